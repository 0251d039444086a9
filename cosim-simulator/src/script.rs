//! Declarative behaviour of a scripted federate.

use std::time::Duration;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use cosim_core::interaction::{Interaction, Payload};
use cosim_core::time::SimTime;

use crate::chaos::{FaultKind, FaultSpec};

lazy_static! {
    static ref IDENTIFIER: Regex = Regex::new(r"^[A-Za-z][A-Za-z0-9_.\-]*$").unwrap();
}

pub(crate) fn validate_identifier(id: &str) -> Result<(), ValidationError> {
    if IDENTIFIER.is_match(id) {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_identifier"))
    }
}

fn validate_steps(steps: &[SimTime]) -> Result<(), ValidationError> {
    if steps.windows(2).all(|pair| pair[0] < pair[1]) {
        Ok(())
    } else {
        Err(ValidationError::new("steps_not_increasing"))
    }
}

/// An interaction the federate publishes when advanced to `at_ns`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct PublishSpec {
    pub at_ns: SimTime,
    #[validate(custom(function = validate_identifier))]
    pub type_id: String,
    /// Timestamp offset from `at_ns`. Must respect the federate's lookahead.
    #[serde(default)]
    pub delay_ns: SimTime,
    #[serde(default)]
    pub text: Option<String>,
}

impl PublishSpec {
    pub(crate) fn to_interaction(&self) -> Interaction {
        let payload = self
            .text
            .as_ref()
            .map_or(Payload::Empty, |text| Payload::Text(text.clone()));
        Interaction::new(
            self.type_id.clone(),
            self.at_ns.saturating_add(self.delay_ns),
            payload,
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct FederateScript {
    #[validate(custom(function = validate_identifier))]
    pub id: String,

    /// 0 is the highest priority, 100 the lowest.
    #[serde(default = "default_priority")]
    #[validate(range(max = 100))]
    pub priority: u8,

    #[serde(default)]
    pub lookahead_ns: SimTime,

    #[serde(default = "default_true")]
    pub time_constrained: bool,

    #[serde(default = "default_true")]
    pub time_regulating: bool,

    #[serde(default)]
    pub subscriptions: Vec<String>,

    /// Times the federate asks to be advanced to, strictly increasing.
    #[serde(default)]
    #[validate(custom(function = validate_steps))]
    pub steps_ns: Vec<SimTime>,

    #[serde(default)]
    #[validate(nested)]
    pub publish: Vec<PublishSpec>,

    /// Wall-clock work done per step, in microseconds.
    #[serde(default)]
    pub work_us: u64,

    #[serde(default)]
    pub fault: Option<FaultSpec>,
}

fn default_priority() -> u8 {
    50
}

fn default_true() -> bool {
    true
}

impl FederateScript {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            priority: default_priority(),
            lookahead_ns: 0,
            time_constrained: true,
            time_regulating: true,
            subscriptions: Vec::new(),
            steps_ns: Vec::new(),
            publish: Vec::new(),
            work_us: 0,
            fault: None,
        }
    }

    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_lookahead(mut self, lookahead: SimTime) -> Self {
        self.lookahead_ns = lookahead;
        self
    }

    pub fn with_steps(mut self, steps: impl IntoIterator<Item = SimTime>) -> Self {
        self.steps_ns = steps.into_iter().collect();
        self
    }

    pub fn with_subscription(mut self, type_id: impl Into<String>) -> Self {
        self.subscriptions.push(type_id.into());
        self
    }

    pub fn with_publication(mut self, at: SimTime, type_id: impl Into<String>, delay: SimTime) -> Self {
        self.publish.push(PublishSpec {
            at_ns: at,
            type_id: type_id.into(),
            delay_ns: delay,
            text: None,
        });
        self
    }

    pub fn with_time_constrained(mut self, constrained: bool) -> Self {
        self.time_constrained = constrained;
        self
    }

    pub fn with_work(mut self, work: Duration) -> Self {
        self.work_us = work.as_micros() as u64;
        self
    }

    pub fn with_fault(mut self, at: SimTime, kind: FaultKind) -> Self {
        self.fault = Some(FaultSpec {
            at_ns: at,
            kind,
            hang_ms: 0,
        });
        self
    }

    pub fn with_hang(mut self, at: SimTime, hang: Duration) -> Self {
        self.fault = Some(FaultSpec {
            at_ns: at,
            kind: FaultKind::Hang,
            hang_ms: hang.as_millis() as u64,
        });
        self
    }

    /// First step strictly after `time`, or the first step when `time` is
    /// `None`.
    pub fn next_step(&self, time: Option<SimTime>) -> Option<SimTime> {
        self.steps_ns
            .iter()
            .copied()
            .find(|step| time.map_or(true, |time| *step > time))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_step_follows_the_script() {
        let script = FederateScript::new("sumo").with_steps([0, 10, 20]);
        assert_eq!(script.next_step(None), Some(0));
        assert_eq!(script.next_step(Some(0)), Some(10));
        assert_eq!(script.next_step(Some(15)), Some(20));
        assert_eq!(script.next_step(Some(20)), None);
    }

    #[test]
    fn validates_steps_and_ids() {
        assert!(FederateScript::new("ok").with_steps([1, 2]).validate().is_ok());
        assert!(FederateScript::new("ok").with_steps([2, 2]).validate().is_err());
        assert!(FederateScript::new("9lives").validate().is_err());
        assert!(FederateScript::new("ok").with_priority(101).validate().is_err());
        assert!(FederateScript::new("ok")
            .with_publication(0, "bad type", 0)
            .validate()
            .is_err());
    }

    #[test]
    fn publication_timestamp_includes_delay() {
        let spec = PublishSpec {
            at_ns: 100,
            type_id: "V2xMessage".into(),
            delay_ns: 5,
            text: Some("hello".into()),
        };
        let interaction = spec.to_interaction();
        assert_eq!(interaction.time(), 105);
        assert_eq!(interaction.payload(), &Payload::Text("hello".into()));
    }
}
