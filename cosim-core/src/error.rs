//! Error taxonomy of the RTI kernel.
//!
//! Admission errors (`OutOfOrderRequest`, `InteractionInPast`, ...) are returned
//! synchronously to the caller and leave the run intact. Everything flagged by
//! [`RtiError::is_fatal`] aborts the whole simulation run.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::federate::FederateId;
use crate::time::SimTime;

/// Shared error source attached to a [`FederateError`].
pub type SharedError = Arc<dyn std::error::Error + Send + Sync + 'static>;

/// Failure reported by a federate implementation.
#[derive(Debug, Clone, Error)]
#[error("federate '{federate}' failed: {message}")]
pub struct FederateError {
    pub federate: FederateId,
    pub message: String,
    #[source]
    pub source: Option<SharedError>,
}

impl FederateError {
    pub fn new(federate: impl Into<FederateId>, message: impl Into<String>) -> Self {
        Self {
            federate: federate.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Attaches the underlying cause.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.source = Some(Arc::new(source));
        self
    }
}

/// Federates that were still executing when the watchdog fired.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingFederates(pub Vec<FederateId>);

impl fmt::Display for PendingFederates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("unknown");
        }
        for (i, id) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{id}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Error)]
pub enum RtiError {
    #[error(
        "federate '{federate}' requested time {requested} which is already in the past (current time is {current})"
    )]
    OutOfOrderRequest {
        federate: FederateId,
        requested: SimTime,
        current: SimTime,
    },

    #[error(
        "federate '{federate}' requested time {requested} while its request for {outstanding} is still pending"
    )]
    DuplicateRequest {
        federate: FederateId,
        requested: SimTime,
        outstanding: SimTime,
    },

    #[error("federate with id '{0}' is unknown")]
    UnknownFederate(FederateId),

    #[error("federate with id '{0}' has already joined the federation")]
    AlreadyJoined(FederateId),

    #[error("interaction '{type_id}' at {time} is in the past (current time is {current})")]
    InteractionInPast {
        type_id: String,
        time: SimTime,
        current: SimTime,
    },

    #[error(
        "federate '{federate}' published '{type_id}' at {time}, earlier than its lookahead bound {bound}"
    )]
    LookaheadViolation {
        federate: FederateId,
        type_id: String,
        time: SimTime,
        bound: SimTime,
    },

    #[error("{type_id} at {time} ns: sender id '{sender}' cannot be set as sender id was already assigned")]
    SenderAlreadyAssigned {
        type_id: String,
        time: SimTime,
        sender: FederateId,
    },

    #[error("invalid priority {0}, allowed range is 100 - 0 (lowest priority - highest priority)")]
    InvalidPriority(u8),

    #[error("invalid end time: {0}")]
    InvalidEndTime(SimTime),

    #[error("invalid engine state: expected {expected}, found {found}")]
    InvalidState {
        expected: &'static str,
        found: &'static str,
    },

    #[error(transparent)]
    Federate(#[from] FederateError),

    #[error(
        "one or more federates did not respond for {timeout:?} at simulation time {time} (pending: {pending})"
    )]
    WatchdogTimeout {
        timeout: Duration,
        time: SimTime,
        pending: PendingFederates,
    },
}

impl RtiError {
    /// Whether this error terminates the simulation run.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            RtiError::DuplicateRequest { .. }
                | RtiError::Federate(_)
                | RtiError::WatchdogTimeout { .. }
        )
    }

    /// Status code reported to the monitor when this error ends a run.
    pub fn status_code(&self) -> i32 {
        match self {
            RtiError::WatchdogTimeout { .. } => crate::STATUS_CODE_WATCHDOG,
            _ => crate::STATUS_CODE_ABORTED,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admission_errors_are_not_fatal() {
        let err = RtiError::OutOfOrderRequest {
            federate: FederateId::from("sumo"),
            requested: 5,
            current: 10,
        };
        assert!(!err.is_fatal());
        assert!(err.to_string().contains("already in the past"));
    }

    #[test]
    fn federate_errors_are_fatal_and_keep_context() {
        let err: RtiError = FederateError::new("ns3", "socket closed").into();
        assert!(err.is_fatal());
        assert_eq!(err.status_code(), crate::STATUS_CODE_ABORTED);
        assert_eq!(err.to_string(), "federate 'ns3' failed: socket closed");
    }

    #[test]
    fn federate_error_keeps_its_source() {
        use std::error::Error as _;
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe");
        let err = FederateError::new("sumo", "traci connection lost").with_source(io);
        assert_eq!(err.source().unwrap().to_string(), "pipe");
        let cloned = err.clone();
        assert!(cloned.source().is_some());
    }

    #[test]
    fn watchdog_lists_pending_federates() {
        let err = RtiError::WatchdogTimeout {
            timeout: Duration::from_secs(1),
            time: 42,
            pending: PendingFederates(vec![FederateId::from("a"), FederateId::from("b")]),
        };
        assert_eq!(err.status_code(), crate::STATUS_CODE_WATCHDOG);
        assert!(err.to_string().contains("pending: a, b"));
    }
}
