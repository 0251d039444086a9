//! [`FederateHandle`] implementation driven by a [`FederateScript`].
//!
//! A time-constrained federate buffers received interactions and processes
//! them once it is granted a time at or after their timestamp. A federate
//! that is not time-constrained processes them on receipt.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::trace;

use cosim_core::federate::{FederateHandle, FederateId, RtiAmbassador};
use cosim_core::interaction::Interaction;
use cosim_core::priority::Priority;
use cosim_core::time::SimTime;
use cosim_core::{FederateError, RtiError};

use crate::call_log::{Call, CallLog};
use crate::chaos::inject_fault;
use crate::script::FederateScript;

pub struct ScriptedFederate {
    id: FederateId,
    priority: Priority,
    script: FederateScript,
    log: Arc<CallLog>,
    inbox: Mutex<BTreeSet<Interaction>>,
}

impl ScriptedFederate {
    pub fn new(script: FederateScript, log: Arc<CallLog>) -> Result<Self, RtiError> {
        Ok(Self {
            id: FederateId::from(script.id.as_str()),
            priority: Priority::new(script.priority)?,
            script,
            log,
            inbox: Mutex::new(BTreeSet::new()),
        })
    }

    pub fn script(&self) -> &FederateScript {
        &self.script
    }

    /// Interactions received but not processed yet.
    pub fn buffered(&self) -> usize {
        self.inbox.lock().len()
    }

    fn rejected(&self, what: &str, err: RtiError) -> FederateError {
        FederateError::new(self.id.clone(), format!("{what} rejected")).with_source(err)
    }

    fn request_next(&self, after: Option<SimTime>, rti: &dyn RtiAmbassador) -> Result<(), FederateError> {
        match self.script.next_step(after) {
            Some(next) => rti
                .request_advance_time(next, self.script.lookahead_ns, self.priority)
                .map_err(|err| self.rejected("time advance request", err)),
            None => Ok(()),
        }
    }

    fn process(&self, interaction: &Interaction, rti: &dyn RtiAmbassador) {
        self.log.record(
            &self.id,
            Call::ProcessInteraction {
                type_id: interaction.type_id().to_string(),
                time: interaction.time(),
            },
        );
        rti.report_processed(interaction);
    }

    fn process_inbox(&self, time: SimTime, rti: &dyn RtiAmbassador) {
        let due: Vec<Interaction> = {
            let mut inbox = self.inbox.lock();
            let mut due = Vec::new();
            while inbox.first().is_some_and(|first| first.time() <= time) {
                if let Some(interaction) = inbox.pop_first() {
                    due.push(interaction);
                }
            }
            due
        };
        for interaction in &due {
            self.process(interaction, rti);
        }
    }
}

impl FederateHandle for ScriptedFederate {
    fn id(&self) -> &FederateId {
        &self.id
    }

    fn priority(&self) -> Priority {
        self.priority
    }

    fn is_time_constrained(&self) -> bool {
        self.script.time_constrained
    }

    fn is_time_regulating(&self) -> bool {
        self.script.time_regulating
    }

    fn initialize(
        &self,
        start_time: SimTime,
        end_time: SimTime,
        rti: &dyn RtiAmbassador,
    ) -> Result<(), FederateError> {
        self.log.record(
            &self.id,
            Call::Initialize {
                start: start_time,
                end: end_time,
            },
        );
        if !self.script.subscriptions.is_empty() {
            let type_ids: Vec<&str> = self.script.subscriptions.iter().map(String::as_str).collect();
            rti.subscribe(&type_ids)
                .map_err(|err| self.rejected("subscription", err))?;
        }
        self.request_next(None, rti)
    }

    fn advance_time(&self, time: SimTime, rti: &dyn RtiAmbassador) -> Result<(), FederateError> {
        self.log.record(&self.id, Call::AdvanceTime(time));
        trace!("Federate '{}' advanced to {time}", self.id);

        if let Some(fault) = self.script.fault.as_ref().filter(|fault| fault.at_ns == time) {
            inject_fault(&self.id, time, fault)?;
        }
        if self.script.work_us > 0 {
            thread::sleep(Duration::from_micros(self.script.work_us));
        }

        self.process_inbox(time, rti);

        for spec in self.script.publish.iter().filter(|spec| spec.at_ns == time) {
            rti.publish_interaction(spec.to_interaction())
                .map_err(|err| self.rejected("publication", err))?;
        }

        self.request_next(Some(time), rti)
    }

    fn receive_interaction(
        &self,
        interaction: &Interaction,
        rti: &dyn RtiAmbassador,
    ) -> Result<(), FederateError> {
        self.log.record(
            &self.id,
            Call::ReceiveInteraction {
                type_id: interaction.type_id().to_string(),
                time: interaction.time(),
            },
        );
        if self.script.time_constrained {
            self.inbox.lock().insert(interaction.clone());
        } else {
            self.process(interaction, rti);
        }
        Ok(())
    }

    fn finish_simulation(&self) -> Result<(), FederateError> {
        self.log.record(&self.id, Call::FinishSimulation);
        Ok(())
    }
}
