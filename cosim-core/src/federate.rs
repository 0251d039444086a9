//! ## cosim-core::federate
//! **The federate boundary**
//!
//! [`FederateHandle`] is the kernel-side proxy of a joined federate. The kernel
//! never stores references back into itself inside a handle: every callback
//! receives a borrowed [`RtiAmbassador`] bound to the calling federate, through
//! which the federate requests time advances and publishes interactions.
//!
//! Handles are invoked from the control thread and, with the worker-pool
//! strategy, from worker threads. Each handle is responsible for its own
//! internal synchronization.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{FederateError, RtiError};
use crate::interaction::Interaction;
use crate::priority::Priority;
use crate::time::SimTime;

/// Identifier of a joined federate. Cheap to clone.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FederateId(Arc<str>);

impl FederateId {
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(Arc::from(id.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for FederateId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for FederateId {
    fn from(id: String) -> Self {
        Self(Arc::from(id))
    }
}

impl From<&FederateId> for FederateId {
    fn from(id: &FederateId) -> Self {
        id.clone()
    }
}

impl AsRef<str> for FederateId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FederateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Services the kernel offers to a federate during a callback.
pub trait RtiAmbassador {
    /// The federate this context is bound to.
    fn federate_id(&self) -> &FederateId;

    /// Current federation time.
    fn now(&self) -> SimTime;

    /// Configured end of the simulation.
    fn end_time(&self) -> SimTime;

    /// Requests to be advanced to `time`. The federate promises not to publish
    /// interactions earlier than `time + lookahead` once granted.
    fn request_advance_time(
        &self,
        time: SimTime,
        lookahead: SimTime,
        priority: Priority,
    ) -> Result<(), RtiError>;

    /// Routes an interaction to every subscriber before returning.
    fn publish_interaction(&self, interaction: Interaction) -> Result<(), RtiError>;

    fn subscribe(&self, type_ids: &[&str]) -> Result<(), RtiError>;

    fn unsubscribe(&self, type_ids: &[&str]);

    /// Earliest pending request time in the federation, if any.
    fn next_event_time(&self) -> Option<SimTime>;

    /// Tells the observability sink that the federate processed `interaction`.
    fn report_processed(&self, interaction: &Interaction);
}

/// Kernel-side representation of a joined federate.
pub trait FederateHandle: Send + Sync {
    fn id(&self) -> &FederateId;

    /// Tie-break priority; lower values are served first.
    fn priority(&self) -> Priority;

    fn is_time_constrained(&self) -> bool;

    fn is_time_regulating(&self) -> bool;

    /// Called once before the main loop, in join order.
    fn initialize(
        &self,
        start_time: SimTime,
        end_time: SimTime,
        rti: &dyn RtiAmbassador,
    ) -> Result<(), FederateError>;

    /// Grants the federate's pending request for `time`.
    fn advance_time(&self, time: SimTime, rti: &dyn RtiAmbassador) -> Result<(), FederateError>;

    /// Delivers an interaction the federate subscribed to.
    fn receive_interaction(
        &self,
        interaction: &Interaction,
        rti: &dyn RtiAmbassador,
    ) -> Result<(), FederateError>;

    /// Called exactly once while the engine drains.
    fn finish_simulation(&self) -> Result<(), FederateError>;
}

impl fmt::Debug for dyn FederateHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FederateHandle")
            .field("id", self.id())
            .field("priority", &self.priority())
            .finish()
    }
}
