//! # cosim-core
//!
//! Foundation types of the co-simulation RTI kernel: priorities, simulation
//! time, time-advance requests, interactions, the federate boundary, the
//! federation directory and the observability sink.
//!
//! ### Key Submodules:
//! - `priority`: saturating federate priorities used as a tie-break
//! - `request`: `TimedRequest` total order and the pending-request queue
//! - `interaction`: typed, timestamped messages with a tagged payload
//! - `federate` / `federation`: the consumed federate and directory boundaries
//! - `monitor`: best-effort observability hooks

pub mod error;
pub mod federate;
pub mod federation;
pub mod interaction;
pub mod monitor;
pub mod priority;
pub mod request;
pub mod time;

/// Status reported when a run finished normally.
pub const STATUS_CODE_SUCCESS: i32 = 101;
/// Status reported when a run was aborted by a fatal error.
pub const STATUS_CODE_ABORTED: i32 = -1;
/// Status reported when the watchdog aborted a run.
pub const STATUS_CODE_WATCHDOG: i32 = 333;

pub mod prelude {
    pub use crate::error::*;
    pub use crate::federate::*;
    pub use crate::federation::*;
    pub use crate::interaction::*;
    pub use crate::monitor::*;
    pub use crate::priority::*;
    pub use crate::request::*;
    pub use crate::time::*;
}

pub use error::{FederateError, RtiError};
