mod kernel;
mod pool;
mod progress;
mod report;
mod router;
mod runtime;
mod watchdog;

pub use self::{
    report::RunReport,
    router::InteractionRouter,
    runtime::{Engine, EngineState},
};

pub mod prelude {
    pub use super::{Engine, EngineState, InteractionRouter, RunReport};
    pub use crate::config::{EngineParams, SchedulingStrategy};
}
