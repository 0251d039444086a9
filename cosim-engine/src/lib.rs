//! # cosim-engine
//!
//! Conservative time synchronization and interaction routing for a
//! federation of simulators. Construct an [`Engine`] over a
//! [`cosim_core::federation::FederationDirectory`], then call
//! [`Engine::run_simulation`].

pub mod config;
pub mod engine;

pub use config::{EngineParams, SchedulingStrategy};
pub use engine::{prelude, Engine, EngineState, InteractionRouter, RunReport};
