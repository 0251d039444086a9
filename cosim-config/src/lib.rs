//! # Cosim Configuration System
//!
//! Hierarchical configuration for the co-simulation kernel and its tooling.
//!
//! ## Features
//! - **Unified Configuration**: one document for engine and telemetry settings
//! - **Validation**: ranges and strategy names are checked after loading
//! - **Environment Awareness**: per-environment overrides and `COSIM_*` variables

#![warn(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

mod engine;
mod error;
mod telemetry;
mod validation;

pub use engine::{EngineConfig, STRATEGY_SEQUENTIAL, STRATEGY_WORKER_POOL};
pub use error::ConfigError;
pub use telemetry::TelemetryConfig;

/// Top-level configuration container.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, Default)]
pub struct CosimConfig {
    /// Time-synchronization engine parameters.
    #[validate(nested)]
    #[serde(default)]
    pub engine: EngineConfig,

    /// Logging and metrics.
    #[validate(nested)]
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl CosimConfig {
    /// Load configuration from default files and environment.
    ///
    /// Hierarchy:
    /// 1. Default values
    /// 2. `config/cosim.yaml`, if present
    /// 3. `config/<COSIM_ENV>.yaml`, if present
    /// 4. `COSIM_*` environment variables, nested keys split on `__`
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(CosimConfig::default()));

        if Path::new("config/cosim.yaml").exists() {
            figment = figment.merge(Yaml::file("config/cosim.yaml"));
        }

        let env = std::env::var("COSIM_ENV").unwrap_or_else(|_| "development".into());
        let env_file = format!("config/{}.yaml", env);
        if Path::new(&env_file).exists() {
            figment = figment.merge(Yaml::file(env_file));
        }

        Self::extract(figment.merge(Env::prefixed("COSIM_").split("__")))
    }

    /// Load configuration from a specific file, on top of the defaults.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::FileNotFound(PathBuf::from(path)));
        }

        Self::extract(
            Figment::from(Serialized::defaults(CosimConfig::default()))
                .merge(Yaml::file(path))
                .merge(Env::prefixed("COSIM_").split("__")),
        )
    }

    fn extract(figment: Figment) -> Result<Self, ConfigError> {
        figment
            .extract()
            .map_err(ConfigError::from)
            .and_then(|config: Self| {
                config.validate()?;
                Ok(config)
            })
    }
}
