//! YAML scenarios: a federation of scripted federates.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;
use validator::{Validate, ValidationErrors};

use cosim_core::federation::LocalFederation;
use cosim_core::time::SimTime;
use cosim_core::RtiError;

use crate::call_log::CallLog;
use crate::federate::ScriptedFederate;
use crate::script::{validate_identifier, FederateScript};

#[derive(Error, Debug)]
pub enum ScenarioError {
    #[error("Scenario file not found: {0}")]
    FileNotFound(PathBuf),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Deserialization error: {0}")]
    Serde(#[from] serde_yaml::Error),
    #[error("Invalid scenario: {0}")]
    Validation(#[from] ValidationErrors),
    #[error("Could not build federation: {0}")]
    Federation(#[from] RtiError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct Scenario {
    #[validate(custom(function = validate_identifier))]
    pub federation_id: String,

    /// Overrides the configured end time when present.
    #[serde(default)]
    pub end_time_ns: Option<SimTime>,

    #[validate(length(min = 1), nested)]
    pub federates: Vec<FederateScript>,
}

impl Scenario {
    pub fn from_yaml(yaml: &str) -> Result<Self, ScenarioError> {
        let scenario: Scenario = serde_yaml::from_str(yaml)?;
        scenario.validate()?;
        Ok(scenario)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ScenarioError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ScenarioError::FileNotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn to_yaml(&self) -> Result<String, ScenarioError> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Joins one [`ScriptedFederate`] per script, in declaration order, all
    /// recording into `log`.
    pub fn build(&self, log: &Arc<CallLog>) -> Result<LocalFederation, ScenarioError> {
        let federation = LocalFederation::new(self.federation_id.as_str());
        for script in &self.federates {
            let federate = ScriptedFederate::new(script.clone(), log.clone())?;
            federation.join(Arc::new(federate))?;
        }
        info!(
            "Built federation '{}' with {} scripted federates",
            self.federation_id,
            self.federates.len()
        );
        Ok(federation)
    }
}
