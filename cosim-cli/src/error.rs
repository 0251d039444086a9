use cosim_core::{RtiError, STATUS_CODE_WATCHDOG};

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("simulation of '{federation}' failed with status {status_code}")]
    RunFailed {
        federation: String,
        status_code: i32,
        #[source]
        source: RtiError,
    },
}

impl CliError {
    pub fn exit_code(&self) -> u8 {
        match self {
            CliError::RunFailed { status_code, .. } if *status_code == STATUS_CODE_WATCHDOG => 2,
            _ => 1,
        }
    }
}
