//! Custom validation functions for configuration.

use lazy_static::lazy_static;
use regex::Regex;
use validator::ValidationError;

lazy_static! {
    static ref STRATEGY: Regex = Regex::new("^(sequential|worker-pool)$").unwrap();
}

/// Validate the scheduling strategy name.
pub fn validate_strategy(strategy: &str) -> Result<(), ValidationError> {
    if STRATEGY.is_match(strategy) {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_strategy"))
    }
}

/// Validate a tracing filter directive such as `info` or `cosim_engine=debug,warn`.
pub fn validate_log_filter(filter: &str) -> Result<(), ValidationError> {
    let valid = !filter.trim().is_empty()
        && filter
            .split(',')
            .all(|directive| !directive.trim().is_empty() && !directive.contains(char::is_whitespace));
    if valid {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_log_filter"))
    }
}
