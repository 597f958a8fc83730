use auditlog_types::{MAX_RECIPIENTS, RunConfig};
use chrono_tz::Tz;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("at least one recipient is required")]
    NoRecipients,
    #[error("{count} recipients configured, at most {max} are allowed")]
    TooManyRecipients { count: usize, max: usize },
    #[error("recipient '{0}' is not an e-mail address")]
    InvalidRecipient(String),
    #[error("time zone '{0}' is not a known IANA zone")]
    UnknownTimeZone(String),
}

/// Check the constraints serde cannot express.
pub fn validate_run_config(config: &RunConfig) -> Result<(), ConfigError> {
    if config.recipients.is_empty() {
        return Err(ConfigError::NoRecipients);
    }
    if config.recipients.len() > MAX_RECIPIENTS {
        return Err(ConfigError::TooManyRecipients {
            count: config.recipients.len(),
            max: MAX_RECIPIENTS,
        });
    }
    if let Some(bad) = config.recipients.iter().find(|r| !r.contains('@')) {
        return Err(ConfigError::InvalidRecipient(bad.clone()));
    }
    resolve_time_zone(&config.time_zone)?;
    Ok(())
}

/// Look up an IANA zone name such as `America/Los_Angeles`.
pub fn resolve_time_zone(name: &str) -> Result<Tz, ConfigError> {
    name.trim()
        .parse::<Tz>()
        .map_err(|_| ConfigError::UnknownTimeZone(name.to_string()))
}
