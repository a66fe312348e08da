//! Service configuration read from the environment.

use std::str::FromStr;

use queue_core::{QueueError, ServiceConfig};
use thiserror::Error;

pub const CAPACITY: &str = "TASK_QUEUE_CAPACITY";
pub const HISTORY_LIMIT: &str = "TASK_QUEUE_HISTORY_LIMIT";
pub const CALL_TIMEOUT_MS: &str = "TASK_QUEUE_CALL_TIMEOUT_MS";
pub const WORKERS: &str = "TASK_QUEUE_WORKERS";
pub const POLL_INTERVAL_MS: &str = "TASK_QUEUE_POLL_INTERVAL_MS";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{key} has an invalid value: {value:?}")]
    Invalid { key: &'static str, value: String },
    #[error(transparent)]
    Queue(#[from] QueueError),
}

/// Build the service configuration from process environment variables.
pub fn from_env() -> Result<ServiceConfig, ConfigError> {
    from_lookup(|key| std::env::var(key).ok())
}

/// Build the service configuration from an arbitrary variable source.
///
/// Unset variables keep their defaults; set but unparsable ones are errors.
pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<ServiceConfig, ConfigError> {
    let mut config = ServiceConfig::default();

    if let Some(capacity) = parse(&lookup, CAPACITY)? {
        config.queue.capacity = capacity;
    }
    if let Some(limit) = parse(&lookup, HISTORY_LIMIT)? {
        config.queue.history_limit = Some(limit);
    }
    if let Some(timeout) = parse(&lookup, CALL_TIMEOUT_MS)? {
        config.queue.call_timeout_ms = timeout;
    }
    if let Some(workers) = parse(&lookup, WORKERS)? {
        config.pool.workers = workers;
    }
    if let Some(interval) = parse(&lookup, POLL_INTERVAL_MS)? {
        config.pool.poll_interval_ms = interval;
    }

    config.validate()?;
    Ok(config)
}

fn parse<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<T>, ConfigError> {
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { key, value: raw }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn empty_environment_gives_defaults() {
        let config = from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, ServiceConfig::default());
    }

    #[test]
    fn variables_override_defaults() {
        let config = from_lookup(lookup(&[
            (CAPACITY, "8"),
            (HISTORY_LIMIT, "50"),
            (WORKERS, " 3 "),
            (POLL_INTERVAL_MS, "250"),
        ]))
        .unwrap();

        assert_eq!(config.queue.capacity, 8);
        assert_eq!(config.queue.history_limit, Some(50));
        assert_eq!(config.pool.workers, 3);
        assert_eq!(config.pool.poll_interval_ms, 250);
    }

    #[test]
    fn unparsable_value_names_the_variable() {
        let err = from_lookup(lookup(&[(WORKERS, "many")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: WORKERS, .. }));
        assert!(err.to_string().contains(WORKERS));
    }

    #[test]
    fn zero_capacity_fails_validation() {
        let err = from_lookup(lookup(&[(CAPACITY, "0")])).unwrap_err();
        assert!(matches!(err, ConfigError::Queue(QueueError::InvalidArgument(_))));
    }
}
