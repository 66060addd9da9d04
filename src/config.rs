//! Runtime configuration, read from environment variables with defaults.

use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}

/// Order lifecycle configuration
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Environment: development | staging | production
    pub environment: String,
    /// Mailbox capacity of every actor
    pub actor_buffer_size: usize,
    /// Fan-out exchange order events are published to
    pub orders_exchange: String,
    /// Queue the notification consumer reads from
    pub notifications_queue: String,
    /// Max unacknowledged deliveries per consumer
    pub consumer_prefetch: usize,
    /// Deadline for identity and catalog calls
    pub collaborator_timeout: Duration,
    /// How often the outbox reconciler runs
    pub outbox_reconcile_interval: Duration,
    /// Publish attempts per outbox entry before it is left for an operator
    pub outbox_max_attempts: u32,
    pub default_page_size: u32,
    pub max_page_size: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            environment: "development".into(),
            actor_buffer_size: 32,
            orders_exchange: "orders".into(),
            notifications_queue: "notifications".into(),
            consumer_prefetch: 1,
            collaborator_timeout: Duration::from_millis(10_000),
            outbox_reconcile_interval: Duration::from_millis(5_000),
            outbox_max_attempts: 5,
            default_page_size: 20,
            max_page_size: 50,
        }
    }
}

fn parse_or<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(key) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
    }
}

fn positive<T: PartialEq + Default + ToString>(key: &'static str, value: T) -> Result<T, ConfigError> {
    if value == T::default() {
        return Err(ConfigError::Invalid { key, value: value.to_string() });
    }
    Ok(value)
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from any key/value source. Missing keys take their default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let config = Self {
            environment: lookup("ENVIRONMENT").unwrap_or(defaults.environment),
            actor_buffer_size: positive(
                "ACTOR_BUFFER_SIZE",
                parse_or(&lookup, "ACTOR_BUFFER_SIZE", defaults.actor_buffer_size)?,
            )?,
            orders_exchange: lookup("ORDERS_EXCHANGE")
                .filter(|s| !s.is_empty())
                .unwrap_or(defaults.orders_exchange),
            notifications_queue: lookup("NOTIFICATIONS_QUEUE")
                .filter(|s| !s.is_empty())
                .unwrap_or(defaults.notifications_queue),
            consumer_prefetch: positive(
                "CONSUMER_PREFETCH",
                parse_or(&lookup, "CONSUMER_PREFETCH", defaults.consumer_prefetch)?,
            )?,
            collaborator_timeout: Duration::from_millis(positive(
                "COLLABORATOR_TIMEOUT_MS",
                parse_or(&lookup, "COLLABORATOR_TIMEOUT_MS", 10_000u64)?,
            )?),
            outbox_reconcile_interval: Duration::from_millis(positive(
                "OUTBOX_RECONCILE_INTERVAL_MS",
                parse_or(&lookup, "OUTBOX_RECONCILE_INTERVAL_MS", 5_000u64)?,
            )?),
            outbox_max_attempts: parse_or(&lookup, "OUTBOX_MAX_ATTEMPTS", defaults.outbox_max_attempts)?,
            default_page_size: positive(
                "DEFAULT_PAGE_SIZE",
                parse_or(&lookup, "DEFAULT_PAGE_SIZE", defaults.default_page_size)?,
            )?,
            max_page_size: positive("MAX_PAGE_SIZE", parse_or(&lookup, "MAX_PAGE_SIZE", defaults.max_page_size)?)?,
        };

        if config.default_page_size > config.max_page_size {
            return Err(ConfigError::Invalid {
                key: "DEFAULT_PAGE_SIZE",
                value: config.default_page_size.to_string(),
            });
        }
        Ok(config)
    }

    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from_pairs(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults_when_unset() {
        assert_eq!(from_pairs(&[]).unwrap(), Config::default());
        assert!(Config::default().is_development());
    }

    #[test]
    fn test_overrides() {
        let config = from_pairs(&[
            ("ENVIRONMENT", "production"),
            ("CONSUMER_PREFETCH", "4"),
            ("COLLABORATOR_TIMEOUT_MS", "250"),
            ("ORDERS_EXCHANGE", "orders.v2"),
        ])
        .unwrap();

        assert_eq!(config.consumer_prefetch, 4);
        assert_eq!(config.collaborator_timeout, Duration::from_millis(250));
        assert_eq!(config.orders_exchange, "orders.v2");
        assert!(!config.is_development());
    }

    #[test]
    fn test_rejects_garbage_and_zero() {
        assert_eq!(
            from_pairs(&[("ACTOR_BUFFER_SIZE", "lots")]),
            Err(ConfigError::Invalid { key: "ACTOR_BUFFER_SIZE", value: "lots".into() })
        );
        assert_eq!(
            from_pairs(&[("CONSUMER_PREFETCH", "0")]),
            Err(ConfigError::Invalid { key: "CONSUMER_PREFETCH", value: "0".into() })
        );
        assert!(from_pairs(&[("DEFAULT_PAGE_SIZE", "80")]).is_err());
    }
}
