//! Process configuration.
//!
//! Loaded once at startup from a JSON file. Validation is the only fatal
//! error path in the process; everything downstream of startup keeps running
//! on a per-stream basis.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub broker: BrokerConfig,
    pub store: StoreConfig,
    pub spool: SpoolConfig,
}

/// Broker connection and consumption settings.
#[derive(Debug, Clone, Deserialize)]
pub struct BrokerConfig {
    pub bootstrap: String,
    pub group_id: String,
    pub topics: Vec<String>,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default = "default_poll_timeout_ms")]
    pub poll_timeout_ms: u64,
}

/// Object store target. Credentials are optional; when absent the ambient
/// provider chain is used.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    pub bucket: String,
    pub region: String,
    #[serde(default)]
    pub access_key: Option<String>,
    #[serde(default)]
    pub access_secret: Option<String>,
    #[serde(default)]
    pub prefix: String,
}

/// Local segment spool settings.
#[derive(Debug, Clone, Deserialize)]
pub struct SpoolConfig {
    pub dir: PathBuf,
    #[serde(default = "default_rotate_size_mb")]
    pub rotate_size_mb: u64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default)]
    pub fsync_on_write: bool,
    #[serde(default)]
    pub retain_raw: bool,
}

fn default_queue_capacity() -> usize {
    1024
}

fn default_poll_timeout_ms() -> u64 {
    5000
}

fn default_rotate_size_mb() -> u64 {
    64
}

fn default_poll_interval_ms() -> u64 {
    1000
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&raw)
            .map_err(|err| Error::Config(format!("{}: {err}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.broker.bootstrap.is_empty() {
            return Err(Error::Config("broker.bootstrap is empty".to_string()));
        }
        if self.broker.group_id.is_empty() {
            return Err(Error::Config("broker.group_id is empty".to_string()));
        }
        if self.broker.topics.is_empty() {
            return Err(Error::Config("broker.topics is empty".to_string()));
        }
        if self.broker.queue_capacity == 0 {
            return Err(Error::Config("broker.queue_capacity must be > 0".to_string()));
        }
        if self.store.bucket.is_empty() {
            return Err(Error::Config("store.bucket is empty".to_string()));
        }
        if self.spool.rotate_size_mb == 0 {
            return Err(Error::Config("spool.rotate_size_mb must be > 0".to_string()));
        }
        Ok(())
    }

    /// One spec per configured topic, bound 1:1 to a segment writer and a
    /// rotation controller at startup.
    pub fn stream_specs(&self) -> Vec<StreamSpec> {
        self.broker
            .topics
            .iter()
            .map(|name| StreamSpec {
                name: name.clone(),
                queue_capacity: self.broker.queue_capacity,
                threshold_bytes: self.spool.rotate_size_mb * 1024 * 1024,
                poll_interval: Duration::from_millis(self.spool.poll_interval_ms),
                fsync_on_write: self.spool.fsync_on_write,
            })
            .collect()
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.broker.poll_timeout_ms)
    }
}

/// Per-stream settings, immutable for the process lifetime.
#[derive(Debug, Clone)]
pub struct StreamSpec {
    pub name: String,
    pub queue_capacity: usize,
    pub threshold_bytes: u64,
    pub poll_interval: Duration,
    pub fsync_on_write: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "broker": {
            "bootstrap": "localhost:9092",
            "group_id": "granary",
            "topics": ["orders", "positions"]
        },
        "store": {
            "bucket": "archive-bucket",
            "region": "eu-west-1",
            "prefix": "raw"
        },
        "spool": {
            "dir": "/var/spool/granary",
            "rotate_size_mb": 128
        }
    }"#;

    #[test]
    fn parse_applies_defaults() {
        let config: Config = serde_json::from_str(SAMPLE).expect("parse");
        config.validate().expect("valid");

        assert_eq!(config.broker.queue_capacity, 1024);
        assert_eq!(config.broker.poll_timeout_ms, 5000);
        assert!(!config.spool.fsync_on_write);
        assert!(!config.spool.retain_raw);

        let specs = config.stream_specs();
        assert_eq!(specs.len(), 2);
        assert_eq!(specs[0].name, "orders");
        assert_eq!(specs[0].threshold_bytes, 128 * 1024 * 1024);
    }

    #[test]
    fn validate_rejects_empty_topics() {
        let mut config: Config = serde_json::from_str(SAMPLE).expect("parse");
        config.broker.topics.clear();
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn validate_rejects_zero_threshold() {
        let mut config: Config = serde_json::from_str(SAMPLE).expect("parse");
        config.spool.rotate_size_mb = 0;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }
}
