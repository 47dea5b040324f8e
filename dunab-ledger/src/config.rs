//! Configuration for the ledger

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

/// Ledger configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Data directory for RocksDB
    pub data_dir: PathBuf,

    /// Service name
    pub service_name: String,

    /// Service version
    pub service_version: String,

    /// RocksDB configuration
    pub rocksdb: RocksDBConfig,

    /// Ledger engine configuration
    pub ledger: LedgerConfig,

    /// Notification dispatch configuration
    pub notifications: NotificationConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data/dunab"),
            service_name: "dunab-ledger".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            rocksdb: RocksDBConfig::default(),
            ledger: LedgerConfig::default(),
            notifications: NotificationConfig::default(),
        }
    }
}

/// RocksDB configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RocksDBConfig {
    /// Write buffer size (MB)
    pub write_buffer_size_mb: usize,

    /// Max write buffers
    pub max_write_buffer_number: i32,

    /// Max background jobs (compaction + flush)
    pub max_background_jobs: i32,

    /// fsync the WAL on every commit
    pub sync_writes: bool,

    /// Enable statistics
    pub enable_statistics: bool,
}

impl Default for RocksDBConfig {
    fn default() -> Self {
        Self {
            write_buffer_size_mb: 64,
            max_write_buffer_number: 3,
            max_background_jobs: 2,
            sync_writes: true,
            enable_statistics: false,
        }
    }
}

/// What to do when a request exceeds the account's `transaction_limit`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LimitPolicy {
    /// Log a warning and let the transaction through
    Advisory,
    /// Reject with `LimitExceeded`
    Enforce,
}

impl FromStr for LimitPolicy {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "advisory" => Ok(LimitPolicy::Advisory),
            "enforce" => Ok(LimitPolicy::Enforce),
            other => Err(crate::Error::Config(format!("Unknown limit policy: {}", other))),
        }
    }
}

/// Ledger engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Balance granted when an account is opened
    pub opening_balance: Decimal,

    /// Per-transaction cap given to new accounts
    pub default_transaction_limit: Option<Decimal>,

    /// Transaction limit handling
    pub limit_policy: LimitPolicy,

    /// Shared capacity of the recent-transaction cache
    pub cache_capacity: usize,

    /// Actor mailbox size (backpressure bound)
    pub mailbox_capacity: usize,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            opening_balance: Decimal::new(50000, 2),              // 500.00
            default_transaction_limit: Some(Decimal::new(1_000_000, 2)), // 10000.00
            limit_policy: LimitPolicy::Advisory,
            cache_capacity: crate::cache::DEFAULT_CAPACITY,
            mailbox_capacity: 1000,
        }
    }
}

/// Notification dispatch configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    /// Run the dispatcher task
    pub enabled: bool,

    /// Poll interval (milliseconds)
    pub poll_interval_ms: u64,

    /// Maximum events handed to the sink per poll
    pub max_batch: usize,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            poll_interval_ms: 500,
            max_batch: 100,
        }
    }
}

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse from a TOML document
    pub fn from_toml(content: &str) -> crate::Result<Self> {
        let config: Config = toml::from_str(content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> crate::Result<Self> {
        let mut config = Config::default();

        if let Ok(data_dir) = std::env::var("DUNAB_DATA_DIR") {
            config.data_dir = PathBuf::from(data_dir);
        }

        if let Ok(balance) = std::env::var("DUNAB_OPENING_BALANCE") {
            config.ledger.opening_balance = Decimal::from_str(&balance).map_err(|e| {
                crate::Error::Config(format!("Invalid DUNAB_OPENING_BALANCE: {}", e))
            })?;
        }

        if let Ok(capacity) = std::env::var("DUNAB_CACHE_CAPACITY") {
            config.ledger.cache_capacity = capacity.parse().map_err(|e| {
                crate::Error::Config(format!("Invalid DUNAB_CACHE_CAPACITY: {}", e))
            })?;
        }

        if let Ok(policy) = std::env::var("DUNAB_LIMIT_POLICY") {
            config.ledger.limit_policy = policy.parse()?;
        }

        if let Ok(poll) = std::env::var("DUNAB_NOTIFY_POLL_MS") {
            config.notifications.poll_interval_ms = poll.parse().map_err(|e| {
                crate::Error::Config(format!("Invalid DUNAB_NOTIFY_POLL_MS: {}", e))
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject settings the ledger cannot run with
    pub fn validate(&self) -> crate::Result<()> {
        if self.ledger.opening_balance < Decimal::ZERO {
            return Err(crate::Error::Config(
                "opening_balance cannot be negative".to_string(),
            ));
        }

        if self.ledger.opening_balance.normalize().scale() > crate::types::DUNAB_SCALE {
            return Err(crate::Error::Config(format!(
                "opening_balance {} has more than {} fractional digits",
                self.ledger.opening_balance,
                crate::types::DUNAB_SCALE
            )));
        }

        if let Some(limit) = self.ledger.default_transaction_limit {
            if limit <= Decimal::ZERO {
                return Err(crate::Error::Config(
                    "default_transaction_limit must be positive".to_string(),
                ));
            }
        }

        if self.ledger.cache_capacity == 0 {
            return Err(crate::Error::Config(
                "cache_capacity must be greater than zero".to_string(),
            ));
        }

        if self.ledger.mailbox_capacity == 0 {
            return Err(crate::Error::Config(
                "mailbox_capacity must be greater than zero".to_string(),
            ));
        }

        if self.notifications.poll_interval_ms == 0 {
            return Err(crate::Error::Config(
                "poll_interval_ms must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.service_name, "dunab-ledger");
        assert_eq!(config.ledger.opening_balance, Decimal::new(50000, 2));
        assert_eq!(config.ledger.cache_capacity, 100);
        assert_eq!(config.ledger.limit_policy, LimitPolicy::Advisory);
        assert!(config.notifications.enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml() {
        let config = Config::from_toml(
            r#"
            data_dir = "/var/lib/dunab"

            [ledger]
            opening_balance = "250.00"
            limit_policy = "enforce"
            cache_capacity = 16

            [notifications]
            poll_interval_ms = 50
            "#,
        )
        .unwrap();

        assert_eq!(config.data_dir, PathBuf::from("/var/lib/dunab"));
        assert_eq!(config.ledger.opening_balance, Decimal::new(25000, 2));
        assert_eq!(config.ledger.limit_policy, LimitPolicy::Enforce);
        assert_eq!(config.ledger.cache_capacity, 16);
        assert_eq!(config.ledger.mailbox_capacity, 1000);
        assert_eq!(config.notifications.poll_interval_ms, 50);
        assert_eq!(config.service_name, "dunab-ledger");
    }

    #[test]
    fn test_validate_rejects_zero_capacity() {
        let mut config = Config::default();
        config.ledger.cache_capacity = 0;
        assert!(matches!(config.validate(), Err(crate::Error::Config(_))));
    }

    #[test]
    fn test_validate_rejects_sub_cent_opening_balance() {
        let mut config = Config::default();
        config.ledger.opening_balance = Decimal::new(5001, 3);
        assert!(matches!(config.validate(), Err(crate::Error::Config(_))));

        config.ledger.opening_balance = Decimal::new(50000, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_limit_policy_from_str() {
        assert_eq!("Enforce".parse::<LimitPolicy>().unwrap(), LimitPolicy::Enforce);
        assert_eq!("advisory".parse::<LimitPolicy>().unwrap(), LimitPolicy::Advisory);
        assert!("strict".parse::<LimitPolicy>().is_err());
    }
}
