//! Configuration for the ledger

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::domain::{AccountType, Error, LendingPolicy};

/// Ledger configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// `tracing` filter directive for the binary
    pub log_filter: String,

    /// Type of the account opened when an owner registers
    pub default_account_type: AccountType,

    /// Ledger log configuration
    pub journal: JournalConfig,

    /// Loan origination bounds
    pub lending: LendingPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_filter: "warn".to_string(),
            default_account_type: AccountType::Savings,
            journal: JournalConfig::default(),
            lending: LendingPolicy::default(),
        }
    }
}

/// Journal configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JournalConfig {
    /// JSON-lines ledger log. Replayed on start and appended to on every
    /// commit. In-memory only when unset.
    pub path: Option<PathBuf>,
}

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self, Error> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, Error> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))
    }

    /// Load from environment variables
    pub fn from_env() -> Result<Self, Error> {
        Self::from_vars(std::env::vars())
    }

    pub fn from_vars<I>(vars: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut config = Config::default();

        for (key, value) in vars {
            match key.as_str() {
                "LEDGER_LOG" => config.log_filter = value,
                "LEDGER_JOURNAL_PATH" => config.journal.path = Some(PathBuf::from(value)),
                "LEDGER_DEFAULT_ACCOUNT_TYPE" => {
                    config.default_account_type = value
                        .parse()
                        .map_err(|e| Error::Config(format!("LEDGER_DEFAULT_ACCOUNT_TYPE: {}", e)))?;
                }
                _ => {}
            }
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Money;
    use rust_decimal::Decimal;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.log_filter, "warn");
        assert_eq!(config.default_account_type, AccountType::Savings);
        assert!(config.journal.path.is_none());
        assert_eq!(config.lending, LendingPolicy::default());
    }

    #[test]
    fn test_toml_config() {
        let config = Config::from_toml(
            r#"
            log_filter = "bank_ledger=debug"
            default_account_type = "CHECKING"

            [journal]
            path = "/var/lib/ledger/ledger.jsonl"

            [lending]
            min_principal = "1000.00"
            max_principal = "1000000"
            min_rate = "1.0"
            max_rate = "20"
            max_term_months = 360
            "#,
        )
        .unwrap();

        assert_eq!(config.default_account_type, AccountType::Checking);
        assert_eq!(config.journal.path, Some(PathBuf::from("/var/lib/ledger/ledger.jsonl")));
        assert_eq!(config.lending.min_principal, Money::from_major(1_000));
        assert_eq!(config.lending.max_rate, Some(Decimal::from(20)));
        assert_eq!(config.lending.max_term_months, Some(360));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = Config::from_toml("[lending]\nmax_term_months = 120\n").unwrap();
        assert_eq!(config.log_filter, "warn");
        assert_eq!(config.lending.max_term_months, Some(120));
        assert!(config.lending.min_principal.is_none());
    }

    #[test]
    fn test_env_overrides() {
        let config = Config::from_vars([
            ("LEDGER_LOG".to_string(), "debug".to_string()),
            ("LEDGER_JOURNAL_PATH".to_string(), "ledger.jsonl".to_string()),
            ("LEDGER_DEFAULT_ACCOUNT_TYPE".to_string(), "checking".to_string()),
            ("UNRELATED".to_string(), "x".to_string()),
        ])
        .unwrap();
        assert_eq!(config.log_filter, "debug");
        assert_eq!(config.journal.path, Some(PathBuf::from("ledger.jsonl")));
        assert_eq!(config.default_account_type, AccountType::Checking);

        let err = Config::from_vars([("LEDGER_DEFAULT_ACCOUNT_TYPE".to_string(), "gold".to_string())]);
        assert!(matches!(err, Err(Error::Config(_))));
    }

    #[test]
    fn test_bad_toml_is_a_config_error() {
        assert!(matches!(Config::from_toml("lending = 5"), Err(Error::Config(_))));
    }
}
