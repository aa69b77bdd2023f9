use anyhow::Context;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fs;
use std::time::Duration;

use crate::db::DEFAULT_POOL_SIZE;
use crate::fee::FeePolicy;
use crate::loan::{EngineSettings, OvertimeFailurePolicy};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    pub log_level: String,
    pub log_dir: String,
    pub log_file: String,
    pub use_json: bool,
    pub rotation: String,
    pub enable_tracing: bool,
    /// PostgreSQL connection URL for the resource store
    #[serde(default)]
    pub postgres_url: Option<String>,
    #[serde(default = "default_pool_size")]
    pub postgres_pool_size: u32,
    #[serde(default)]
    pub loans: LoanConfig,
    #[serde(default)]
    pub notifications: NotificationConfig,
}

fn default_pool_size() -> u32 {
    DEFAULT_POOL_SIZE
}

/// Loan engine tunables, unset keys fall back to the default schedule
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct LoanConfig {
    /// Charged when a loan opens
    pub initial_fee: Decimal,
    /// Hours included in the initial fee
    pub base_allowance_hours: u32,
    /// Surcharge per full hour beyond the allowance
    pub overtime_fee_per_hour: Decimal,
    /// Upper bound for a single payment gateway call
    pub payment_timeout_ms: u64,
    /// What a declined overtime charge does to a return
    pub overtime_failure_policy: OvertimeFailurePolicy,
}

impl Default for LoanConfig {
    fn default() -> Self {
        let fees = FeePolicy::default();
        Self {
            initial_fee: fees.initial_fee(),
            base_allowance_hours: fees.allowance_hours(),
            overtime_fee_per_hour: fees.overtime_per_hour(),
            payment_timeout_ms: 3_000,
            overtime_failure_policy: OvertimeFailurePolicy::default(),
        }
    }
}

impl LoanConfig {
    pub fn fee_policy(&self) -> FeePolicy {
        FeePolicy::new(
            self.initial_fee,
            self.base_allowance_hours,
            self.overtime_fee_per_hour,
        )
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            payment_timeout: Duration::from_millis(self.payment_timeout_ms),
            overtime_failure: self.overtime_failure_policy,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct NotificationConfig {
    /// Capacity of the queue between the engine and the notification worker
    pub queue_size: usize,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self { queue_size: 1024 }
    }
}

impl AppConfig {
    pub fn load(env: &str) -> anyhow::Result<Self> {
        let config_path = format!("config/{}.yaml", env);
        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path))?;
        Self::from_yaml(&content).with_context(|| format!("Failed to parse {}", config_path))
    }

    pub fn from_yaml(content: &str) -> anyhow::Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
log_level: info
log_dir: ./logs
log_file: scb_rental.log
use_json: false
rotation: never
enable_tracing: true
"#;

    #[test]
    fn test_sections_default_when_absent() {
        let config = AppConfig::from_yaml(MINIMAL).unwrap();
        assert!(config.postgres_url.is_none());
        assert_eq!(config.postgres_pool_size, 10);
        assert_eq!(config.loans.initial_fee, Decimal::new(1000, 2));
        assert_eq!(config.loans.base_allowance_hours, 2);
        assert_eq!(config.loans.overtime_fee_per_hour, Decimal::new(500, 2));
        assert_eq!(
            config.loans.overtime_failure_policy,
            OvertimeFailurePolicy::Tolerate
        );
        assert_eq!(config.notifications.queue_size, 1024);
    }

    #[test]
    fn test_loan_section_overrides() {
        let yaml = format!(
            "{MINIMAL}loans:
  initial_fee: \"12.50\"
  base_allowance_hours: 1
  overtime_fee_per_hour: \"7.00\"
  payment_timeout_ms: 250
  overtime_failure_policy: reject
"
        );
        let config = AppConfig::from_yaml(&yaml).unwrap();

        let fees = config.loans.fee_policy();
        assert_eq!(fees.initial_fee(), Decimal::new(1250, 2));
        assert_eq!(fees.allowance_hours(), 1);

        let settings = config.loans.engine_settings();
        assert_eq!(settings.payment_timeout, Duration::from_millis(250));
        assert_eq!(settings.overtime_failure, OvertimeFailurePolicy::Reject);
    }

    #[test]
    fn test_partial_loan_section_keeps_defaults() {
        let yaml = format!(
            "{MINIMAL}loans:
  overtime_failure_policy: reject
"
        );
        let config = AppConfig::from_yaml(&yaml).unwrap();

        assert_eq!(
            config.loans.overtime_failure_policy,
            OvertimeFailurePolicy::Reject
        );
        assert_eq!(config.loans.initial_fee, Decimal::new(1000, 2));
        assert_eq!(config.loans.base_allowance_hours, 2);
        assert_eq!(config.loans.payment_timeout_ms, 3_000);
    }

    #[test]
    fn test_invalid_yaml_is_an_error() {
        assert!(AppConfig::from_yaml("log_level: [").is_err());
    }
}
