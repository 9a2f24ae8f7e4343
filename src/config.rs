//! Engine configuration
//!
//! Defaults match the current tariff decree. Binaries may override them
//! through environment variables via [`EngineConfig::from_env`].

use crate::calculation::CapRatePolicy;
use crate::esg::DEFAULT_EMISSION_FACTOR;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use thiserror::Error;

/// Coefficient table version used when a practice does not name one
pub const DEFAULT_VERSION_CODE: &str = "CT3_DM_2025_08_07";

/// Directory holding coefficients.csv and practices.json
pub const DEFAULT_DATA_DIR: &str = "data";

/// File names looked up inside the data directory
pub const COEFFICIENTS_FILE: &str = "coefficients.csv";
pub const DATASET_FILE: &str = "practices.json";

/// Data directory from INCENTIVE_DATA_DIR, else [`DEFAULT_DATA_DIR`]
pub fn data_dir_from_env() -> PathBuf {
    env::var("INCENTIVE_DATA_DIR")
        .ok()
        .filter(|dir| !dir.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR))
}

/// How the single cap rate stored on the aggregate result is chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregateCapRate {
    /// Cap rate of the first computed line (historical behaviour)
    #[default]
    FirstLine,
    /// Net-weighted mean of the line cap rates
    NetWeighted,
}

impl AggregateCapRate {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "first_line" | "first" => Some(AggregateCapRate::FirstLine),
            "net_weighted" | "weighted" => Some(AggregateCapRate::NetWeighted),
            _ => None,
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{name} must be a positive number, got '{value}'")]
    InvalidNumber { name: &'static str, value: String },

    #[error("{name} must be first_line or net_weighted, got '{value}'")]
    InvalidAggregate { name: &'static str, value: String },

    #[error("{name} must not be empty")]
    Empty { name: &'static str },
}

/// Tunables of the incentive calculation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub default_version_code: String,
    /// kg CO₂ per kWh saved
    pub emission_factor: f64,
    /// Used when a coefficient row leaves the duration blank
    pub default_duration_years: u32,
    pub aggregate_cap_rate: AggregateCapRate,
    pub cap_policy: CapRatePolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_version_code: DEFAULT_VERSION_CODE.to_string(),
            emission_factor: DEFAULT_EMISSION_FACTOR,
            default_duration_years: crate::coefficients::DEFAULT_DURATION_YEARS,
            aggregate_cap_rate: AggregateCapRate::default(),
            cap_policy: CapRatePolicy::default(),
        }
    }
}

impl EngineConfig {
    /// Defaults overridden by INCENTIVE_* environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(version) = lookup("INCENTIVE_DEFAULT_VERSION") {
            let version = version.trim();
            if version.is_empty() {
                return Err(ConfigError::Empty {
                    name: "INCENTIVE_DEFAULT_VERSION",
                });
            }
            config.default_version_code = version.to_string();
        }

        if let Some(raw) = lookup("INCENTIVE_EMISSION_FACTOR") {
            config.emission_factor = raw
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|f| f.is_finite() && *f > 0.0)
                .ok_or(ConfigError::InvalidNumber {
                    name: "INCENTIVE_EMISSION_FACTOR",
                    value: raw.clone(),
                })?;
        }

        if let Some(raw) = lookup("INCENTIVE_AGGREGATE_CAP_RATE") {
            config.aggregate_cap_rate =
                AggregateCapRate::parse(&raw).ok_or(ConfigError::InvalidAggregate {
                    name: "INCENTIVE_AGGREGATE_CAP_RATE",
                    value: raw.clone(),
                })?;
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults_without_variables() {
        let config = EngineConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.default_version_code, DEFAULT_VERSION_CODE);
        assert_eq!(config.aggregate_cap_rate, AggregateCapRate::FirstLine);
    }

    #[test]
    fn test_overrides() {
        let config = EngineConfig::from_lookup(lookup(&[
            ("INCENTIVE_DEFAULT_VERSION", " CT3_TEST "),
            ("INCENTIVE_EMISSION_FACTOR", "0.3"),
            ("INCENTIVE_AGGREGATE_CAP_RATE", "net_weighted"),
        ]))
        .unwrap();
        assert_eq!(config.default_version_code, "CT3_TEST");
        assert_eq!(config.emission_factor, 0.3);
        assert_eq!(config.aggregate_cap_rate, AggregateCapRate::NetWeighted);
    }

    #[test]
    fn test_malformed_values_rejected() {
        let err = EngineConfig::from_lookup(lookup(&[("INCENTIVE_EMISSION_FACTOR", "abc")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidNumber { .. }));

        let err = EngineConfig::from_lookup(lookup(&[("INCENTIVE_AGGREGATE_CAP_RATE", "mean")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidAggregate { .. }));

        let err = EngineConfig::from_lookup(lookup(&[("INCENTIVE_DEFAULT_VERSION", "  ")])).unwrap_err();
        assert_eq!(err, ConfigError::Empty { name: "INCENTIVE_DEFAULT_VERSION" });
    }

    #[test]
    fn test_deserialize_partial_json() {
        let config: EngineConfig = serde_json::from_str(r#"{"aggregate_cap_rate": "net_weighted"}"#).unwrap();
        assert_eq!(config.aggregate_cap_rate, AggregateCapRate::NetWeighted);
        assert_eq!(config.cap_policy.default_rate, 0.65);
    }
}
