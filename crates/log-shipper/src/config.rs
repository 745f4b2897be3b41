// Copyright 2025-Present New Relic, Inc. https://newrelic.com/
// SPDX-License-Identifier: Apache-2.0

//! Configuration surface for the shipper.
//!
//! All keys are optional except the credential: exactly one of `apiKey` or
//! `licenseKey` must be set. Construction is either from a string-keyed map
//! (the shape a host plugin hands over) or from `NR_*` environment variables.

use std::collections::HashMap;
use std::env;
use std::fmt::Debug;
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

use crate::constants;
use crate::errors::ConfigError;

/// The single configured secret authenticating outbound requests.
///
/// Mutually exclusive and required: never both, never neither.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    /// Insert (API) key, sent as `X-Insert-Key`.
    InsertKey(String),
    /// License key, sent as `X-License-Key`.
    LicenseKey(String),
}

impl Credential {
    /// Header name/value pair selected by which credential is configured.
    pub fn header(&self) -> (&'static str, &str) {
        match self {
            Credential::InsertKey(key) => ("X-Insert-Key", key),
            Credential::LicenseKey(key) => ("X-License-Key", key),
        }
    }
}

/// Shipper configuration, read-only after initialization.
#[derive(Debug, Clone)]
pub struct Config {
    /// Ingestion URL.
    pub endpoint: String,
    /// Outbound request credential.
    pub credential: Credential,
    /// Compressed-payload size cap in bytes.
    pub max_buffer_size: usize,
    /// Flush trigger: record count.
    pub max_records: usize,
    /// Flush trigger: elapsed time since the last flush.
    pub max_time_between_flushes: Duration,
    /// Reporting-source type stamped on every record.
    pub reporting_source_type: String,
    /// Reporting-source version stamped on every record.
    pub reporting_source_version: String,
}

impl Config {
    /// Builds a configuration from a string-keyed settings map, using the
    /// documented key names (`endpoint`, `apiKey`, `licenseKey`,
    /// `maxBufferSize`, `maxRecords`, `maxTimeBetweenFlushes`,
    /// `reportingSourceType`, `reportingSourceVersion`).
    pub fn from_map(settings: &HashMap<String, String>) -> Result<Self, ConfigError> {
        Self::resolve(|key| settings.get(key).cloned())
    }

    /// Builds a configuration from `NR_*` environment variables
    /// (`NR_ENDPOINT`, `NR_API_KEY`, `NR_LICENSE_KEY`, ...).
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::resolve(|key| env::var(env_key(key)).ok())
    }

    fn resolve(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let api_key = get("apiKey").filter(|v| !v.is_empty());
        let license_key = get("licenseKey").filter(|v| !v.is_empty());
        let credential = match (api_key, license_key) {
            (Some(_), Some(_)) => return Err(ConfigError::ConflictingCredentials),
            (None, None) => return Err(ConfigError::MissingCredential),
            (Some(key), None) => Credential::InsertKey(key),
            (None, Some(key)) => Credential::LicenseKey(key),
        };

        let config = Config {
            endpoint: get("endpoint")
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| constants::DEFAULT_ENDPOINT.to_string()),
            credential,
            max_buffer_size: parse_or_default(
                get("maxBufferSize"),
                constants::DEFAULT_MAX_BUFFER_SIZE,
                "maxBufferSize",
            ),
            max_records: parse_or_default(
                get("maxRecords"),
                constants::DEFAULT_MAX_RECORDS,
                "maxRecords",
            ),
            max_time_between_flushes: Duration::from_millis(parse_or_default(
                get("maxTimeBetweenFlushes"),
                constants::DEFAULT_MAX_TIME_BETWEEN_FLUSHES_MS,
                "maxTimeBetweenFlushes",
            )),
            reporting_source_type: get("reportingSourceType")
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| constants::DEFAULT_REPORTING_SOURCE_TYPE.to_string()),
            reporting_source_version: get("reportingSourceVersion")
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| env!("CARGO_PKG_VERSION").to_string()),
        };

        config.validate()?;
        Ok(config)
    }

    /// Validates the flush-trigger invariants: all three thresholds must be
    /// positive.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_buffer_size == 0 {
            return Err(ConfigError::Invalid(
                "maxBufferSize must be greater than 0".to_string(),
            ));
        }
        if self.max_records == 0 {
            return Err(ConfigError::Invalid(
                "maxRecords must be greater than 0".to_string(),
            ));
        }
        if self.max_time_between_flushes.is_zero() {
            return Err(ConfigError::Invalid(
                "maxTimeBetweenFlushes must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

// Maps a settings-map key to its environment variable name.
fn env_key(key: &str) -> &'static str {
    match key {
        "endpoint" => "NR_ENDPOINT",
        "apiKey" => "NR_API_KEY",
        "licenseKey" => "NR_LICENSE_KEY",
        "maxBufferSize" => "NR_MAX_BUFFER_SIZE",
        "maxRecords" => "NR_MAX_RECORDS",
        "maxTimeBetweenFlushes" => "NR_MAX_TIME_BETWEEN_FLUSHES",
        "reportingSourceType" => "NR_REPORTING_SOURCE_TYPE",
        "reportingSourceVersion" => "NR_REPORTING_SOURCE_VERSION",
        _ => "NR_UNKNOWN",
    }
}

// A malformed numeric value falls back to the default instead of aborting
// startup; the warning is the only surface for the typo.
fn parse_or_default<T>(raw: Option<String>, default: T, key: &str) -> T
where
    T: FromStr + Debug,
{
    match raw.as_deref().filter(|v| !v.is_empty()) {
        None => default,
        Some(value) => match value.parse() {
            Ok(parsed) => parsed,
            Err(_) => {
                warn!(
                    "ignoring malformed {} value {:?}, using default {:?}",
                    key, value, default
                );
                default
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults_with_license_key() {
        let config = Config::from_map(&settings(&[("licenseKey", "l-key")]))
            .expect("config should be valid");

        assert_eq!(config.endpoint, constants::DEFAULT_ENDPOINT);
        assert_eq!(config.credential, Credential::LicenseKey("l-key".to_string()));
        assert_eq!(config.max_buffer_size, 256_000);
        assert_eq!(config.max_records, 1024);
        assert_eq!(config.max_time_between_flushes, Duration::from_millis(5000));
        assert_eq!(config.reporting_source_type, "log-shipper");
        assert_eq!(config.reporting_source_version, env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn test_api_key_selects_insert_key_header() {
        let config =
            Config::from_map(&settings(&[("apiKey", "a-key")])).expect("config should be valid");

        let (name, value) = config.credential.header();
        assert_eq!(name, "X-Insert-Key");
        assert_eq!(value, "a-key");
    }

    #[test]
    fn test_license_key_selects_license_key_header() {
        let config = Config::from_map(&settings(&[("licenseKey", "l-key")]))
            .expect("config should be valid");

        let (name, value) = config.credential.header();
        assert_eq!(name, "X-License-Key");
        assert_eq!(value, "l-key");
    }

    #[test]
    fn test_both_credentials_rejected() {
        let result = Config::from_map(&settings(&[("apiKey", "a"), ("licenseKey", "l")]));
        assert!(matches!(result, Err(ConfigError::ConflictingCredentials)));
    }

    #[test]
    fn test_no_credential_rejected() {
        let result = Config::from_map(&settings(&[]));
        assert!(matches!(result, Err(ConfigError::MissingCredential)));

        // Empty strings count as unset.
        let result = Config::from_map(&settings(&[("apiKey", ""), ("licenseKey", "")]));
        assert!(matches!(result, Err(ConfigError::MissingCredential)));
    }

    #[test]
    fn test_threshold_overrides() {
        let config = Config::from_map(&settings(&[
            ("licenseKey", "l"),
            ("maxBufferSize", "1024"),
            ("maxRecords", "16"),
            ("maxTimeBetweenFlushes", "250"),
        ]))
        .expect("config should be valid");

        assert_eq!(config.max_buffer_size, 1024);
        assert_eq!(config.max_records, 16);
        assert_eq!(config.max_time_between_flushes, Duration::from_millis(250));
    }

    #[test]
    fn test_malformed_number_falls_back_to_default() {
        let config = Config::from_map(&settings(&[
            ("licenseKey", "l"),
            ("maxRecords", "not-a-number"),
        ]))
        .expect("config should be valid");

        assert_eq!(config.max_records, constants::DEFAULT_MAX_RECORDS);
    }

    #[test]
    fn test_zero_threshold_rejected() {
        let result = Config::from_map(&settings(&[("licenseKey", "l"), ("maxRecords", "0")]));
        assert!(matches!(result, Err(ConfigError::Invalid(_))));

        let result = Config::from_map(&settings(&[
            ("licenseKey", "l"),
            ("maxTimeBetweenFlushes", "0"),
        ]));
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }
}
