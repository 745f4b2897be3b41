// Copyright 2025-Present New Relic, Inc. https://newrelic.com/
// SPDX-License-Identifier: Apache-2.0

//! Host binary: reads newline-delimited JSON records from stdin and forwards
//! them through the shipper pipeline. Configuration comes from `NR_*`
//! environment variables; EOF triggers the final flush.

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]

use std::env;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, error, warn};
use tracing_subscriber::EnvFilter;

use log_shipper::config::Config;
use log_shipper::record::RawValue;
use log_shipper::Shipper;

// How long to wait for in-flight sends after the final flush. Exiting
// earlier would silently drop the last batch's payloads.
const SHUTDOWN_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() {
    let log_level = env::var("NR_LOG_LEVEL")
        .map(|val| val.to_lowercase())
        .unwrap_or_else(|_| "info".to_string());
    let env_filter = format!("h2=off,hyper=off,rustls=off,{}", log_level);

    #[allow(clippy::expect_used)]
    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_new(env_filter).expect("could not parse log level in configuration"),
        )
        .with_level(true)
        .with_thread_names(false)
        .with_thread_ids(false)
        .finish();
    #[allow(clippy::expect_used)]
    tracing::subscriber::set_global_default(subscriber)
        .expect("failed to set global tracing subscriber");

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("{}. Shutting down log shipper agent.", e);
            std::process::exit(1);
        }
    };

    let (mut shipper, _completions) = match Shipper::new(config) {
        Ok(pair) => pair,
        Err(e) => {
            error!("{}. Shutting down log shipper agent.", e);
            std::process::exit(1);
        }
    };

    debug!("log shipper agent started, reading records from stdin");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if line.trim().is_empty() {
                    continue;
                }
                ingest_line(&mut shipper, &line);
            }
            Ok(None) => break,
            Err(e) => {
                error!("failed to read from stdin: {}", e);
                break;
            }
        }
    }

    debug!("input stream closed, flushing remaining records");
    shipper.shutdown(Some(SHUTDOWN_DRAIN_TIMEOUT)).await;
}

fn ingest_line(shipper: &mut Shipper, line: &str) {
    let value: serde_json::Value = match serde_json::from_str(line) {
        Ok(value) => value,
        Err(e) => {
            warn!("skipping malformed input line: {}", e);
            return;
        }
    };

    let RawValue::Map(mut entries) = RawValue::from(value) else {
        warn!("skipping non-object input line");
        return;
    };

    // A numeric timestamp field on the record rides along as the raw
    // timestamp; otherwise the arrival time does.
    let timestamp = match extract_timestamp(&mut entries) {
        Some(ts) => ts,
        None => RawValue::UInt(now_millis()),
    };

    shipper.ingest(&entries, &timestamp);
}

fn extract_timestamp(entries: &mut Vec<(RawValue, RawValue)>) -> Option<RawValue> {
    let index = entries.iter().position(|(key, value)| {
        matches!(key, RawValue::Str(name) if name == "timestamp")
            && matches!(value, RawValue::Int(_) | RawValue::UInt(_))
    })?;
    Some(entries.remove(index).1)
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_timestamp_removes_numeric_field() {
        let mut entries = vec![
            (
                RawValue::Str("message".to_string()),
                RawValue::Str("hi".to_string()),
            ),
            (
                RawValue::Str("timestamp".to_string()),
                RawValue::UInt(1_555_612_951),
            ),
        ];

        let ts = extract_timestamp(&mut entries);
        assert_eq!(ts, Some(RawValue::UInt(1_555_612_951)));
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_extract_timestamp_ignores_non_numeric_field() {
        let mut entries = vec![(
            RawValue::Str("timestamp".to_string()),
            RawValue::Str("2019-04-18".to_string()),
        )];

        assert_eq!(extract_timestamp(&mut entries), None);
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_now_millis_is_milliseconds_scale() {
        let now = now_millis();
        // Past 2020-01-01 in ms, well before 2033 in ms.
        assert!(now > 1_577_836_800_000);
        assert!(now < 2_000_000_000_000);
    }
}
