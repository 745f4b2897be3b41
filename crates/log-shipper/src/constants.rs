// Copyright 2025-Present New Relic, Inc. https://newrelic.com/
// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

/// Public New Relic Logs API ingestion endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://log-api.newrelic.com/log/v1";

/// Compressed-payload size cap in bytes.
pub const DEFAULT_MAX_BUFFER_SIZE: usize = 256_000;

/// Flush trigger: record count.
pub const DEFAULT_MAX_RECORDS: usize = 1024;

/// Flush trigger: elapsed milliseconds since the last flush.
pub const DEFAULT_MAX_TIME_BETWEEN_FLUSHES_MS: u64 = 5000;

/// Reporting-source type stamped on every outgoing record.
pub const DEFAULT_REPORTING_SOURCE_TYPE: &str = "log-shipper";

/// Per-request timeout. There is no retry policy behind it.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// How long idle keep-alive connections stay in the pool.
pub const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(600);

/// Idle connections retained per host; the dispatcher makes repeated small
/// sends to a single intake host.
pub const POOL_MAX_IDLE_PER_HOST: usize = 100;
