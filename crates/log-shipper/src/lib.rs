// Copyright 2025-Present New Relic, Inc. https://newrelic.com/
// SPDX-License-Identifier: Apache-2.0

//! Batching and delivery core for shipping log records to the New Relic
//! Logs API.
//!
//! Raw records flow through four stages: the normalizer ([`record`]) turns a
//! dynamically-typed record into canonical JSON, the accumulator ([`buffer`])
//! batches records until a count or time threshold is crossed, the packager
//! ([`payload`]) gzips each batch and splits it under the transport size cap,
//! and the dispatcher ([`flusher`]) POSTs every resulting chunk on its own
//! task. The ingestion path never blocks on network I/O and never reports a
//! delivery failure back to the caller.

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

pub mod buffer;
pub mod config;
pub mod constants;
pub mod errors;
pub mod flusher;
pub mod payload;
pub mod record;

use std::time::Duration;

use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, error};

use crate::buffer::BatchBuffer;
use crate::config::Config;
use crate::errors::ConfigError;
use crate::flusher::{DispatchComplete, Flusher};
use crate::record::{normalize, RawValue, Record, ReportingSource};

/// Owned pipeline instance wiring the normalizer, accumulator, packager and
/// dispatcher together. The host constructs exactly one and passes it by
/// handle to its ingestion and shutdown entry points; there is no process
/// global.
///
/// `Shipper` expects to live inside a tokio runtime: each payload chunk is
/// dispatched on a spawned task so that ingestion keeps running while sends
/// are in flight.
pub struct Shipper {
    config: Config,
    source: ReportingSource,
    buffer: BatchBuffer,
    flusher: Flusher,
}

impl Shipper {
    /// Validates `config` and builds the pipeline. Fails fast when the
    /// credential configuration is invalid rather than starting in an
    /// undefined credential state.
    ///
    /// The returned receiver sees one [`DispatchComplete`] per payload chunk
    /// accepted by the intake. It exists for test synchronization only and
    /// carries no delivery guarantee; dropping it is fine.
    pub fn new(config: Config) -> Result<(Shipper, UnboundedReceiver<DispatchComplete>), ConfigError> {
        config.validate()?;
        let (flusher, completions) = Flusher::new(&config)?;
        let source = ReportingSource {
            source_type: config.reporting_source_type.clone(),
            version: config.reporting_source_version.clone(),
        };
        let buffer = BatchBuffer::new(config.max_records, config.max_time_between_flushes);
        let shipper = Shipper {
            config,
            source,
            buffer,
            flusher,
        };
        Ok((shipper, completions))
    }

    /// Accepts one raw record with its (unit-ambiguous) timestamp.
    ///
    /// Never blocks and never raises: once the record lands in the batch,
    /// everything downstream is fire-and-forget. A flush triggered by this
    /// insertion packages the snapshot inline and spawns one send per chunk.
    pub fn ingest(&mut self, record: &[(RawValue, RawValue)], timestamp: &RawValue) {
        let normalized = normalize(record, timestamp, &self.source);
        if let Some(batch) = self.buffer.insert(normalized) {
            self.flush_batch(batch);
        }
    }

    /// Whether the live batch holds no records.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Flushes any non-empty batch, then optionally waits (bounded by
    /// `drain_timeout`) for outstanding sends.
    ///
    /// Passing `None` reproduces the historical exit behavior: the final
    /// flush's sends race process exit and may be silently dropped. Hosts
    /// that care should pass a timeout.
    pub async fn shutdown(mut self, drain_timeout: Option<Duration>) {
        if !self.buffer.is_empty() {
            let batch = self.buffer.take_all();
            self.flush_batch(batch);
        }
        if let Some(timeout) = drain_timeout {
            self.flusher.drain(timeout).await;
        }
    }

    fn flush_batch(&mut self, batch: Vec<Record>) {
        debug!("flushing batch of {} records", batch.len());
        match payload::package(&batch, self.config.max_buffer_size) {
            Ok(payloads) => {
                for payload in payloads {
                    self.flusher.dispatch(payload);
                }
            }
            // The batch is lost; say so instead of swallowing it.
            Err(e) => error!("dropping batch of {} records: {}", batch.len(), e),
        }
    }
}
