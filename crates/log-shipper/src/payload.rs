// Copyright 2025-Present New Relic, Inc. https://newrelic.com/
// SPDX-License-Identifier: Apache-2.0

//! Payload packaging: JSON-array serialization, gzip compression and
//! recursive splitting under the transport size cap.

use std::io::Write;

use flate2::write::GzEncoder;
use flate2::Compression;
use tracing::warn;

use crate::errors::PayloadError;
use crate::record::Record;

/// Serializes and gzips `records` into one or more dispatch-ready payloads,
/// recursively halving the record list until every payload's compressed size
/// is under `max_buffer_size`.
///
/// Exception: a single record whose compressed encoding still exceeds the
/// cap is emitted as-is, with a warning, since halving it cannot make
/// progress. It is never dropped and never recursed on.
pub fn package(records: &[Record], max_buffer_size: usize) -> Result<Vec<Vec<u8>>, PayloadError> {
    let mut payloads = Vec::new();
    split_into(records, max_buffer_size, &mut payloads)?;
    Ok(payloads)
}

fn split_into(
    records: &[Record],
    max_buffer_size: usize,
    payloads: &mut Vec<Vec<u8>>,
) -> Result<(), PayloadError> {
    if records.is_empty() {
        return Ok(());
    }

    let compressed = compress(records)?;
    if compressed.len() >= max_buffer_size {
        if records.len() > 1 {
            let mid = records.len() / 2;
            split_into(&records[..mid], max_buffer_size, payloads)?;
            return split_into(&records[mid..], max_buffer_size, payloads);
        }
        // A lone record busting the cap cannot be split further.
        warn!(
            "single record compresses to {} bytes, exceeding maxBufferSize {}; sending oversized payload",
            compressed.len(),
            max_buffer_size
        );
    }

    payloads.push(compressed);
    Ok(())
}

// Full gzip stream: write, flush, close. The cap is measured against the
// compressed size, so this runs before any size decision.
fn compress(records: &[Record]) -> Result<Vec<u8>, PayloadError> {
    let serialized = serde_json::to_vec(records)?;
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&serialized)?;
    encoder.flush()?;
    Ok(encoder.finish()?)
}
