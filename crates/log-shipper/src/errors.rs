// Copyright 2025-Present New Relic, Inc. https://newrelic.com/
// SPDX-License-Identifier: Apache-2.0

/// Fatal configuration problems detected at initialization.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("either apiKey or licenseKey must be specified")]
    MissingCredential,

    #[error("only one of apiKey or licenseKey can be specified")]
    ConflictingCredentials,

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Serialization or compression failure while packaging a batch. The
/// affected batch is unrecoverable and gets dropped by the caller.
#[derive(Debug, thiserror::Error)]
pub enum PayloadError {
    #[error("failed to serialize batch: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to compress batch: {0}")]
    Compress(#[from] std::io::Error),
}
