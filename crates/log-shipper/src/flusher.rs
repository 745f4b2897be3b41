// Copyright 2025-Present New Relic, Inc. https://newrelic.com/
// SPDX-License-Identifier: Apache-2.0

//! Fire-and-forget dispatch of compressed payload chunks to the ingestion
//! endpoint.
//!
//! Every chunk is sent on its own spawned task; chunks from one flush have
//! no ordering relationship and may interleave with chunks from later
//! flushes. Transport failures and rejections are logged and dropped. There
//! is no retry policy, so memory stays bounded when the endpoint degrades.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_ENCODING, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, error};

use crate::config::{Config, Credential};
use crate::constants;
use crate::errors::ConfigError;

/// Marker sent on the completion channel after the intake accepts a payload
/// chunk and its response body has been drained. Purely for test
/// synchronization; carries no delivery-guarantee semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchComplete;

/// Sends compressed payloads over a shared keep-alive connection pool.
pub struct Flusher {
    client: Client,
    endpoint: String,
    headers: HeaderMap,
    in_flight: JoinSet<()>,
    completion_tx: mpsc::UnboundedSender<DispatchComplete>,
}

impl Flusher {
    /// Builds the dispatcher and its completion channel. Fails when the
    /// configured credential cannot be carried in an HTTP header.
    pub fn new(
        config: &Config,
    ) -> Result<(Flusher, mpsc::UnboundedReceiver<DispatchComplete>), ConfigError> {
        let headers = build_headers(config)?;
        let (completion_tx, completion_rx) = mpsc::unbounded_channel();
        let flusher = Flusher {
            client: build_client(),
            endpoint: config.endpoint.clone(),
            headers,
            in_flight: JoinSet::new(),
            completion_tx,
        };
        Ok((flusher, completion_rx))
    }

    /// Spawns one independent send for `payload`. Returns immediately; the
    /// outcome is observable only through logs and the completion channel.
    pub fn dispatch(&mut self, payload: Vec<u8>) {
        // Reap whatever already finished so the set doesn't grow without
        // bound on a long-lived shipper.
        while self.in_flight.try_join_next().is_some() {}

        let client = self.client.clone();
        let endpoint = self.endpoint.clone();
        let headers = self.headers.clone();
        let completion_tx = self.completion_tx.clone();
        self.in_flight.spawn(async move {
            send(&client, &endpoint, headers, payload, &completion_tx).await;
        });
    }

    /// Number of sends not yet known to have finished.
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Waits for outstanding sends, bounded by `timeout`. Sends still in
    /// flight at the deadline are abandoned, which matches the
    /// fire-and-forget delivery contract.
    pub async fn drain(&mut self, timeout: Duration) {
        let deadline = tokio::time::sleep(timeout);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                joined = self.in_flight.join_next() => {
                    match joined {
                        None => break,
                        Some(Ok(())) => {}
                        Some(Err(e)) => debug!("dispatch task failed to join: {}", e),
                    }
                }
                () = &mut deadline => {
                    debug!(
                        "shutdown drain timed out with {} sends in flight",
                        self.in_flight.len()
                    );
                    break;
                }
            }
        }
    }
}

async fn send(
    client: &Client,
    endpoint: &str,
    headers: HeaderMap,
    payload: Vec<u8>,
    completion_tx: &mpsc::UnboundedSender<DispatchComplete>,
) {
    let response = client
        .post(endpoint)
        .headers(headers)
        .body(payload)
        .send()
        .await;

    match response {
        Ok(response) => {
            let status = response.status();
            if status != StatusCode::ACCEPTED {
                // Non-fatal: the payload is dropped and never retried.
                error!("log intake rejected payload: got status code {}", status);
                return;
            }
            // Read the body to completion so the connection goes back into
            // the keep-alive pool.
            if let Err(e) = response.bytes().await {
                debug!("failed to drain intake response body: {}", e);
            }
            let _ = completion_tx.send(DispatchComplete);
        }
        Err(e) => error!("error making HTTP request: {}", e),
    }
}

fn build_client() -> Client {
    let builder = Client::builder()
        .timeout(constants::REQUEST_TIMEOUT)
        .pool_idle_timeout(Some(constants::POOL_IDLE_TIMEOUT))
        .pool_max_idle_per_host(constants::POOL_MAX_IDLE_PER_HOST);

    match builder.build() {
        Ok(client) => client,
        Err(e) => {
            error!("failed to build HTTP client: {}, using reqwest defaults", e);
            Client::new()
        }
    }
}

fn build_headers(config: &Config) -> Result<HeaderMap, ConfigError> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(CONTENT_ENCODING, HeaderValue::from_static("gzip"));

    // HeaderName normalizes to lowercase on the wire either way.
    let (name, key) = match &config.credential {
        Credential::InsertKey(key) => (HeaderName::from_static("x-insert-key"), key),
        Credential::LicenseKey(key) => (HeaderName::from_static("x-license-key"), key),
    };
    let value = HeaderValue::from_str(key)
        .map_err(|_| ConfigError::Invalid(format!("{} is not a valid header value", name)))?;
    headers.insert(name, value);
    Ok(headers)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config(credential: Credential) -> Config {
        Config {
            endpoint: "http://127.0.0.1:0/log/v1".to_string(),
            credential,
            max_buffer_size: 1024,
            max_records: 8,
            max_time_between_flushes: Duration::from_millis(5000),
            reporting_source_type: "log-shipper".to_string(),
            reporting_source_version: "0.0.0".to_string(),
        }
    }

    #[test]
    fn test_headers_with_insert_key() {
        let headers = build_headers(&test_config(Credential::InsertKey("a-key".to_string())))
            .expect("headers should build");

        assert_eq!(headers.get("Content-Type").unwrap(), "application/json");
        assert_eq!(headers.get("Content-Encoding").unwrap(), "gzip");
        assert_eq!(headers.get("X-Insert-Key").unwrap(), "a-key");
        assert!(headers.get("X-License-Key").is_none());
    }

    #[test]
    fn test_headers_with_license_key() {
        let headers = build_headers(&test_config(Credential::LicenseKey("l-key".to_string())))
            .expect("headers should build");

        assert_eq!(headers.get("X-License-Key").unwrap(), "l-key");
        assert!(headers.get("X-Insert-Key").is_none());
    }

    #[test]
    fn test_unencodable_credential_rejected() {
        let result = build_headers(&test_config(Credential::InsertKey("bad\nkey".to_string())));
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }
}
