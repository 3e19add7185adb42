//! Device directory client - resolves a caller's phone number to the
//! device serials registered for it.
//!
//! The directory is an external tabular store reached over HTTPS with a
//! bearer API key. The daemon only ever reads from it.

use helio_common::{DeviceRecord, DirectoryConfig};
use std::time::Duration;
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    #[error("no device registered for this phone number")]
    NotFound,

    #[error("network error: {0}")]
    Network(String),

    #[error("directory returned HTTP {0}")]
    Status(u16),

    #[error("decode error: {0}")]
    Decode(String),
}

pub struct DirectoryClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl DirectoryClient {
    pub fn new(config: &DirectoryConfig, timeout: Duration) -> Result<Self, LookupError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LookupError::Network(e.to_string()))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    /// Look up the devices registered for `phone`.
    pub async fn resolve(&self, phone: &str) -> Result<DeviceRecord, LookupError> {
        debug!("Resolving devices for phone ending {}", tail(phone));

        let response = self
            .http
            .get(format!("{}/lookup", self.base_url))
            .bearer_auth(&self.api_key)
            .query(&[("phone", phone)])
            .send()
            .await
            .map_err(|e| LookupError::Network(e.to_string()))?;

        if response.status().as_u16() == 404 {
            return Err(LookupError::NotFound);
        }
        if !response.status().is_success() {
            return Err(LookupError::Status(response.status().as_u16()));
        }

        let record: DeviceRecord = response
            .json()
            .await
            .map_err(|e| LookupError::Decode(e.to_string()))?;

        if record.devices.is_empty() {
            return Err(LookupError::NotFound);
        }

        Ok(record)
    }
}

/// Last few digits of a phone number, for log lines that must not leak
/// the full number. Counts characters, not bytes, so a path segment
/// with multi-byte input cannot split a char boundary.
fn tail(phone: &str) -> &str {
    let start = phone
        .char_indices()
        .rev()
        .take(4)
        .last()
        .map(|(i, _)| i)
        .unwrap_or(0);
    &phone[start..]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tail_keeps_last_four_digits() {
        assert_eq!(tail("+4712345678"), "5678");
        assert_eq!(tail("123"), "123");
        assert_eq!(tail(""), "");
    }

    #[test]
    fn tail_handles_multibyte_input() {
        // Not a real phone number, but anything can arrive in the URL
        // path; slicing must not panic mid-character.
        assert_eq!(tail("\u{00f1}abc"), "\u{00f1}abc");
        assert_eq!(tail("+47\u{00f1}12345"), "2345");
        assert_eq!(tail("\u{00e9}\u{00e9}"), "\u{00e9}\u{00e9}");
    }
}
