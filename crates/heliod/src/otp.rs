//! OTP client - SMS one-time-password delivery and verification via the
//! external verification provider.
//!
//! The provider's Verify-style API takes form-encoded POSTs with basic
//! auth. A check either comes back "approved" or it does not; anything
//! other than "approved" counts as denied.

use helio_common::{OtpConfig, OtpDecision};
use serde_json::Value;
use std::time::Duration;
use tracing::info;

#[derive(Debug, thiserror::Error)]
pub enum OtpError {
    #[error("network error: {0}")]
    Network(String),

    #[error("provider returned HTTP {0}")]
    Provider(u16),

    #[error("decode error: {0}")]
    Decode(String),
}

pub struct OtpClient {
    http: reqwest::Client,
    config: OtpConfig,
}

impl OtpClient {
    pub fn new(config: &OtpConfig, timeout: Duration) -> Result<Self, OtpError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| OtpError::Network(e.to_string()))?;

        Ok(Self {
            http,
            config: config.clone(),
        })
    }

    fn service_url(&self, resource: &str) -> String {
        format!(
            "{}/Services/{}/{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.service_sid,
            resource
        )
    }

    /// Trigger an SMS code to `phone`.
    pub async fn send(&self, phone: &str) -> Result<(), OtpError> {
        let response = self
            .http
            .post(self.service_url("Verifications"))
            .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
            .form(&[("To", phone), ("Channel", "sms")])
            .send()
            .await
            .map_err(|e| OtpError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(OtpError::Provider(response.status().as_u16()));
        }

        info!("OTP sent");
        Ok(())
    }

    /// Check the code the caller typed in.
    pub async fn check(&self, phone: &str, code: &str) -> Result<OtpDecision, OtpError> {
        let response = self
            .http
            .post(self.service_url("VerificationCheck"))
            .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
            .form(&[("To", phone), ("Code", code)])
            .send()
            .await
            .map_err(|e| OtpError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(OtpError::Provider(response.status().as_u16()));
        }

        let json: Value = response
            .json()
            .await
            .map_err(|e| OtpError::Decode(e.to_string()))?;

        let approved = json.get("status").and_then(|s| s.as_str()) == Some("approved");
        Ok(if approved {
            OtpDecision::Approved
        } else {
            OtpDecision::Denied
        })
    }
}
