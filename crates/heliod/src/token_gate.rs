//! Session token gate - short-lived opaque tokens issued after a
//! successful OTP check.
//!
//! Tokens live only in process memory. There is no expiry sweep: an
//! expired token is detected and removed the first time someone looks it
//! up. A valid token may be reused any number of times until it expires.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use helio_common::TokenResponse;
use tracing::{debug, info};
use uuid::Uuid;

/// Token lifetime after issue.
const TOKEN_TTL_MINUTES: i64 = 30;

/// Store of live session tokens, shared process-wide.
pub trait TokenStore: Send + Sync {
    fn put(&self, token: String, expires_at: DateTime<Utc>);

    /// Check a token against `now`. Expired tokens are removed as a side
    /// effect of the lookup.
    fn validate_at(&self, token: &str, now: DateTime<Utc>) -> bool;

    fn validate(&self, token: &str) -> bool {
        self.validate_at(token, Utc::now())
    }
}

/// In-memory token store behind a mutex; requests race on verifying and
/// expiring the same token, so every access takes the lock.
#[derive(Default)]
pub struct MemoryTokenStore {
    tokens: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.tokens.lock().unwrap().len()
    }
}

impl TokenStore for MemoryTokenStore {
    fn put(&self, token: String, expires_at: DateTime<Utc>) {
        self.tokens.lock().unwrap().insert(token, expires_at);
    }

    fn validate_at(&self, token: &str, now: DateTime<Utc>) -> bool {
        let mut tokens = self.tokens.lock().unwrap();
        match tokens.get(token) {
            Some(expires_at) if now <= *expires_at => true,
            Some(_) => {
                // Lazy garbage collection on first use after expiry.
                debug!("Removing expired session token");
                tokens.remove(token);
                false
            }
            None => false,
        }
    }
}

/// Issue a fresh session token valid for 30 minutes.
pub fn issue_token(store: &dyn TokenStore) -> TokenResponse {
    let token = Uuid::new_v4().to_string();
    let expires_at = Utc::now() + Duration::minutes(TOKEN_TTL_MINUTES);
    store.put(token.clone(), expires_at);
    info!("Issued session token, expires at {}", expires_at);
    TokenResponse { token, expires_at }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_token_validates_immediately() {
        let store = MemoryTokenStore::new();
        let issued = issue_token(&store);
        assert!(store.validate(&issued.token));
        // Reuse is allowed before expiry.
        assert!(store.validate(&issued.token));
    }

    #[test]
    fn unknown_token_is_invalid() {
        let store = MemoryTokenStore::new();
        assert!(!store.validate("nope"));
    }

    #[test]
    fn token_valid_before_expiry_and_removed_after() {
        let store = MemoryTokenStore::new();
        let issued_at = Utc::now();
        store.put("tok".to_string(), issued_at + Duration::minutes(30));

        assert!(store.validate_at("tok", issued_at + Duration::minutes(29)));
        assert_eq!(store.len(), 1);

        assert!(!store.validate_at("tok", issued_at + Duration::minutes(31)));
        // Expired token was garbage-collected by the lookup.
        assert_eq!(store.len(), 0);
        // And stays invalid even for an earlier clock afterwards.
        assert!(!store.validate_at("tok", issued_at));
    }

    #[test]
    fn expiry_boundary_is_inclusive() {
        let store = MemoryTokenStore::new();
        let expires = Utc::now() + Duration::minutes(30);
        store.put("tok".to_string(), expires);
        assert!(store.validate_at("tok", expires));
    }
}
