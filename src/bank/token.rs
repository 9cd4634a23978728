//! # Token Manager
//!
//! Owns the cached bearer token for one connection. The cache is replaced,
//! never mutated, and the async mutex is held across the login call so
//! concurrent callers trigger exactly one login per refresh.

use chrono::{DateTime, Duration, Utc};
use metrics::counter;
use tokio::sync::Mutex;
use tracing::debug;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::bank::client::BankClient;
use crate::error::ApiError;

/// Floor for server-declared token lifetimes.
const MIN_SERVER_TTL_SECONDS: i64 = 60;

/// Cached token together with its validity window.
#[derive(Zeroize, ZeroizeOnDrop)]
struct TokenCache {
    token: String,
    #[zeroize(skip)]
    issued_at: DateTime<Utc>,
    #[zeroize(skip)]
    ttl: Duration,
}

impl TokenCache {
    /// `issued_at + ttl > now` is the sole condition for reuse.
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now < self.issued_at + self.ttl
    }
}

/// Per-connection token lifecycle.
pub struct TokenManager {
    cache: Mutex<Option<TokenCache>>,
    default_ttl: Duration,
}

impl TokenManager {
    /// Create a manager with the given default validity window (the bank's
    /// documented window is 50 minutes).
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            cache: Mutex::new(None),
            default_ttl,
        }
    }

    /// Return the cached token while fresh, otherwise log in and replace the
    /// cache. The lock is held across the login call: under concurrent
    /// callers for the same connection only one login is ever in flight.
    pub async fn get_valid_token(
        &self,
        client: &BankClient,
        username: &str,
        secret: &str,
    ) -> Result<String, ApiError> {
        let mut cache = self.cache.lock().await;
        let now = Utc::now();

        if let Some(cached) = cache.as_ref() {
            if cached.is_fresh(now) {
                return Ok(cached.token.clone());
            }
            debug!("Cached token expired, performing login");
        }

        let grant = client.login(username, secret).await?;
        counter!("bank_logins_total").increment(1);

        let ttl = grant
            .expires_in
            .map(|seconds| Duration::seconds(seconds.max(MIN_SERVER_TTL_SECONDS)))
            .unwrap_or(self.default_ttl);

        let token = grant.token.clone();
        *cache = Some(TokenCache {
            token: grant.token,
            issued_at: now,
            ttl,
        });

        Ok(token)
    }

    /// Drop the cached token so the next call performs a fresh login. Used
    /// for the single forced refresh after an authentication rejection.
    pub async fn invalidate(&self) {
        self.cache.lock().await.take();
    }
}
