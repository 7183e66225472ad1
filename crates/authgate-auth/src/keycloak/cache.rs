//! TTL cache for service tokens.
//!
//! Client-credentials tokens are valid for minutes; re-acquiring one per
//! workflow invocation is wasteful under load. This wrapper caches the
//! token until the configured lifetime (or the token's own `expires_in`
//! hint, whichever is shorter) elapses. Password-grant calls pass through
//! untouched.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::config::TokenCacheConfig;
use crate::error::ServiceTokenError;
use crate::keycloak::{IdpTokens, ServiceToken, TokenClient, TokenResponse};

struct CachedEntry {
    token: ServiceToken,
    expires_at: Instant,
}

/// Caching layer in front of [`TokenClient`].
pub struct CachedTokenClient {
    inner: TokenClient,
    ttl: Duration,
    slot: RwLock<Option<CachedEntry>>,
}

impl CachedTokenClient {
    /// Wraps a token client with the configured cache lifetime.
    #[must_use]
    pub fn new(inner: TokenClient, config: &TokenCacheConfig) -> Self {
        Self {
            inner,
            ttl: config.ttl,
            slot: RwLock::new(None),
        }
    }

    /// Drops the cached token so the next call re-acquires one.
    pub async fn invalidate(&self) {
        *self.slot.write().await = None;
    }

    fn lifetime_for(&self, token: &ServiceToken) -> Duration {
        token
            .expires_in()
            .map(Duration::from_secs)
            .map_or(self.ttl, |hint| hint.min(self.ttl))
    }
}

#[async_trait]
impl IdpTokens for CachedTokenClient {
    async fn service_token(&self) -> Result<ServiceToken, ServiceTokenError> {
        {
            let slot = self.slot.read().await;
            if let Some(entry) = slot.as_ref()
                && Instant::now() < entry.expires_at
            {
                return Ok(entry.token.clone());
            }
        }

        let mut slot = self.slot.write().await;
        // Another task may have refreshed while we waited for the lock.
        if let Some(entry) = slot.as_ref()
            && Instant::now() < entry.expires_at
        {
            return Ok(entry.token.clone());
        }

        let token = self.inner.service_token().await?;
        let expires_at = Instant::now() + self.lifetime_for(&token);
        *slot = Some(CachedEntry {
            token: token.clone(),
            expires_at,
        });
        tracing::debug!("cached fresh service token");
        Ok(token)
    }

    async fn authenticate(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<TokenResponse>, reqwest::Error> {
        self.inner.authenticate(email, password).await
    }
}
