//! Token Acquisition
//!
//! Bearer tokens for downstream services. A `TokenSource` produces a
//! token with its expiry; `CachedTokenProvider` keeps one per service
//! and refreshes only when the expiry is closer than a safety margin.
//! Acquisition failures propagate to the caller unmodified.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;
use tracing::debug;

/// Downstream services the explainer may need a token for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenService {
    /// Azure OpenAI chat deployments
    AzureOpenAi,
}

impl TokenService {
    pub fn name(&self) -> &'static str {
        match self {
            TokenService::AzureOpenAi => "azure_openai",
        }
    }
}

/// One issued token with its expiry, when the issuer reports one.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Where tokens actually come from (identity flow, CLI credential, a
/// fixed secret in tests).
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn issue(&self, service: TokenService) -> Result<IssuedToken>;
}

/// Token provider interface consumed by the LLM client.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn get_token(&self, service: TokenService) -> Result<String>;
}

/// A fixed token, primarily for tests and API-key style deployments.
#[derive(Debug, Clone)]
pub struct StaticTokenProvider {
    token: String,
}

impl StaticTokenProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn get_token(&self, _service: TokenService) -> Result<String> {
        Ok(self.token.clone())
    }
}

/// Expiry-aware cache over a [`TokenSource`].
///
/// A cached token is considered fresh while its expiry is at least the
/// refresh margin away; tokens without a reported expiry are re-issued
/// on every call.
pub struct CachedTokenProvider {
    source: Arc<dyn TokenSource>,
    cache: Mutex<HashMap<TokenService, IssuedToken>>,
    refresh_margin: Duration,
}

impl CachedTokenProvider {
    pub fn new(source: Arc<dyn TokenSource>) -> Self {
        Self {
            source,
            cache: Mutex::new(HashMap::new()),
            refresh_margin: Duration::minutes(5),
        }
    }

    pub fn with_refresh_margin(mut self, margin: Duration) -> Self {
        self.refresh_margin = margin;
        self
    }

    fn is_fresh(&self, issued: &IssuedToken) -> bool {
        match issued.expires_at {
            Some(expires_at) => expires_at - Utc::now() > self.refresh_margin,
            None => false,
        }
    }
}

#[async_trait]
impl TokenProvider for CachedTokenProvider {
    async fn get_token(&self, service: TokenService) -> Result<String> {
        let mut cache = self.cache.lock().await;
        if let Some(issued) = cache.get(&service) {
            if self.is_fresh(issued) {
                return Ok(issued.token.clone());
            }
            debug!(service = service.name(), "cached token stale, reissuing");
        }
        let issued = self.source.issue(service).await?;
        let token = issued.token.clone();
        cache.insert(service, issued);
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSource {
        calls: AtomicUsize,
        ttl: Option<Duration>,
    }

    #[async_trait]
    impl TokenSource for CountingSource {
        async fn issue(&self, _service: TokenService) -> Result<IssuedToken> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(IssuedToken {
                token: format!("token-{n}"),
                expires_at: self.ttl.map(|ttl| Utc::now() + ttl),
            })
        }
    }

    #[tokio::test]
    async fn test_fresh_token_is_reused() {
        let source = Arc::new(CountingSource {
            calls: AtomicUsize::new(0),
            ttl: Some(Duration::hours(1)),
        });
        let provider = CachedTokenProvider::new(source.clone());

        let first = provider.get_token(TokenService::AzureOpenAi).await.unwrap();
        let second = provider.get_token(TokenService::AzureOpenAi).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_near_expiry_token_is_reissued() {
        let source = Arc::new(CountingSource {
            calls: AtomicUsize::new(0),
            ttl: Some(Duration::seconds(10)),
        });
        // margin larger than the ttl: every call reissues
        let provider =
            CachedTokenProvider::new(source.clone()).with_refresh_margin(Duration::minutes(5));

        let first = provider.get_token(TokenService::AzureOpenAi).await.unwrap();
        let second = provider.get_token(TokenService::AzureOpenAi).await.unwrap();
        assert_ne!(first, second);
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_static_provider() {
        let provider = StaticTokenProvider::new("fixed");
        assert_eq!(
            provider.get_token(TokenService::AzureOpenAi).await.unwrap(),
            "fixed"
        );
    }
}
