//! OAuth2 client-credentials authentication with a shared token store.
//!
//! Tokens expire server-side after about five minutes. Rather than tracking
//! expiry, the middleware reuses the stored token until the API answers 401,
//! then fetches a new one and retries exactly once.
//!
//! The store is read and written without holding a lock across the token
//! request. Two concurrent callers may both refresh; the last write wins and
//! both tokens are valid.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use features_protocol::{ErrorResult, WrapperError};

use crate::config::ClientConfig;
use crate::fetch::{Fetch, FetchResult};
use crate::request::FeatureRequest;

/// Errors obtaining an access token.
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("CLIENT_ID and CLIENT_SECRET are not configured")]
    MissingCredentials,

    #[error("Token endpoint rejected the credentials ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("Token response did not contain an access_token")]
    MissingAccessToken,

    #[error("Token request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Holder of the current access token.
pub trait TokenStore: Send + Sync {
    fn get(&self) -> Option<String>;
    fn set(&self, token: String);
    fn clear(&self);
}

/// Process-local token store.
#[derive(Debug, Default)]
pub struct InMemoryTokenStore {
    token: RwLock<Option<String>>,
}

impl InMemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: RwLock::new(Some(token.into())),
        }
    }
}

impl TokenStore for InMemoryTokenStore {
    fn get(&self) -> Option<String> {
        self.token
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn set(&self, token: String) {
        *self
            .token
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(token);
    }

    fn clear(&self) {
        *self
            .token
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = None;
    }
}

/// Source of new access tokens.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn fetch_token(&self) -> Result<String, TokenError>;
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
}

/// Requests tokens with the client-credentials grant.
#[derive(Debug, Clone)]
pub struct OAuthTokenProvider {
    client: Client,
    token_url: String,
    client_id: Option<String>,
    client_secret: Option<String>,
    timeout: Duration,
}

impl OAuthTokenProvider {
    pub fn new(client: Client, config: &ClientConfig) -> Self {
        Self {
            client,
            token_url: config.token_url.clone(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            timeout: config.request_timeout,
        }
    }
}

#[async_trait]
impl TokenProvider for OAuthTokenProvider {
    async fn fetch_token(&self) -> Result<String, TokenError> {
        let (Some(client_id), Some(client_secret)) = (&self.client_id, &self.client_secret)
        else {
            return Err(TokenError::MissingCredentials);
        };

        let response = self
            .client
            .post(&self.token_url)
            .basic_auth(client_id, Some(client_secret))
            .form(&[("grant_type", "client_credentials")])
            .timeout(self.timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TokenError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let token: TokenResponse = response.json().await?;
        token.access_token.ok_or(TokenError::MissingAccessToken)
    }
}

/// Attaches a bearer token to requests, refreshing it once on 401.
pub struct AuthMiddleware<F> {
    inner: F,
    store: Arc<dyn TokenStore>,
    provider: Arc<dyn TokenProvider>,
}

impl<F: Fetch> AuthMiddleware<F> {
    pub fn new(inner: F, store: Arc<dyn TokenStore>, provider: Arc<dyn TokenProvider>) -> Self {
        Self {
            inner,
            store,
            provider,
        }
    }
}

#[async_trait]
impl<F: Fetch> Fetch for AuthMiddleware<F> {
    async fn fetch(&self, request: FeatureRequest) -> FetchResult {
        if request.has_api_key() {
            debug!("API key supplied, skipping OAuth");
            return self.inner.fetch(request).await;
        }

        if let Some(token) = self.store.get() {
            let result = self.inner.fetch(request.clone().with_bearer(&token)).await;
            if !matches!(&result, Err(e) if e.is_unauthorized()) {
                return result;
            }
            info!("Access token rejected, requesting a new one");
            self.store.clear();
        }

        let token = match self.provider.fetch_token().await {
            Ok(token) => token,
            Err(e) => {
                warn!(error = %e, "Failed to obtain access token");
                return Err(ErrorResult::from(WrapperError::MissingCredentials));
            }
        };
        self.store.set(token.clone());

        self.inner.fetch(request.with_bearer(&token)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use features_protocol::{FeatureResponse, SearchResult};

    /// Accepts only `Bearer good`, recording each authorization header seen.
    #[derive(Default)]
    struct Gatekeeper {
        seen: Mutex<Vec<Option<String>>>,
    }

    #[async_trait]
    impl Fetch for Gatekeeper {
        async fn fetch(&self, request: FeatureRequest) -> FetchResult {
            let auth = request.headers.get("authorization").map(str::to_string);
            self.seen.lock().unwrap().push(auth.clone());
            if request.has_api_key() || auth.as_deref() == Some("Bearer good") {
                Ok(FeatureResponse::Features(SearchResult::empty()))
            } else {
                Err(ErrorResult::api(401, "Unauthorized"))
            }
        }
    }

    struct CountingProvider {
        token: Option<&'static str>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TokenProvider for CountingProvider {
        async fn fetch_token(&self) -> Result<String, TokenError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.token
                .map(str::to_string)
                .ok_or(TokenError::MissingCredentials)
        }
    }

    fn provider(token: Option<&'static str>) -> Arc<CountingProvider> {
        Arc::new(CountingProvider {
            token,
            calls: AtomicUsize::new(0),
        })
    }

    #[tokio::test]
    async fn test_expired_token_refreshed_once() {
        let store = Arc::new(InMemoryTokenStore::with_token("stale"));
        let provider = provider(Some("good"));
        let auth = AuthMiddleware::new(Gatekeeper::default(), store.clone(), provider.clone());

        let result = auth.fetch(FeatureRequest::for_collection("c-d-e-1")).await;
        assert!(result.is_ok());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.get().as_deref(), Some("good"));
        assert_eq!(
            *auth.inner.seen.lock().unwrap(),
            vec![Some("Bearer stale".to_string()), Some("Bearer good".to_string())]
        );
    }

    #[tokio::test]
    async fn test_cached_token_reused() {
        let store = Arc::new(InMemoryTokenStore::with_token("good"));
        let provider = provider(Some("other"));
        let auth = AuthMiddleware::new(Gatekeeper::default(), store, provider.clone());

        assert!(auth.fetch(FeatureRequest::default()).await.is_ok());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_token_failure_is_fixed_401() {
        let provider = provider(None);
        let auth = AuthMiddleware::new(
            Gatekeeper::default(),
            Arc::new(InMemoryTokenStore::new()),
            provider,
        );

        let err = auth.fetch(FeatureRequest::default()).await.unwrap_err();
        assert_eq!(err.code, 401);
        assert_eq!(err.description, "Missing or invalid credentials");
        assert!(err.is_from_wrapper());
        assert!(auth.inner.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_second_401_propagated() {
        let provider = provider(Some("also-bad"));
        let auth = AuthMiddleware::new(
            Gatekeeper::default(),
            Arc::new(InMemoryTokenStore::with_token("bad")),
            provider.clone(),
        );

        let err = auth.fetch(FeatureRequest::default()).await.unwrap_err();
        assert_eq!(err.code, 401);
        assert!(!err.is_from_wrapper());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
        assert_eq!(auth.inner.seen.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_api_key_bypasses_tokens() {
        let provider = provider(Some("good"));
        let auth = AuthMiddleware::new(
            Gatekeeper::default(),
            Arc::new(InMemoryTokenStore::new()),
            provider.clone(),
        );

        let request = FeatureRequest::default().with_param("key", "abc");
        assert!(auth.fetch(request).await.is_ok());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
        assert_eq!(*auth.inner.seen.lock().unwrap(), vec![None]);
    }

    #[tokio::test]
    async fn test_other_errors_not_retried() {
        struct AlwaysFails;

        #[async_trait]
        impl Fetch for AlwaysFails {
            async fn fetch(&self, _request: FeatureRequest) -> FetchResult {
                Err(ErrorResult::api(500, "boom"))
            }
        }

        let provider = provider(Some("good"));
        let auth = AuthMiddleware::new(
            AlwaysFails,
            Arc::new(InMemoryTokenStore::with_token("good")),
            provider.clone(),
        );
        let err = auth.fetch(FeatureRequest::default()).await.unwrap_err();
        assert_eq!(err.code, 500);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }
}
