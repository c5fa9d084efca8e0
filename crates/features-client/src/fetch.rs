//! The capability every pipeline layer implements.

use std::sync::Arc;

use async_trait::async_trait;

use features_protocol::{ErrorResult, FeatureResponse};

use crate::request::FeatureRequest;

/// Outcome of a pipeline call.
pub type FetchResult = Result<FeatureResponse, ErrorResult>;

/// Issue a feature request and return the (possibly merged) result.
///
/// The base requester and every middleware implement this, so layers stack by
/// wrapping one another and each can be tested against a stub inner `Fetch`.
#[async_trait]
pub trait Fetch: Send + Sync {
    async fn fetch(&self, request: FeatureRequest) -> FetchResult;
}

#[async_trait]
impl<F: Fetch + ?Sized> Fetch for Box<F> {
    async fn fetch(&self, request: FeatureRequest) -> FetchResult {
        (**self).fetch(request).await
    }
}

#[async_trait]
impl<F: Fetch + ?Sized> Fetch for Arc<F> {
    async fn fetch(&self, request: FeatureRequest) -> FetchResult {
        (**self).fetch(request).await
    }
}
