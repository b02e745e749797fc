//! Remote transport contract

use crate::error::RemoteError;
use crate::record::ResourceRecord;
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;

/// One remote operation for a resource type and mutation kind
///
/// Implementations reject with a [`RemoteError`] carrying a structured code;
/// the engine never inspects the message for control flow.
#[async_trait]
pub trait RemoteOperation: Send + Sync {
    /// Issue the call; `Ok(None)` means the server returned no body
    async fn call(&self, payload: &ResourceRecord) -> Result<Option<ResourceRecord>, RemoteError>;
}

#[async_trait]
impl<T: RemoteOperation + ?Sized> RemoteOperation for Arc<T> {
    async fn call(&self, payload: &ResourceRecord) -> Result<Option<ResourceRecord>, RemoteError> {
        (**self).call(payload).await
    }
}

/// Adapter turning an async closure into a [`RemoteOperation`]
pub struct RemoteFn<F>(F);

/// Wrap `f` as a remote operation
pub fn remote_fn<F, Fut>(f: F) -> RemoteFn<F>
where
    F: Fn(ResourceRecord) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Option<ResourceRecord>, RemoteError>> + Send + 'static,
{
    RemoteFn(f)
}

#[async_trait]
impl<F, Fut> RemoteOperation for RemoteFn<F>
where
    F: Fn(ResourceRecord) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Option<ResourceRecord>, RemoteError>> + Send + 'static,
{
    async fn call(&self, payload: &ResourceRecord) -> Result<Option<ResourceRecord>, RemoteError> {
        (self.0)(payload.clone()).await
    }
}
