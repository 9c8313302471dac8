use crate::error::LimitError;
use crate::limiter::RateLimiter;
use crate::telemetry::{NullSink, TelemetrySink};
use futures::future::BoxFuture;
use std::fmt;
use std::hash::Hash;
use std::task::{Context, Poll};
use tower_layer::Layer;
use tower_service::Service;

/// A layer that enforces a [`RateLimiter`] in front of a tower service.
///
/// The request plays the role of the call's arguments: the limiter's key extractor sees
/// `&Request`, and the request reaches the inner service unchanged once admitted.
pub struct RateLimitLayer<Req, K = (), S = NullSink> {
    limiter: RateLimiter<Req, K, S>,
}

impl<Req, K, S> RateLimitLayer<Req, K, S> {
    /// Create a new rate limit layer. Services it produces share `limiter`'s windows.
    pub fn new(limiter: RateLimiter<Req, K, S>) -> Self {
        Self { limiter }
    }
}

impl<Req, K, S: Clone> Clone for RateLimitLayer<Req, K, S> {
    fn clone(&self) -> Self {
        Self { limiter: self.limiter.clone() }
    }
}

impl<Req, K, S> fmt::Debug for RateLimitLayer<Req, K, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateLimitLayer").field("limiter", &self.limiter).finish()
    }
}

impl<Svc, Req, K, S: Clone> Layer<Svc> for RateLimitLayer<Req, K, S> {
    type Service = RateLimitService<Svc, Req, K, S>;

    fn layer(&self, service: Svc) -> Self::Service {
        RateLimitService { inner: service, limiter: self.limiter.clone() }
    }
}

/// Middleware service that enforces rate limits.
pub struct RateLimitService<Svc, Req, K = (), S = NullSink> {
    inner: Svc,
    limiter: RateLimiter<Req, K, S>,
}

impl<Svc: Clone, Req, K, S: Clone> Clone for RateLimitService<Svc, Req, K, S> {
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone(), limiter: self.limiter.clone() }
    }
}

impl<Svc: fmt::Debug, Req, K, S> fmt::Debug for RateLimitService<Svc, Req, K, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateLimitService")
            .field("inner", &self.inner)
            .field("limiter", &self.limiter)
            .finish()
    }
}

impl<Svc, Req, K, S> Service<Req> for RateLimitService<Svc, Req, K, S>
where
    Svc: Service<Req> + Clone + Send + 'static,
    Svc::Response: Send + 'static,
    Svc::Error: Send + 'static,
    Svc::Future: Send + 'static,
    Req: Send + 'static,
    K: Hash + Eq + Clone + Send + 'static,
    S: TelemetrySink + Sync,
    S::Future: Send + 'static,
{
    type Response = Svc::Response;
    type Error = LimitError<Svc::Error>;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx).map_err(LimitError::Inner)
    }

    fn call(&mut self, req: Req) -> Self::Future {
        let limiter = self.limiter.clone();
        // Keep the service that was driven ready; leave the fresh clone in its place.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let key = limiter.key_for(&req);

        Box::pin(async move {
            limiter.acquire_key(key).await?;
            inner.call(req).await.map_err(LimitError::Inner)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;
    use std::time::Duration;
    use tower::{service_fn, ServiceExt};

    #[tokio::test]
    async fn layer_admits_then_denies() {
        let limiter = RateLimiter::builder()
            .capacity(1)
            .period(Duration::from_secs(1))
            .build()
            .unwrap();
        let svc = limiter.layer().layer(service_fn(|req: u32| async move {
            Ok::<_, Infallible>(req + 1)
        }));

        assert_eq!(svc.clone().oneshot(1).await.unwrap(), 2);
        let denied = svc.oneshot(1).await.unwrap_err();
        assert!(denied.is_rate_limited());
    }
}
