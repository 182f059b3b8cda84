// web-server/src/middleware/rate_limiter.rs
use std::sync::Arc;
use std::time::{Duration, Instant};
use actix_web::{
    body::EitherBody,
    dev::{Service, ServiceRequest, ServiceResponse, Transform, forward_ready},
    http::header,
    Error, HttpResponse,
};
use common::RateLimitConfig;
use dashmap::DashMap;
use futures_util::future::{LocalBoxFuture, Ready, ready};
use serde_json::json;

/// Per-client sliding window limiter for the unauthenticated auth endpoints
#[derive(Debug, Clone)]
pub struct RateLimiter {
    paths: Vec<String>,
    max_requests: usize,
    window: Duration,
    // Client ip -> request instants inside the current window
    store: Arc<DashMap<String, Vec<Instant>>>,
}

impl RateLimiter {
    pub fn new(paths: Vec<String>, config: &RateLimitConfig) -> Self {
        Self {
            paths,
            max_requests: config.max_requests,
            window: Duration::from_secs(config.window_seconds),
            store: Arc::new(DashMap::new()),
        }
    }

    fn applies_to(&self, path: &str) -> bool {
        self.paths.iter().any(|p| path.starts_with(p.as_str()))
    }

    /// Record a request from `client`. Returns the wait before the next
    /// allowed request when the limit is already reached.
    fn check(&self, client: &str, now: Instant) -> Option<Duration> {
        let mut entry = self.store.entry(client.to_string()).or_default();
        let window = self.window;
        entry.retain(|t| now.duration_since(*t) < window);

        if entry.len() >= self.max_requests {
            let oldest = entry.first().copied().unwrap_or(now);
            Some(window.saturating_sub(now.duration_since(oldest)))
        } else {
            entry.push(now);
            None
        }
    }

    /// Drop clients with no requests in the current window
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let window = self.window;
        let before = self.store.len();
        self.store
            .retain(|_, times| times.iter().any(|t| now.duration_since(*t) < window));
        before - self.store.len()
    }
}

impl<S, B> Transform<S, ServiceRequest> for RateLimiter
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = RateLimiterMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RateLimiterMiddleware {
            service,
            limiter: self.clone(),
        }))
    }
}

pub struct RateLimiterMiddleware<S> {
    service: S,
    limiter: RateLimiter,
}

impl<S, B> Service<ServiceRequest> for RateLimiterMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        if self.limiter.applies_to(req.path()) {
            let ip = req
                .connection_info()
                .realip_remote_addr()
                .unwrap_or("unknown")
                .to_string();

            if let Some(wait) = self.limiter.check(&ip, Instant::now()) {
                tracing::warn!("Rate limit exceeded for IP {} on {}", ip, req.path());

                let retry_after = wait.as_secs().max(1).to_string();
                let response = HttpResponse::TooManyRequests()
                    .append_header((header::RETRY_AFTER, retry_after))
                    .json(json!({ "ok": false, "error": "rate_limited" }));
                let res = req.into_response(response).map_into_right_body();
                return Box::pin(async move { Ok(res) });
            }
        }

        let fut = self.service.call(req);
        Box::pin(async move { fut.await.map(ServiceResponse::map_into_left_body) })
    }
}
