//! Daily per-identity request quota.
//!
//! Requests carrying the identity header are counted in a [`CounterStore`];
//! once an identity used up its quota for the day every further request is
//! answered with `429 Too Many Requests` before reaching any handler.
//! Requests without the header are never limited.

pub mod memory;
pub mod window;

use std::future::{ready, Ready};
use std::rc::Rc;
use std::sync::Arc;

use actix_web::body::EitherBody;
use actix_web::dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::{Error, HttpResponse, HttpResponseBuilder};
use async_trait::async_trait;
use futures_lite::future::BoxedLocal;
use log::{debug, error, warn};
use thiserror::Error;

use crate::config::RateLimitConfig;
use crate::limiter::window::{system_clock, Clock, ResetBoundary};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Admitted(u32),
    Rejected,
}

#[derive(Debug, Error)]
pub enum CounterError {
    #[error("rate limit cache unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Atomically admits one request for `key`.
    ///
    /// A missing counter is created at 1 and expires after `ttl_seconds`. An
    /// existing counter below `quota` is incremented without touching its
    /// expiry. A counter at or above `quota` rejects.
    async fn acquire(
        &self,
        key: &str,
        quota: u32,
        ttl_seconds: u64,
    ) -> Result<Admission, CounterError>;
}

#[derive(Clone)]
pub struct RateLimiter {
    counter: Arc<Box<dyn CounterStore>>,
    config: Arc<RateLimitConfig>,
    clock: Clock,
}

impl RateLimiter {
    const REJECTED: &'static str = "Rate limit exceeded";
    const UNAVAILABLE: &'static str = "Rate limit cache unavailable";

    pub fn new(counter: Box<dyn CounterStore>, config: RateLimitConfig) -> Self {
        Self {
            counter: Arc::new(counter),
            config: Arc::new(config),
            clock: system_clock(),
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    fn identity(&self, request: &ServiceRequest) -> Option<String> {
        request
            .headers()
            .get(self.config.header.as_str())
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(String::from)
    }

    fn boundary(&self) -> ResetBoundary {
        self.config.reset
    }

    async fn acquire(&self, identity: &str) -> Result<Admission, CounterError> {
        let ttl = self.boundary().seconds_until_reset((self.clock)());
        let key = format!("{}{}", self.config.key_prefix, identity);

        self.counter
            .acquire(&key, self.config.daily_quota, ttl)
            .await
    }

    fn plain_text(mut response: HttpResponseBuilder, body: &'static str) -> HttpResponse {
        response.content_type(mime::TEXT_PLAIN_UTF_8).body(body)
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
    type InitError = ();
    type Transform = RateLimiterMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RateLimiterMiddleware {
            service: Rc::new(service),
            limiter: self.clone(),
        }))
    }
}

pub struct RateLimiterMiddleware<S> {
    service: Rc<S>,
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
    type Future = BoxedLocal<Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, request: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let limiter = self.limiter.clone();

        Box::pin(async move {
            if let Some(identity) = limiter.identity(&request) {
                match limiter.acquire(&identity).await {
                    Ok(Admission::Admitted(count)) => {
                        debug!("Request {} of the day for \"{}\"", count, identity);
                    }
                    Ok(Admission::Rejected) => {
                        warn!("Rate limit exceeded for \"{}\"", identity);

                        let response = RateLimiter::plain_text(
                            HttpResponse::TooManyRequests(),
                            RateLimiter::REJECTED,
                        );

                        return Ok(request.into_response(response).map_into_right_body());
                    }
                    Err(e) => {
                        error!("Error counting requests for \"{}\": {:#?}", identity, e);

                        sentry::capture_error(&e);

                        if !limiter.config.fail_open {
                            let response = RateLimiter::plain_text(
                                HttpResponse::ServiceUnavailable(),
                                RateLimiter::UNAVAILABLE,
                            );

                            return Ok(request.into_response(response).map_into_right_body());
                        }
                    }
                }
            }

            service
                .call(request)
                .await
                .map(ServiceResponse::map_into_left_body)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::limiter::memory::Memory;
    use actix_web::http::StatusCode;
    use actix_web::{test, web, App};
    use chrono::{DateTime, Utc};
    use std::sync::Mutex;

    struct Broken;

    #[async_trait]
    impl CounterStore for Broken {
        async fn acquire(&self, _: &str, _: u32, _: u64) -> Result<Admission, CounterError> {
            Err(CounterError::Unavailable("connection refused".into()))
        }
    }

    fn at(time: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(time)
            .expect("valid timestamp")
            .with_timezone(&Utc)
    }

    fn utc_config() -> RateLimitConfig {
        RateLimitConfig {
            reset: ResetBoundary::Utc,
            ..RateLimitConfig::default()
        }
    }

    fn shared_clock(now: &Arc<Mutex<DateTime<Utc>>>) -> Clock {
        let now = Arc::clone(now);

        Arc::new(move || *now.lock().expect("clock lock"))
    }

    fn get(identity: Option<&str>) -> test::TestRequest {
        let request = test::TestRequest::get().uri("/");

        match identity {
            Some(identity) => request.insert_header(("user_id", identity)),
            None => request,
        }
    }

    macro_rules! limited_app {
        ($limiter:expr) => {
            test::init_service(
                App::new()
                    .wrap($limiter)
                    .route("/", web::get().to(|| async { HttpResponse::Ok().body("hello") })),
            )
            .await
        };
    }

    #[actix_web::test]
    async fn rejects_after_daily_quota() {
        let limiter = RateLimiter::new(Box::new(Memory::new()), utc_config());
        let app = limited_app!(limiter);

        for _ in 0..3 {
            let response = test::call_service(&app, get(Some("alice")).to_request()).await;
            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(test::read_body(response).await, "hello");
        }

        for _ in 0..2 {
            let response = test::call_service(&app, get(Some("alice")).to_request()).await;
            assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
            assert_eq!(
                response
                    .headers()
                    .get("content-type")
                    .and_then(|value| value.to_str().ok()),
                Some("text/plain; charset=utf-8")
            );
            assert_eq!(test::read_body(response).await, "Rate limit exceeded");
        }
    }

    #[actix_web::test]
    async fn identities_are_counted_separately() {
        let limiter = RateLimiter::new(Box::new(Memory::new()), utc_config());
        let app = limited_app!(limiter);

        for _ in 0..3 {
            test::call_service(&app, get(Some("alice")).to_request()).await;
        }

        let alice = test::call_service(&app, get(Some("alice")).to_request()).await;
        let bob = test::call_service(&app, get(Some("bob")).to_request()).await;

        assert_eq!(alice.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(bob.status(), StatusCode::OK);
    }

    #[actix_web::test]
    async fn requests_without_identity_are_not_limited() {
        let limiter = RateLimiter::new(Box::new(Memory::new()), utc_config());
        let app = limited_app!(limiter);

        for identity in [None, Some(""), Some("   ")]
            .into_iter()
            .cycle()
            .take(12)
        {
            let response = test::call_service(&app, get(identity).to_request()).await;
            assert_eq!(response.status(), StatusCode::OK);
        }
    }

    #[actix_web::test]
    async fn quota_resets_after_day_boundary() {
        let now = Arc::new(Mutex::new(at("2024-03-01T23:59:00Z")));
        let limiter = RateLimiter::new(
            Box::new(Memory::with_clock(shared_clock(&now))),
            utc_config(),
        )
        .with_clock(shared_clock(&now));
        let app = limited_app!(limiter);

        for _ in 0..3 {
            test::call_service(&app, get(Some("alice")).to_request()).await;
        }
        let response = test::call_service(&app, get(Some("alice")).to_request()).await;
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

        *now.lock().expect("clock lock") = at("2024-03-02T00:00:01Z");

        let response = test::call_service(&app, get(Some("alice")).to_request()).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[actix_web::test]
    async fn configured_quota_and_header_are_used() {
        let config = RateLimitConfig {
            daily_quota: 1,
            header: "x-api-user".into(),
            ..utc_config()
        };
        let app = limited_app!(RateLimiter::new(Box::new(Memory::new()), config));

        let request = || {
            test::TestRequest::get()
                .uri("/")
                .insert_header(("x-api-user", "carol"))
                .to_request()
        };

        assert_eq!(
            test::call_service(&app, request()).await.status(),
            StatusCode::OK
        );
        assert_eq!(
            test::call_service(&app, request()).await.status(),
            StatusCode::TOO_MANY_REQUESTS
        );
        // the default header is no longer an identity
        assert_eq!(
            test::call_service(&app, get(Some("carol")).to_request())
                .await
                .status(),
            StatusCode::OK
        );
    }

    #[actix_web::test]
    async fn unavailable_cache_fails_closed() {
        let app = limited_app!(RateLimiter::new(Box::new(Broken), utc_config()));

        let response = test::call_service(&app, get(Some("alice")).to_request()).await;

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[actix_web::test]
    async fn unavailable_cache_fails_open_when_configured() {
        let config = RateLimitConfig {
            fail_open: true,
            ..utc_config()
        };
        let app = limited_app!(RateLimiter::new(Box::new(Broken), config));

        let response = test::call_service(&app, get(Some("alice")).to_request()).await;

        assert_eq!(response.status(), StatusCode::OK);
    }
}
