//! Process-wide request rate limiting.
//!
//! A single fixed window shared by all clients: once the counter hits the
//! cap, every request gets a 429 until the window rolls over.

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error,
};
use futures::future::{ready, LocalBoxFuture, Ready};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::error::AppError;

#[derive(Debug)]
struct Window {
    started: Instant,
    count: u64,
}

/// Fixed-window rate limiter middleware. Clones share the same window, so
/// one instance cloned into every worker keeps the limit process-wide.
#[derive(Clone)]
pub struct RateLimit {
    window: Duration,
    max_requests: u64,
    state: Arc<Mutex<Window>>,
}

impl RateLimit {
    /// `max_requests` per `window`, counted across all clients.
    pub fn new(window: Duration, max_requests: u64) -> Self {
        Self {
            window,
            max_requests,
            state: Arc::new(Mutex::new(Window {
                started: Instant::now(),
                count: 0,
            })),
        }
    }

    /// The production default: 200 requests per 15 minutes.
    pub fn standard() -> Self {
        Self::new(Duration::from_secs(15 * 60), 200)
    }

    fn try_acquire(&self) -> bool {
        let mut window = self.state.lock().unwrap();
        if window.started.elapsed() >= self.window {
            window.started = Instant::now();
            window.count = 0;
        }
        if window.count >= self.max_requests {
            return false;
        }
        window.count += 1;
        true
    }
}

impl<S, B> Transform<S, ServiceRequest> for RateLimit
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = RateLimitService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RateLimitService {
            service,
            limiter: RateLimit {
                window: self.window,
                max_requests: self.max_requests,
                state: Arc::clone(&self.state),
            },
        }))
    }
}

pub struct RateLimitService<S> {
    service: S,
    limiter: RateLimit,
}

impl<S, B> Service<ServiceRequest> for RateLimitService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        if self.limiter.try_acquire() {
            Box::pin(self.service.call(req))
        } else {
            Box::pin(async { Err(AppError::RateLimited.into()) })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter_stops_at_cap() {
        let limiter = RateLimit::new(Duration::from_secs(60), 3);
        assert!(limiter.try_acquire());
        assert!(limiter.try_acquire());
        assert!(limiter.try_acquire());
        assert!(!limiter.try_acquire());
        assert!(!limiter.try_acquire());
    }

    #[test]
    fn test_window_rolls_over() {
        let limiter = RateLimit::new(Duration::from_millis(20), 1);
        assert!(limiter.try_acquire());
        assert!(!limiter.try_acquire());
        std::thread::sleep(Duration::from_millis(30));
        assert!(limiter.try_acquire());
    }

    #[actix_rt::test]
    async fn test_middleware_returns_429_past_cap() {
        use actix_web::{test, web, App, HttpResponse};

        let app = test::init_service(
            App::new()
                .wrap(RateLimit::new(Duration::from_secs(60), 2))
                .route("/", web::get().to(|| async { HttpResponse::Ok().finish() })),
        )
        .await;

        for _ in 0..2 {
            let resp = test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await;
            assert!(resp.status().is_success());
        }

        let req = test::TestRequest::get().uri("/").to_request();
        let resp = test::try_call_service(&app, req).await;
        match resp {
            Ok(resp) => assert_eq!(resp.status(), 429),
            Err(err) => assert_eq!(err.error_response().status(), 429),
        }
    }
}
