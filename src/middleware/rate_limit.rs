/// Per-IP Rate Limiting Middleware
///
/// A keyed GCRA limiter (`governor`) in front of a scope. Requests over the
/// quota are answered with 429 and a `Retry-After` header.

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error,
};
use futures::future::LocalBoxFuture;
use governor::{
    clock::{Clock, DefaultClock},
    DefaultKeyedRateLimiter, Quota, RateLimiter,
};
use std::net::IpAddr;
use std::num::NonZeroU32;
use std::rc::Rc;
use std::sync::Arc;

use crate::error::AppError;

/// Tracked addresses above which idle entries are pruned
const MAX_TRACKED_KEYS: usize = 10_000;

/// Rate limit middleware, cheap to clone into each worker
#[derive(Clone)]
pub struct RateLimit {
    limiter: Arc<DefaultKeyedRateLimiter<IpAddr>>,
    scope: &'static str,
}

impl RateLimit {
    /// Allow `requests` per minute per client address. Zero is rejected.
    pub fn per_minute(requests: u32, scope: &'static str) -> Result<Self, AppError> {
        let requests = NonZeroU32::new(requests).ok_or_else(|| {
            AppError::Internal(format!("{} rate limit must be positive", scope))
        })?;

        Ok(Self {
            limiter: Arc::new(RateLimiter::keyed(Quota::per_minute(requests))),
            scope,
        })
    }

    /// Take one cell for `ip`, or report how many seconds until the next one
    pub fn check(&self, ip: IpAddr) -> Result<(), AppError> {
        if self.limiter.len() > MAX_TRACKED_KEYS {
            self.limiter.retain_recent();
        }

        self.limiter.check_key(&ip).map_err(|not_until| {
            let wait = not_until.wait_time_from(DefaultClock::default().now());
            tracing::warn!(
                scope = self.scope,
                client_ip = %ip,
                retry_after = wait.as_secs(),
                "Rate limit exceeded"
            );
            AppError::TooManyRequests(wait.as_secs().max(1))
        })
    }
}

impl<S, B> Transform<S, ServiceRequest> for RateLimit
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = RateLimitService<S>;
    type Future = std::future::Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        std::future::ready(Ok(RateLimitService {
            service: Rc::new(service),
            limit: self.clone(),
        }))
    }
}

pub struct RateLimitService<S> {
    service: Rc<S>,
    limit: RateLimit,
}

impl<S, B> Service<ServiceRequest> for RateLimitService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        // Without a peer address there is nothing to key on
        let verdict = match req.peer_addr() {
            Some(addr) => self.limit.check(addr.ip()),
            None => Ok(()),
        };
        let service = self.service.clone();

        Box::pin(async move {
            verdict?;
            service.call(req).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    const CLIENT: IpAddr = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1));
    const OTHER: IpAddr = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2));

    #[test]
    fn test_zero_quota_is_rejected() {
        assert!(matches!(
            RateLimit::per_minute(0, "auth"),
            Err(AppError::Internal(_))
        ));
    }

    #[test]
    fn test_requests_over_quota_are_rejected() {
        let limit = RateLimit::per_minute(3, "auth").unwrap();

        for _ in 0..3 {
            assert!(limit.check(CLIENT).is_ok());
        }

        match limit.check(CLIENT) {
            Err(AppError::TooManyRequests(retry_after)) => assert!(retry_after >= 1),
            other => panic!("expected TooManyRequests, got {:?}", other.err()),
        }
    }

    #[test]
    fn test_quota_is_per_address() {
        let limit = RateLimit::per_minute(1, "global").unwrap();

        assert!(limit.check(CLIENT).is_ok());
        assert!(limit.check(CLIENT).is_err());
        assert!(limit.check(OTHER).is_ok());
    }
}
