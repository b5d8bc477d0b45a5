//! Admission control for mutation endpoints.
//!
//! A request is admitted when its client address is on the allow-list, or
//! when the client's token bucket has a token to spend.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::config::model::RateLimiterConfig;
use crate::observability::metrics;
use crate::security::allow_list::{AllowList, AllowListError};
use crate::security::rate_limit::RateLimiter;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdmissionError {
    #[error("client address {0:?} is not a valid IP address")]
    UnparsableAddress(String),

    #[error("rate limit exceeded for {0}")]
    RateLimited(IpAddr),
}

impl AdmissionError {
    /// Short label for metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            AdmissionError::UnparsableAddress(_) => "unparsable_address",
            AdmissionError::RateLimited(_) => "rate_limited",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AdmissionError::UnparsableAddress(_) => StatusCode::FORBIDDEN,
            AdmissionError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
        }
    }
}

impl IntoResponse for AdmissionError {
    fn into_response(self) -> Response {
        (self.status(), self.to_string()).into_response()
    }
}

/// The host part of a remote address, without any port.
///
/// Accepts `ip`, `ipv4:port`, `[ipv6]:port` and bare IPv6.
pub fn client_host(remote: &str) -> &str {
    let remote = remote.trim();
    if let Some(rest) = remote.strip_prefix('[') {
        return rest.split(']').next().unwrap_or(rest);
    }
    match remote.rsplit_once(':') {
        Some((host, _)) if !host.contains(':') => host,
        _ => remote,
    }
}

#[derive(Debug)]
pub struct AdmissionControl {
    allow_list: AllowList,
    limiter: RateLimiter,
}

impl AdmissionControl {
    pub fn new(config: &RateLimiterConfig) -> Result<Self, AllowListError> {
        Ok(Self {
            allow_list: AllowList::new(&config.white_list)?,
            limiter: RateLimiter::from_config(config),
        })
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Admit a request from `remote`, which may carry a port.
    ///
    /// An address that does not parse is rejected.
    pub fn admit(&self, remote: &str) -> Result<(), AdmissionError> {
        let host = client_host(remote);
        let ip = host
            .parse::<IpAddr>()
            .map_err(|_| AdmissionError::UnparsableAddress(remote.to_string()))?;
        self.admit_ip(ip)
    }

    pub fn admit_ip(&self, ip: IpAddr) -> Result<(), AdmissionError> {
        if self.allow_list.allows(ip) || self.limiter.check(ip) {
            Ok(())
        } else {
            Err(AdmissionError::RateLimited(ip))
        }
    }
}

/// Admission middleware.
pub async fn admission_middleware(
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(admission): State<Arc<AdmissionControl>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    match admission.admit(&addr.to_string()) {
        Ok(()) => next.run(request).await,
        Err(e) => {
            tracing::warn!(client = %addr, error = %e, "Request rejected");
            metrics::record_admission_rejected(e.reason());
            e.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn control(tps: u32, size: u32, white_list: &[&str]) -> AdmissionControl {
        AdmissionControl::new(&RateLimiterConfig {
            tps,
            size,
            white_list: white_list.iter().map(|s| s.to_string()).collect(),
        })
        .unwrap()
    }

    #[test]
    fn test_client_host() {
        assert_eq!(client_host("10.0.0.5:8080"), "10.0.0.5");
        assert_eq!(client_host("10.0.0.5"), "10.0.0.5");
        assert_eq!(client_host("[::1]:8080"), "::1");
        assert_eq!(client_host("2001:db8::1"), "2001:db8::1");
        assert_eq!(client_host("garbage"), "garbage");
    }

    #[test]
    fn test_allow_listed_client_bypasses_limiter() {
        let admission = control(1, 1, &["10.0.0.0/24"]);
        for _ in 0..10 {
            assert!(admission.admit("10.0.0.5:1234").is_ok());
        }
        assert_eq!(admission.limiter().tracked_clients(), 0);
    }

    #[test]
    fn test_other_clients_are_limited() {
        let admission = control(1, 2, &["10.0.0.0/24"]);
        assert!(admission.admit("192.168.1.1:1").is_ok());
        assert!(admission.admit("192.168.1.1:2").is_ok());
        assert_eq!(
            admission.admit("192.168.1.1:3"),
            Err(AdmissionError::RateLimited("192.168.1.1".parse().unwrap()))
        );
    }

    #[test]
    fn test_unparsable_address_rejected() {
        let admission = control(100, 100, &["0.0.0.0/0"]);
        let err = admission.admit("not-an-address:80").unwrap_err();
        assert!(matches!(err, AdmissionError::UnparsableAddress(_)));
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_invalid_allow_list_rejected() {
        let result = AdmissionControl::new(&RateLimiterConfig {
            white_list: vec!["10.0.0.0/40".into()],
            ..Default::default()
        });
        assert!(result.is_err());
    }
}
