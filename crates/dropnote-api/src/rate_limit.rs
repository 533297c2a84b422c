//! Per-client daily quota on write routes.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use governor::clock::{Clock, DefaultClock};
use governor::middleware::NoOpMiddleware;
use governor::state::keyed::DashMapStateStore;
use governor::{Quota, RateLimiter};
use tracing::{debug, warn};

use dropnote_core::logging::{CLIENT_IP, COMPONENT, SUBSYSTEM};
use dropnote_core::{Error, Result};

use crate::error::ApiError;
use crate::AppState;

const DAY: Duration = Duration::from_secs(24 * 60 * 60);

/// Checks between sweeps of idle client buckets.
const PRUNE_EVERY: u64 = 4096;

type KeyedRateLimiter<C> =
    RateLimiter<IpAddr, DashMapStateStore<IpAddr>, C, NoOpMiddleware<<C as Clock>::Instant>>;

/// Token bucket per client IP: a full day's allowance up front, refilled
/// evenly over the day.
///
/// Buckets that have refilled completely are swept every few thousand
/// checks, so the map tracks recent clients only.
pub struct WriteQuota<C: Clock = DefaultClock> {
    limiter: KeyedRateLimiter<C>,
    per_day: NonZeroU32,
    trust_forwarded_for: bool,
    checks: AtomicU64,
}

impl WriteQuota {
    pub fn per_day(per_day: u32, trust_forwarded_for: bool) -> Result<Self> {
        Self::with_clock(per_day, trust_forwarded_for, &DefaultClock::default())
    }
}

impl<C: Clock> WriteQuota<C> {
    pub fn with_clock(per_day: u32, trust_forwarded_for: bool, clock: &C) -> Result<Self> {
        let per_day = NonZeroU32::new(per_day)
            .ok_or_else(|| Error::Config("Write limit must be positive".to_string()))?;
        let quota = Quota::with_period(DAY / per_day.get())
            .ok_or_else(|| Error::Config("Write limit period must be non-zero".to_string()))?
            .allow_burst(per_day);
        Ok(Self {
            limiter: RateLimiter::dashmap_with_clock(quota, clock),
            per_day,
            trust_forwarded_for,
            checks: AtomicU64::new(0),
        })
    }

    /// Consume one write for `client`. Returns false when exhausted.
    pub fn check(&self, client: IpAddr) -> bool {
        if self.checks.fetch_add(1, Ordering::Relaxed) % PRUNE_EVERY == PRUNE_EVERY - 1 {
            self.prune();
        }
        self.limiter.check_key(&client).is_ok()
    }

    /// Drop buckets that are full again.
    pub fn prune(&self) {
        self.limiter.retain_recent();
        self.limiter.shrink_to_fit();
        debug!(
            { SUBSYSTEM } = "api",
            { COMPONENT } = "write_quota",
            tracked = self.limiter.len(),
            "Pruned idle write quota buckets"
        );
    }

    /// Number of clients with a bucket in memory.
    pub fn tracked_clients(&self) -> usize {
        self.limiter.len()
    }

    pub fn description(&self) -> String {
        format!("{} per 1 day", self.per_day)
    }

    /// Client key: first `X-Forwarded-For` entry when trusted, otherwise
    /// the peer address. Unknown peers share one bucket.
    pub fn client_ip(&self, headers: &HeaderMap, peer: Option<SocketAddr>) -> IpAddr {
        if self.trust_forwarded_for {
            let forwarded = headers
                .get("x-forwarded-for")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.split(',').next())
                .and_then(|v| v.trim().parse().ok());
            if let Some(ip) = forwarded {
                return ip;
            }
        }
        peer.map(|addr| addr.ip())
            .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
    }
}

/// Middleware applied to create, update and delete.
pub async fn write_quota(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if let Some(quota) = &state.write_quota {
        let peer = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        let client = quota.client_ip(request.headers(), peer);

        if !quota.check(client) {
            warn!(
                { SUBSYSTEM } = "api",
                { COMPONENT } = "write_quota",
                { CLIENT_IP } = %client,
                "Write quota exceeded"
            );
            return ApiError::TooManyRequests(format!(
                "Rate limit exceeded: {}",
                quota.description()
            ))
            .into_response();
        }
    }
    next.run(request).await
}
