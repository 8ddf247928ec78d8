use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::extract::{ConnectInfo, State};
use axum::http::{header, HeaderValue, Request};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::error::Error;

/// Expired windows are swept once the table grows past this many clients.
const SWEEP_THRESHOLD: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum ClientKey {
    Addr(IpAddr),
    /// No forwarded header and no socket address; these share one budget.
    Unknown,
}

#[derive(Debug)]
struct Window {
    start: Instant,
    used: u32,
}

/// Fixed-window request budget for one route group, counted per client
/// address.
#[derive(Clone, Debug)]
pub struct RateLimiter {
    group: &'static str,
    limit: u32,
    window: Duration,
    clients: Arc<Mutex<HashMap<ClientKey, Window>>>,
}

impl RateLimiter {
    pub fn new(group: &'static str, limit: u32, window: Duration) -> Self {
        Self {
            group,
            limit: limit.max(1),
            window,
            clients: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn per_second(group: &'static str, limit: u32) -> Self {
        Self::new(group, limit, Duration::from_secs(1))
    }

    /// Counts one request. `Err` carries the time left in the exhausted
    /// window.
    fn check(&self, client: ClientKey, now: Instant) -> Result<(), Duration> {
        let mut clients = self.clients.lock().unwrap_or_else(PoisonError::into_inner);
        if clients.len() >= SWEEP_THRESHOLD {
            let window = self.window;
            clients.retain(|_, w| now.saturating_duration_since(w.start) < window);
        }

        let entry = clients.entry(client).or_insert(Window { start: now, used: 0 });
        if now.saturating_duration_since(entry.start) >= self.window {
            entry.start = now;
            entry.used = 0;
        }
        if entry.used < self.limit {
            entry.used += 1;
            Ok(())
        } else {
            Err(self
                .window
                .saturating_sub(now.saturating_duration_since(entry.start)))
        }
    }
}

/// First `X-Forwarded-For` hop, else the peer address.
fn client_key(req: &Request<Body>) -> ClientKey {
    let forwarded = req
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .and_then(|v| v.trim().parse::<IpAddr>().ok());
    forwarded
        .or_else(|| {
            req.extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip())
        })
        .map(ClientKey::Addr)
        .unwrap_or(ClientKey::Unknown)
}

pub async fn rate_limit(
    State(limiter): State<RateLimiter>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let client = client_key(&req);
    match limiter.check(client, Instant::now()) {
        Ok(()) => next.run(req).await,
        Err(wait) => {
            tracing::warn!(
                group = limiter.group,
                client = ?client,
                path = %req.uri().path(),
                "rate limit exceeded"
            );
            let retry_after = wait.as_secs() + u64::from(wait.subsec_nanos() > 0);
            let mut response = Error::TooManyRequests.into_response();
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(retry_after.max(1)));
            response
        }
    }
}
