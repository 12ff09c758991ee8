//! Admission control for outbound advisory requests
//!
//! Per endpoint key:
//! - sliding window budget (request count and byte volume)
//! - circuit breaker: Closed → Open (after consecutive failures) → HalfOpen (one probe)
//!
//! One limiter is shared (via `Arc`) by every in-flight analysis. All state sits
//! behind a single mutex so concurrent callers see consistent counters.

use crate::models::{DenialReason, RateLimitDecision};
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Consecutive failures that open the circuit
    pub failure_threshold: u32,
    /// First cool-down once the circuit opens
    pub cooldown: Duration,
    /// Cool-down growth after a failed half-open probe
    pub cooldown_multiplier: f64,
    pub max_cooldown: Duration,
    /// Sliding window length
    pub window: Duration,
    pub max_requests_per_window: usize,
    pub max_bytes_per_window: usize,
    /// Largest single request accepted
    pub max_request_bytes: usize,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            cooldown: Duration::from_secs(30),
            cooldown_multiplier: 2.0,
            max_cooldown: Duration::from_secs(300),
            window: Duration::from_secs(60),
            max_requests_per_window: 10,
            max_bytes_per_window: 256 * 1024,
            max_request_bytes: 64 * 1024,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CircuitStatus {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone, Copy)]
enum Circuit {
    Closed,
    Open { until: Instant },
    /// `probe_started` is set while the single probe request is outstanding
    HalfOpen { probe_started: Option<Instant> },
}

#[derive(Debug)]
struct EndpointState {
    window: VecDeque<(Instant, usize)>,
    circuit: Circuit,
    consecutive_failures: u32,
    current_cooldown: Duration,
}

impl EndpointState {
    fn new(config: &RateLimitConfig) -> Self {
        Self {
            window: VecDeque::with_capacity(config.max_requests_per_window),
            circuit: Circuit::Closed,
            consecutive_failures: 0,
            current_cooldown: config.cooldown,
        }
    }

    fn prune(&mut self, now: Instant, window: Duration) {
        while let Some(&(at, _)) = self.window.front() {
            if now.duration_since(at) >= window {
                self.window.pop_front();
            } else {
                break;
            }
        }
    }

    fn window_bytes(&self) -> usize {
        self.window.iter().map(|(_, bytes)| bytes).sum()
    }

    fn status(&self) -> CircuitStatus {
        match self.circuit {
            Circuit::Closed => CircuitStatus::Closed,
            Circuit::Open { .. } => CircuitStatus::Open,
            Circuit::HalfOpen { .. } => CircuitStatus::HalfOpen,
        }
    }
}

pub struct RateLimiter {
    config: RateLimitConfig,
    endpoints: Mutex<HashMap<String, EndpointState>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            endpoints: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Decide whether a request of `request_bytes` may go out to `endpoint_key`.
    /// An admitted request is counted against the window.
    pub async fn check_rate_limit(&self, request_bytes: usize, endpoint_key: &str) -> RateLimitDecision {
        let now = Instant::now();
        let mut endpoints = self.endpoints.lock().await;
        let state = endpoints
            .entry(endpoint_key.to_string())
            .or_insert_with(|| EndpointState::new(&self.config));

        state.prune(now, self.config.window);

        let circuit = state.circuit;
        match circuit {
            Circuit::Open { until } if now < until => {
                let remaining = until.duration_since(now).as_secs_f64();
                debug!(endpoint = endpoint_key, remaining, "Rejected: circuit open");
                return RateLimitDecision::deny(DenialReason::CircuitOpen, Some(remaining));
            }
            Circuit::Open { .. } => {
                info!(endpoint = endpoint_key, "Circuit cool-down elapsed, allowing a probe");
                state.circuit = Circuit::HalfOpen { probe_started: None };
            }
            Circuit::HalfOpen {
                probe_started: Some(started),
            } => {
                // A probe that never reported back stops blocking after one cool-down.
                let probe_expires = started + state.current_cooldown;
                if now < probe_expires {
                    let remaining = probe_expires.duration_since(now).as_secs_f64();
                    return RateLimitDecision::deny(DenialReason::CircuitHalfOpen, Some(remaining));
                }
            }
            Circuit::HalfOpen { probe_started: None } | Circuit::Closed => {}
        }

        if request_bytes > self.config.max_request_bytes {
            warn!(
                endpoint = endpoint_key,
                request_bytes,
                limit = self.config.max_request_bytes,
                "Rejected: request too large"
            );
            return RateLimitDecision::deny(DenialReason::RequestTooLarge, None);
        }

        let over_count = state.window.len() >= self.config.max_requests_per_window;
        let over_bytes = state.window_bytes() + request_bytes > self.config.max_bytes_per_window;
        if over_count || over_bytes {
            let retry_after = state
                .window
                .front()
                .map(|&(oldest, _)| (oldest + self.config.window).duration_since(now).as_secs_f64());
            debug!(
                endpoint = endpoint_key,
                in_window = state.window.len(),
                over_count,
                over_bytes,
                "Rejected: rate limit"
            );
            return RateLimitDecision::deny(DenialReason::RateLimit, retry_after);
        }

        state.window.push_back((now, request_bytes));
        if let Circuit::HalfOpen { probe_started } = &mut state.circuit {
            *probe_started = Some(now);
        }

        RateLimitDecision::allow()
    }

    pub async fn record_failure(&self, endpoint_key: &str) {
        let now = Instant::now();
        let mut endpoints = self.endpoints.lock().await;
        let state = endpoints
            .entry(endpoint_key.to_string())
            .or_insert_with(|| EndpointState::new(&self.config));

        state.consecutive_failures += 1;

        let circuit = state.circuit;
        match circuit {
            Circuit::HalfOpen { .. } => {
                let grown = state.current_cooldown.as_secs_f64() * self.config.cooldown_multiplier;
                state.current_cooldown =
                    Duration::from_secs_f64(grown.min(self.config.max_cooldown.as_secs_f64()));
                state.circuit = Circuit::Open {
                    until: now + state.current_cooldown,
                };
                warn!(
                    endpoint = endpoint_key,
                    cooldown_secs = state.current_cooldown.as_secs_f64(),
                    "Probe failed, circuit re-opened"
                );
            }
            Circuit::Closed if state.consecutive_failures >= self.config.failure_threshold => {
                state.current_cooldown = self.config.cooldown;
                state.circuit = Circuit::Open {
                    until: now + state.current_cooldown,
                };
                warn!(
                    endpoint = endpoint_key,
                    consecutive_failures = state.consecutive_failures,
                    cooldown_secs = state.current_cooldown.as_secs_f64(),
                    "Circuit opened"
                );
            }
            Circuit::Closed | Circuit::Open { .. } => {
                debug!(
                    endpoint = endpoint_key,
                    consecutive_failures = state.consecutive_failures,
                    "Failure recorded"
                );
            }
        }
    }

    pub async fn record_success(&self, endpoint_key: &str) {
        let mut endpoints = self.endpoints.lock().await;
        let state = endpoints
            .entry(endpoint_key.to_string())
            .or_insert_with(|| EndpointState::new(&self.config));

        if state.status() != CircuitStatus::Closed {
            info!(endpoint = endpoint_key, "Circuit closed after successful call");
        }

        state.consecutive_failures = 0;
        state.current_cooldown = self.config.cooldown;
        state.circuit = Circuit::Closed;
    }

    /// Current breaker state, as last recorded (no time-based transition).
    pub async fn circuit_status(&self, endpoint_key: &str) -> CircuitStatus {
        let endpoints = self.endpoints.lock().await;
        endpoints
            .get(endpoint_key)
            .map(EndpointState::status)
            .unwrap_or(CircuitStatus::Closed)
    }

    pub async fn consecutive_failures(&self, endpoint_key: &str) -> u32 {
        let endpoints = self.endpoints.lock().await;
        endpoints
            .get(endpoint_key)
            .map(|state| state.consecutive_failures)
            .unwrap_or(0)
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(RateLimitConfig::default())
    }
}
