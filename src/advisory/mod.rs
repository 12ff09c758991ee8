//! Advisory request pipeline
//!
//! Packages the computed costs into a request for the remote reasoning
//! service and handles everything around that unreliable call:
//! admission control, retry with backoff, error classification, and
//! response validation.
//!
//! FLOW:
//! BUILD REQUEST → ADMIT (rate limit / circuit) → CALL (retry) → PARSE → RECORD HEALTH

use crate::error::AdvisorError;
use crate::models::{AdvisoryResult, CostResult, LoanInputs, ProductType, Recommendation};
use crate::rate_limit::RateLimiter;
use crate::Result;
use async_trait::async_trait;
use rand::Rng;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

pub mod prompt;
pub use prompt::{build_request, AdvisoryRequest};

/// Remote reasoning service, seen as a black box.
#[async_trait]
pub trait AdvisoryService: Send + Sync {
    /// Key under which the rate limiter tracks this service
    fn endpoint_key(&self) -> &str;

    /// Send one request and return the raw text of the structured answer.
    async fn generate(&self, request: &AdvisoryRequest) -> Result<String>;
}

/// Waits between retry attempts.
#[async_trait]
pub trait Delay: Send + Sync {
    async fn wait(&self, duration: Duration);
}

/// Non-blocking wait on the tokio timer
pub struct TokioDelay;

#[async_trait]
impl Delay for TokioDelay {
    async fn wait(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Samples a jitter in `[0, max)`.
pub type JitterFn = Arc<dyn Fn(Duration) -> Duration + Send + Sync>;

/// Uniform jitter in `[0, max)` from the thread-local RNG.
pub fn random_jitter(max: Duration) -> Duration {
    let max_nanos = max.as_nanos().min(u64::MAX as u128) as u64;
    if max_nanos == 0 {
        return Duration::ZERO;
    }
    Duration::from_nanos(rand::thread_rng().gen_range(0..max_nanos))
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Upper bound (exclusive) of the random jitter added to each delay
    pub max_jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_jitter: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// `min(base * 2^attempt + jitter, max_delay)`, attempt is 0-based.
    pub fn backoff(&self, attempt: u32, jitter: Duration) -> Duration {
        let exponential = self.base_delay.as_secs_f64() * 2f64.powi(attempt as i32);
        let total = exponential + jitter.as_secs_f64();
        Duration::from_secs_f64(total.min(self.max_delay.as_secs_f64()))
    }
}

/// Coarse-grained cancellation, honoured between attempts only.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

pub struct AdvisoryPipeline {
    service: Arc<dyn AdvisoryService>,
    limiter: Arc<RateLimiter>,
    delay: Arc<dyn Delay>,
    jitter: JitterFn,
    policy: RetryPolicy,
}

impl AdvisoryPipeline {
    pub fn new(service: Arc<dyn AdvisoryService>, limiter: Arc<RateLimiter>) -> Self {
        Self {
            service,
            limiter,
            delay: Arc::new(TokioDelay),
            jitter: Arc::new(random_jitter),
            policy: RetryPolicy::default(),
        }
    }

    pub fn with_delay(mut self, delay: Arc<dyn Delay>) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_jitter(mut self, jitter: JitterFn) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    pub async fn get_advice(
        &self,
        inputs: &LoanInputs,
        product: ProductType,
        cost: &CostResult,
    ) -> Result<AdvisoryResult> {
        self.get_advice_cancellable(inputs, product, cost, &CancellationFlag::new())
            .await
    }

    pub async fn get_advice_cancellable(
        &self,
        inputs: &LoanInputs,
        product: ProductType,
        cost: &CostResult,
        cancel: &CancellationFlag,
    ) -> Result<AdvisoryResult> {
        let request = build_request(inputs, product, cost);
        let request_bytes = serde_json::to_vec(&request)?.len();
        let endpoint = self.service.endpoint_key();

        let decision = self.limiter.check_rate_limit(request_bytes, endpoint).await;
        if !decision.allowed {
            let reason = decision
                .reason
                .map(|r| r.to_string())
                .unwrap_or_else(|| "rate limit".to_string());
            warn!(
                endpoint,
                reason = %reason,
                retry_after = ?decision.retry_after_seconds,
                "Advisory request not admitted"
            );
            return Err(AdvisorError::RateLimited {
                reason,
                retry_after_seconds: decision.retry_after_seconds,
            });
        }

        info!(endpoint, %product, request_bytes, "Requesting financial advice");

        let raw = match self.call_with_retry(&request, cancel).await {
            Ok(raw) => raw,
            Err(e) => {
                if e.counts_against_circuit() {
                    self.limiter.record_failure(endpoint).await;
                }
                return Err(e);
            }
        };

        // Health is only confirmed once the answer is usable.
        match parse_advice(&raw) {
            Ok(advice) => {
                self.limiter.record_success(endpoint).await;
                info!(
                    recommendation = %advice.recommendation,
                    growth = advice.projected_investment_growth,
                    "Advice received"
                );
                Ok(advice)
            }
            Err(e) => {
                error!(error = %e, "Advisory response failed validation");
                self.limiter.record_failure(endpoint).await;
                Err(e)
            }
        }
    }

    async fn call_with_retry(
        &self,
        request: &AdvisoryRequest,
        cancel: &CancellationFlag,
    ) -> Result<String> {
        let mut attempt: u32 = 0;

        loop {
            if cancel.is_cancelled() {
                info!(attempt, "Advisory request cancelled before attempt");
                return Err(AdvisorError::Cancelled);
            }

            attempt += 1;
            debug!(attempt, max_attempts = self.policy.max_attempts, "Calling advisory service");

            match self.service.generate(request).await {
                Ok(text) => return Ok(text),
                Err(e) if !e.is_retryable() => {
                    warn!(attempt, error = %e, "Advisory call failed, not retrying");
                    return Err(e);
                }
                Err(e) if attempt >= self.policy.max_attempts => {
                    error!(attempt, error = %e, "Advisory call failed, retries exhausted");
                    return Err(e);
                }
                Err(e) => {
                    let delay = self
                        .policy
                        .backoff(attempt - 1, (self.jitter)(self.policy.max_jitter));
                    warn!(
                        attempt,
                        error = %e,
                        delay_ms = delay.as_millis() as u64,
                        "Advisory call failed, retrying"
                    );
                    self.delay.wait(delay).await;
                }
            }
        }
    }
}

/// Parse the service's answer, tolerating a ```json fence around it.
pub fn parse_advice(raw: &str) -> Result<AdvisoryResult> {
    let cleaned = raw
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();

    let json: Value = serde_json::from_str(cleaned).map_err(|e| {
        AdvisorError::MalformedResponse(format!("invalid JSON: {} | raw={}", e, raw))
    })?;

    let field = |name: &str| {
        json.get(name)
            .ok_or_else(|| AdvisorError::MalformedResponse(format!("missing field '{}'", name)))
    };
    let text = |name: &str| -> Result<String> {
        field(name)?
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| AdvisorError::MalformedResponse(format!("'{}' is not a string", name)))
    };

    let recommendation: Recommendation = text("recommendation")?.parse()?;
    let summary = text("summary")?;
    let detailed_analysis = text("detailedAnalysis")?;
    let projected_investment_growth = field("projectedInvestmentGrowth")?
        .as_f64()
        .filter(|v| v.is_finite())
        .ok_or_else(|| {
            AdvisorError::MalformedResponse(
                "'projectedInvestmentGrowth' is not a number".to_string(),
            )
        })?;

    Ok(AdvisoryResult {
        recommendation,
        summary,
        detailed_analysis,
        projected_investment_growth,
    })
}
