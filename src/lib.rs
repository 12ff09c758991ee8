//! Financing Advisor
//!
//! Helps decide whether to finance a purchase (personal loan, installment
//! plan, mortgage) or pay for it from savings and investments:
//! - Deterministic cost engine for every product
//! - Portfolio-weighted investment projection with inflation adjustment
//! - Advisory requests to a remote reasoning service, behind a rate
//!   limiter and circuit breaker, with retry and backoff
//!
//! FLOW:
//! INPUT → COERCE → COST → ADVISE (rate limit / retry) → OUTCOME

pub mod advisory;
pub mod amortization;
pub mod analysis;
pub mod api;
pub mod coercion;
pub mod config;
pub mod error;
pub mod gemini;
pub mod models;
pub mod portfolio;
pub mod projection;
pub mod rate_limit;
pub mod session;

pub use error::{AdvisorError, Result};

// Re-export common types
pub use models::*;
pub use advisory::{AdvisoryPipeline, AdvisoryService};
pub use analysis::LoanAnalyzer;
pub use config::AdvisorConfig;
pub use rate_limit::{RateLimitConfig, RateLimiter};
