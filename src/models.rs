//! Core data models for the financing advisor

use crate::error::AdvisorError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

//
// ================= Enums =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ProductType {
    Loan,
    Installment,
    Mortgage,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Recommendation {
    Finance,
    UseSavings,
    Undecided,
}

impl Recommendation {
    pub const ALL: [&'static str; 3] = ["Finance", "UseSavings", "Undecided"];
}

//
// ================= Inputs =================
//

/// Raw calculator inputs. Numeric fields stay as the user typed them and are
/// coerced only when a calculation runs.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct LoanInputs {
    pub principal: String,
    pub annual_rate: String,
    pub term_months: String,
    pub origination_fee: String,
    pub insurance_cost: String,
    pub collection_fee: String,
    pub monthly_insurance_premium: String,
    pub brokerage_commission: String,
    pub file_management_fee: String,
    pub spread: String,
    pub reference_rate: String,
    pub notarial_costs: String,
    pub mandatory_insurance: String,
    pub substitute_tax: String,
    pub liquid_savings: String,
    pub portfolio: Vec<PortfolioItem>,
}

impl LoanInputs {
    /// Names accepted by [`LoanInputs::field_mut`], in wire (camelCase) form.
    pub const FIELD_NAMES: [&'static str; 15] = [
        "principal",
        "annualRate",
        "termMonths",
        "originationFee",
        "insuranceCost",
        "collectionFee",
        "monthlyInsurancePremium",
        "brokerageCommission",
        "fileManagementFee",
        "spread",
        "referenceRate",
        "notarialCosts",
        "mandatoryInsurance",
        "substituteTax",
        "liquidSavings",
    ];

    pub fn field_mut(&mut self, name: &str) -> Option<&mut String> {
        let field = match name {
            "principal" => &mut self.principal,
            "annualRate" => &mut self.annual_rate,
            "termMonths" => &mut self.term_months,
            "originationFee" => &mut self.origination_fee,
            "insuranceCost" => &mut self.insurance_cost,
            "collectionFee" => &mut self.collection_fee,
            "monthlyInsurancePremium" => &mut self.monthly_insurance_premium,
            "brokerageCommission" => &mut self.brokerage_commission,
            "fileManagementFee" => &mut self.file_management_fee,
            "spread" => &mut self.spread,
            "referenceRate" => &mut self.reference_rate,
            "notarialCosts" => &mut self.notarial_costs,
            "mandatoryInsurance" => &mut self.mandatory_insurance,
            "substituteTax" => &mut self.substitute_tax,
            "liquidSavings" => &mut self.liquid_savings,
            _ => return None,
        };
        Some(field)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioItem {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub amount: f64,
    #[serde(default)]
    pub return_rate: f64,
}

//
// ================= Cost =================
//

/// Per-product cost breakdown. Every variant carries the installment,
/// interest and final cost; the rest is product specific.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(tag = "product", rename_all_fields = "camelCase")]
pub enum CostResult {
    Loan {
        monthly_installment: f64,
        total_interest: f64,
        final_cost: f64,
    },
    Installment {
        monthly_installment: f64,
        total_interest: f64,
        total_insurance_cost: f64,
        final_cost: f64,
    },
    Mortgage {
        effective_annual_rate: f64,
        monthly_installment: f64,
        total_interest: f64,
        final_cost: f64,
    },
}

impl CostResult {
    pub fn product(&self) -> ProductType {
        match self {
            CostResult::Loan { .. } => ProductType::Loan,
            CostResult::Installment { .. } => ProductType::Installment,
            CostResult::Mortgage { .. } => ProductType::Mortgage,
        }
    }

    pub fn monthly_installment(&self) -> f64 {
        match *self {
            CostResult::Loan { monthly_installment, .. }
            | CostResult::Installment { monthly_installment, .. }
            | CostResult::Mortgage { monthly_installment, .. } => monthly_installment,
        }
    }

    pub fn total_interest(&self) -> f64 {
        match *self {
            CostResult::Loan { total_interest, .. }
            | CostResult::Installment { total_interest, .. }
            | CostResult::Mortgage { total_interest, .. } => total_interest,
        }
    }

    pub fn final_cost(&self) -> f64 {
        match *self {
            CostResult::Loan { final_cost, .. }
            | CostResult::Installment { final_cost, .. }
            | CostResult::Mortgage { final_cost, .. } => final_cost,
        }
    }
}

//
// ================= Advice =================
//

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AdvisoryResult {
    pub recommendation: Recommendation,
    pub summary: String,
    pub detailed_analysis: String,
    pub projected_investment_growth: f64,
}

//
// ================= Rate Limiting =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DenialReason {
    CircuitOpen,
    CircuitHalfOpen,
    RateLimit,
    RequestTooLarge,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub reason: Option<DenialReason>,
    pub retry_after_seconds: Option<f64>,
}

impl RateLimitDecision {
    pub fn allow() -> Self {
        Self {
            allowed: true,
            reason: None,
            retry_after_seconds: None,
        }
    }

    pub fn deny(reason: DenialReason, retry_after_seconds: Option<f64>) -> Self {
        Self {
            allowed: false,
            reason: Some(reason),
            retry_after_seconds,
        }
    }
}

//
// ================= Investment =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InvestmentResult {
    pub projected_value: f64,
    pub total_return: f64,
    /// Geometric yearly rate, in percent
    pub annualized_return: f64,
    pub inflation_adjusted_value: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioSummary {
    pub weighted_return: f64,
    pub total_invested: f64,
    /// True when the portfolio was empty and the conservative default was used
    pub used_default: bool,
}

//
// ================= Final Result =================
//

/// Final cost next to the growth the same money could earn if invested.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CostComparison {
    pub final_cost: f64,
    pub investment_gain: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisOutcome {
    pub product: ProductType,
    pub cost: CostResult,
    pub advice: AdvisoryResult,
    pub comparison: CostComparison,
    pub total_repaid: f64,
}

impl FromStr for ProductType {
    type Err = AdvisorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "loan" => Ok(ProductType::Loan),
            "installment" => Ok(ProductType::Installment),
            "mortgage" => Ok(ProductType::Mortgage),
            _ => Err(AdvisorError::UnsupportedProduct(s.to_string())),
        }
    }
}

impl FromStr for Recommendation {
    type Err = AdvisorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Finance" => Ok(Recommendation::Finance),
            "UseSavings" => Ok(Recommendation::UseSavings),
            "Undecided" => Ok(Recommendation::Undecided),
            other => Err(AdvisorError::MalformedResponse(format!(
                "recommendation '{}' is not one of {:?}",
                other,
                Recommendation::ALL
            ))),
        }
    }
}

impl fmt::Display for ProductType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProductType::Loan => "Loan",
            ProductType::Installment => "Installment",
            ProductType::Mortgage => "Mortgage",
        };
        write!(f, "{}", s)
    }
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Recommendation::Finance => "Finance",
            Recommendation::UseSavings => "UseSavings",
            Recommendation::Undecided => "Undecided",
        };
        write!(f, "{}", s)
    }
}

impl fmt::Display for DenialReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DenialReason::CircuitOpen => "circuit open",
            DenialReason::CircuitHalfOpen => "circuit half-open",
            DenialReason::RateLimit => "rate limit",
            DenialReason::RequestTooLarge => "request too large",
        };
        write!(f, "{}", s)
    }
}
