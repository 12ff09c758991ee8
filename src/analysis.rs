//! Loan analysis
//!
//! Validates a request, computes its cost, and asks the advisory pipeline
//! for a recommendation. Overlapping analyses of the same input snapshot
//! are refused.

use crate::advisory::{AdvisoryPipeline, CancellationFlag};
use crate::amortization::compute_cost;
use crate::coercion::coerce_bounded;
use crate::error::AdvisorError;
use crate::models::{AnalysisOutcome, CostComparison, CostResult, LoanInputs, ProductType};
use crate::portfolio::{validate_items, AmountKind};
use crate::Result;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::sync::Mutex;
use tracing::{info, warn};

const MAX_PRINCIPAL: f64 = 10_000_000.0;
const MAX_TERM_MONTHS: f64 = 600.0;
const MAX_FEE: f64 = 10_000_000.0;
const MAX_RATE: f64 = 100.0;

/// Check every input the product's cost formula depends on.
pub fn validate_request(product: ProductType, inputs: &LoanInputs) -> Result<()> {
    coerce_bounded("principal", &inputs.principal, 1.0, MAX_PRINCIPAL)?;

    let term = coerce_bounded("termMonths", &inputs.term_months, 1.0, MAX_TERM_MONTHS)?;
    if term.fract() != 0.0 {
        return Err(AdvisorError::invalid_number("termMonths", inputs.term_months.as_str()));
    }

    let fees: Vec<(&str, &str)> = match product {
        ProductType::Loan => {
            let rate = coerce_bounded("annualRate", &inputs.annual_rate, 0.0, MAX_RATE)?;
            if rate == 0.0 {
                return Err(AdvisorError::invalid_number("annualRate", inputs.annual_rate.as_str()));
            }
            vec![
                ("originationFee", inputs.origination_fee.as_str()),
                ("insuranceCost", inputs.insurance_cost.as_str()),
                ("collectionFee", inputs.collection_fee.as_str()),
            ]
        }
        ProductType::Installment => {
            coerce_bounded("annualRate", &inputs.annual_rate, 0.0, MAX_RATE)?;
            vec![
                ("monthlyInsurancePremium", inputs.monthly_insurance_premium.as_str()),
                ("brokerageCommission", inputs.brokerage_commission.as_str()),
                ("fileManagementFee", inputs.file_management_fee.as_str()),
            ]
        }
        ProductType::Mortgage => {
            coerce_bounded("spread", &inputs.spread, -MAX_RATE, MAX_RATE)?;
            coerce_bounded("referenceRate", &inputs.reference_rate, -MAX_RATE, MAX_RATE)?;
            vec![
                ("originationFee", inputs.origination_fee.as_str()),
                ("notarialCosts", inputs.notarial_costs.as_str()),
                ("mandatoryInsurance", inputs.mandatory_insurance.as_str()),
                ("substituteTax", inputs.substitute_tax.as_str()),
            ]
        }
    };

    // Fees and savings are optional: blank reads as zero.
    for (field, raw) in fees {
        if !raw.trim().is_empty() {
            coerce_bounded(field, raw, 0.0, MAX_FEE)?;
        }
    }
    if !inputs.liquid_savings.trim().is_empty() {
        coerce_bounded("liquidSavings", &inputs.liquid_savings, 0.0, f64::MAX)?;
    }

    validate_items(&inputs.portfolio, AmountKind::Currency)
}

/// Stable fingerprint of a `(product, inputs)` snapshot.
pub fn snapshot_key(product: ProductType, inputs: &LoanInputs) -> Result<String> {
    let bytes = serde_json::to_vec(&(product, inputs))?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}

/// Releases the snapshot key when dropped.
struct InFlightGuard<'a> {
    in_flight: &'a Mutex<HashSet<String>>,
    key: String,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        let mut set = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        set.remove(&self.key);
    }
}

pub struct LoanAnalyzer {
    pipeline: AdvisoryPipeline,
    in_flight: Mutex<HashSet<String>>,
}

impl LoanAnalyzer {
    pub fn new(pipeline: AdvisoryPipeline) -> Self {
        Self {
            pipeline,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    pub fn pipeline(&self) -> &AdvisoryPipeline {
        &self.pipeline
    }

    /// Validate and compute the cost without calling the advisory service.
    pub fn cost(&self, product: ProductType, inputs: &LoanInputs) -> Result<CostResult> {
        validate_request(product, inputs)?;
        Ok(compute_cost(product, inputs))
    }

    pub async fn analyze(&self, product: ProductType, inputs: &LoanInputs) -> Result<AnalysisOutcome> {
        self.analyze_cancellable(product, inputs, &CancellationFlag::new())
            .await
    }

    pub async fn analyze_cancellable(
        &self,
        product: ProductType,
        inputs: &LoanInputs,
        cancel: &CancellationFlag,
    ) -> Result<AnalysisOutcome> {
        let cost = self.cost(product, inputs)?;
        let _guard = self.acquire(snapshot_key(product, inputs)?)?;

        info!(
            %product,
            monthly_installment = cost.monthly_installment(),
            final_cost = cost.final_cost(),
            "Starting loan analysis"
        );

        let advice = self
            .pipeline
            .get_advice_cancellable(inputs, product, &cost, cancel)
            .await?;

        let principal = coerce_bounded("principal", &inputs.principal, 1.0, MAX_PRINCIPAL)?;
        let comparison = CostComparison {
            final_cost: cost.final_cost(),
            investment_gain: advice.projected_investment_growth.max(0.0),
        };

        Ok(AnalysisOutcome {
            product,
            cost,
            advice,
            comparison,
            total_repaid: principal + cost.final_cost(),
        })
    }

    fn acquire(&self, key: String) -> Result<InFlightGuard<'_>> {
        let mut set = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        if !set.insert(key.clone()) {
            warn!(snapshot = &key[..12], "Analysis already running for these inputs");
            return Err(AdvisorError::AnalysisInProgress);
        }
        Ok(InFlightGuard {
            in_flight: &self.in_flight,
            key,
        })
    }
}
