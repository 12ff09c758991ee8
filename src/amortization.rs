//! Amortization and cost engine
//!
//! Turns raw loan inputs into a per-product cost breakdown.
//! Pure functions: no rounding, no side effects.

use crate::coercion::coerce;
use crate::models::{CostResult, LoanInputs, ProductType};

const MONTHS_PER_YEAR: f64 = 12.0;

/// Standard annuity payment for principal `c`, periodic rate `r`, `n` periods.
///
/// Returns 0 when the loan is not computable yet (`c <= 0` or `n <= 0`) and
/// falls back to straight division when the rate is zero, negative, or too
/// small to compound.
pub fn annuity_payment(c: f64, r: f64, n: f64) -> f64 {
    if c <= 0.0 || n <= 0.0 {
        return 0.0;
    }
    if r <= 0.0 {
        return c / n;
    }
    // (1 + r)^n - 1 without cancellation, so tiny rates stay finite
    let growth_m1 = (n * r.ln_1p()).exp_m1();
    if !growth_m1.is_normal() || growth_m1 <= 0.0 {
        return c / n;
    }
    let payment = c * r * (growth_m1 + 1.0) / growth_m1;
    if payment.is_finite() {
        payment
    } else {
        c / n
    }
}

/// Nominal annual percentage to monthly decimal rate.
pub fn monthly_rate(annual_percent: f64) -> f64 {
    annual_percent / MONTHS_PER_YEAR / 100.0
}

/// Compute the cost breakdown of `product` from raw inputs.
///
/// Fields are read leniently; validation belongs to the caller
/// (see [`crate::analysis::validate_request`]).
pub fn compute_cost(product: ProductType, inputs: &LoanInputs) -> CostResult {
    let c = coerce(&inputs.principal);
    let n = coerce(&inputs.term_months);
    let computable = c > 0.0 && n > 0.0;

    // Fees are only charged on a loan that can actually be computed.
    let fee = |raw: &str| if computable { coerce(raw) } else { 0.0 };

    match product {
        ProductType::Loan => {
            let payment = annuity_payment(c, monthly_rate(coerce(&inputs.annual_rate)), n);
            let total_interest = interest(payment, c, n);
            let final_cost = total_interest
                + fee(&inputs.origination_fee)
                + fee(&inputs.insurance_cost)
                + fee(&inputs.collection_fee) * n;

            CostResult::Loan {
                monthly_installment: payment,
                total_interest,
                final_cost,
            }
        }
        ProductType::Installment => {
            let payment = annuity_payment(c, monthly_rate(coerce(&inputs.annual_rate)), n);
            let total_interest = interest(payment, c, n);
            let total_insurance_cost = fee(&inputs.monthly_insurance_premium) * n;
            let final_cost = total_interest
                + fee(&inputs.brokerage_commission)
                + fee(&inputs.file_management_fee)
                + total_insurance_cost;

            CostResult::Installment {
                monthly_installment: payment,
                total_interest,
                total_insurance_cost,
                final_cost,
            }
        }
        ProductType::Mortgage => {
            let effective_annual_rate = coerce(&inputs.spread) + coerce(&inputs.reference_rate);
            let payment = annuity_payment(c, monthly_rate(effective_annual_rate), n);
            let total_interest = interest(payment, c, n);
            let final_cost = total_interest
                + fee(&inputs.origination_fee)
                + fee(&inputs.notarial_costs)
                + fee(&inputs.mandatory_insurance) * n
                + fee(&inputs.substitute_tax);

            CostResult::Mortgage {
                effective_annual_rate,
                monthly_installment: payment,
                total_interest,
                final_cost,
            }
        }
    }
}

fn interest(payment: f64, c: f64, n: f64) -> f64 {
    if payment == 0.0 {
        0.0
    } else {
        payment * n - c
    }
}

impl ProductType {
    /// Starting inputs for a fresh calculation of this product.
    pub fn default_inputs(&self) -> LoanInputs {
        let mut inputs = LoanInputs {
            principal: "15000".into(),
            annual_rate: "7.5".into(),
            term_months: "60".into(),
            origination_fee: "200".into(),
            insurance_cost: "0".into(),
            collection_fee: "2".into(),
            monthly_insurance_premium: "15".into(),
            brokerage_commission: "300".into(),
            file_management_fee: "150".into(),
            spread: "1.5".into(),
            reference_rate: "2.0".into(),
            notarial_costs: "2500".into(),
            mandatory_insurance: "20".into(),
            substitute_tax: "500".into(),
            liquid_savings: "5000".into(),
            portfolio: Vec::new(),
        };

        match self {
            ProductType::Loan => {}
            ProductType::Installment => {
                inputs.principal = "8000".into();
                inputs.term_months = "36".into();
                inputs.annual_rate = "9.0".into();
            }
            ProductType::Mortgage => {
                inputs.principal = "200000".into();
                inputs.term_months = "300".into();
                inputs.reference_rate = "2.5".into();
            }
        }

        inputs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn test_zero_rate_is_straight_division() {
        for (c, n) in [(15000.0, 60.0), (1.0, 7.0), (999.99, 13.0)] {
            assert_eq!(annuity_payment(c, 0.0, n), c / n);
            assert_eq!(annuity_payment(c, -0.01, n), c / n);
        }
    }

    #[test]
    fn test_tiny_rates_stay_finite() {
        for r in [1e-20, 1e-300, 5e-324] {
            let payment = annuity_payment(15000.0, r, 60.0);
            assert!(payment.is_finite());
            assert!(close(payment, 250.0));
        }

        let mut loan = ProductType::Loan.default_inputs();
        loan.annual_rate = "0.0000000000000001".into();
        let mut installment = ProductType::Installment.default_inputs();
        installment.annual_rate = "0.0000000000000001".into();
        let mut mortgage = ProductType::Mortgage.default_inputs();
        mortgage.spread = "0.00000000000000001".into();
        mortgage.reference_rate = "0".into();

        for (product, inputs, c, n) in [
            (ProductType::Loan, loan, 15000.0, 60.0),
            (ProductType::Installment, installment, 8000.0, 36.0),
            (ProductType::Mortgage, mortgage, 200000.0, 300.0),
        ] {
            let cost = compute_cost(product, &inputs);
            assert!(close(cost.monthly_installment(), c / n), "{} installment", product);
            assert!(cost.total_interest().is_finite());
            assert!(cost.total_interest().abs() < 1e-6);
            assert!(cost.final_cost().is_finite());

            let json = serde_json::to_value(cost).unwrap();
            assert!(json["monthlyInstallment"].is_f64());
            assert!(json["finalCost"].is_f64());
        }
    }

    #[test]
    fn test_not_computable_yields_zero() {
        assert_eq!(annuity_payment(0.0, 0.01, 60.0), 0.0);
        assert_eq!(annuity_payment(1000.0, 0.01, 0.0), 0.0);
        assert_eq!(annuity_payment(-5.0, 0.0, 10.0), 0.0);

        let mut inputs = ProductType::Loan.default_inputs();
        inputs.principal = "".into();
        let cost = compute_cost(ProductType::Loan, &inputs);
        assert_eq!(cost.monthly_installment(), 0.0);
        assert_eq!(cost.total_interest(), 0.0);
        assert_eq!(cost.final_cost(), 0.0);
    }

    #[test]
    fn test_interest_matches_payments() {
        for (c, annual, n) in [(15000.0, 7.5, 60.0), (200000.0, 4.0, 300.0), (500.0, 19.9, 12.0)] {
            let payment = annuity_payment(c, monthly_rate(annual), n);
            let mut inputs = LoanInputs::default();
            inputs.principal = c.to_string();
            inputs.annual_rate = annual.to_string();
            inputs.term_months = n.to_string();

            let cost = compute_cost(ProductType::Loan, &inputs);
            assert!(close(cost.monthly_installment() * n - c, cost.total_interest()));
            assert!(cost.total_interest() > 0.0);
            assert!(close(cost.monthly_installment(), payment));
        }
    }

    #[test]
    fn test_loan_with_defaults_matches_closed_form() {
        let inputs = ProductType::Loan.default_inputs();
        let cost = compute_cost(ProductType::Loan, &inputs);

        let r: f64 = 0.075 / 12.0;
        let growth = (1.0 + r).powi(60);
        let expected = 15000.0 * r * growth / (growth - 1.0);

        assert!((cost.monthly_installment() - expected).abs() < 1e-9);
        assert!((cost.monthly_installment() - 300.57).abs() < 0.01);

        // Pure function of its inputs
        assert_eq!(cost, compute_cost(ProductType::Loan, &inputs));

        let interest = expected * 60.0 - 15000.0;
        let fees = 200.0 + 0.0 + 2.0 * 60.0;
        assert!(close(cost.final_cost(), interest + fees));
        assert!(matches!(cost, CostResult::Loan { .. }));
    }

    #[test]
    fn test_installment_breakdown() {
        let inputs = ProductType::Installment.default_inputs();
        let cost = compute_cost(ProductType::Installment, &inputs);

        match cost {
            CostResult::Installment {
                monthly_installment,
                total_interest,
                total_insurance_cost,
                final_cost,
            } => {
                assert_eq!(total_insurance_cost, 15.0 * 36.0);
                assert!(close(total_interest, monthly_installment * 36.0 - 8000.0));
                assert!(close(final_cost, total_interest + 300.0 + 150.0 + 540.0));
            }
            other => panic!("unexpected variant: {:?}", other),
        }
    }

    #[test]
    fn test_mortgage_uses_spread_plus_reference() {
        let inputs = ProductType::Mortgage.default_inputs();
        let cost = compute_cost(ProductType::Mortgage, &inputs);

        match cost {
            CostResult::Mortgage {
                effective_annual_rate,
                monthly_installment,
                total_interest,
                final_cost,
            } => {
                assert!(close(effective_annual_rate, 4.0));
                assert!(close(monthly_installment, annuity_payment(200000.0, 4.0 / 1200.0, 300.0)));
                let extras = 200.0 + 2500.0 + 20.0 * 300.0 + 500.0;
                assert!(close(final_cost, total_interest + extras));
            }
            other => panic!("unexpected variant: {:?}", other),
        }
    }

    #[test]
    fn test_product_defaults() {
        assert_eq!(ProductType::Mortgage.default_inputs().term_months, "300");
        assert_eq!(ProductType::Installment.default_inputs().annual_rate, "9.0");
        assert_eq!(ProductType::Loan.default_inputs().principal, "15000");
    }
}
