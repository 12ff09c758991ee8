//! Investment projection
//!
//! Annual compounding of a principal at a fixed rate, with a flat 3%
//! inflation adjustment. Also hosts the standalone investment analysis.

use crate::coercion::coerce_bounded;
use crate::error::AdvisorError;
use crate::models::{InvestmentResult, PortfolioItem};
use crate::portfolio::{validate_allocation, validate_items, weighted_return, AmountKind};
use crate::Result;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const INFLATION_RATE: f64 = 0.03;

const MAX_INVESTMENT: f64 = 10_000_000.0;
const MAX_HORIZON_YEARS: f64 = 100.0;

/// Compound `principal` at `annual_rate_percent` for `years`.
pub fn project(principal: f64, annual_rate_percent: f64, years: f64) -> Result<InvestmentResult> {
    if !principal.is_finite() || principal <= 0.0 {
        return Err(AdvisorError::InvalidPrincipal(principal));
    }
    if !years.is_finite() || years <= 0.0 {
        return Err(AdvisorError::InvalidHorizon(years));
    }
    if !annual_rate_percent.is_finite() {
        return Err(AdvisorError::invalid_number(
            "annualRate",
            annual_rate_percent.to_string(),
        ));
    }

    let projected_value = principal * (1.0 + annual_rate_percent / 100.0).powf(years);
    let total_return = projected_value - principal;
    let annualized_return = ((projected_value / principal).powf(1.0 / years) - 1.0) * 100.0;
    let inflation_adjusted_value = projected_value / (1.0 + INFLATION_RATE).powf(years);

    let result = InvestmentResult {
        projected_value,
        total_return,
        annualized_return,
        inflation_adjusted_value,
    };

    let all_finite = [
        result.projected_value,
        result.total_return,
        result.annualized_return,
        result.inflation_adjusted_value,
    ]
    .iter()
    .all(|v| v.is_finite());

    if !all_finite {
        return Err(AdvisorError::invalid_number(
            "projection",
            format!("{}@{}%x{}y", principal, annual_rate_percent, years),
        ));
    }

    Ok(result)
}

/// Raw inputs of the standalone investment analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvestmentRequest {
    pub investment_amount: String,
    pub time_horizon_years: String,
    /// Percentage allocations; empty means "assume the conservative default"
    #[serde(default)]
    pub portfolio: Vec<PortfolioItem>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InvestmentAnalysis {
    pub rate_used: f64,
    pub used_default_rate: bool,
    pub result: InvestmentResult,
}

/// Validate the request, derive the portfolio rate and project.
pub fn analyze_investment(request: &InvestmentRequest) -> Result<InvestmentAnalysis> {
    let amount = coerce_bounded(
        "investmentAmount",
        &request.investment_amount,
        1.0,
        MAX_INVESTMENT,
    )?;
    let years = coerce_bounded(
        "timeHorizonYears",
        &request.time_horizon_years,
        1.0,
        MAX_HORIZON_YEARS,
    )?;

    if !request.portfolio.is_empty() {
        validate_items(&request.portfolio, AmountKind::Percentage)?;
        validate_allocation(&request.portfolio)?;
    }
    let summary = weighted_return(&request.portfolio);

    debug!(
        amount,
        years,
        rate = summary.weighted_return,
        used_default = summary.used_default,
        "Projecting investment"
    );

    Ok(InvestmentAnalysis {
        rate_used: summary.weighted_return,
        used_default_rate: summary.used_default,
        result: project(amount, summary.weighted_return, years)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn allocation(amount: f64, return_rate: f64) -> PortfolioItem {
        PortfolioItem {
            id: uuid::Uuid::new_v4().to_string(),
            name: "slice".to_string(),
            amount,
            return_rate,
        }
    }

    #[test]
    fn test_zero_rate_keeps_value() {
        let result = project(1000.0, 0.0, 5.0).unwrap();
        assert_eq!(result.projected_value, 1000.0);
        assert_eq!(result.total_return, 0.0);
        assert_eq!(result.annualized_return, 0.0);
    }

    #[test]
    fn test_annualized_return_recomposes() {
        for (rate, years) in [(7.0, 10.0), (-4.0, 3.0), (12.5, 1.0), (5.0, 2.5)] {
            let result = project(1000.0, rate, years).unwrap();
            let recomposed = (1.0 + result.annualized_return / 100.0).powf(years) * 1000.0;
            assert!((recomposed - result.projected_value).abs() < 1e-6);
            assert!(
                (result.projected_value - (1000.0 + result.total_return)).abs() < 1e-9
            );
        }
    }

    #[test]
    fn test_inflation_adjustment() {
        let result = project(1000.0, 3.0, 10.0).unwrap();
        assert!((result.inflation_adjusted_value - 1000.0).abs() < 1e-9);
    }

    #[test]
    fn test_invalid_inputs() {
        assert!(matches!(project(1000.0, 5.0, 0.0), Err(AdvisorError::InvalidHorizon(_))));
        assert!(matches!(project(1000.0, 5.0, -2.0), Err(AdvisorError::InvalidHorizon(_))));
        assert!(matches!(project(0.0, 5.0, 5.0), Err(AdvisorError::InvalidPrincipal(_))));
        assert!(matches!(
            project(f64::NAN, 5.0, 5.0),
            Err(AdvisorError::InvalidPrincipal(_))
        ));
    }

    #[test]
    fn test_analysis_with_empty_portfolio_uses_default() {
        let request = InvestmentRequest {
            investment_amount: "10000".into(),
            time_horizon_years: "10".into(),
            portfolio: vec![],
        };

        let analysis = analyze_investment(&request).unwrap();
        assert!(analysis.used_default_rate);
        assert_eq!(analysis.rate_used, 3.0);
        assert!((analysis.result.projected_value - 10000.0 * 1.03f64.powi(10)).abs() < 1e-6);
    }

    #[test]
    fn test_analysis_requires_full_allocation() {
        let request = InvestmentRequest {
            investment_amount: "10000".into(),
            time_horizon_years: "10".into(),
            portfolio: vec![allocation(70.0, 7.0), allocation(20.0, 2.0)],
        };
        assert!(matches!(
            analyze_investment(&request),
            Err(AdvisorError::AllocationMismatch(_))
        ));

        let request = InvestmentRequest {
            portfolio: vec![allocation(70.0, 7.0), allocation(30.0, 2.0)],
            ..request
        };
        let analysis = analyze_investment(&request).unwrap();
        assert!((analysis.rate_used - 5.5).abs() < 1e-12);
    }

    #[test]
    fn test_analysis_rejects_out_of_range() {
        let request = InvestmentRequest {
            investment_amount: "0".into(),
            time_horizon_years: "10".into(),
            portfolio: vec![],
        };
        assert!(matches!(
            analyze_investment(&request),
            Err(AdvisorError::InvalidNumber { .. })
        ));

        let request = InvestmentRequest {
            investment_amount: "5000".into(),
            time_horizon_years: "101".into(),
            portfolio: vec![],
        };
        assert!(analyze_investment(&request).is_err());
    }
}
