//! Context prompt and response schema for the advisory call

use crate::coercion::{coerce, sanitize_text};
use crate::models::{CostResult, LoanInputs, PortfolioItem, ProductType, Recommendation};
use crate::portfolio::weighted_return;
use serde::Serialize;
use serde_json::{json, Value};

/// Sampling temperature for advisory requests
pub const ADVISORY_TEMPERATURE: f32 = 0.3;

/// Typed request handed to an [`super::AdvisoryService`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvisoryRequest {
    pub prompt: String,
    pub response_schema: Value,
    pub temperature: f32,
}

pub fn build_request(inputs: &LoanInputs, product: ProductType, cost: &CostResult) -> AdvisoryRequest {
    AdvisoryRequest {
        prompt: build_prompt(inputs, product, cost),
        response_schema: response_schema(),
        temperature: ADVISORY_TEMPERATURE,
    }
}

/// Structured-output declaration sent with every request.
pub fn response_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "recommendation": {
                "type": "STRING",
                "enum": Recommendation::ALL,
                "description": "Final call: 'Finance' if taking the financing is better, 'UseSavings' if paying from savings is better, 'Undecided' if the two are too close to call."
            },
            "summary": {
                "type": "STRING",
                "description": "One-sentence summary of the recommendation."
            },
            "detailedAnalysis": {
                "type": "STRING",
                "description": "One paragraph comparing the opportunity cost of using savings with the total final cost of the financing, assuming 3% yearly inflation. If recommending savings, say which funds (liquid or invested) to use first."
            },
            "projectedInvestmentGrowth": {
                "type": "NUMBER",
                "description": "Expected net profit from investing the requested amount for the financing term: future value minus the initial capital."
            }
        },
        "required": ["recommendation", "summary", "detailedAnalysis", "projectedInvestmentGrowth"]
    })
}

fn product_context(product: ProductType) -> &'static str {
    match product {
        ProductType::Loan => "I am considering taking out a personal loan.",
        ProductType::Installment => "I am considering a consumer installment financing plan.",
        ProductType::Mortgage => "I am considering a mortgage to buy a property.",
    }
}

fn format_portfolio(items: &[PortfolioItem]) -> String {
    if items.is_empty() {
        return "  - No investments in the portfolio.".to_string();
    }

    items
        .iter()
        .map(|item| {
            let name = sanitize_text(&item.name);
            let name = if name.is_empty() { "Unnamed asset".to_string() } else { name };
            format!(
                "  - {}: {:.2} EUR (expected yearly return: {:.2}%)",
                name, item.amount, item.return_rate
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_cost(cost: &CostResult) -> String {
    let mut lines = vec![
        format!("- Monthly installment: {:.2} EUR", cost.monthly_installment()),
        format!("- Total interest: {:.2} EUR", cost.total_interest()),
    ];

    match cost {
        CostResult::Installment { total_insurance_cost, .. } => {
            lines.push(format!("- Total insurance cost: {:.2} EUR", total_insurance_cost));
        }
        CostResult::Mortgage { effective_annual_rate, .. } => {
            lines.push(format!("- Effective annual rate: {:.2}%", effective_annual_rate));
        }
        CostResult::Loan { .. } => {}
    }

    lines.push(format!(
        "- **Total final cost of the financing (interest + all fees): {:.2} EUR**",
        cost.final_cost()
    ));
    lines.join("\n")
}

/// Natural-language context bundle: the user's situation, the computed cost
/// breakdown and the two scenarios to weigh.
pub fn build_prompt(inputs: &LoanInputs, product: ProductType, cost: &CostResult) -> String {
    let principal = coerce(&inputs.principal);
    let term_months = coerce(&inputs.term_months);
    let liquid_savings = coerce(&inputs.liquid_savings);

    let summary = weighted_return(&inputs.portfolio);
    let total_assets = liquid_savings + summary.total_invested;
    let return_note = if summary.used_default {
        " (no portfolio given: conservative reference rate)"
    } else {
        ""
    };

    format!(
        r#"Act as an expert financial advisor. {context}
I need to decide how to pay for an amount of {principal:.2} EUR.

My financial situation:
- Liquid savings (not invested): {liquid:.2} EUR
- Investment portfolio:
{portfolio}
- Total invested: {invested:.2} EUR
- Total assets (liquid + invested): {assets:.2} EUR
- Weighted average yearly portfolio return: {rate:.2}%{return_note}

I computed the total cost of the requested financing:
- Product: {product}
- Requested amount: {principal:.2} EUR
- Term: {term} months
{cost}

Analyze two scenarios:
1. **Take the financing:** the total cost is {final_cost:.2} EUR. My savings and investments stay intact and keep generating returns.
2. **Use my savings:** I take {principal:.2} EUR from my assets, which reduces my future earning potential.

Compare the **total final cost of the financing** with the **opportunity cost** of using my funds, that is the return I would give up by spending liquid savings or selling investments.
If you recommend using savings, say whether liquid savings (zero return) should go first or whether selling part of the investments is better, and which ones if possible.
Assume a standard yearly inflation rate of about 3%.

Compute the **net profit** (total gain minus initial capital) of investing {principal:.2} EUR for {term} months at a yearly return of {rate:.2}%. This is the main opportunity cost; put it in the 'projectedInvestmentGrowth' field.

Answer in JSON following the declared schema."#,
        context = product_context(product),
        principal = principal,
        liquid = liquid_savings,
        portfolio = format_portfolio(&inputs.portfolio),
        invested = summary.total_invested,
        assets = total_assets,
        rate = summary.weighted_return,
        return_note = return_note,
        product = product,
        term = term_months,
        cost = format_cost(cost),
        final_cost = cost.final_cost(),
    )
}
