//! In-memory calculator session for a single user

use crate::analysis::LoanAnalyzer;
use crate::coercion::sanitize_numeric;
use crate::error::AdvisorError;
use crate::models::{AnalysisOutcome, CostResult, LoanInputs, ProductType};
use crate::portfolio::{AmountKind, ItemField, Portfolio};
use crate::Result;
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct LoanSession {
    product: ProductType,
    inputs: LoanInputs,
    cost: Option<CostResult>,
    outcome: Option<AnalysisOutcome>,
    error: Option<String>,
}

impl Default for LoanSession {
    fn default() -> Self {
        Self::new()
    }
}

impl LoanSession {
    pub fn new() -> Self {
        Self {
            product: ProductType::Loan,
            inputs: ProductType::Loan.default_inputs(),
            cost: None,
            outcome: None,
            error: None,
        }
    }

    pub fn product(&self) -> ProductType {
        self.product
    }

    pub fn inputs(&self) -> &LoanInputs {
        &self.inputs
    }

    pub fn cost(&self) -> Option<&CostResult> {
        self.cost.as_ref()
    }

    pub fn outcome(&self) -> Option<&AnalysisOutcome> {
        self.outcome.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Switch product: load its defaults, keep the user's savings and assets.
    pub fn set_product(&mut self, product: ProductType) {
        let mut inputs = product.default_inputs();
        inputs.liquid_savings = std::mem::take(&mut self.inputs.liquid_savings);
        inputs.portfolio = std::mem::take(&mut self.inputs.portfolio);

        self.product = product;
        self.inputs = inputs;
        self.clear_results();
        info!(%product, "Product switched");
    }

    /// Store a raw numeric field, keeping only digits and one decimal point.
    pub fn set_field(&mut self, name: &str, raw: &str) -> Result<()> {
        let field = self
            .inputs
            .field_mut(name)
            .ok_or_else(|| AdvisorError::UnknownField(name.to_string()))?;
        *field = sanitize_numeric(raw);
        debug!(field = name, value = %field, "Input updated");
        Ok(())
    }

    pub fn add_asset(&mut self) -> String {
        self.with_portfolio(|portfolio| portfolio.add_item())
    }

    pub fn update_asset(&mut self, id: &str, field: ItemField, raw: &str) -> Result<()> {
        self.with_portfolio(|portfolio| portfolio.update_item(id, field, raw))
    }

    pub fn remove_asset(&mut self, id: &str) -> Result<()> {
        self.with_portfolio(|portfolio| portfolio.remove_item(id).map(|_| ()))
    }

    fn with_portfolio<T>(&mut self, f: impl FnOnce(&mut Portfolio) -> T) -> T {
        let items = std::mem::take(&mut self.inputs.portfolio);
        let mut portfolio = Portfolio::from_items(AmountKind::Currency, items);
        let result = f(&mut portfolio);
        self.inputs.portfolio = portfolio.into_items();
        result
    }

    /// Run a full analysis of the current inputs. Previous results are
    /// discarded before the request starts.
    pub async fn run_analysis(&mut self, analyzer: &LoanAnalyzer) -> Result<&AnalysisOutcome> {
        self.clear_results();

        let result = analyzer.analyze(self.product, &self.inputs).await;
        match result {
            Ok(outcome) => {
                self.cost = Some(outcome.cost);
                Ok(self.outcome.insert(outcome))
            }
            Err(e) => {
                self.error = Some(e.user_message());
                Err(e)
            }
        }
    }

    fn clear_results(&mut self) {
        self.cost = None;
        self.outcome = None;
        self.error = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::advisory::testing::{transient, ScriptedService, VALID_ADVICE};
    use crate::advisory::{AdvisoryPipeline, RetryPolicy};
    use crate::rate_limit::RateLimiter;
    use std::sync::Arc;
    use std::time::Duration;

    fn analyzer(script: Vec<Result<String>>) -> LoanAnalyzer {
        let pipeline = AdvisoryPipeline::new(
            Arc::new(ScriptedService::new(script)),
            Arc::new(RateLimiter::default()),
        )
        .with_policy(RetryPolicy {
            max_attempts: 1,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            max_jitter: Duration::ZERO,
        });
        LoanAnalyzer::new(pipeline)
    }

    #[test]
    fn test_switching_product_keeps_savings_and_assets() {
        let mut session = LoanSession::new();
        session.set_field("liquidSavings", "12.500").unwrap();
        let id = session.add_asset();
        session.update_asset(&id, ItemField::Amount, "4000").unwrap();

        session.set_product(ProductType::Mortgage);

        assert_eq!(session.product(), ProductType::Mortgage);
        assert_eq!(session.inputs().principal, "200000");
        assert_eq!(session.inputs().liquid_savings, "12.500");
        assert_eq!(session.inputs().portfolio.len(), 1);
        assert_eq!(session.inputs().portfolio[0].amount, 4000.0);
    }

    #[test]
    fn test_set_field() {
        let mut session = LoanSession::new();
        session.set_field("principal", "€ 20,000.50").unwrap();
        assert_eq!(session.inputs().principal, "20000.50");

        assert!(matches!(
            session.set_field("downPayment", "10"),
            Err(AdvisorError::UnknownField(_))
        ));
    }

    #[test]
    fn test_asset_lifecycle() {
        let mut session = LoanSession::new();
        let id = session.add_asset();
        assert!(!id.is_empty());
        session.update_asset(&id, ItemField::Name, "Bonds").unwrap();
        assert_eq!(session.inputs().portfolio[0].name, "Bonds");

        session.remove_asset(&id).unwrap();
        assert!(session.inputs().portfolio.is_empty());
        assert!(matches!(session.remove_asset(&id), Err(AdvisorError::ItemNotFound(_))));
    }

    #[tokio::test]
    async fn test_run_analysis_stores_results_then_clears_them() {
        let analyzer = analyzer(vec![]);
        let mut session = LoanSession::new();

        let outcome = session.run_analysis(&analyzer).await.unwrap();
        assert_eq!(outcome.product, ProductType::Loan);
        assert!(session.cost().is_some());
        assert!(session.error().is_none());

        session.set_product(ProductType::Installment);
        assert!(session.cost().is_none());
        assert!(session.outcome().is_none());
    }

    #[tokio::test]
    async fn test_failed_analysis_replaces_previous_results() {
        let analyzer = analyzer(vec![Ok(VALID_ADVICE.into()), transient()]);
        let mut session = LoanSession::new();

        session.run_analysis(&analyzer).await.unwrap();
        assert!(session.outcome().is_some());

        assert!(session.run_analysis(&analyzer).await.is_err());
        assert!(session.outcome().is_none());
        assert!(session.cost().is_none());
        assert!(session.error().unwrap().contains("could not be reached"));
    }
}
