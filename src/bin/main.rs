use financing_advisor::{
    gemini::GeminiClient,
    projection::{analyze_investment, InvestmentRequest},
    session::LoanSession,
    AdvisorConfig, AdvisoryPipeline, LoanAnalyzer, PortfolioItem, ProductType, RateLimiter,
};
use financing_advisor::portfolio::ItemField;
use std::sync::Arc;
use tracing::{info, warn};

/// One-shot analysis run: `advisor [loan|installment|mortgage]`
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let product: ProductType = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "loan".to_string())
        .parse()?;

    info!(%product, "Financing Advisor starting");

    // Sample session: defaults plus a small portfolio
    let mut session = LoanSession::new();
    session.set_product(product);
    let etf = session.add_asset();
    session.update_asset(&etf, ItemField::Name, "World ETF")?;
    session.update_asset(&etf, ItemField::Amount, "20000")?;
    session.update_asset(&etf, ItemField::ReturnRate, "7")?;
    let bonds = session.add_asset();
    session.update_asset(&bonds, ItemField::Name, "Government bonds")?;
    session.update_asset(&bonds, ItemField::Amount, "10000")?;
    session.update_asset(&bonds, ItemField::ReturnRate, "3")?;

    // Standalone projection never needs the remote service
    let projection = analyze_investment(&InvestmentRequest {
        investment_amount: session.inputs().principal.clone(),
        time_horizon_years: "5".to_string(),
        portfolio: vec![
            PortfolioItem {
                id: "etf".to_string(),
                name: "World ETF".to_string(),
                amount: 70.0,
                return_rate: 7.0,
            },
            PortfolioItem {
                id: "bonds".to_string(),
                name: "Government bonds".to_string(),
                amount: 30.0,
                return_rate: 3.0,
            },
        ],
    })?;

    println!("\n=== INVESTMENT PROJECTION (5 years @ {:.2}%) ===", projection.rate_used);
    println!("Projected value:      {:.2}", projection.result.projected_value);
    println!("Total return:         {:.2}", projection.result.total_return);
    println!("Inflation adjusted:   {:.2}", projection.result.inflation_adjusted_value);

    let config = AdvisorConfig::from_env()?;
    let client = match GeminiClient::new(&config) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            warn!("Advisory service unavailable: {}", e);
            eprintln!("{}", e.user_message());
            return Ok(());
        }
    };
    let limiter = Arc::new(RateLimiter::new(config.rate_limit_config()));
    let analyzer = LoanAnalyzer::new(AdvisoryPipeline::new(client, limiter));

    match session.run_analysis(&analyzer).await {
        Ok(outcome) => {
            info!("Analysis successful");
            println!("\n=== {} ANALYSIS ===", outcome.product);
            println!("Monthly installment:  {:.2}", outcome.cost.monthly_installment());
            println!("Total interest:       {:.2}", outcome.cost.total_interest());
            println!("Final cost:           {:.2}", outcome.cost.final_cost());
            println!("Total repaid:         {:.2}", outcome.total_repaid);
            println!("\nRecommendation: {}", outcome.advice.recommendation);
            println!("{}", outcome.advice.summary);
            println!("\n{}", outcome.advice.detailed_analysis);
            println!(
                "\nOpportunity cost (investment growth): {:.2}",
                outcome.comparison.investment_gain
            );
            Ok(())
        }
        Err(e) => {
            eprintln!("Analysis failed: {}", e.user_message());
            Err(Box::new(e) as Box<dyn std::error::Error>)
        }
    }
}
