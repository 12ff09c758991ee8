use financing_advisor::{
    api::start_server, gemini::GeminiClient, AdvisorConfig, AdvisoryPipeline, LoanAnalyzer,
    RateLimiter,
};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug")),
        )
        .init();

    let config = AdvisorConfig::from_env()?;

    info!("Financing Advisor - API Server");
    info!(port = config.port, model = %config.model, "Configuration loaded");

    if config.api_key.is_none() {
        eprintln!("GEMINI_API_KEY not set in .env");
        eprintln!("See .env.example for setup instructions");
    }

    // Create components
    let client = Arc::new(GeminiClient::new(&config)?);
    let limiter = Arc::new(RateLimiter::new(config.rate_limit_config()));
    let analyzer = Arc::new(LoanAnalyzer::new(AdvisoryPipeline::new(client, limiter)));

    info!("Analyzer initialized, starting API server");

    start_server(analyzer, config.port).await?;

    Ok(())
}
