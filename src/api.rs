//! REST API server for the financing advisor
//!
//! Exposes cost calculation, loan analysis and investment projection
//! over HTTP for the frontend UI.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::analysis::LoanAnalyzer;
use crate::error::AdvisorError;
use crate::models::{LoanInputs, ProductType};
use crate::projection::{analyze_investment, InvestmentRequest};

/// =============================
/// Request Models
/// =============================

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct LoanRequest {
    pub product: String,
    #[serde(default)]
    pub inputs: LoanInputs,
}

impl LoanRequest {
    fn product(&self) -> crate::Result<ProductType> {
        self.product.parse()
    }
}

/// =============================
/// Response Wrapper
/// =============================

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
    pub timestamp: String,
}

impl ApiResponse {
    pub fn success<T: Serialize>(data: T) -> Self {
        Self {
            success: true,
            data: serde_json::to_value(data).ok(),
            error: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

type ApiReply = (StatusCode, Json<ApiResponse>);

fn status_for(err: &AdvisorError) -> StatusCode {
    match err {
        e if e.is_validation() => StatusCode::BAD_REQUEST,
        AdvisorError::AnalysisInProgress => StatusCode::CONFLICT,
        AdvisorError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
        AdvisorError::TransientService(_) | AdvisorError::Cancelled => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        AdvisorError::ClientService { .. } | AdvisorError::MalformedResponse(_) => {
            StatusCode::BAD_GATEWAY
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn failure(err: AdvisorError) -> ApiReply {
    let status = status_for(&err);
    warn!(status = status.as_u16(), error = %err, "Request failed");

    let mut response = ApiResponse::error(err.user_message());
    if let AdvisorError::RateLimited {
        reason,
        retry_after_seconds,
    } = &err
    {
        response.data = Some(serde_json::json!({
            "reason": reason,
            "retryAfterSeconds": retry_after_seconds,
        }));
    }
    (status, Json(response))
}

fn reply<T: Serialize>(result: crate::Result<T>) -> ApiReply {
    match result {
        Ok(data) => (StatusCode::OK, Json(ApiResponse::success(data))),
        Err(e) => failure(e),
    }
}

/// =============================
/// API State
/// =============================

#[derive(Clone)]
pub struct ApiState {
    pub analyzer: Arc<LoanAnalyzer>,
}

/// =============================
/// Health Endpoint
/// =============================

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// =============================
/// Loan Endpoints
/// =============================

async fn loan_defaults(Path(product): Path<String>) -> ApiReply {
    reply(product.parse::<ProductType>().map(|p| p.default_inputs()))
}

async fn loan_cost(State(state): State<ApiState>, Json(req): Json<LoanRequest>) -> ApiReply {
    reply(
        req.product()
            .and_then(|product| state.analyzer.cost(product, &req.inputs)),
    )
}

async fn loan_analyze(State(state): State<ApiState>, Json(req): Json<LoanRequest>) -> ApiReply {
    let product = match req.product() {
        Ok(product) => product,
        Err(e) => return failure(e),
    };
    info!(%product, "Received loan analysis request");

    reply(state.analyzer.analyze(product, &req.inputs).await)
}

/// =============================
/// Investment Endpoint
/// =============================

async fn investment_project(Json(req): Json<InvestmentRequest>) -> ApiReply {
    reply(analyze_investment(&req))
}

/// =============================
/// Router
/// =============================

pub fn create_router(analyzer: Arc<LoanAnalyzer>) -> Router {
    let state = ApiState { analyzer };

    Router::new()
        .route("/health", get(health))
        .route("/api/loan/defaults/:product", get(loan_defaults))
        .route("/api/loan/cost", post(loan_cost))
        .route("/api/loan/analyze", post(loan_analyze))
        .route("/api/investment/project", post(investment_project))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server(analyzer: Arc<LoanAnalyzer>, port: u16) -> crate::Result<()> {
    let router = create_router(analyzer);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!("API Server listening on http://0.0.0.0:{}", port);
    info!("Local: http://127.0.0.1:{}", port);

    axum::serve(listener, router).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::advisory::testing::ScriptedService;
    use crate::advisory::AdvisoryPipeline;
    use crate::rate_limit::{RateLimitConfig, RateLimiter};
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn router_with(limits: RateLimitConfig) -> Router {
        let pipeline = AdvisoryPipeline::new(
            Arc::new(ScriptedService::new(vec![])),
            Arc::new(RateLimiter::new(limits)),
        );
        create_router(Arc::new(LoanAnalyzer::new(pipeline)))
    }

    fn router() -> Router {
        router_with(RateLimitConfig::default())
    }

    async fn send(router: Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json");
        let body = body.map(|b| Body::from(b.to_string())).unwrap_or_else(Body::empty);

        let response = router.oneshot(builder.body(body).unwrap()).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = send(router(), "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    async fn test_defaults_endpoint() {
        let (status, body) = send(router(), "GET", "/api/loan/defaults/mortgage", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["principal"], "200000");

        let (status, body) = send(router(), "GET", "/api/loan/defaults/lease", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_cost_endpoint() {
        let inputs = ProductType::Loan.default_inputs();
        let (status, body) = send(
            router(),
            "POST",
            "/api/loan/cost",
            Some(json!({"product": "loan", "inputs": inputs})),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["product"], "Loan");
        let installment = body["data"]["monthlyInstallment"].as_f64().unwrap();
        assert!((installment - 300.5692289).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_cost_endpoint_rejects_invalid_inputs() {
        let mut inputs = ProductType::Loan.default_inputs();
        inputs.term_months = "0".into();
        let (status, body) = send(
            router(),
            "POST",
            "/api/loan/cost",
            Some(json!({"product": "Loan", "inputs": inputs})),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("termMonths"));
    }

    #[tokio::test]
    async fn test_analyze_endpoint() {
        let inputs = ProductType::Installment.default_inputs();
        let (status, body) = send(
            router(),
            "POST",
            "/api/loan/analyze",
            Some(json!({"product": "Installment", "inputs": inputs})),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["advice"]["recommendation"], "UseSavings");
        assert_eq!(body["data"]["comparison"]["investmentGain"], 1234.5);
    }

    #[tokio::test]
    async fn test_analyze_rate_limited() {
        let router = router_with(RateLimitConfig {
            max_request_bytes: 16,
            ..RateLimitConfig::default()
        });
        let inputs = ProductType::Loan.default_inputs();
        let (status, body) = send(
            router,
            "POST",
            "/api/loan/analyze",
            Some(json!({"product": "Loan", "inputs": inputs})),
        )
        .await;

        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body["data"]["reason"], "request too large");
        assert!(body["error"].as_str().unwrap().contains("too large"));
    }

    #[tokio::test]
    async fn test_investment_endpoint() {
        let (status, body) = send(
            router(),
            "POST",
            "/api/investment/project",
            Some(json!({"investmentAmount": "10000", "timeHorizonYears": "5", "portfolio": []})),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["usedDefaultRate"], true);
        assert!(body["data"]["result"]["projectedValue"].as_f64().unwrap() > 10000.0);

        let (status, _) = send(
            router(),
            "POST",
            "/api/investment/project",
            Some(json!({"investmentAmount": "10000", "timeHorizonYears": "0"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(status_for(&AdvisorError::AnalysisInProgress), StatusCode::CONFLICT);
        assert_eq!(
            status_for(&AdvisorError::MalformedResponse("x".into())),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(status_for(&AdvisorError::Cancelled), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            status_for(&AdvisorError::Configuration("x".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
