use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use agri_yield_core::RAW_FEATURES;
use agri_yield_service::{DataService, PredictionService};
use anyhow::{Context, Result};
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::dashboard;

/// Name reported by the health endpoint
pub const SERVICE_NAME: &str = "Agriculture Yield Predictor API";

/// Rows returned by `/api/historical` without a usable `limit`
pub const DEFAULT_HISTORY_LIMIT: usize = 100;

/// Services shared by every handler
#[derive(Clone)]
pub struct AppState {
    pub prediction: Arc<PredictionService>,
    pub data: Arc<DataService>,
}

impl AppState {
    pub fn new(prediction: PredictionService, data: DataService) -> Self {
        Self {
            prediction: Arc::new(prediction),
            data: Arc::new(data),
        }
    }
}

pub(crate) type SharedState = Arc<AppState>;

#[derive(Debug, Serialize)]
struct ErrorResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    success: Option<bool>,
    error: String,
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    include_success: bool,
    message: String,
}

impl ApiError {
    fn new<S: Into<String>>(status: StatusCode, message: S) -> Self {
        Self {
            status,
            include_success: true,
            message: message.into(),
        }
    }

    fn bad_request<S: Into<String>>(message: S) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    fn internal<S: Into<String>>(message: S) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    /// Validation failure reported as a bare `{error}` body
    fn missing_field(name: &str) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            include_success: false,
            message: format!("Missing required field: {name}"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let payload = Json(ErrorResponse {
            success: self.include_success.then_some(false),
            error: self.message,
        });
        (self.status, payload).into_response()
    }
}

#[derive(Debug, Serialize)]
struct ApiResponse<T: Serialize> {
    success: bool,
    data: T,
}

impl<T: Serialize> ApiResponse<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data,
        })
    }
}

#[derive(Debug, Deserialize)]
struct HistoricalParams {
    #[serde(default)]
    limit: Option<String>,
}

/// Bind `addr` and serve the router until the listener fails
pub async fn start_server(state: AppState, addr: &str) -> Result<()> {
    let app = build_router(state);
    let listener = bind_listener(addr).await?;
    info!("Agriculture yield API listening on {}", addr);
    axum::serve(listener, app)
        .await
        .context("HTTP server terminated unexpectedly")
}

async fn bind_listener(addr: &str) -> Result<tokio::net::TcpListener> {
    if let Ok(socket_addr) = addr.parse::<SocketAddr>() {
        tokio::net::TcpListener::bind(socket_addr)
            .await
            .with_context(|| format!("failed to bind HTTP listener on {socket_addr}"))
    } else {
        tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind HTTP listener on {addr}"))
    }
}

/// JSON API under `/api` plus the HTML dashboard
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/predict", post(handle_predict))
        .route("/api/historical", get(handle_historical))
        .route("/api/statistics", get(handle_statistics))
        .route("/api/health", get(handle_health))
        .route("/", get(dashboard::index))
        .route("/dashboard", get(dashboard::dashboard))
        .route(
            "/predict",
            get(dashboard::predict_form).post(dashboard::predict_submit),
        )
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(state))
}

async fn handle_predict(State(state): State<SharedState>, body: Bytes) -> Result<Response, ApiError> {
    let input = parse_prediction_input(&body)?;

    match state.prediction.predict_yield(&input) {
        Ok(result) => Ok(ApiResponse::ok(result).into_response()),
        Err(err) => {
            warn!("Prediction failed: {}", err);
            Err(ApiError::internal(err.to_string()))
        }
    }
}

/// Validate the request body: a JSON object carrying every raw field as a number
fn parse_prediction_input(body: &[u8]) -> Result<HashMap<String, f64>, ApiError> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| ApiError::bad_request(format!("Invalid JSON body: {e}")))?;
    let Value::Object(fields) = value else {
        return Err(ApiError::bad_request("Request body must be a JSON object"));
    };

    if let Some(missing) = RAW_FEATURES.iter().find(|name| !fields.contains_key(**name)) {
        return Err(ApiError::missing_field(missing));
    }

    RAW_FEATURES
        .iter()
        .map(|&name| {
            fields
                .get(name)
                .and_then(Value::as_f64)
                .map(|v| (name.to_string(), v))
                .ok_or_else(|| ApiError::bad_request(format!("Field '{name}' must be a number")))
        })
        .collect()
}

async fn handle_historical(
    State(state): State<SharedState>,
    Query(params): Query<HistoricalParams>,
) -> Result<Response, ApiError> {
    let limit = params
        .limit
        .and_then(|raw| raw.parse::<usize>().ok())
        .unwrap_or(DEFAULT_HISTORY_LIMIT);

    let records = state
        .data
        .get_historical(limit)
        .map_err(|e| ApiError::internal(e.to_string()))?;
    Ok(ApiResponse::ok(records).into_response())
}

async fn handle_statistics(State(state): State<SharedState>) -> Result<Response, ApiError> {
    let stats = state
        .data
        .get_statistics()
        .map_err(|e| ApiError::internal(e.to_string()))?;

    let data = match stats {
        Some(stats) => serde_json::to_value(stats).map_err(|e| ApiError::internal(e.to_string()))?,
        None => json!({}),
    };
    Ok(ApiResponse::ok(data).into_response())
}

async fn handle_health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": SERVICE_NAME,
    }))
}
