use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;

use crate::error::EngineError;
use crate::monitor::{EngineStatus, MonitorEngine, StartOutcome, StopOutcome};
use crate::risk::AnalysisResult;
use crate::store::{AnalysisPage, HistoryFilters, RiskStatistics};

use super::types::*;

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ErrorResponse>)>;

fn api_error(status: StatusCode, msg: impl Into<String>) -> (StatusCode, Json<ErrorResponse>) {
    (status, Json(ErrorResponse { error: msg.into() }))
}

fn engine_error(error: EngineError) -> (StatusCode, Json<ErrorResponse>) {
    let status = match &error {
        EngineError::InvalidAddress(_) | EngineError::InvalidHash(_) => StatusCode::BAD_REQUEST,
        EngineError::TransactionNotFound(_) => StatusCode::NOT_FOUND,
        EngineError::ChainUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        EngineError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    api_error(status, error.to_string())
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

pub async fn start_monitoring(
    State(engine): State<Arc<MonitorEngine>>,
    Json(req): Json<StartRequest>,
) -> ApiResult<StartResponse> {
    match engine
        .start_monitoring(&req.addresses, req.rules)
        .await
        .map_err(engine_error)?
    {
        StartOutcome::Started { from_block } => Ok(Json(StartResponse {
            status: "started".to_string(),
            from_block: Some(from_block),
        })),
        StartOutcome::AlreadyMonitoring => Ok(Json(StartResponse {
            status: "already_monitoring".to_string(),
            from_block: None,
        })),
    }
}

pub async fn stop_monitoring(
    State(engine): State<Arc<MonitorEngine>>,
) -> Json<StopResponse> {
    let status = match engine.stop_monitoring().await {
        StopOutcome::Stopped => "stopped",
        StopOutcome::AlreadyStopped => "already_stopped",
    };
    Json(StopResponse {
        status: status.to_string(),
    })
}

pub async fn monitor_status(State(engine): State<Arc<MonitorEngine>>) -> Json<EngineStatus> {
    Json(engine.status().await)
}

pub async fn add_address(
    State(engine): State<Arc<MonitorEngine>>,
    Json(req): Json<AddressRequest>,
) -> ApiResult<AddressResponse> {
    let changed = engine
        .add_watched_address(&req.address)
        .map_err(engine_error)?;
    Ok(Json(AddressResponse {
        address: req.address,
        changed,
    }))
}

pub async fn remove_address(
    State(engine): State<Arc<MonitorEngine>>,
    Path(address): Path<String>,
) -> ApiResult<AddressResponse> {
    let changed = engine
        .remove_watched_address(&address)
        .map_err(engine_error)?;
    Ok(Json(AddressResponse { address, changed }))
}

pub async fn analyze(
    State(engine): State<Arc<MonitorEngine>>,
    Json(req): Json<AnalyzeRequest>,
) -> ApiResult<AnalysisResult> {
    engine
        .analyze_transaction_by_hash(&req.tx_hash)
        .await
        .map(Json)
        .map_err(engine_error)
}

pub async fn list_analyses(
    State(engine): State<Arc<MonitorEngine>>,
    Query(params): Query<HistoryParams>,
) -> ApiResult<AnalysisPage> {
    let page = params.page.unwrap_or(1).max(1);
    let limit = params.limit.unwrap_or(50).clamp(1, 500);
    let filters = HistoryFilters {
        min_risk_level: params.min_risk_level,
        since: params.since,
        until: params.until,
        address: params.address,
    };
    engine
        .analysis_history(page, limit, &filters)
        .await
        .map(Json)
        .map_err(engine_error)
}

pub async fn stats(
    State(engine): State<Arc<MonitorEngine>>,
    Query(params): Query<StatsParams>,
) -> ApiResult<RiskStatistics> {
    let window = Duration::from_secs(params.window_secs.unwrap_or(86_400));
    engine
        .risk_statistics(window)
        .await
        .map(Json)
        .map_err(engine_error)
}
