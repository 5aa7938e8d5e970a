// Price Reconciliation - Web Server
// REST API with Axum: compare uploads, replace the baseline, download diffs

use anyhow::Context;
use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, DefaultBodyLimit, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use price_reconciliation::{
    codec, Actor, AppConfig, BaselineMissing, ChangeSet, ComparisonStats, PriceChange,
    ReconciliationService, SnapshotStore, TabularRecord, ValidationFailure,
};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use tower_http::cors::CorsLayer;
use tracing::{error, info};

/// Shared application state
struct AppState<S: SnapshotStore> {
    service: Arc<Mutex<ReconciliationService<S>>>,
}

impl<S: SnapshotStore> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
        }
    }
}

impl<S: SnapshotStore> AppState<S> {
    fn new(service: ReconciliationService<S>) -> Self {
        Self {
            service: Arc::new(Mutex::new(service)),
        }
    }

    fn service(&self) -> anyhow::Result<MutexGuard<'_, ReconciliationService<S>>> {
        self.service
            .lock()
            .map_err(|_| anyhow::anyhow!("Service lock poisoned"))
    }
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    fn err(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
        }
    }
}

#[derive(Deserialize)]
struct UploadRequest {
    #[serde(rename = "newData")]
    new_data: Vec<TabularRecord>,
}

#[derive(Deserialize)]
struct DownloadRequest {
    #[serde(rename = "priceChanges")]
    price_changes: Vec<PriceChange>,
}

#[derive(Deserialize)]
struct HistoryQuery {
    limit: Option<usize>,
}

/// Comparison response
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CompareResponse {
    price_changes: Vec<PriceChange>,
    stats: ComparisonStats,
    increases: usize,
    decreases: usize,
    message: String,
}

impl From<ChangeSet> for CompareResponse {
    fn from(change_set: ChangeSet) -> Self {
        Self {
            increases: change_set.increases(),
            decreases: change_set.decreases(),
            message: change_set.message(),
            price_changes: change_set.changes,
            stats: change_set.stats,
        }
    }
}

/// Validation → 400, no baseline → 404, anything else → 500
fn error_response(e: anyhow::Error) -> Response {
    let status = if e.downcast_ref::<ValidationFailure>().is_some() {
        StatusCode::BAD_REQUEST
    } else if e.downcast_ref::<BaselineMissing>().is_some() {
        StatusCode::NOT_FOUND
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };

    if status == StatusCode::INTERNAL_SERVER_ERROR {
        error!(error = ?e, "request failed");
    } else {
        info!(status = status.as_u16(), error = %e, "request rejected");
    }

    (status, Json(ApiResponse::<()>::err(e.to_string()))).into_response()
}

/// Malformed or mis-shaped JSON bodies → 400 in the usual envelope
fn rejection_response(rejection: JsonRejection) -> Response {
    let status = match rejection.status() {
        StatusCode::PAYLOAD_TOO_LARGE => StatusCode::PAYLOAD_TOO_LARGE,
        _ => StatusCode::BAD_REQUEST,
    };
    info!(status = status.as_u16(), error = %rejection.body_text(), "request rejected");

    let message = format!("Invalid data format: {}", rejection.body_text());
    (status, Json(ApiResponse::<()>::err(message))).into_response()
}

fn compare_rows<S: SnapshotStore>(state: &AppState<S>, rows: &[TabularRecord]) -> Response {
    let result = state
        .service()
        .and_then(|service| service.compare(rows, Actor::Api));

    match result {
        Ok(change_set) => {
            let body = CompareResponse::from(change_set);
            (StatusCode::OK, Json(ApiResponse::ok(body))).into_response()
        }
        Err(e) => error_response(e),
    }
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// POST /api/compare-prices - Compare uploaded rows against the baseline
async fn compare_prices<S: SnapshotStore + 'static>(
    State(state): State<AppState<S>>,
    payload: Result<Json<UploadRequest>, JsonRejection>,
) -> Response {
    match payload {
        Ok(Json(request)) => compare_rows(&state, &request.new_data),
        Err(rejection) => rejection_response(rejection),
    }
}

/// POST /api/compare-prices/csv - Same, with a raw CSV body
async fn compare_prices_csv<S: SnapshotStore + 'static>(
    State(state): State<AppState<S>>,
    body: Bytes,
) -> Response {
    match codec::parse(&body).context("Invalid CSV upload") {
        Ok(dataset) => compare_rows(&state, &dataset.rows),
        Err(e) => (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::<()>::err(format!("{:#}", e))),
        )
            .into_response(),
    }
}

/// POST /api/replace-export - Make the uploaded rows the new baseline
async fn replace_export<S: SnapshotStore + 'static>(
    State(state): State<AppState<S>>,
    payload: Result<Json<UploadRequest>, JsonRejection>,
) -> Response {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => return rejection_response(rejection),
    };
    let result = state
        .service()
        .and_then(|service| service.replace_baseline(request.new_data, Actor::Api));

    match result {
        Ok(info) => (StatusCode::OK, Json(ApiResponse::ok(info))).into_response(),
        Err(e) => error_response(e),
    }
}

/// POST /api/download-price-changes - Change-set as a CSV attachment
async fn download_price_changes<S: SnapshotStore + 'static>(
    State(state): State<AppState<S>>,
    payload: Result<Json<DownloadRequest>, JsonRejection>,
) -> Response {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => return rejection_response(rejection),
    };
    let result = state
        .service()
        .and_then(|service| service.export(&request.price_changes));

    match result {
        Ok(bytes) => {
            let file_name = codec::export_file_name(chrono::Utc::now().date_naive());
            (
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, "text/csv".to_string()),
                    (
                        header::CONTENT_DISPOSITION,
                        format!("attachment; filename={}", file_name),
                    ),
                ],
                bytes,
            )
                .into_response()
        }
        Err(e) => error_response(e),
    }
}

/// GET /api/history - Recent comparisons and baseline replacements
async fn get_history<S: SnapshotStore + 'static>(
    State(state): State<AppState<S>>,
    Query(query): Query<HistoryQuery>,
) -> Response {
    let limit = query.limit.unwrap_or(50);
    let result = state.service().and_then(|service| service.history(limit));

    match result {
        Ok(events) => (StatusCode::OK, Json(ApiResponse::ok(events))).into_response(),
        Err(e) => error_response(e),
    }
}

fn build_router<S: SnapshotStore + 'static>(state: AppState<S>, max_upload_bytes: usize) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/compare-prices", post(compare_prices::<S>))
        .route("/compare-prices/csv", post(compare_prices_csv::<S>))
        .route("/replace-export", post(replace_export::<S>))
        .route("/download-price-changes", post(download_price_changes::<S>))
        .route("/history", get(get_history::<S>))
        .with_state(state);

    Router::new()
        .nest("/api", api_routes)
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(CorsLayer::permissive())
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();
}

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    let config = AppConfig::load()?;
    let service = ReconciliationService::from_config(&config)?;
    info!(
        baseline = %service.store().baseline_path().display(),
        audit = config.audit_db.is_some(),
        "service ready"
    );

    let app = build_router(AppState::new(service), config.max_upload_bytes);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_addr))?;

    info!(addr = %config.bind_addr, "server running");

    axum::serve(listener, app)
        .await
        .context("Server error")?;

    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================
