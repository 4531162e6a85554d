#![cfg(feature = "web")]

use axum::{
    Json, Router,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::adapter::{ReadState, TabularAdapter};
use crate::cache::TableCache;
use crate::config::{AppConfig, DashboardColumns};
use crate::dashboard;
use crate::downloader;
use crate::error::{ConfigError, Violation};
use crate::form::{FormCollector, ProductionRequest, SubmitError};
use crate::notify::Notifier;
use crate::schema::Schema;
use crate::table::Cell;
use crate::transport::SheetTransport;

pub struct AppState {
    collector: FormCollector,
    requests: TabularAdapter,
    columns: DashboardColumns,
}

impl AppState {
    /// Wire adapters, collector and notifier from the startup config.
    pub fn new(
        config: &AppConfig,
        transport: Arc<dyn SheetTransport>,
        notifier: Option<Arc<dyn Notifier>>,
    ) -> Result<Self, ConfigError> {
        let cache = TableCache::new(
            Duration::from_secs(config.sheets.cache_ttl_secs),
            config.sheets.cache_max_entries,
        );
        let requests = TabularAdapter::new(
            transport.clone(),
            config.sheets.requests_address()?,
            cache.clone(),
        );
        let form = TabularAdapter::new(transport, config.sheets.form_address()?, cache);

        let mut collector = FormCollector::new(requests.clone(), form);
        if let Some(notifier) = notifier {
            collector = collector.with_notifier(
                notifier,
                config.notify.recipients.clone(),
                config.notify.use_form_recipients,
            );
        }

        Ok(AppState {
            collector,
            requests,
            columns: config.dashboard.clone(),
        })
    }
}

#[derive(Serialize)]
struct ViolationBody {
    code: Violation,
    message: &'static str,
}

#[derive(Serialize)]
struct InvalidResponse {
    status: &'static str,
    violations: Vec<ViolationBody>,
}

#[derive(Serialize)]
struct AppendFailedResponse {
    status: &'static str,
    message: String,
    /// The submission as received, so the client can show it again.
    request: ProductionRequest,
}

#[derive(Serialize)]
struct TableResponse<'a> {
    source: ReadState,
    schema: &'a Schema,
    rows: &'a [Vec<Cell>],
}

#[derive(Serialize)]
struct ErrorResponse {
    status: &'static str,
    message: String,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/form", get(get_form))
        .route("/api/requests", get(list_requests).post(submit_request))
        .route("/api/dashboard", get(get_dashboard))
        .route("/api/export/csv", get(export_csv))
        .route("/api/export/xlsx", get(export_xlsx))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run(config: AppConfig, state: AppState) -> Result<(), Box<dyn std::error::Error>> {
    let app = router(Arc::new(state));

    let listener = TcpListener::bind(&config.server.bind).await?;
    log::info!("Listening on http://{}", config.server.bind);
    axum::serve(listener, app).await?;

    Ok(())
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn get_form(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let (definition, source) = state.collector.definition().await;
    Json(definition.view(source))
}

async fn submit_request(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ProductionRequest>,
) -> Response {
    match state.collector.submit(request).await {
        Ok(receipt) => (StatusCode::CREATED, Json(receipt)).into_response(),
        Err(SubmitError::Validation(e)) => {
            let violations = e
                .violations
                .iter()
                .map(|&code| ViolationBody {
                    code,
                    message: code.message(),
                })
                .collect();
            (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(InvalidResponse {
                    status: "invalid",
                    violations,
                }),
            )
                .into_response()
        }
        Err(SubmitError::Append { error, request }) => (
            StatusCode::BAD_GATEWAY,
            Json(AppendFailedResponse {
                status: "error",
                message: error.to_string(),
                request: *request,
            }),
        )
            .into_response(),
    }
}

async fn list_requests(State(state): State<Arc<AppState>>) -> Response {
    let read = state.requests.get_table().await;
    Json(TableResponse {
        source: read.state(),
        schema: read.table.schema(),
        rows: read.table.rows(),
    })
    .into_response()
}

async fn get_dashboard(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let read = state.requests.get_table().await;
    Json(dashboard::report(&read, &state.columns))
}

async fn export_csv(State(state): State<Arc<AppState>>) -> Response {
    let read = state.requests.get_table().await;
    if let Some(e) = read.error {
        return unavailable(e.to_string());
    }
    (
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (header::CONTENT_DISPOSITION, "attachment; filename=\"requests.csv\""),
        ],
        downloader::to_csv(&read.table),
    )
        .into_response()
}

async fn export_xlsx(State(state): State<Arc<AppState>>) -> Response {
    let read = state.requests.get_table().await;
    if let Some(e) = read.error {
        return unavailable(e.to_string());
    }
    match downloader::to_xlsx(&read.table) {
        Ok(bytes) => (
            [
                (
                    header::CONTENT_TYPE,
                    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
                ),
                (header::CONTENT_DISPOSITION, "attachment; filename=\"requests.xlsx\""),
            ],
            bytes,
        )
            .into_response(),
        Err(e) => {
            log::error!("XLSX export failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    status: "error",
                    message: e.to_string(),
                }),
            )
                .into_response()
        }
    }
}

fn unavailable(message: String) -> Response {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(ErrorResponse {
            status: "unreachable",
            message,
        }),
    )
        .into_response()
}
