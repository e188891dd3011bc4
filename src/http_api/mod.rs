use std::{net::SocketAddr, sync::Arc};

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use log::info;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{
    NewStore, PersistenceError, PlanningReader, ReconciliationReport, ReconciliationSummary,
    StoreMaster, ValidatorConfig, ValidatorError, admin, export_file_name, load_required_master,
    persistence::MasterStore, validate_planning,
};

pub const ADMIN_SECRET_HEADER: &str = "x-admin-secret";

#[derive(Clone)]
pub struct AppState {
    master: Arc<dyn MasterStore + Send + Sync>,
    config: Arc<ValidatorConfig>,
}

impl AppState {
    pub fn new<S>(master: S, config: ValidatorConfig) -> Self
    where
        S: MasterStore + Send + Sync + 'static,
    {
        Self {
            master: Arc::new(master),
            config: Arc::new(config),
        }
    }

    fn is_admin(&self, headers: &HeaderMap) -> bool {
        headers
            .get(ADMIN_SECRET_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(|candidate| admin::check_secret(candidate, self.config.admin_secret.as_deref()))
            .unwrap_or(false)
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    message: String,
}

#[derive(Debug)]
enum ApiError {
    NotFound(String),
    Conflict(String),
    Invalid(String),
    Unauthorized(String),
    Internal(String),
}

impl From<ValidatorError> for ApiError {
    fn from(value: ValidatorError) -> Self {
        let message = value.to_string();
        match value {
            ValidatorError::InvalidDate { .. } | ValidatorError::EmptyPlanning => {
                ApiError::Invalid(message)
            }
            ValidatorError::DuplicateStoreId(_) => ApiError::Conflict(message),
            ValidatorError::StoreNotFound(_) => ApiError::NotFound(message),
            ValidatorError::Unauthorized => ApiError::Unauthorized(message),
            ValidatorError::Persistence(
                PersistenceError::InvalidData(_)
                | PersistenceError::Csv(_)
                | PersistenceError::SpreadsheetRead(_),
            ) => ApiError::Invalid(message),
            ValidatorError::MissingMasterTable(_) | ValidatorError::Persistence(_) => {
                ApiError::Internal(message)
            }
        }
    }
}

impl From<PersistenceError> for ApiError {
    fn from(value: PersistenceError) -> Self {
        ApiError::from(ValidatorError::from(value))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error, message) = match self {
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, "not_found", message),
            ApiError::Conflict(message) => (StatusCode::CONFLICT, "conflict", message),
            ApiError::Invalid(message) => (StatusCode::BAD_REQUEST, "invalid_request", message),
            ApiError::Unauthorized(message) => (StatusCode::UNAUTHORIZED, "unauthorized", message),
            ApiError::Internal(message) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", message)
            }
        };
        (status, Json(ErrorBody { error, message })).into_response()
    }
}

#[derive(Debug, Deserialize)]
struct DeliverySpecPayload {
    delivery_spec: String,
}

#[derive(Debug, Deserialize)]
struct ValidateQuery {
    #[serde(default)]
    collapse: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct ValidateResponse {
    pub report: ReconciliationReport,
    pub summary: ReconciliationSummary,
    pub weekend_mode: bool,
    pub export_file_name: String,
    pub collapsed_verdicts: Option<Vec<String>>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/stores", get(list_stores).post(create_store))
        .route("/stores/:id", get(get_store))
        .route("/stores/:id/delivery_spec", put(update_delivery_spec))
        .route("/validate", post(validate))
        .with_state(state)
}

pub async fn serve(addr: SocketAddr, state: AppState) -> std::io::Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("planning-validator HTTP API listening on http://{addr}");
    axum::serve(listener, app).await
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

async fn list_stores(State(state): State<AppState>) -> Result<Json<Vec<StoreMaster>>, ApiError> {
    let table = load_required_master(state.master.as_ref())?;
    Ok(Json(table.stores().to_vec()))
}

async fn get_store(
    State(state): State<AppState>,
    Path(store_id): Path<i64>,
) -> Result<Json<StoreMaster>, ApiError> {
    let table = load_required_master(state.master.as_ref())?;
    table
        .get(store_id)
        .cloned()
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("store {store_id} not found")))
}

async fn create_store(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<NewStore>,
) -> Result<(StatusCode, Json<StoreMaster>), ApiError> {
    let authenticated = state.is_admin(&headers);
    let store = payload.into_master(&state.config);
    let created = admin::add_store(state.master.as_ref(), authenticated, store)?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn update_delivery_spec(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(store_id): Path<i64>,
    Json(payload): Json<DeliverySpecPayload>,
) -> Result<Json<StoreMaster>, ApiError> {
    let authenticated = state.is_admin(&headers);
    let updated = admin::update_delivery_spec(
        state.master.as_ref(),
        authenticated,
        store_id,
        payload.delivery_spec,
    )?;
    Ok(Json(updated))
}

/// Body is the planning table as delimited text (UTF-8 or Windows-1252) or
/// an xlsx workbook.
async fn validate(
    State(state): State<AppState>,
    Query(query): Query<ValidateQuery>,
    body: Bytes,
) -> Result<Json<ValidateResponse>, ApiError> {
    let master = load_required_master(state.master.as_ref())?;
    let planned = PlanningReader::from_config(&state.config).read_bytes(body.to_vec())?;
    let report = validate_planning(&master, &planned)?;

    let collapse = query.collapse.unwrap_or(state.config.collapse_verdicts);
    let collapsed_verdicts = collapse.then(|| {
        report
            .rows()
            .map(|row| row.verdict.collapsed_label().to_string())
            .collect()
    });

    Ok(Json(ValidateResponse {
        summary: report.summary(),
        weekend_mode: report.weekend_mode(),
        export_file_name: export_file_name(
            report.reference_date,
            report.reference_day,
            state.config.export_format,
        ),
        collapsed_verdicts,
        report,
    }))
}
