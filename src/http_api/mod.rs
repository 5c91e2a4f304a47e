use std::{net::SocketAddr, sync::Arc};

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{
    DistributeError, DistributorConfig, PersistenceError, ScheduleBuilder, ScheduleRow,
    ScheduleSummary, SqliteStore, calendar::parse_date, distributor,
};

#[derive(Clone)]
pub struct AppState {
    store: Arc<SqliteStore>,
    config: Arc<DistributorConfig>,
}

impl AppState {
    pub fn new(store: SqliteStore, config: DistributorConfig) -> Self {
        Self {
            store: Arc::new(store),
            config: Arc::new(config),
        }
    }

    fn builder(&self, start: Option<&str>) -> Result<ScheduleBuilder, ApiError> {
        let start_date = match start {
            Some(raw) => parse_date(raw).map_err(|err| ApiError::invalid(err.to_string()))?,
            None => self
                .config
                .start_date_now()
                .map_err(|err| ApiError::internal(err.to_string()))?,
        };
        Ok(ScheduleBuilder::new(start_date).with_days(self.config.days))
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
    Invalid(String),
    Internal(String),
}

impl ApiError {
    fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    fn invalid(message: impl Into<String>) -> Self {
        ApiError::Invalid(message.into())
    }

    fn internal(message: impl Into<String>) -> Self {
        ApiError::Internal(message.into())
    }
}

impl From<DistributeError> for ApiError {
    fn from(value: DistributeError) -> Self {
        match value {
            DistributeError::Schedule { .. } => ApiError::Invalid(value.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<PersistenceError> for ApiError {
    fn from(value: PersistenceError) -> Self {
        ApiError::Internal(value.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error, message) = match self {
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, "not_found", message),
            ApiError::Invalid(message) => (StatusCode::BAD_REQUEST, "invalid_request", message),
            ApiError::Internal(message) => {
                tracing::error!(%message, "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", message)
            }
        };
        (status, Json(ErrorBody { error, message })).into_response()
    }
}

#[derive(Debug, Default, Deserialize)]
struct PlanQuery {
    start: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct DistributePayload {
    #[serde(default)]
    start_date: Option<String>,
}

#[derive(Serialize)]
struct DistributeResponse {
    rows_written: usize,
    #[serde(flatten)]
    summary: ScheduleSummary,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/plan", get(plan_schedule))
        .route("/distribute", post(distribute_sites))
        .route("/rows", get(list_rows))
        .route("/rows/:apply_on", get(get_row))
        .with_state(state)
}

pub async fn serve(
    addr: SocketAddr,
    store: SqliteStore,
    config: DistributorConfig,
) -> std::io::Result<()> {
    let state = AppState::new(store, config);
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

async fn plan_schedule(
    State(state): State<AppState>,
    Query(query): Query<PlanQuery>,
) -> Result<Json<ScheduleSummary>, ApiError> {
    let builder = state.builder(query.start.as_deref())?;
    let schedule = distributor::plan(state.store.as_ref(), &builder)?;
    Ok(Json(schedule.summary()))
}

async fn distribute_sites(
    State(state): State<AppState>,
    Json(payload): Json<DistributePayload>,
) -> Result<Json<DistributeResponse>, ApiError> {
    let builder = state.builder(payload.start_date.as_deref())?;
    let store = state.store.as_ref();
    let outcome = distributor::distribute(store, store, &builder)?;
    Ok(Json(DistributeResponse {
        rows_written: outcome.rows_written,
        summary: outcome.schedule.summary(),
    }))
}

async fn list_rows(State(state): State<AppState>) -> Result<Json<Vec<ScheduleRow>>, ApiError> {
    Ok(Json(state.store.list_rows()?))
}

async fn get_row(
    State(state): State<AppState>,
    Path(apply_on): Path<String>,
) -> Result<Json<ScheduleRow>, ApiError> {
    let date: NaiveDate =
        parse_date(&apply_on).map_err(|err| ApiError::invalid(err.to_string()))?;
    match state.store.find_by_apply_on(date)? {
        Some(row) => Ok(Json(row)),
        None => Err(ApiError::not_found(format!("no schedule row for {date}"))),
    }
}
