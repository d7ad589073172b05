use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;
use crate::model::{CheckDefinition, CheckId, CheckResult, CheckType, Target, TargetId, TargetKind};
use crate::scheduler::{CheckScheduler, ScheduleOutcome, UnscheduleOutcome, MIN_INTERVAL_SECONDS};
use crate::store::{MemoryStore, StoreError};

/// Shared handles the REST handlers work against.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<MemoryStore>,
    pub scheduler: Arc<CheckScheduler>,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("{0}")]
    Validation(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Store(StoreError::TargetNotFound(_))
            | ApiError::Store(StoreError::CheckNotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Store(StoreError::CheckTargetMismatch { .. })
            | ApiError::Validation(_) => StatusCode::BAD_REQUEST,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateTargetRequest {
    pub name: String,
    pub address: String,
    pub kind: TargetKind,
    #[serde(default)]
    pub enabled: bool,
}

#[derive(Debug, Deserialize)]
pub struct CreateCheckRequest {
    pub check_type: CheckType,
    #[serde(default)]
    pub parameters: Option<String>,
    pub interval_seconds: u64,
}

#[derive(Debug, Serialize)]
pub struct CheckDto {
    pub id: CheckId,
    pub check_type: CheckType,
    pub parameters: Option<String>,
    pub interval_seconds: u64,
}

impl From<&CheckDefinition> for CheckDto {
    fn from(check: &CheckDefinition) -> Self {
        CheckDto {
            id: check.id,
            check_type: check.check_type,
            parameters: check.parameters.clone(),
            interval_seconds: check.interval_seconds,
        }
    }
}

/// Results for one check, newest first.
#[derive(Debug, Serialize)]
pub struct CheckResultsDto {
    pub check_id: CheckId,
    pub check_type: CheckType,
    pub parameters: Option<String>,
    pub results: Vec<CheckResult>,
}

#[derive(Debug, Serialize)]
struct ServerInfo {
    name: &'static str,
    version: &'static str,
    targets: usize,
    scheduled_checks: usize,
}

pub struct Server {
    is_running: bool,
    handle: Option<JoinHandle<()>>,
}

impl Server {
    pub fn new() -> Self {
        Server {
            is_running: false,
            handle: None,
        }
    }

    pub async fn start(&mut self, config: &ServerConfig, state: AppState) -> Result<(), ()> {
        if self.is_running {
            warn!("Server is already running.");
            return Err(());
        }

        let app = router(state);
        let addr = format!("{}:{}", config.address, config.port);
        debug!("Binding to {}", addr);
        let listener = match TcpListener::bind(&addr).await {
            Ok(listener) => listener,
            Err(e) => {
                error!("Failed to bind to {}: {}", addr, e);
                return Err(());
            }
        };
        match listener.local_addr() {
            Ok(local) => info!("Listening on http://{}", local),
            Err(e) => {
                error!("Failed to read the bound address: {}", e);
                return Err(());
            }
        }
        self.is_running = true;
        self.handle = Some(tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                error!("Server error: {}", e);
            }
        }));
        info!("Server started.");
        Ok(())
    }

    pub async fn stop(&mut self) {
        if !self.is_running {
            return;
        }

        self.is_running = false;
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
        info!("Server stopped.");
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/info", get(info_handler))
        .route("/api/v1/targets", post(create_target).get(list_targets))
        .route(
            "/api/v1/targets/{target_id}/checks",
            post(add_check).get(list_checks),
        )
        .route(
            "/api/v1/targets/{target_id}/checks/{check_id}",
            delete(delete_check),
        )
        .route("/api/v1/targets/{target_id}/results", get(target_results))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn info_handler(State(state): State<AppState>) -> Json<ServerInfo> {
    Json(ServerInfo {
        name: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        targets: state.store.list_targets().len(),
        scheduled_checks: state.scheduler.active_checks(),
    })
}

async fn create_target(
    State(state): State<AppState>,
    Json(request): Json<CreateTargetRequest>,
) -> (StatusCode, Json<Target>) {
    let target = state.store.create_target(
        request.name,
        request.address,
        request.kind,
        request.enabled,
    );
    (StatusCode::CREATED, Json((*target).clone()))
}

async fn list_targets(State(state): State<AppState>) -> Json<Vec<Target>> {
    Json(
        state
            .store
            .list_targets()
            .iter()
            .map(|t| (**t).clone())
            .collect(),
    )
}

async fn add_check(
    State(state): State<AppState>,
    Path(target_id): Path<TargetId>,
    Json(request): Json<CreateCheckRequest>,
) -> Result<(StatusCode, Json<CheckDto>), ApiError> {
    if request.interval_seconds < MIN_INTERVAL_SECONDS {
        return Err(ApiError::Validation(format!(
            "interval_seconds must be at least {}",
            MIN_INTERVAL_SECONDS
        )));
    }

    let check = state.store.add_check(
        target_id,
        request.check_type,
        request.parameters,
        request.interval_seconds,
    )?;
    if check.target.enabled {
        match state.scheduler.schedule(check.clone()) {
            ScheduleOutcome::Scheduled => {}
            ScheduleOutcome::AlreadyScheduled => {
                warn!("Check {} was already scheduled.", check.id)
            }
            ScheduleOutcome::Rejected(reason) => {
                warn!("Check {} was created but not scheduled: {}", check.id, reason)
            }
        }
    } else {
        warn!(
            "Check {} was created for disabled target '{}'. It will not be scheduled.",
            check.id, check.target.name
        );
    }
    Ok((StatusCode::CREATED, Json(CheckDto::from(&check))))
}

async fn list_checks(
    State(state): State<AppState>,
    Path(target_id): Path<TargetId>,
) -> Result<Json<Vec<CheckDto>>, ApiError> {
    let checks = state.store.checks_for_target(target_id)?;
    Ok(Json(checks.iter().map(CheckDto::from).collect()))
}

async fn delete_check(
    State(state): State<AppState>,
    Path((target_id, check_id)): Path<(TargetId, CheckId)>,
) -> Result<StatusCode, ApiError> {
    state.store.delete_check(target_id, check_id)?;
    match state.scheduler.unschedule(check_id) {
        UnscheduleOutcome::Unscheduled => info!("Deleted and unscheduled check {}.", check_id),
        UnscheduleOutcome::NotFound => {
            debug!("Deleted check {}; it had no scheduled task.", check_id)
        }
    }
    Ok(StatusCode::NO_CONTENT)
}

async fn target_results(
    State(state): State<AppState>,
    Path(target_id): Path<TargetId>,
) -> Result<Json<Vec<CheckResultsDto>>, ApiError> {
    let grouped = state.store.results_for_target(target_id)?;
    let dtos = grouped
        .into_iter()
        .map(|(check, results)| CheckResultsDto {
            check_id: check.id,
            check_type: check.check_type,
            parameters: check.parameters,
            results,
        })
        .collect();
    Ok(Json(dtos))
}
