use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::admin::AppState;
use crate::reconcile::{PassReport, ReconcilerError};
use crate::registry::ServiceRecord;

#[derive(Debug, Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub cached_services: usize,
    pub last_pass: Option<PassSummary>,
}

#[derive(Debug, Serialize)]
pub struct PassSummary {
    pub id: String,
    pub clean: bool,
    pub failures: usize,
    pub duration_ms: u64,
}

impl From<&PassReport> for PassSummary {
    fn from(report: &PassReport) -> Self {
        Self {
            id: report.id.to_string(),
            clean: report.is_clean(),
            failures: report.failures.len(),
            duration_ms: report.duration_ms,
        }
    }
}

fn unavailable(e: ReconcilerError) -> StatusCode {
    tracing::error!(error = %e, "Admin request failed");
    StatusCode::SERVICE_UNAVAILABLE
}

pub async fn get_status(State(state): State<AppState>) -> Result<Json<SystemStatus>, StatusCode> {
    let services = state.reconciler.services().await.map_err(unavailable)?;
    let last = state.reconciler.last_report().await.map_err(unavailable)?;

    Ok(Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        cached_services: services.len(),
        last_pass: last.as_ref().map(PassSummary::from),
    }))
}

pub async fn get_services(
    State(state): State<AppState>,
) -> Result<Json<Vec<ServiceRecord>>, StatusCode> {
    let services = state.reconciler.services().await.map_err(unavailable)?;
    Ok(Json(services))
}

pub async fn get_report(State(state): State<AppState>) -> Result<Json<PassReport>, StatusCode> {
    match state.reconciler.last_report().await.map_err(unavailable)? {
        Some(report) => Ok(Json(report)),
        None => Err(StatusCode::NOT_FOUND),
    }
}
