//! # Debug Variables
//!
//! GET /v1/debug/vars: request counters plus admission-control state.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use crate::middleware::metrics::MetricsSnapshot;
use crate::state::AppState;

/// Admission-control counters.
#[derive(Debug, Serialize)]
pub struct AdmissionVars {
    pub enabled: bool,
    pub tracked_clients: usize,
    pub rejected: u64,
}

/// Body of `/v1/debug/vars`.
#[derive(Debug, Serialize)]
pub struct DebugVars {
    #[serde(flatten)]
    pub metrics: MetricsSnapshot,
    pub admission: AdmissionVars,
}

/// Build the debug router.
pub fn router() -> Router<AppState> {
    Router::new().route("/v1/debug/vars", get(vars))
}

async fn vars(State(state): State<AppState>) -> Json<DebugVars> {
    Json(DebugVars {
        metrics: state.metrics.snapshot(),
        admission: AdmissionVars {
            enabled: state.admission.is_enabled(),
            tracked_clients: state.admission.len(),
            rejected: state.admission.rejected(),
        },
    })
}
