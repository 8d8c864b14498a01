//! Focus mode, tenant memory mode, and manual sweep handlers.

use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;

use crate::decay;
use crate::error::MnemoError;
use crate::store::{FocusSession, MemoryMode};
use crate::thresholds::{FOCUS_DEFAULT_BOOST, FOCUS_DEFAULT_MINUTES};
use crate::AppState;

use super::{blocking, header_tenant};

#[derive(Deserialize)]
pub(super) struct TenantQuery {
    tenant: Option<String>,
}

fn effective_tenant(q: Option<String>, headers: &HeaderMap) -> String {
    q.or_else(|| header_tenant(headers))
        .unwrap_or_else(crate::store::default_tenant)
}

#[derive(Deserialize)]
pub(super) struct FocusRequest {
    categories: Vec<String>,
    minutes: Option<u64>,
    boost: Option<f64>,
    tenant: Option<String>,
}

/// POST /focus — boost the given categories for a while. Re-activating a
/// category replaces its session rather than stacking boosts.
pub(super) async fn activate_focus(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<FocusRequest>,
) -> Result<Json<Vec<FocusSession>>, MnemoError> {
    let tenant = effective_tenant(req.tenant, &headers);
    let minutes = req.minutes.unwrap_or(FOCUS_DEFAULT_MINUTES);
    let boost = req.boost.unwrap_or(FOCUS_DEFAULT_BOOST);
    let store = state.store.clone();
    let sessions =
        blocking(move || store.activate_focus(&tenant, &req.categories, minutes, boost)).await??;
    Ok(Json(sessions))
}

/// GET /focus — active sessions for the tenant.
pub(super) async fn get_focus(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(q): Query<TenantQuery>,
) -> Result<Json<Vec<FocusSession>>, MnemoError> {
    let tenant = effective_tenant(q.tenant, &headers);
    let store = state.store.clone();
    let sessions = blocking(move || store.active_focus(&tenant)).await?;
    Ok(Json(sessions))
}

/// DELETE /focus — end all focus sessions for the tenant early.
pub(super) async fn clear_focus(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(q): Query<TenantQuery>,
) -> Result<Json<serde_json::Value>, MnemoError> {
    let tenant = effective_tenant(q.tenant, &headers);
    let store = state.store.clone();
    let cleared = blocking(move || store.clear_focus(&tenant)).await??;
    Ok(Json(serde_json::json!({"cleared": cleared})))
}

/// GET /mode — the tenant's memory lifecycle mode.
pub(super) async fn get_mode(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(q): Query<TenantQuery>,
) -> Result<Json<serde_json::Value>, MnemoError> {
    let tenant = effective_tenant(q.tenant, &headers);
    let store = state.store.clone();
    let (tenant, mode) = blocking(move || {
        let mode = store.tenant_mode(&tenant);
        (tenant, mode)
    })
    .await?;
    Ok(Json(serde_json::json!({"tenant": tenant, "mode": mode.as_str()})))
}

#[derive(Deserialize)]
pub(super) struct ModeRequest {
    mode: String,
    tenant: Option<String>,
}

/// PUT /mode — switch between persistent and humanized lifecycles.
pub(super) async fn set_mode(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<ModeRequest>,
) -> Result<Json<serde_json::Value>, MnemoError> {
    let tenant = effective_tenant(req.tenant, &headers);
    let mode = MemoryMode::parse(&req.mode)?;
    let store = state.store.clone();
    let tenant = blocking(move || -> Result<String, MnemoError> {
        store.set_tenant_mode(&tenant, mode)?;
        Ok(tenant)
    })
    .await??;
    Ok(Json(serde_json::json!({"tenant": tenant, "mode": mode.as_str()})))
}

/// POST /sweep — run the decay sweep immediately instead of waiting for the
/// background interval.
pub(super) async fn do_sweep(
    State(state): State<AppState>,
) -> Result<Json<decay::SweepReport>, MnemoError> {
    let store = state.store.clone();
    let report = blocking(move || decay::sweep(&store)).await?;
    Ok(Json(report))
}
