//! Team mapping handlers and the provider ingest endpoint.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use crate::error::MnemoError;
use crate::store::{Memory, MemoryInput, TeamMapping, TeamMappingInput};
use crate::AppState;

use super::{blocking, spawn_embed};

/// POST /teams — create or update a mapping. (provider, external_team) is
/// the natural key; re-posting updates the target tenant and defaults.
pub(super) async fn upsert_team(
    State(state): State<AppState>,
    Json(input): Json<TeamMappingInput>,
) -> Result<(StatusCode, Json<TeamMapping>), MnemoError> {
    let store = state.store.clone();
    let mapping = blocking(move || store.upsert_team_mapping(input)).await??;
    Ok((StatusCode::CREATED, Json(mapping)))
}

#[derive(Deserialize)]
pub(super) struct TeamsQuery {
    tenant: Option<String>,
}

/// GET /teams — list mappings, optionally scoped to one tenant.
pub(super) async fn list_teams(
    State(state): State<AppState>,
    Query(q): Query<TeamsQuery>,
) -> Result<Json<Vec<TeamMapping>>, MnemoError> {
    let store = state.store.clone();
    let rows = blocking(move || store.list_team_mappings(q.tenant.as_deref())).await??;
    Ok(Json(rows))
}

/// DELETE /teams/{id}
pub(super) async fn delete_team(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, MnemoError> {
    let store = state.store.clone();
    let deleted = blocking(move || store.delete_team_mapping(&id)).await??;
    if !deleted {
        return Err(MnemoError::NotFound);
    }
    Ok(Json(serde_json::json!({"deleted": true})))
}

#[derive(Deserialize)]
pub(super) struct IngestRequest {
    provider: String,
    team: String,
    content: String,
    owner: Option<String>,
    category: Option<String>,
    privacy: Option<u8>,
    importance: Option<f64>,
    tags: Option<Vec<String>>,
}

/// POST /ingest — store a provider event through its team mapping. The
/// mapping decides the tenant and supplies category/privacy defaults; the
/// event may override both.
pub(super) async fn do_ingest(
    State(state): State<AppState>,
    Json(req): Json<IngestRequest>,
) -> Result<(StatusCode, Json<Memory>), MnemoError> {
    let store = state.store.clone();
    let mem = blocking(move || -> Result<Memory, MnemoError> {
        let provider = req.provider.trim().to_lowercase();
        let team = req.team.trim();
        let mapping = store
            .resolve_team(&provider, team)?
            .ok_or_else(|| MnemoError::UnknownTeam(format!("{provider}/{team}")))?;

        let input = MemoryInput {
            content: req.content,
            tenant: Some(mapping.tenant),
            owner: req.owner,
            category: req.category.or(Some(mapping.default_category)),
            privacy: req.privacy.or(Some(mapping.default_privacy)),
            importance: req.importance,
            source: Some(provider),
            tags: req.tags,
            skip_dedup: None,
        };
        store.insert(input)
    })
    .await??;

    let status = if mem.repetition_count > 0 {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };

    if mem.embedding.is_none() {
        if let Some(cfg) = state.embed.clone() {
            spawn_embed(state.store.clone(), cfg, mem.id.clone(), mem.content.clone());
        }
    }

    Ok((status, Json(mem)))
}
