//! Memory CRUD and trash handlers.

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::Deserialize;

use crate::error::MnemoError;
use crate::store::{Memory, MemoryInput, TrashEntry};
use crate::AppState;

use super::{blocking, header_actor, header_tenant, spawn_embed, spawn_embed_batch};

/// Fill tenant/owner from headers where the body left them out.
fn apply_headers(mut input: MemoryInput, headers: &HeaderMap) -> MemoryInput {
    if input.tenant.is_none() {
        input.tenant = header_tenant(headers);
    }
    if input.owner.is_none() {
        input.owner = header_actor(headers);
    }
    input
}

/// POST /memories — create a memory. Duplicate content (exact or near) in
/// the same tenant reinforces the existing memory instead; 200 vs 201
/// distinguishes the two.
pub(super) async fn create_memory(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(input): Json<MemoryInput>,
) -> Result<(StatusCode, Json<Memory>), MnemoError> {
    let input = apply_headers(input, &headers);
    let store = state.store.clone();
    let mem = blocking(move || store.insert(input)).await??;

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

/// POST /memories/batch — bulk insert, no dedup, one transaction.
pub(super) async fn batch_create(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(inputs): Json<Vec<MemoryInput>>,
) -> Result<(StatusCode, Json<serde_json::Value>), MnemoError> {
    if inputs.is_empty() {
        return Err(MnemoError::Validation("empty batch".into()));
    }
    if inputs.len() > 500 {
        return Err(MnemoError::Validation("batch too large (max 500)".into()));
    }
    let requested = inputs.len();
    let inputs: Vec<MemoryInput> = inputs
        .into_iter()
        .map(|i| apply_headers(i, &headers))
        .collect();

    let store = state.store.clone();
    let memories = blocking(move || store.insert_batch(inputs)).await??;

    if let Some(cfg) = state.embed.clone() {
        let items: Vec<(String, String)> = memories
            .iter()
            .map(|m| (m.id.clone(), m.content.clone()))
            .collect();
        spawn_embed_batch(state.store.clone(), cfg, items);
    }

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "inserted": memories.len(),
            "skipped": requested - memories.len(),
            "memories": memories,
        })),
    ))
}

/// GET /memories/{id} — id may be a short prefix.
pub(super) async fn get_memory(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Memory>, MnemoError> {
    let store = state.store.clone();
    let mem = blocking(move || {
        let full_id = store.resolve_prefix(&id)?;
        store.get(&full_id)?.ok_or(MnemoError::NotFound)
    })
    .await??;
    Ok(Json(mem))
}

#[derive(Deserialize)]
pub(super) struct UpdateMemory {
    content: Option<String>,
    category: Option<String>,
    privacy: Option<u8>,
    importance: Option<f64>,
    tags: Option<Vec<String>>,
}

/// PATCH /memories/{id} — partial update. Changing the content drops the
/// stale embedding; a fresh one is generated in the background.
pub(super) async fn update_memory(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(update): Json<UpdateMemory>,
) -> Result<Json<Memory>, MnemoError> {
    let store = state.store.clone();
    let mem = blocking(move || {
        let full_id = store.resolve_prefix(&id)?;
        store
            .update_fields(
                &full_id,
                update.content.as_deref(),
                update.category.as_deref(),
                update.privacy,
                update.importance,
                update.tags.as_deref(),
            )?
            .ok_or(MnemoError::NotFound)
    })
    .await??;

    if mem.embedding.is_none() {
        if let Some(cfg) = state.embed.clone() {
            spawn_embed(state.store.clone(), cfg, mem.id.clone(), mem.content.clone());
        }
    }

    Ok(Json(mem))
}

/// DELETE /memories/{id} — moves to trash, recoverable.
pub(super) async fn delete_memory(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, MnemoError> {
    let store = state.store.clone();
    let deleted = blocking(move || {
        let full_id = store.resolve_prefix(&id)?;
        store.delete(&full_id)
    })
    .await??;
    if !deleted {
        return Err(MnemoError::NotFound);
    }
    Ok(Json(serde_json::json!({"deleted": true})))
}

#[derive(Deserialize)]
pub(super) struct ListQuery {
    limit: Option<usize>,
    offset: Option<usize>,
    tenant: Option<String>,
    category: Option<String>,
    privacy: Option<u8>,
    tag: Option<String>,
}

/// GET /memories — filtered listing, newest first.
pub(super) async fn list_memories(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(q): Query<ListQuery>,
) -> Result<Json<Vec<Memory>>, MnemoError> {
    let limit = q.limit.unwrap_or(50).min(500);
    let offset = q.offset.unwrap_or(0);
    let tenant = q.tenant.or_else(|| header_tenant(&headers));
    let store = state.store.clone();
    let rows = blocking(move || {
        store.list_filtered(
            limit,
            offset,
            tenant.as_deref(),
            q.category.as_deref(),
            q.privacy,
            q.tag.as_deref(),
        )
    })
    .await??;
    Ok(Json(rows))
}

#[derive(Deserialize)]
pub(super) struct BatchDelete {
    ids: Option<Vec<String>>,
    tenant: Option<String>,
}

/// DELETE /memories — bulk delete by explicit ids, or wipe a whole tenant.
pub(super) async fn batch_delete(
    State(state): State<AppState>,
    Json(req): Json<BatchDelete>,
) -> Result<Json<serde_json::Value>, MnemoError> {
    let store = state.store.clone();
    let deleted = blocking(move || -> Result<usize, MnemoError> {
        if let Some(ids) = req.ids {
            let mut n = 0;
            for id in &ids {
                let full_id = match store.resolve_prefix(id) {
                    Ok(f) => f,
                    Err(MnemoError::NotFound) => continue,
                    Err(e) => return Err(e),
                };
                if store.delete(&full_id)? {
                    n += 1;
                }
            }
            Ok(n)
        } else if let Some(tenant) = req.tenant {
            store.delete_tenant(&tenant)
        } else {
            Err(MnemoError::Validation("provide ids or tenant".into()))
        }
    })
    .await??;
    Ok(Json(serde_json::json!({"deleted": deleted})))
}

#[derive(Deserialize)]
pub(super) struct TrashQuery {
    limit: Option<usize>,
    offset: Option<usize>,
}

/// GET /trash — deleted and forgotten memories, newest deletion first.
pub(super) async fn trash_list(
    State(state): State<AppState>,
    Query(q): Query<TrashQuery>,
) -> Result<Json<Vec<TrashEntry>>, MnemoError> {
    let limit = q.limit.unwrap_or(100).min(1000);
    let offset = q.offset.unwrap_or(0);
    let store = state.store.clone();
    let rows = blocking(move || store.trash_list(limit, offset)).await??;
    Ok(Json(rows))
}

/// POST /trash/{id}/restore — bring a memory back with a fresh access clock.
pub(super) async fn trash_restore(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, MnemoError> {
    let store = state.store.clone();
    let restored = blocking(move || store.trash_restore(&id)).await??;
    if !restored {
        return Err(MnemoError::NotFound);
    }
    Ok(Json(serde_json::json!({"restored": true})))
}

/// DELETE /trash — permanent purge.
pub(super) async fn trash_purge(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, MnemoError> {
    let store = state.store.clone();
    let purged = blocking(move || store.trash_purge()).await??;
    Ok(Json(serde_json::json!({"purged": purged})))
}
