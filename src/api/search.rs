//! Search handlers: hybrid search, quick keyword lookup, recent listing.

use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;
use tracing::warn;

use crate::error::MnemoError;
use crate::recall::{self, SearchRequest, SearchResponse};
use crate::scoring::MemoryResult;
use crate::store::Memory;
use crate::{embed, AppState};

use super::{blocking, header_actor, header_tenant};

/// Embed the query, going through the LRU cache first. Falls back to None
/// (keyword-only search) when embeddings are unavailable or the backend
/// errors out.
async fn query_embedding(state: &AppState, query: &str) -> Option<Vec<f32>> {
    let cfg = state.embed.as_ref()?;
    if let Some(cached) = state.embed_cache.get(query) {
        return Some(cached);
    }
    match embed::get_embeddings(cfg, std::slice::from_ref(&query.to_string())).await {
        Ok(mut embs) if !embs.is_empty() => {
            let emb = embs.swap_remove(0);
            state.embed_cache.insert(query.to_string(), emb.clone());
            Some(emb)
        }
        Ok(_) => None,
        Err(e) => {
            warn!(error = %e, "query embedding failed, keyword-only search");
            None
        }
    }
}

/// POST /search — hybrid semantic + keyword search with focus boosting.
pub(super) async fn do_search(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(mut req): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, MnemoError> {
    if req.query.trim().is_empty() {
        return Err(MnemoError::EmptyQuery);
    }
    if req.tenant.is_none() {
        req.tenant = header_tenant(&headers);
    }
    if req.actor.is_none() {
        req.actor = header_actor(&headers);
    }

    let emb = query_embedding(&state, &req.query).await;
    let store = state.store.clone();
    let resp = blocking(move || recall::search(&store, &req, emb.as_deref())).await?;
    Ok(Json(resp))
}

#[derive(Deserialize)]
pub(super) struct QuickQuery {
    q: String,
    limit: Option<usize>,
    tenant: Option<String>,
    actor: Option<String>,
}

/// GET /search?q=term — keyword-only search returning compact results.
pub(super) async fn quick_search(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(q): Query<QuickQuery>,
) -> Result<Json<Vec<MemoryResult>>, MnemoError> {
    if q.q.trim().is_empty() {
        return Err(MnemoError::EmptyQuery);
    }
    let req = SearchRequest {
        query: q.q,
        tenant: q.tenant.or_else(|| header_tenant(&headers)),
        actor: q.actor.or_else(|| header_actor(&headers)),
        limit: q.limit,
        dry: true,
        ..Default::default()
    };
    let store = state.store.clone();
    let resp = blocking(move || recall::search(&store, &req, None)).await?;
    let results: Vec<MemoryResult> = resp
        .memories
        .iter()
        .map(|sm| MemoryResult::from_memory(&sm.memory, sm.score))
        .collect();
    Ok(Json(results))
}

#[derive(Deserialize)]
pub(super) struct RecentQuery {
    hours: Option<f64>,
    limit: Option<usize>,
    tenant: Option<String>,
}

/// GET /recent?hours=2 — memories created in the last N hours.
pub(super) async fn list_recent(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(q): Query<RecentQuery>,
) -> Result<Json<Vec<Memory>>, MnemoError> {
    let hours = q.hours.unwrap_or(24.0).clamp(0.01, 24.0 * 365.0);
    let limit = q.limit.unwrap_or(50).min(500);
    let tenant = q.tenant.or_else(|| header_tenant(&headers));
    let since = crate::store::now_ms() - (hours * 3_600_000.0) as i64;
    let store = state.store.clone();
    let rows = blocking(move || store.list_since(since, limit, tenant.as_deref())).await??;
    Ok(Json(rows))
}
