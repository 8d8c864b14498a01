//! HTTP API surface.

use axum::extract::{Query, State};
use axum::http::Request;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use subtle::ConstantTimeEq;
use tower_http::limit::RequestBodyLimitLayer;
use tracing::warn;

use crate::error::MnemoError;
use crate::{embed, AppState};

mod focus;
mod memory;
mod search;
mod teams;

use focus::*;
use memory::*;
use search::*;
use teams::*;

/// Run a blocking closure on the spawn_blocking pool and map JoinError.
async fn blocking<T, F>(f: F) -> Result<T, MnemoError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| MnemoError::Internal(e.to_string()))
}

fn read_rss_kb() -> u64 {
    #[cfg(target_os = "linux")]
    {
        std::fs::read_to_string("/proc/self/statm")
            .ok()
            .and_then(|s| s.split_whitespace().nth(1)?.parse::<u64>().ok())
            .map(|pages| pages * 4)
            .unwrap_or(0)
    }
    #[cfg(not(target_os = "linux"))]
    {
        0
    }
}

/// Tenant from the X-Tenant header; body/query fields take precedence at
/// each handler. None means "default".
fn header_tenant(headers: &axum::http::HeaderMap) -> Option<String> {
    headers
        .get("x-tenant")
        .and_then(|v| v.to_str().ok())
        .map(std::string::ToString::to_string)
        .filter(|s| !s.is_empty())
}

/// Acting user from the X-Actor header.
fn header_actor(headers: &axum::http::HeaderMap) -> Option<String> {
    headers
        .get("x-actor")
        .and_then(|v| v.to_str().ok())
        .map(std::string::ToString::to_string)
        .filter(|s| !s.is_empty())
}

/// Auth middleware: checks Bearer token if MNEMO_API_KEY is configured.
async fn require_auth(
    State(state): State<AppState>,
    req: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, MnemoError> {
    let Some(ref expected) = state.api_key else {
        return Ok(next.run(req).await);
    };

    let unauthorized = || MnemoError::Unauthorized;

    let header = req
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(unauthorized)?;

    let token = header.strip_prefix("Bearer ").ok_or_else(unauthorized)?;

    // constant-time comparison to prevent timing attacks
    if token.as_bytes().ct_eq(expected.as_bytes()).into() {
        Ok(next.run(req).await)
    } else {
        Err(unauthorized())
    }
}

pub fn router(state: AppState) -> Router {
    let public = Router::new()
        .route("/", get(index))
        .route("/health", get(health_only))
        .route("/stats", get(stats));

    let protected = Router::new()
        .route("/memories", post(create_memory).get(list_memories).delete(batch_delete))
        .route("/memories/batch", post(batch_create))
        .route(
            "/memories/{id}",
            get(get_memory).patch(update_memory).delete(delete_memory),
        )
        .route("/search", post(do_search).get(quick_search))
        .route("/recent", get(list_recent))
        .route("/focus", post(activate_focus).get(get_focus).delete(clear_focus))
        .route("/mode", get(get_mode).put(set_mode))
        .route("/sweep", post(do_sweep))
        .route("/trash", get(trash_list).delete(trash_purge))
        .route("/trash/{id}/restore", post(trash_restore))
        .route("/teams", post(upsert_team).get(list_teams))
        .route("/teams/{id}", delete(delete_team))
        .route("/ingest", post(do_ingest))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth));

    public
        .merge(protected)
        .layer(RequestBodyLimitLayer::new(64 * 1024))
        .with_state(state)
}

/// Shared health data (without endpoints) used by both `/` and `/health`.
async fn health_data(state: &AppState) -> serde_json::Value {
    let store = state.store.clone();
    let (s, indexed, trash, db_size_mb, last_sweep) = blocking(move || {
        let s = store.stats();
        let indexed = store.vec_index_len();
        let trash = store.trash_count().unwrap_or(0);
        let bytes = store.db_size_bytes();
        let mb = (bytes as f64 / 1048576.0 * 10.0).round() / 10.0;
        let last_sweep = store.get_meta("last_sweep_ms");
        (s, indexed, trash, mb, last_sweep)
    })
    .await
    .unwrap_or((crate::store::Stats::default(), 0, 0, 0.0, None));

    let uptime_secs = state.started_at.elapsed().as_secs();
    let rss_kb = read_rss_kb();
    let (cache_len, cache_cap, cache_hits, cache_misses) = state.embed_cache.stats();

    serde_json::json!({
        "name": "mnemo",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_secs": uptime_secs,
        "rss_kb": rss_kb,
        "db_size_mb": db_size_mb,
        "embed_enabled": state.embed.is_some(),
        "embed_cache": { "size": cache_len, "capacity": cache_cap, "hits": cache_hits, "misses": cache_misses },
        "vectors_indexed": indexed,
        "trash": trash,
        "last_sweep_ms": last_sweep,
        "stats": s,
    })
}

/// GET / — full index with health data + endpoint list.
async fn index(State(state): State<AppState>) -> Json<serde_json::Value> {
    let mut data = health_data(&state).await;
    if let Some(obj) = data.as_object_mut() {
        obj.insert("endpoints".to_string(), serde_json::json!({
            "GET /": "index with health data + endpoint list",
            "GET /health": "health only (uptime, rss, cache — no endpoints)",
            "GET /stats": "memory counts by privacy tier and category (?tenant=X)",
            "POST /memories": "create a memory (dedup + reinforcement on duplicates)",
            "POST /memories/batch": "batch create memories (body: [{content, ...}, ...])",
            "GET /memories": "list memories (?tenant=X&category=Y&privacy=N&tag=Z&limit=N)",
            "GET /memories/:id": "get a memory by id or short prefix",
            "PATCH /memories/:id": "update a memory",
            "DELETE /memories/:id": "delete a memory (recoverable via trash)",
            "DELETE /memories": "batch delete (body: {ids: [...]} or {tenant: 'x'})",
            "POST /search": "hybrid search (semantic + keyword, focus-boosted)",
            "GET /search?q=term": "quick keyword search",
            "GET /recent?hours=2": "recent memories by time",
            "POST /focus": "activate focus mode (body: {categories, minutes, boost})",
            "GET /focus": "active focus sessions",
            "DELETE /focus": "end focus mode early",
            "GET /mode": "tenant memory mode (persistent | humanized)",
            "PUT /mode": "toggle memory mode (body: {mode})",
            "POST /sweep": "run decay sweep now",
            "GET /trash": "deleted and forgotten memories (?limit=100)",
            "POST /trash/:id/restore": "restore a memory from trash",
            "DELETE /trash": "permanently purge all trash",
            "POST /teams": "create/update a team mapping",
            "GET /teams": "list team mappings (?tenant=X)",
            "DELETE /teams/:id": "delete a team mapping",
            "POST /ingest": "store a provider event via its team mapping",
        }));
    }
    Json(data)
}

/// GET /health — health data only (no endpoint list).
async fn health_only(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(health_data(&state).await)
}

async fn stats(
    State(state): State<AppState>,
    headers: axum::http::HeaderMap,
    Query(q): Query<std::collections::HashMap<String, String>>,
) -> Json<serde_json::Value> {
    let tenant = q.get("tenant").cloned().or_else(|| header_tenant(&headers));
    let store = state.store.clone();
    let is_global = tenant.is_none();
    let result = blocking(move || {
        let s = match &tenant {
            Some(t) => store.stats_tenant(t),
            None => store.stats(),
        };
        let mut v = serde_json::to_value(&s).unwrap_or_default();
        if is_global {
            let tenants = store.list_tenants().unwrap_or_default();
            v["tenants"] = serde_json::json!(tenants);
        }
        v
    })
    .await
    .unwrap_or_else(|_| serde_json::json!({"total":0,"personal":0,"team":0,"org":0}));
    Json(result)
}

/// Fire-and-forget: generate an embedding for a memory in the background.
fn spawn_embed(store: crate::SharedStore, cfg: embed::EmbedConfig, id: String, content: String) {
    tokio::spawn(async move {
        let mut attempts = 0;
        loop {
            attempts += 1;
            match embed::get_embeddings(&cfg, std::slice::from_ref(&content)).await {
                Ok(embs) if !embs.is_empty() => {
                    if let Some(emb) = embs.into_iter().next() {
                        let _ = tokio::task::spawn_blocking(move || store.set_embedding(&id, &emb))
                            .await;
                    }
                    return;
                }
                Err(e) if attempts < 3 => {
                    warn!(error = %e, attempt = attempts, "embedding failed, retrying");
                    tokio::time::sleep(std::time::Duration::from_secs(attempts * 2)).await;
                }
                Err(e) => {
                    warn!(error = %e, id = %id, "embedding failed after 3 attempts");
                    return;
                }
                _ => return,
            }
        }
    });
}

/// Batch embed: generate embeddings for multiple memories at once.
fn spawn_embed_batch(
    store: crate::SharedStore,
    cfg: embed::EmbedConfig,
    items: Vec<(String, String)>,
) {
    if items.is_empty() {
        return;
    }
    tokio::spawn(async move {
        let texts: Vec<String> = items.iter().map(|(_, c)| c.clone()).collect();
        let mut attempts = 0;
        loop {
            attempts += 1;
            match embed::get_embeddings(&cfg, &texts).await {
                Ok(embs) => {
                    for (emb, (id, _)) in embs.into_iter().zip(items.iter()) {
                        let store = store.clone();
                        let id = id.clone();
                        let _ = tokio::task::spawn_blocking(move || store.set_embedding(&id, &emb))
                            .await;
                    }
                    return;
                }
                Err(e) if attempts < 3 => {
                    warn!(error = %e, attempt = attempts, "batch embedding failed, retrying");
                    tokio::time::sleep(std::time::Duration::from_secs(attempts * 2)).await;
                }
                Err(e) => {
                    warn!(error = %e, "batch embedding failed after 3 attempts");
                    return;
                }
            }
        }
    });
}
