//! Hybrid retrieval: semantic + keyword search with privacy filtering,
//! focus boosting, and category-weighted ranking.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::decay;
use crate::scoring::category_weight;
use crate::store::{Memory, MemoryMode, MemoryStore, Privacy, ScoredMemory};
use crate::thresholds::FORGET_THRESHOLD;

// scoring weights — should add up to 1.0
// relevance is king: a perfectly relevant low-importance memory
// beats a vaguely related high-importance one
const WEIGHT_RELEVANCE: f64 = 0.6;
const WEIGHT_IMPORTANCE: f64 = 0.2;
const WEIGHT_RECENCY: f64 = 0.2;

/// Relevance assigned to keyword-only hits, scaled by normalized BM25.
/// Kept below the semantic floor so cosine-confirmed results rank first.
const FTS_ONLY_RELEVANCE: f64 = 0.5;

/// Search request parameters.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct SearchRequest {
    #[serde(default)]
    pub query: String,
    /// Tenant scope. Org-tier memories from other tenants are still visible.
    pub tenant: Option<String>,
    /// Acting user — unlocks their personal-tier memories.
    pub actor: Option<String>,
    pub limit: Option<usize>,
    /// Offset into the result set (applied after scoring/sorting).
    pub offset: Option<usize>,
    /// Drop results below this relevance threshold (0.0-1.0).
    pub min_score: Option<f64>,
    pub min_importance: Option<f64>,
    /// Highest privacy tier to include (1 personal, 2 team, 3 org).
    /// A ceiling of 2 keeps org-wide noise out of tenant-local queries.
    pub max_privacy: Option<u8>,
    /// Filter to these categories.
    pub categories: Option<Vec<String>>,
    /// Memory must have ALL specified tags.
    pub tags: Option<Vec<String>>,
    /// Only include memories created at or after this timestamp (unix ms).
    pub since: Option<i64>,
    /// Only include memories created at or before this timestamp (unix ms).
    pub until: Option<i64>,
    /// Sort order: "score" (default), "recent", or "accessed".
    pub sort_by: Option<String>,
    /// If true, skip touch/reinforcement on matched memories.
    /// Useful for background queries that shouldn't inflate access counts.
    #[serde(default)]
    pub dry: bool,
}

/// Search response with scored memories and metadata.
#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub memories: Vec<ScoredMemory>,
    /// Total results available (before offset/limit pagination).
    pub total: usize,
    pub offset: usize,
    pub limit: usize,
    pub search_mode: String,
    pub mode: MemoryMode,
    /// Active focus boosts applied to this search (category → multiplier).
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub focus: HashMap<String, f64>,
}

/// Recency score using the memory's own decay curve.
fn recency_score(last_accessed: i64, decay_rate: f64) -> f64 {
    let now = crate::store::now_ms();
    let hours = ((now - last_accessed) as f64 / 3_600_000.0).max(0.0);
    let rate = if decay_rate.is_finite() { decay_rate.clamp(0.0, 10.0) } else { 0.1 };
    (-rate * hours / 168.0).exp()
}

fn score_memory(mem: &Memory, relevance: f64, focus: &HashMap<String, f64>) -> ScoredMemory {
    let recency = recency_score(mem.last_accessed, mem.decay_rate);
    let base = WEIGHT_IMPORTANCE * mem.importance
        + WEIGHT_RECENCY * recency
        + WEIGHT_RELEVANCE * relevance;
    let boost = focus.get(&mem.category).copied().unwrap_or(1.0);
    // Cap at 1.0 — scores above 1 confuse callers and threshold logic
    let score = (base * category_weight(&mem.category) * boost).min(1.0);

    ScoredMemory { memory: mem.clone(), score, relevance, recency }
}

/// Can this request see the memory at all? Tenant scoping first, then the
/// privacy tier.
fn visible(mem: &Memory, tenant: &str, actor: Option<&str>) -> bool {
    match mem.privacy {
        Privacy::Org => true,
        Privacy::Team => mem.tenant == tenant,
        Privacy::Personal => mem.tenant == tenant && actor == Some(mem.owner.as_str()),
    }
}

/// Run a hybrid search.
///
/// Combines semantic search (if `query_emb` is provided) with FTS5 keyword
/// search, merges candidates, filters by privacy and retention, then ranks
/// with focus and category weighting.
pub fn search(
    db: &MemoryStore,
    req: &SearchRequest,
    query_emb: Option<&[f32]>,
) -> SearchResponse {
    let tenant = req.tenant.clone().unwrap_or_else(crate::store::default_tenant);
    let actor = req.actor.as_deref();
    let limit = req.limit.unwrap_or(20).min(100);
    let offset = req.offset.unwrap_or(0);
    let fetch_limit = (offset + limit).max(limit);
    let min_imp = req.min_importance.unwrap_or(0.0);
    let sort_by = req.sort_by.as_deref().unwrap_or("score");

    let mode = db.tenant_mode(&tenant);
    let focus = db.focus_boosts(&tenant);
    let now = crate::store::now_ms();

    let passes_filters = |mem: &Memory| -> bool {
        if !visible(mem, &tenant, actor) {
            return false;
        }
        if mem.importance < min_imp {
            return false;
        }
        if let Some(ceiling) = req.max_privacy {
            if mem.privacy as u8 > ceiling {
                return false;
            }
        }
        if let Some(since) = req.since {
            if mem.created_at < since {
                return false;
            }
        }
        if let Some(until) = req.until {
            if mem.created_at > until {
                return false;
            }
        }
        if let Some(ref cats) = req.categories {
            if !cats.iter().any(|c| c == &mem.category) {
                return false;
            }
        }
        if let Some(ref required_tags) = req.tags {
            if !required_tags.iter().all(|t| mem.tags.contains(t)) {
                return false;
            }
        }
        // Humanized tenants: a memory past the forget threshold is gone from
        // recall even if the sweeper hasn't collected it yet.
        if mode == MemoryMode::Humanized && decay::retention(mem, now) < FORGET_THRESHOLD {
            return false;
        }
        true
    };

    let mut scored: Vec<ScoredMemory> = Vec::new();
    let mut seen = HashSet::new();
    let mut search_mode = "fts".to_string();

    let fts = db
        .search_fts(&req.query, fetch_limit * 3, Some(&tenant))
        .unwrap_or_default();

    // Semantic pass
    if let Some(qemb) = query_emb {
        let semantic_results = db.search_semantic(qemb, fetch_limit * 3, Some(&tenant));
        if !semantic_results.is_empty() {
            search_mode = "semantic+fts".to_string();
            let sim_floor = req.min_score.unwrap_or(0.3);
            for (id, sim) in &semantic_results {
                if *sim < sim_floor {
                    continue;
                }
                if let Ok(Some(mem)) = db.get(id) {
                    if !passes_filters(&mem) {
                        continue;
                    }
                    seen.insert(id.clone());
                    scored.push(score_memory(&mem, *sim, &focus));
                }
            }
        }
    }

    // Keyword pass. Results found by BOTH passes get a relevance boost —
    // agreement between cosine and BM25 is a strong signal.
    let max_bm25 = fts.iter().map(|r| r.1).fold(0.001_f64, f64::max);
    for (id, bm25) in &fts {
        let fts_rel = bm25 / max_bm25;
        if seen.contains(id) {
            if let Some(sm) = scored.iter_mut().find(|s| &s.memory.id == id) {
                let boosted = (sm.relevance * (1.0 + fts_rel * 0.3)).min(1.0);
                let mem = sm.memory.clone();
                *sm = score_memory(&mem, boosted, &focus);
            }
            continue;
        }
        if let Ok(Some(mem)) = db.get(id) {
            if !passes_filters(&mem) {
                continue;
            }
            let relevance = fts_rel * FTS_ONLY_RELEVANCE;
            if let Some(min) = req.min_score {
                if relevance < min {
                    continue;
                }
            }
            seen.insert(id.clone());
            scored.push(score_memory(&mem, relevance, &focus));
        }
    }

    match sort_by {
        "recent" => scored.sort_by_key(|s| std::cmp::Reverse(s.memory.created_at)),
        "accessed" => scored.sort_by_key(|s| std::cmp::Reverse(s.memory.last_accessed)),
        _ => scored.sort_by(|a, b| {
            b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal)
        }),
    }

    let total = scored.len();
    let page: Vec<ScoredMemory> = scored.into_iter().skip(offset).take(limit).collect();

    // Retrieval is reinforcement: matched memories get their idle clock reset.
    if !req.dry {
        for sm in &page {
            if let Err(e) = db.touch(&sm.memory.id) {
                tracing::warn!(id = %sm.memory.id, error = %e, "touch failed");
            }
        }
    }

    SearchResponse {
        memories: page,
        total,
        offset,
        limit,
        search_mode,
        mode,
        focus,
    }
}
