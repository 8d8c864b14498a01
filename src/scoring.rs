use serde::Serialize;

use crate::store::Memory;

/// Clean API response for a single memory — used at the HTTP boundary only.
/// Internal types (`ScoredMemory`, `SearchResponse`) remain unchanged.
#[derive(Debug, Clone, Serialize)]
pub struct MemoryResult {
    /// Short ID (first 8 characters)
    pub id: String,
    pub content: String,
    pub score: f64,
    pub category: String,
    pub privacy: String,
    /// Only present if non-empty
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl MemoryResult {
    pub fn from_memory(mem: &Memory, score: f64) -> Self {
        Self {
            id: mem.id[..mem.id.len().min(8)].to_string(),
            content: mem.content.clone(),
            score,
            category: mem.category.clone(),
            privacy: mem.privacy.name().to_string(),
            tags: mem.tags.clone(),
        }
    }
}

/// Ranking weight per category. Decisions and identity outrank ambient
/// chatter at equal similarity.
pub fn category_weight(category: &str) -> f64 {
    match category {
        "identity" => 1.2,
        "decision" => 1.15,
        "preference" => 1.1,
        "fact" | "task" => 1.0,
        "meeting" => 0.95,
        "event" => 0.9,
        "chatter" => 0.8,
        _ => 1.0,
    }
}

/// Unified memory weight — used across ranking contexts.
/// Combines decayable importance with permanent reinforcement signals.
pub fn memory_weight(mem: &Memory) -> f64 {
    let rep_bonus = (mem.repetition_count as f64 * 0.1).min(0.5);
    let access_bonus = ((1.0 + mem.access_count as f64).ln() * 0.1).min(0.3);

    (mem.importance + rep_bonus + access_bonus) * category_weight(&mem.category)
}
