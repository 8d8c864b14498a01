//! In-memory vector index and semantic search.

use rusqlite::params;
use std::collections::HashMap;

use super::*;

struct VecEntry {
    tenant: String,
    org_wide: bool,
    emb: Vec<f32>,
}

/// Brute-force cosine index over all embeddings, keyed by memory id.
/// Entries carry tenant and org visibility so search can filter without
/// DB lookups. O(n) per query — fine for collections up to ~10k memories;
/// larger deployments would want IVF or HNSW.
pub(super) struct VecIndex {
    entries: HashMap<String, VecEntry>,
}

impl VecIndex {
    pub(super) fn new() -> Self {
        Self { entries: HashMap::new() }
    }

    fn insert(&mut self, id: String, tenant: String, org_wide: bool, emb: Vec<f32>) {
        self.entries.insert(id, VecEntry { tenant, org_wide, emb });
    }

    fn remove(&mut self, id: &str) {
        self.entries.remove(id);
    }

    fn clear(&mut self) {
        self.entries.clear();
    }

    fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

impl MemoryStore {
    /// Load all embeddings from DB into the in-memory vector index.
    pub(super) fn load_vec_index(&self) {
        let Ok(conn) = self.conn() else { return };
        let Ok(mut stmt) = conn.prepare(
            "SELECT id, tenant, privacy, embedding FROM memories WHERE embedding IS NOT NULL",
        ) else {
            return;
        };

        let rows: Vec<(String, String, bool, Vec<f32>)> = stmt
            .query_map([], |row| {
                let id: String = row.get(0)?;
                let tenant: String = row.get(1)?;
                let privacy: u8 = row.get(2)?;
                let blob: Vec<u8> = row.get(3)?;
                Ok((id, tenant, privacy == Privacy::Org as u8, crate::embed::bytes_to_embedding(&blob)))
            })
            .map(|iter| iter.filter_map(|r| r.ok()).collect())
            .unwrap_or_default();

        if let Ok(mut idx) = self.vec_index.write() {
            idx.clear();
            let count = rows.len();
            for (id, tenant, org_wide, emb) in rows {
                idx.insert(id, tenant, org_wide, emb);
            }
            tracing::debug!(count, "loaded vector index");
        }
    }

    pub(super) fn vec_index_remove(&self, id: &str) {
        if let Ok(mut idx) = self.vec_index.write() {
            idx.remove(id);
        }
    }

    /// Keep the cached org visibility in step with a privacy update.
    pub(super) fn vec_index_set_org(&self, id: &str, org_wide: bool) {
        if let Ok(mut idx) = self.vec_index.write() {
            if let Some(entry) = idx.entries.get_mut(id) {
                entry.org_wide = org_wide;
            }
        }
    }

    pub fn vec_index_len(&self) -> usize {
        self.vec_index.read().map(|idx| idx.len()).unwrap_or(0)
    }

    /// Persist an embedding and mirror it into the in-memory index.
    /// No-op if the memory was deleted in the meantime.
    pub fn set_embedding(&self, id: &str, embedding: &[f32]) -> Result<(), MnemoError> {
        use rusqlite::OptionalExtension;
        let bytes = crate::embed::embedding_to_bytes(embedding);
        let row: Option<(String, u8)> = self
            .conn()?
            .query_row(
                "UPDATE memories SET embedding = ?1 WHERE id = ?2 RETURNING tenant, privacy",
                params![bytes, id],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .optional()?;
        if let Some((tenant, privacy)) = row {
            if let Ok(mut idx) = self.vec_index.write() {
                idx.insert(id.to_string(), tenant, privacy == Privacy::Org as u8, embedding.to_vec());
            }
        }
        Ok(())
    }

    /// Semantic search: memories closest to a query embedding, optionally
    /// restricted to a tenant. Org-tier memories match regardless of tenant.
    /// Returns `(id, cosine)` pairs, best first.
    pub fn search_semantic(
        &self,
        query_emb: &[f32],
        limit: usize,
        tenant: Option<&str>,
    ) -> Vec<(String, f64)> {
        let Ok(idx) = self.vec_index.read() else { return vec![] };
        if idx.is_empty() {
            return vec![];
        }
        let mut scored: Vec<(String, f64)> = idx
            .entries
            .iter()
            .filter(|(_, e)| tenant.is_none_or(|want| e.tenant == want || e.org_wide))
            .map(|(id, e)| (id.clone(), crate::embed::cosine_similarity(query_emb, &e.emb)))
            .filter(|(_, sim)| *sim > 0.0)
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);
        scored
    }

    /// Memories that still need an embedding, oldest first.
    pub fn list_missing_embeddings(&self, limit: usize) -> Vec<(String, String)> {
        let Ok(conn) = self.conn() else { return vec![] };
        let Ok(mut stmt) = conn.prepare(
            "SELECT id, content FROM memories WHERE embedding IS NULL \
             ORDER BY created_at ASC LIMIT ?1",
        ) else {
            return vec![];
        };
        stmt.query_map(params![limit as i64], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })
        .map(|rows| rows.filter_map(|r| r.ok()).collect())
        .unwrap_or_default()
    }
}
