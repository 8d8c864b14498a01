//! FTS5 keyword search and index maintenance.

use rusqlite::params;

use super::*;

impl MemoryStore {
    pub(super) fn fts_insert(&self, id: &str, content: &str, tags_json: &str) -> Result<(), MnemoError> {
        self.conn()?.execute(
            "INSERT INTO memories_fts(id, content, tags) VALUES (?1, ?2, ?3)",
            params![id, content, tags_json],
        )?;
        Ok(())
    }

    pub(super) fn fts_delete(&self, id: &str) -> Result<(), MnemoError> {
        self.conn()?
            .execute("DELETE FROM memories_fts WHERE id = ?1", params![id])?;
        Ok(())
    }

    /// Full-text search using FTS5. Returns `(id, bm25_score)` pairs, higher
    /// score = better match.
    pub fn search_fts(
        &self,
        query: &str,
        limit: usize,
        tenant: Option<&str>,
    ) -> Result<Vec<(String, f64)>, MnemoError> {
        // Sanitize: FTS5 query syntax chokes on punctuation; keep alphanumerics
        let terms: Vec<String> = query
            .split(|c: char| !c.is_alphanumeric())
            .map(str::to_lowercase)
            .filter(|w| !w.is_empty() && !is_stopword(w))
            .collect();
        if terms.is_empty() {
            return Ok(vec![]);
        }
        let fts_query: String = terms.join(" OR ");

        let conn = self.conn()?;

        if let Some(t) = tenant {
            // Org-tier memories are visible from any tenant's search.
            let mut stmt = conn.prepare(
                "SELECT f.id, f.rank FROM memories_fts f \
                 JOIN memories m ON m.id = f.id \
                 WHERE f.memories_fts MATCH ?1 AND (m.tenant = ?3 OR m.privacy = 3) \
                 ORDER BY f.rank LIMIT ?2",
            )?;
            Ok(stmt
                .query_map(params![fts_query, limit as i64, t], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?))
                })
                .map(|iter| {
                    iter.filter_map(|r| r.map_err(|e| tracing::warn!("row parse: {e}")).ok())
                        .map(|(id, rank)| (id, -rank))
                        .collect()
                })
                .unwrap_or_default())
        } else {
            let mut stmt = conn.prepare(
                "SELECT id, rank FROM memories_fts \
                 WHERE memories_fts MATCH ?1 ORDER BY rank LIMIT ?2",
            )?;
            Ok(stmt
                .query_map(params![fts_query, limit as i64], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?))
                })
                .map(|iter| {
                    iter.filter_map(|r| r.map_err(|e| tracing::warn!("row parse: {e}")).ok())
                        .map(|(id, rank)| (id, -rank))
                        .collect()
                })
                .unwrap_or_default())
        }
    }

    /// Auto-repair FTS index: remove orphans and rebuild missing entries.
    /// Idempotent; runs on startup. Returns (orphans_removed, missing_rebuilt).
    pub fn repair_fts(&self) -> Result<(usize, usize), MnemoError> {
        let conn = self.conn()?;

        let orphans = conn.execute(
            "DELETE FROM memories_fts WHERE id NOT IN (SELECT id FROM memories)",
            [],
        )?;

        let mut stmt = conn.prepare(
            "SELECT id, content, tags FROM memories WHERE id NOT IN (SELECT id FROM memories_fts)",
        )?;
        let missing: Vec<(String, String, String)> = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
            .filter_map(|r| r.map_err(|e| tracing::warn!("row parse: {e}")).ok())
            .collect();
        drop(stmt);

        let rebuilt = missing.len();
        for (id, content, tags_json) in &missing {
            conn.execute(
                "INSERT INTO memories_fts(id, content, tags) VALUES (?1, ?2, ?3)",
                params![id, content, tags_json],
            )?;
        }
        if orphans > 0 || rebuilt > 0 {
            tracing::info!(orphans, rebuilt, "repaired FTS index");
        }

        Ok((orphans, rebuilt))
    }

    /// Run incremental vacuum, returning bytes freed.
    pub fn vacuum_incremental(&self, pages: u32) -> Result<i64, MnemoError> {
        let conn = self.conn()?;
        let before: i64 = conn.query_row(
            "SELECT page_count * page_size FROM pragma_page_count, pragma_page_size",
            [],
            |r| r.get(0),
        )?;
        conn.execute_batch(&format!("PRAGMA incremental_vacuum({pages})"))?;
        let after: i64 = conn.query_row(
            "SELECT page_count * page_size FROM pragma_page_count, pragma_page_size",
            [],
            |r| r.get(0),
        )?;
        Ok(before - after)
    }
}

/// Stop words that match nearly everything and add noise to FTS queries.
pub fn is_stopword(word: &str) -> bool {
    matches!(word,
        "the" | "a" | "an" | "is" | "are" | "was" | "were" | "be" | "been" |
        "and" | "or" | "but" | "in" | "on" | "at" | "to" | "for" | "of" |
        "it" | "as" | "if" | "no" | "not" | "so" | "this" | "that" | "my" |
        "we" | "our" | "you" | "your" | "do" | "does" | "what" | "who" | "how"
    )
}
