//! Memory CRUD, deduplication, and reinforcement.

use rusqlite::params;
use uuid::Uuid;

use crate::decay;
use crate::thresholds::{DEDUP_SCAN_LIMIT, INSERT_DEDUP_SIM};

use super::*;

impl MemoryStore {
    pub fn insert(&self, input: MemoryInput) -> Result<Memory, MnemoError> {
        validate_input(&input)?;

        let tenant = input.tenant.clone().unwrap_or_else(default_tenant);
        let owner = input.owner.clone().unwrap_or_default();
        let hash = content_hash(&input.content);

        // Duplicate detection runs in two passes. Exact: same normalized hash
        // in the same tenant. Near: token overlap against recent memories.
        // Either way the existing memory is reinforced — repeated writes mean
        // the author cares about this information. Candidates follow the same
        // visibility rule as recall: a personal-tier memory only matches
        // writes from its own owner, so one user's write can never be
        // absorbed into (or reveal) another user's personal memory.
        let do_dedup = !input.skip_dedup.unwrap_or(false);
        if do_dedup {
            let existing = self
                .find_by_hash(&tenant, &owner, &hash)
                .or_else(|| self.find_near_duplicate(&tenant, &owner, &input.content));
            if let Some(existing) = existing {
                tracing::debug!(existing_id = %existing.id, "duplicate found, reinforcing");
                let _ = self.reinforce(&existing.id);
                let tags = input.tags.unwrap_or_default();
                let mut merged_tags: Vec<String> = existing.tags.clone();
                for t in &tags {
                    if !merged_tags.contains(t) {
                        merged_tags.push(t.clone());
                    }
                }
                merged_tags.truncate(MAX_TAGS);
                // reinforce() already bumped importance by 0.05; keep the higher value
                let reinforced_imp = (existing.importance + 0.05).min(1.0);
                let imp = input
                    .importance
                    .map(|new_imp| new_imp.max(reinforced_imp))
                    .unwrap_or(reinforced_imp);
                // A personal-tier request only retiers a row the writer
                // already owns; team/org rows keep their tier on reinforce.
                let privacy = match input.privacy {
                    Some(p) if p == Privacy::Personal as u8 && existing.owner != owner => None,
                    p => p,
                };

                return self
                    .update_fields(
                        &existing.id,
                        Some(&input.content),
                        None,
                        privacy,
                        Some(imp),
                        Some(&merged_tags),
                    )
                    .and_then(|opt| {
                        opt.ok_or(MnemoError::Internal("update after dedup failed".into()))
                    });
            }
        }

        let now = now_ms();
        let importance = input.importance.unwrap_or(0.5).clamp(0.0, 1.0);
        let id = Uuid::new_v4().to_string();
        let category = input.category.unwrap_or_else(|| "fact".into());
        let privacy_val = input.privacy.unwrap_or(2);
        let privacy: Privacy = privacy_val.try_into()?;
        let source = input.source.unwrap_or_else(|| "api".into());
        let tags = input.tags.unwrap_or_default();
        let decay_rate = decay::default_decay(&category);
        let tags_json = serde_json::to_string(&tags).unwrap_or_else(|_| "[]".into());

        self.conn()?.execute(
            "INSERT INTO memories \
             (id, tenant, owner, content, content_hash, category, privacy, importance, \
              created_at, last_accessed, access_count, repetition_count, decay_rate, source, tags) \
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,0,0,?11,?12,?13)",
            params![
                id,
                tenant,
                owner,
                input.content,
                hash,
                category,
                privacy_val,
                importance,
                now,
                now,
                decay_rate,
                source,
                tags_json,
            ],
        )?;

        self.fts_insert(&id, &input.content, &tags_json)?;

        Ok(Memory {
            id,
            tenant,
            owner,
            content: input.content,
            content_hash: hash,
            category,
            privacy,
            importance,
            created_at: now,
            last_accessed: now,
            access_count: 0,
            repetition_count: 0,
            decay_rate,
            source,
            tags,
            embedding: None,
        })
    }

    /// Batch insert within a single transaction. Skips dedup for speed.
    /// Invalid entries are skipped; returns the successfully inserted memories.
    pub fn insert_batch(&self, inputs: Vec<MemoryInput>) -> Result<Vec<Memory>, MnemoError> {
        let conn = self.conn()?;
        conn.execute_batch("BEGIN")?;
        let mut results = Vec::with_capacity(inputs.len());
        let result = (|| -> Result<(), MnemoError> {
            for input in inputs {
                if let Err(e) = validate_input(&input) {
                    tracing::warn!(error = %e, "batch: skipping invalid input");
                    continue;
                }
                let now = now_ms();
                let id = Uuid::new_v4().to_string();
                let tenant = input.tenant.unwrap_or_else(default_tenant);
                let owner = input.owner.unwrap_or_default();
                let hash = content_hash(&input.content);
                let category = input.category.unwrap_or_else(|| "fact".into());
                let privacy_val = input.privacy.unwrap_or(2);
                let privacy: Privacy = match privacy_val.try_into() {
                    Ok(p) => p,
                    Err(_) => continue,
                };
                let importance = input.importance.unwrap_or(0.5).clamp(0.0, 1.0);
                let source = input.source.unwrap_or_else(|| "api".into());
                let tags = input.tags.unwrap_or_default();
                let decay_rate = decay::default_decay(&category);
                let tags_json = serde_json::to_string(&tags).unwrap_or_else(|_| "[]".into());

                conn.execute(
                    "INSERT INTO memories \
                     (id, tenant, owner, content, content_hash, category, privacy, importance, \
                      created_at, last_accessed, access_count, repetition_count, decay_rate, source, tags) \
                     VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,0,0,?11,?12,?13)",
                    params![
                        id, tenant, owner, input.content, hash, category, privacy_val,
                        importance, now, now, decay_rate, source, tags_json
                    ],
                )?;
                conn.execute(
                    "INSERT INTO memories_fts(id, content, tags) VALUES (?1, ?2, ?3)",
                    params![id, input.content, tags_json],
                )?;

                results.push(Memory {
                    id,
                    tenant,
                    owner,
                    content: input.content,
                    content_hash: hash,
                    category,
                    privacy,
                    importance,
                    created_at: now,
                    last_accessed: now,
                    access_count: 0,
                    repetition_count: 0,
                    decay_rate,
                    source,
                    tags,
                    embedding: None,
                });
            }
            Ok(())
        })();
        match result {
            Ok(()) => {
                conn.execute_batch("COMMIT")?;
                Ok(results)
            }
            Err(e) => {
                let _ = conn.execute_batch("ROLLBACK");
                Err(e)
            }
        }
    }

    pub fn get(&self, id: &str) -> Result<Option<Memory>, MnemoError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT * FROM memories WHERE id = ?1")?;
        let mut rows = stmt.query(params![id])?;
        match rows.next()? {
            Some(row) => Ok(Some(row_to_memory(row)?)),
            None => Ok(None),
        }
    }

    /// Resolve a short ID prefix to a full UUID.
    /// If the input is already a full UUID (36+ chars), returns it as-is.
    /// Returns NotFound if no match, Validation error if ambiguous.
    pub fn resolve_prefix(&self, prefix: &str) -> Result<String, MnemoError> {
        if prefix.len() >= 36 {
            return Ok(prefix.to_string());
        }
        let conn = self.conn()?;
        let pattern = format!("{}%", prefix);
        let mut stmt = conn.prepare("SELECT id FROM memories WHERE id LIKE ?1 LIMIT 2")?;
        let ids: Vec<String> = stmt
            .query_map(params![pattern], |row| row.get(0))?
            .filter_map(|r| r.ok())
            .collect();
        match ids.len() {
            0 => Err(MnemoError::NotFound),
            1 => Ok(ids.into_iter().next().unwrap()),
            _ => Err(MnemoError::Validation(format!(
                "prefix '{}' matches multiple memories",
                prefix
            ))),
        }
    }

    fn find_by_hash(&self, tenant: &str, owner: &str, hash: &str) -> Option<Memory> {
        let conn = self.conn().ok()?;
        let mut stmt = conn
            .prepare(
                "SELECT * FROM memories WHERE tenant = ?1 AND content_hash = ?2 \
                 AND (privacy != 1 OR owner = ?3) LIMIT 1",
            )
            .ok()?;
        stmt.query_row(params![tenant, hash, owner], row_to_memory).ok()
    }

    /// Token-overlap scan over the most recent memories in the tenant.
    /// O(DEDUP_SCAN_LIMIT) per insert, which is fine at insert rates here.
    /// When several candidates qualify, the strongest one absorbs the write.
    fn find_near_duplicate(&self, tenant: &str, owner: &str, content: &str) -> Option<Memory> {
        let conn = self.conn().ok()?;
        let mut stmt = conn
            .prepare(
                "SELECT * FROM memories WHERE tenant = ?1 \
                 AND (privacy != 1 OR owner = ?3) \
                 ORDER BY created_at DESC LIMIT ?2",
            )
            .ok()?;
        let candidates: Vec<Memory> = stmt
            .query_map(params![tenant, DEDUP_SCAN_LIMIT as i64, owner], row_to_memory)
            .ok()?
            .filter_map(|r| r.ok())
            .collect();
        candidates
            .into_iter()
            .filter(|m| jaccard_similar(&m.content, content, INSERT_DEDUP_SIM))
            .max_by(|a, b| {
                crate::scoring::memory_weight(a)
                    .partial_cmp(&crate::scoring::memory_weight(b))
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
    }

    /// Update selected fields. Content changes re-hash, re-index FTS, and drop
    /// the stale embedding (it no longer describes the content).
    pub fn update_fields(
        &self,
        id: &str,
        content: Option<&str>,
        category: Option<&str>,
        privacy: Option<u8>,
        importance: Option<f64>,
        tags: Option<&[String]>,
    ) -> Result<Option<Memory>, MnemoError> {
        let Some(existing) = self.get(id)? else {
            return Ok(None);
        };

        let new_content = content.unwrap_or(&existing.content);
        if new_content.trim().is_empty() {
            return Err(MnemoError::EmptyContent);
        }
        if new_content.chars().count() > MAX_CONTENT_LEN {
            return Err(MnemoError::ContentTooLong);
        }
        let new_category = category.unwrap_or(&existing.category);
        validate_ident(new_category, "category")?;
        let new_privacy = match privacy {
            Some(p) => Privacy::try_from(p)? as u8,
            None => existing.privacy as u8,
        };
        // Updates obey the same limits as inserts: a personal memory without
        // an owner would be visible to nobody, and tags stay bounded.
        if new_privacy == Privacy::Personal as u8 && existing.owner.is_empty() {
            return Err(MnemoError::Validation("personal memories require an owner".into()));
        }
        if let Some(tags) = tags {
            if tags.len() > MAX_TAGS {
                return Err(MnemoError::Validation(format!("too many tags (max {MAX_TAGS})")));
            }
            if let Some(t) = tags.iter().find(|t| t.chars().count() > MAX_TAG_LEN) {
                return Err(MnemoError::Validation(format!("tag '{}' too long (max {MAX_TAG_LEN})", t)));
            }
        }
        let new_importance = importance.unwrap_or(existing.importance).clamp(0.0, 1.0);
        let new_tags: Vec<String> = tags.map(|t| t.to_vec()).unwrap_or_else(|| existing.tags.clone());
        let tags_json = serde_json::to_string(&new_tags).unwrap_or_else(|_| "[]".into());

        let content_changed = new_content != existing.content;
        let new_hash = if content_changed { content_hash(new_content) } else { existing.content_hash.clone() };
        let new_decay = if new_category != existing.category {
            decay::default_decay(new_category)
        } else {
            existing.decay_rate
        };

        self.conn()?.execute(
            "UPDATE memories SET content = ?1, content_hash = ?2, category = ?3, privacy = ?4, \
             importance = ?5, decay_rate = ?6, tags = ?7 WHERE id = ?8",
            params![new_content, new_hash, new_category, new_privacy, new_importance, new_decay, tags_json, id],
        )?;

        self.fts_delete(id)?;
        self.fts_insert(id, new_content, &tags_json)?;

        if content_changed {
            self.conn()?
                .execute("UPDATE memories SET embedding = NULL WHERE id = ?1", params![id])?;
            self.vec_index_remove(id);
        } else if new_privacy != existing.privacy as u8 {
            // The index caches org visibility; a tier change must reach
            // semantic search without waiting for a reload.
            self.vec_index_set_org(id, new_privacy == Privacy::Org as u8);
        }

        self.get(id)
    }

    pub fn delete(&self, id: &str) -> Result<bool, MnemoError> {
        self.remove_to_trash(id, "deleted")
    }

    /// Move a memory to trash with the given reason ("deleted" or "forgotten").
    pub(crate) fn remove_to_trash(&self, id: &str, reason: &str) -> Result<bool, MnemoError> {
        let conn = self.conn()?;
        let moved = conn.execute(
            "INSERT OR REPLACE INTO trash \
             (id, tenant, owner, content, category, privacy, importance, created_at, deleted_at, reason, tags, source) \
             SELECT id, tenant, owner, content, category, privacy, importance, created_at, ?2, ?3, tags, source \
             FROM memories WHERE id = ?1",
            params![id, now_ms(), reason],
        )?;
        let n = conn.execute("DELETE FROM memories WHERE id = ?1", params![id])?;
        if n > 0 {
            self.fts_delete(id)?;
            self.vec_index_remove(id);
        }
        Ok(n > 0 || moved > 0)
    }

    /// Delete all memories in a tenant. Returns how many were removed.
    /// Like single deletes, everything lands in trash and can be restored.
    pub fn delete_tenant(&self, tenant: &str) -> Result<usize, MnemoError> {
        let ids: Vec<String> = {
            let conn = self.conn()?;
            let mut stmt = conn.prepare("SELECT id FROM memories WHERE tenant = ?1")?;
            let ids = stmt
                .query_map(params![tenant], |row| row.get(0))?
                .filter_map(|r| r.ok())
                .collect();
            ids
        };

        let mut n = 0;
        for id in &ids {
            if self.remove_to_trash(id, "deleted")? {
                n += 1;
            }
        }
        Ok(n)
    }

    // -- Trash (recovery for deleted and forgotten memories) --

    pub fn trash_list(&self, limit: usize, offset: usize) -> Result<Vec<TrashEntry>, MnemoError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, tenant, owner, content, category, privacy, importance, created_at, \
             deleted_at, reason, tags, source \
             FROM trash ORDER BY deleted_at DESC LIMIT ?1 OFFSET ?2",
        )?;
        let rows = stmt
            .query_map(params![limit as i64, offset as i64], |row| {
                let tags_json: String = row.get(10)?;
                let tags: Vec<String> = serde_json::from_str(&tags_json).unwrap_or_default();
                Ok(TrashEntry {
                    id: row.get(0)?,
                    tenant: row.get(1)?,
                    owner: row.get(2)?,
                    content: row.get(3)?,
                    category: row.get(4)?,
                    privacy: row.get(5)?,
                    importance: row.get(6)?,
                    created_at: row.get(7)?,
                    deleted_at: row.get(8)?,
                    reason: row.get(9)?,
                    tags,
                    source: row.get(11)?,
                })
            })?
            .filter_map(|r| r.ok())
            .collect();
        Ok(rows)
    }

    /// Restore a trashed memory. It re-enters the store with a fresh access
    /// clock so it doesn't get immediately re-forgotten.
    pub fn trash_restore(&self, id: &str) -> Result<bool, MnemoError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, tenant, owner, content, category, privacy, importance, created_at, tags, source \
             FROM trash WHERE id = ?1",
        )?;
        type TrashRow = (String, String, String, String, String, i64, f64, i64, String, String);
        let entry: Option<TrashRow> = stmt
            .query_row(params![id], |row| {
                Ok((
                    row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?,
                    row.get(5)?, row.get(6)?, row.get(7)?, row.get(8)?, row.get(9)?,
                ))
            })
            .ok();
        drop(stmt);

        if let Some((rid, tenant, owner, content, category, privacy, importance, created_at, tags_json, source)) = entry {
            let now = now_ms();
            let hash = content_hash(&content);
            let decay_rate = decay::default_decay(&category);
            conn.execute(
                "INSERT OR REPLACE INTO memories \
                 (id, tenant, owner, content, content_hash, category, privacy, importance, \
                  created_at, last_accessed, access_count, repetition_count, decay_rate, source, tags) \
                 VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,0,0,?11,?12,?13)",
                params![rid, tenant, owner, content, hash, category, privacy, importance, created_at, now, decay_rate, source, tags_json],
            )?;
            self.fts_insert(&rid, &content, &tags_json)?;
            conn.execute("DELETE FROM trash WHERE id = ?1", params![id])?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    pub fn trash_purge(&self) -> Result<usize, MnemoError> {
        let n = self.conn()?.execute("DELETE FROM trash", [])?;
        Ok(n)
    }

    pub fn trash_count(&self) -> Result<usize, MnemoError> {
        let n: i64 = self.conn()?.query_row("SELECT COUNT(*) FROM trash", [], |r| r.get(0))?;
        Ok(n as usize)
    }

    /// Recall-based reinforcement: bump access stats and importance.
    /// The idle clock resets, which is what keeps recalled memories alive
    /// in humanized mode.
    pub fn touch(&self, id: &str) -> Result<(), MnemoError> {
        self.conn()?.execute(
            "UPDATE memories SET last_accessed = ?1, access_count = access_count + 1, \
             importance = MIN(1.0, importance + 0.02) WHERE id = ?2",
            params![now_ms(), id],
        )?;
        Ok(())
    }

    /// Repetition-based reinforcement — stronger than recall touch.
    /// Called when duplicate content is written again, indicating the author
    /// considers this information worth restating.
    pub fn reinforce(&self, id: &str) -> Result<(), MnemoError> {
        self.conn()?.execute(
            "UPDATE memories SET last_accessed = ?1, \
             repetition_count = repetition_count + 1, \
             importance = MIN(1.0, importance + 0.05) WHERE id = ?2",
            params![now_ms(), id],
        )?;
        Ok(())
    }

    /// Passive importance decay for idle memories in a humanized tenant.
    /// Identity memories keep a higher floor. Returns rows affected.
    pub fn decay_importance(
        &self,
        tenant: &str,
        idle_hours: f64,
        decay_amount: f64,
        floor: f64,
        identity_floor: f64,
    ) -> Result<usize, MnemoError> {
        let cutoff = now_ms() - (idle_hours * 3_600_000.0) as i64;
        let conn = self.conn()?;
        let n = conn.execute(
            "UPDATE memories SET importance = MAX(?1, importance - ?2) \
             WHERE tenant = ?3 AND last_accessed < ?4 AND importance > ?1 AND category != 'identity'",
            params![floor, decay_amount, tenant, cutoff],
        )?;
        let n2 = conn.execute(
            "UPDATE memories SET importance = MAX(?1, importance - ?2) \
             WHERE tenant = ?3 AND last_accessed < ?4 AND importance > ?1 AND category = 'identity'",
            params![identity_floor, decay_amount, tenant, cutoff],
        )?;
        Ok(n + n2)
    }

    /// Memories in a tenant whose retention fell below the threshold.
    /// Identity memories are exempt — who the user is must not fade away.
    pub fn list_decayed(&self, tenant: &str, threshold: f64) -> Vec<Memory> {
        let now = now_ms();
        let Ok(conn) = self.conn() else { return vec![] };
        let Ok(mut stmt) =
            conn.prepare("SELECT * FROM memories WHERE tenant = ?1 AND category != 'identity'")
        else {
            return vec![];
        };
        stmt.query_map(params![tenant], row_to_memory)
            .map(|iter| {
                iter.filter_map(|r| r.ok())
                    .filter(|m| decay::retention(m, now) < threshold)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// List memories with optional tenant, category, privacy, and tag filters —
    /// all pushed to SQL.
    pub fn list_filtered(
        &self,
        limit: usize,
        offset: usize,
        tenant: Option<&str>,
        category: Option<&str>,
        privacy: Option<u8>,
        tag: Option<&str>,
    ) -> Result<Vec<Memory>, MnemoError> {
        let conn = self.conn()?;

        let mut params_vec: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();
        let mut clauses = Vec::new();

        if let Some(t) = tenant {
            params_vec.push(Box::new(t.to_string()));
            clauses.push(format!("tenant = ?{}", params_vec.len()));
        }
        if let Some(c) = category {
            params_vec.push(Box::new(c.to_string()));
            clauses.push(format!("category = ?{}", params_vec.len()));
        }
        if let Some(p) = privacy {
            params_vec.push(Box::new(p as i64));
            clauses.push(format!("privacy = ?{}", params_vec.len()));
        }
        if let Some(t) = tag {
            let pattern = format!("%\"{}\"%", t.replace('"', ""));
            params_vec.push(Box::new(pattern));
            clauses.push(format!("tags LIKE ?{}", params_vec.len()));
        }

        params_vec.push(Box::new(limit as i64));
        let limit_idx = params_vec.len();
        params_vec.push(Box::new(offset as i64));
        let offset_idx = params_vec.len();

        let mut sql = String::from("SELECT * FROM memories");
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(&format!(" ORDER BY created_at DESC LIMIT ?{limit_idx} OFFSET ?{offset_idx}"));

        let mut stmt = conn.prepare(&sql)?;
        let param_refs: Vec<&dyn rusqlite::types::ToSql> =
            params_vec.iter().map(|p| p.as_ref()).collect();
        let rows: Vec<Memory> = stmt
            .query_map(param_refs.as_slice(), row_to_memory)?
            .filter_map(|r| r.ok())
            .collect();
        Ok(rows)
    }

    /// List memories created since a given timestamp, newest first.
    pub fn list_since(
        &self,
        since_ms: i64,
        limit: usize,
        tenant: Option<&str>,
    ) -> Result<Vec<Memory>, MnemoError> {
        let conn = self.conn()?;
        if let Some(t) = tenant {
            let mut stmt = conn.prepare(
                "SELECT * FROM memories WHERE created_at >= ?1 AND tenant = ?3 \
                 ORDER BY created_at DESC LIMIT ?2",
            )?;
            let rows = stmt
                .query_map(params![since_ms, limit as i64, t], row_to_memory)?
                .filter_map(|r| r.ok())
                .collect();
            Ok(rows)
        } else {
            let mut stmt = conn.prepare(
                "SELECT * FROM memories WHERE created_at >= ?1 \
                 ORDER BY created_at DESC LIMIT ?2",
            )?;
            let rows = stmt
                .query_map(params![since_ms, limit as i64], row_to_memory)?
                .filter_map(|r| r.ok())
                .collect();
            Ok(rows)
        }
    }

    pub fn stats(&self) -> Stats {
        self.stats_filtered(None)
    }

    pub fn stats_tenant(&self, tenant: &str) -> Stats {
        self.stats_filtered(Some(tenant))
    }

    fn stats_filtered(&self, tenant: Option<&str>) -> Stats {
        let Ok(conn) = self.conn() else { return Stats::default() };
        let (where_clause, p): (&str, Vec<String>) = match tenant {
            Some(t) => ("WHERE tenant = ?1", vec![t.to_string()]),
            None => ("", vec![]),
        };
        let sql = format!(
            "SELECT privacy, category, COUNT(*) FROM memories {where_clause} GROUP BY privacy, category"
        );
        let Ok(mut stmt) = conn.prepare(&sql) else { return Stats::default() };
        let param_refs: Vec<&dyn rusqlite::types::ToSql> =
            p.iter().map(|s| s as &dyn rusqlite::types::ToSql).collect();
        let rows: Vec<(u8, String, usize)> = stmt
            .query_map(param_refs.as_slice(), |r| {
                Ok((r.get::<_, u8>(0)?, r.get::<_, String>(1)?, r.get::<_, i64>(2)? as usize))
            })
            .map(|iter| iter.filter_map(|r| r.ok()).collect())
            .unwrap_or_default();

        let mut stats = Stats::default();
        for (privacy, category, count) in rows {
            stats.total += count;
            match privacy {
                1 => stats.personal += count,
                2 => stats.team += count,
                _ => stats.org += count,
            }
            *stats.by_category.entry(category).or_insert(0) += count;
        }
        stats
    }
}
