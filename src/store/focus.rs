//! Focus sessions: time-boxed recall boosts for specific categories.

use rusqlite::params;
use serde::Serialize;
use std::collections::HashMap;
use uuid::Uuid;

use crate::thresholds::{FOCUS_MAX_BOOST, FOCUS_MAX_MINUTES, FOCUS_MIN_BOOST};

use super::*;

#[derive(Debug, Clone, Serialize)]
pub struct FocusSession {
    pub id: String,
    pub tenant: String,
    pub category: String,
    pub boost: f64,
    pub started_at: i64,
    pub expires_at: i64,
}

impl MemoryStore {
    /// Start focus sessions for the given categories. An existing session for
    /// the same (tenant, category) is replaced, not stacked — boosts never
    /// compound.
    pub fn activate_focus(
        &self,
        tenant: &str,
        categories: &[String],
        minutes: u64,
        boost: f64,
    ) -> Result<Vec<FocusSession>, MnemoError> {
        if categories.is_empty() {
            return Err(MnemoError::Validation("at least one category required".into()));
        }
        let minutes = minutes.clamp(1, FOCUS_MAX_MINUTES);
        let boost = boost.clamp(FOCUS_MIN_BOOST, FOCUS_MAX_BOOST);
        let now = now_ms();
        let expires_at = now + (minutes as i64) * 60_000;

        let conn = self.conn()?;
        let mut sessions = Vec::with_capacity(categories.len());
        for category in categories {
            let category = category.trim().to_lowercase();
            if category.is_empty() {
                continue;
            }
            conn.execute(
                "DELETE FROM focus_sessions WHERE tenant = ?1 AND category = ?2",
                params![tenant, category],
            )?;
            let id = Uuid::new_v4().to_string();
            conn.execute(
                "INSERT INTO focus_sessions (id, tenant, category, boost, started_at, expires_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![id, tenant, category, boost, now, expires_at],
            )?;
            sessions.push(FocusSession {
                id,
                tenant: tenant.to_string(),
                category,
                boost,
                started_at: now,
                expires_at,
            });
        }
        if sessions.is_empty() {
            return Err(MnemoError::Validation("at least one category required".into()));
        }
        Ok(sessions)
    }

    /// Active (unexpired) focus sessions for a tenant.
    pub fn active_focus(&self, tenant: &str) -> Vec<FocusSession> {
        let Ok(conn) = self.conn() else { return vec![] };
        let Ok(mut stmt) = conn.prepare(
            "SELECT id, tenant, category, boost, started_at, expires_at \
             FROM focus_sessions WHERE tenant = ?1 AND expires_at > ?2 \
             ORDER BY expires_at",
        ) else {
            return vec![];
        };
        stmt.query_map(params![tenant, now_ms()], |row| {
            Ok(FocusSession {
                id: row.get(0)?,
                tenant: row.get(1)?,
                category: row.get(2)?,
                boost: row.get(3)?,
                started_at: row.get(4)?,
                expires_at: row.get(5)?,
            })
        })
        .map(|iter| iter.filter_map(|r| r.ok()).collect())
        .unwrap_or_default()
    }

    /// category → boost for a tenant's active sessions. Used by recall.
    pub fn focus_boosts(&self, tenant: &str) -> HashMap<String, f64> {
        self.active_focus(tenant)
            .into_iter()
            .map(|s| (s.category, s.boost))
            .collect()
    }

    /// End all focus sessions for a tenant early. Returns how many were cleared.
    pub fn clear_focus(&self, tenant: &str) -> Result<usize, MnemoError> {
        let n = self
            .conn()?
            .execute("DELETE FROM focus_sessions WHERE tenant = ?1", params![tenant])?;
        Ok(n)
    }

    /// Drop expired focus sessions. Called by the sweeper.
    pub fn purge_expired_focus(&self) -> Result<usize, MnemoError> {
        let n = self.conn()?.execute(
            "DELETE FROM focus_sessions WHERE expires_at <= ?1",
            params![now_ms()],
        )?;
        Ok(n)
    }
}
