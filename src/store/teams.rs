//! Team mappings: bindings from external tracker teams to internal tenants.

use rusqlite::params;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::*;

#[derive(Debug, Clone, Serialize)]
pub struct TeamMapping {
    pub id: String,
    /// Integration provider, e.g. "linear", "slack", "fathom", "gmail".
    pub provider: String,
    pub external_team: String,
    pub tenant: String,
    /// Category applied to memories ingested through this mapping.
    pub default_category: String,
    pub default_privacy: u8,
    pub created_at: i64,
}

#[derive(Debug, Deserialize)]
pub struct TeamMappingInput {
    pub provider: String,
    pub external_team: String,
    pub tenant: String,
    pub default_category: Option<String>,
    pub default_privacy: Option<u8>,
}

fn row_to_mapping(row: &rusqlite::Row) -> rusqlite::Result<TeamMapping> {
    Ok(TeamMapping {
        id: row.get(0)?,
        provider: row.get(1)?,
        external_team: row.get(2)?,
        tenant: row.get(3)?,
        default_category: row.get(4)?,
        default_privacy: row.get(5)?,
        created_at: row.get(6)?,
    })
}

const MAPPING_COLS: &str =
    "id, provider, external_team, tenant, default_category, default_privacy, created_at";

impl MemoryStore {
    /// Create or replace a mapping, keyed on (provider, external_team).
    pub fn upsert_team_mapping(&self, input: TeamMappingInput) -> Result<TeamMapping, MnemoError> {
        let provider = input.provider.trim().to_lowercase();
        let external_team = input.external_team.trim().to_string();
        if provider.is_empty() || external_team.is_empty() {
            return Err(MnemoError::Validation("provider and external_team required".into()));
        }
        validate_ident(&provider, "provider")?;
        validate_ident(&external_team, "external_team")?;
        validate_ident(&input.tenant, "tenant")?;
        let default_category = input.default_category.unwrap_or_else(|| "task".into());
        validate_ident(&default_category, "category")?;
        let default_privacy = input.default_privacy.unwrap_or(2);
        Privacy::try_from(default_privacy)?;

        let id = Uuid::new_v4().to_string();
        let now = now_ms();
        self.conn()?.execute(
            "INSERT INTO team_mappings \
             (id, provider, external_team, tenant, default_category, default_privacy, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7) \
             ON CONFLICT(provider, external_team) DO UPDATE SET \
               tenant = excluded.tenant, \
               default_category = excluded.default_category, \
               default_privacy = excluded.default_privacy",
            params![id, provider, external_team, input.tenant, default_category, default_privacy, now],
        )?;

        // Re-read: on conflict the original id and created_at survive.
        self.resolve_team(&provider, &external_team)?
            .ok_or(MnemoError::Internal("mapping upsert lost".into()))
    }

    /// Look up the mapping for an external team, if one exists.
    pub fn resolve_team(
        &self,
        provider: &str,
        external_team: &str,
    ) -> Result<Option<TeamMapping>, MnemoError> {
        use rusqlite::OptionalExtension;
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {MAPPING_COLS} FROM team_mappings WHERE provider = ?1 AND external_team = ?2"
        );
        let mapping = conn
            .query_row(&sql, params![provider, external_team], row_to_mapping)
            .optional()?;
        Ok(mapping)
    }

    pub fn list_team_mappings(&self, tenant: Option<&str>) -> Result<Vec<TeamMapping>, MnemoError> {
        let conn = self.conn()?;
        if let Some(t) = tenant {
            let sql = format!(
                "SELECT {MAPPING_COLS} FROM team_mappings WHERE tenant = ?1 ORDER BY provider, external_team"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params![t], row_to_mapping)?
                .filter_map(|r| r.ok())
                .collect();
            Ok(rows)
        } else {
            let sql = format!(
                "SELECT {MAPPING_COLS} FROM team_mappings ORDER BY provider, external_team"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([], row_to_mapping)?
                .filter_map(|r| r.ok())
                .collect();
            Ok(rows)
        }
    }

    pub fn delete_team_mapping(&self, id: &str) -> Result<bool, MnemoError> {
        let n = self
            .conn()?
            .execute("DELETE FROM team_mappings WHERE id = ?1", params![id])?;
        Ok(n > 0)
    }
}
