//! SQLite-backed memory store with FTS5 keyword search and an in-memory
//! vector index.

mod focus;
mod fts;
mod memory;
mod teams;
mod vec;

use std::sync::RwLock;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

pub use focus::FocusSession;
pub use teams::{TeamMapping, TeamMappingInput};

use crate::error::MnemoError;

/// Set busy_timeout on every connection handed out by the pool.
/// Prevents SQLITE_BUSY under concurrent write pressure (sweeper + API).
#[derive(Debug)]
struct BusyTimeoutCustomizer;
impl r2d2::CustomizeConnection<rusqlite::Connection, rusqlite::Error> for BusyTimeoutCustomizer {
    fn on_acquire(&self, conn: &mut rusqlite::Connection) -> Result<(), rusqlite::Error> {
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        Ok(())
    }
}

type PooledConn = r2d2::PooledConnection<SqliteConnectionManager>;

const MAX_CONTENT_LEN: usize = 8192;
const MAX_IDENT_LEN: usize = 64;
const MAX_TAGS: usize = 20;
const MAX_TAG_LEN: usize = 32;

/// Who can see a memory: the owner, the tenant, or everyone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Privacy {
    Personal = 1,
    Team = 2,
    Org = 3,
}

impl TryFrom<u8> for Privacy {
    type Error = MnemoError;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        match v {
            1 => Ok(Privacy::Personal),
            2 => Ok(Privacy::Team),
            3 => Ok(Privacy::Org),
            _ => Err(MnemoError::InvalidPrivacy(v)),
        }
    }
}

impl From<Privacy> for u8 {
    fn from(p: Privacy) -> u8 {
        p as u8
    }
}

impl Privacy {
    pub fn name(self) -> &'static str {
        match self {
            Privacy::Personal => "personal",
            Privacy::Team => "team",
            Privacy::Org => "org",
        }
    }
}

/// Per-tenant lifecycle mode. Persistent tenants never forget;
/// humanized tenants decay and eventually drop unreinforced memories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryMode {
    Persistent,
    Humanized,
}

impl MemoryMode {
    pub fn as_str(self) -> &'static str {
        match self {
            MemoryMode::Persistent => "persistent",
            MemoryMode::Humanized => "humanized",
        }
    }

    pub fn parse(s: &str) -> Result<Self, MnemoError> {
        match s {
            "persistent" => Ok(MemoryMode::Persistent),
            "humanized" => Ok(MemoryMode::Humanized),
            other => Err(MnemoError::InvalidMode(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Memory {
    pub id: String,
    #[serde(default = "default_tenant", skip_serializing_if = "is_default_tenant")]
    pub tenant: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub owner: String,
    pub content: String,
    #[serde(skip_serializing)]
    pub content_hash: String,
    pub category: String,
    pub privacy: Privacy,
    pub importance: f64,
    pub created_at: i64,
    pub last_accessed: i64,
    pub access_count: i64,
    pub repetition_count: i64,
    pub decay_rate: f64,
    pub source: String,
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrashEntry {
    pub id: String,
    pub tenant: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub owner: String,
    pub content: String,
    pub category: String,
    pub privacy: i64,
    pub importance: f64,
    pub created_at: i64,
    pub deleted_at: i64,
    /// "deleted" (explicit) or "forgotten" (decay sweep).
    pub reason: String,
    pub tags: Vec<String>,
    pub source: String,
}

fn is_default_tenant(t: &str) -> bool {
    t == "default"
}

pub fn default_tenant() -> String {
    "default".into()
}

#[derive(Debug, Default, Deserialize)]
pub struct MemoryInput {
    #[serde(default)]
    pub content: String,
    pub tenant: Option<String>,
    pub owner: Option<String>,
    pub category: Option<String>,
    pub privacy: Option<u8>,
    pub importance: Option<f64>,
    pub source: Option<String>,
    pub tags: Option<Vec<String>>,
    /// Skip duplicate detection. Useful when storing intentionally similar memories.
    #[serde(default)]
    pub skip_dedup: Option<bool>,
}

impl MemoryInput {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Default::default()
        }
    }

    pub fn tenant(mut self, t: impl Into<String>) -> Self {
        self.tenant = Some(t.into());
        self
    }

    pub fn owner(mut self, o: impl Into<String>) -> Self {
        self.owner = Some(o.into());
        self
    }

    pub fn category(mut self, c: impl Into<String>) -> Self {
        self.category = Some(c.into());
        self
    }

    pub fn privacy(mut self, p: u8) -> Self {
        self.privacy = Some(p);
        self
    }

    pub fn importance(mut self, i: f64) -> Self {
        self.importance = Some(i);
        self
    }

    pub fn source(mut self, s: impl Into<String>) -> Self {
        self.source = Some(s.into());
        self
    }

    pub fn tags(mut self, t: Vec<String>) -> Self {
        self.tags = Some(t);
        self
    }

    pub fn skip_dedup(mut self) -> Self {
        self.skip_dedup = Some(true);
        self
    }
}

/// A memory with its computed retrieval score.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredMemory {
    #[serde(flatten)]
    pub memory: Memory,
    pub score: f64,
    pub relevance: f64,
    pub recency: f64,
}

#[derive(Debug, Default, Serialize)]
pub struct Stats {
    pub total: usize,
    pub personal: usize,
    pub team: usize,
    pub org: usize,
    pub by_category: std::collections::HashMap<String, usize>,
}

fn validate_ident(value: &str, what: &str) -> Result<(), MnemoError> {
    if value.len() > MAX_IDENT_LEN {
        return Err(MnemoError::Validation(format!("{what} too long (max {MAX_IDENT_LEN})")));
    }
    Ok(())
}

fn validate_input(input: &MemoryInput) -> Result<(), MnemoError> {
    let content = input.content.trim();
    if content.is_empty() {
        return Err(MnemoError::EmptyContent);
    }
    if content.chars().count() > MAX_CONTENT_LEN {
        return Err(MnemoError::ContentTooLong);
    }
    if let Some(p) = input.privacy {
        let tier = Privacy::try_from(p)?;
        // Personal memories are owner-scoped; without an owner nobody could
        // ever see them.
        if tier == Privacy::Personal && input.owner.as_deref().unwrap_or("").is_empty() {
            return Err(MnemoError::Validation("personal memories require an owner".into()));
        }
    }
    if let Some(i) = input.importance {
        if !(0.0..=1.0).contains(&i) {
            return Err(MnemoError::Validation("importance must be in 0.0..=1.0".into()));
        }
    }
    if let Some(ref t) = input.tenant {
        validate_ident(t, "tenant")?;
    }
    if let Some(ref o) = input.owner {
        validate_ident(o, "owner")?;
    }
    if let Some(ref c) = input.category {
        validate_ident(c, "category")?;
    }
    if let Some(ref src) = input.source {
        validate_ident(src, "source")?;
    }
    if let Some(ref tags) = input.tags {
        if tags.len() > MAX_TAGS {
            return Err(MnemoError::Validation(format!("too many tags (max {MAX_TAGS})")));
        }
        if let Some(t) = tags.iter().find(|t| t.chars().count() > MAX_TAG_LEN) {
            return Err(MnemoError::Validation(format!("tag '{}' too long (max {MAX_TAG_LEN})", t)));
        }
    }
    Ok(())
}

pub fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("system clock before Unix epoch")
        .as_millis() as i64
}

/// SHA-256 over normalized content (lowercased, whitespace collapsed).
/// Two writes that differ only in casing or spacing are the same memory.
pub fn content_hash(content: &str) -> String {
    let normalized = content
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ");
    format!("{:x}", Sha256::digest(normalized.as_bytes()))
}

fn tokenize_for_dedup(text: &str) -> std::collections::HashSet<String> {
    text.split_whitespace()
        .map(|w| {
            w.trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase()
        })
        .filter(|w| !w.is_empty())
        .collect()
}

/// Jaccard similarity between two text snippets (no DB involved).
/// Returns true if similarity exceeds threshold.
pub(crate) fn jaccard_similar(a: &str, b: &str, threshold: f64) -> bool {
    let ta = tokenize_for_dedup(a);
    let tb = tokenize_for_dedup(b);
    if ta.len() < 3 || tb.len() < 3 {
        return false;
    }
    let inter = ta.intersection(&tb).count();
    let union = ta.union(&tb).count();
    union > 0 && (inter as f64 / union as f64) > threshold
}

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS memories (
    id TEXT PRIMARY KEY,
    tenant TEXT NOT NULL DEFAULT 'default',
    owner TEXT NOT NULL DEFAULT '',
    content TEXT NOT NULL,
    content_hash TEXT NOT NULL,
    category TEXT NOT NULL DEFAULT 'fact',
    privacy INTEGER NOT NULL DEFAULT 2,
    importance REAL NOT NULL DEFAULT 0.5,
    created_at INTEGER NOT NULL,
    last_accessed INTEGER NOT NULL,
    access_count INTEGER NOT NULL DEFAULT 0,
    repetition_count INTEGER NOT NULL DEFAULT 0,
    decay_rate REAL NOT NULL DEFAULT 1.0,
    source TEXT NOT NULL DEFAULT 'api',
    tags TEXT NOT NULL DEFAULT '[]',
    embedding BLOB
);

CREATE INDEX IF NOT EXISTS idx_mem_tenant ON memories(tenant);
CREATE INDEX IF NOT EXISTS idx_mem_hash ON memories(tenant, content_hash);
CREATE INDEX IF NOT EXISTS idx_mem_category ON memories(tenant, category);
CREATE INDEX IF NOT EXISTS idx_mem_last_accessed ON memories(last_accessed);

CREATE TABLE IF NOT EXISTS focus_sessions (
    id TEXT PRIMARY KEY,
    tenant TEXT NOT NULL,
    category TEXT NOT NULL,
    boost REAL NOT NULL DEFAULT 1.5,
    started_at INTEGER NOT NULL,
    expires_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_focus_tenant ON focus_sessions(tenant, expires_at);

CREATE TABLE IF NOT EXISTS team_mappings (
    id TEXT PRIMARY KEY,
    provider TEXT NOT NULL,
    external_team TEXT NOT NULL,
    tenant TEXT NOT NULL,
    default_category TEXT NOT NULL DEFAULT 'task',
    default_privacy INTEGER NOT NULL DEFAULT 2,
    created_at INTEGER NOT NULL,
    UNIQUE(provider, external_team)
);

CREATE TABLE IF NOT EXISTS tenant_settings (
    tenant TEXT PRIMARY KEY,
    mode TEXT NOT NULL DEFAULT 'persistent',
    updated_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS trash (
    id TEXT PRIMARY KEY,
    tenant TEXT NOT NULL DEFAULT 'default',
    owner TEXT NOT NULL DEFAULT '',
    content TEXT NOT NULL,
    category TEXT NOT NULL DEFAULT 'fact',
    privacy INTEGER NOT NULL DEFAULT 2,
    importance REAL NOT NULL,
    created_at INTEGER NOT NULL,
    deleted_at INTEGER NOT NULL,
    reason TEXT NOT NULL DEFAULT 'deleted',
    tags TEXT NOT NULL DEFAULT '[]',
    source TEXT NOT NULL DEFAULT 'api'
);
CREATE INDEX IF NOT EXISTS idx_trash_deleted ON trash(deleted_at);

CREATE TABLE IF NOT EXISTS mnemo_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

// External-content FTS — inserts and deletes are managed manually so the
// index stays aligned with the memories table.
const FTS_SCHEMA: &str =
    "CREATE VIRTUAL TABLE IF NOT EXISTS memories_fts USING fts5(\
     id UNINDEXED, content, tags, tokenize='unicode61')";

/// SQLite-backed memory store.
pub struct MemoryStore {
    pool: Pool<SqliteConnectionManager>,
    /// In-memory vector index for semantic search. Rebuilt from blobs at open.
    vec_index: RwLock<vec::VecIndex>,
}

impl MemoryStore {
    fn conn(&self) -> Result<PooledConn, MnemoError> {
        self.pool.get().map_err(|e| MnemoError::Internal(format!("pool: {e}")))
    }

    /// Database file size in bytes (via SQLite pragma).
    pub fn db_size_bytes(&self) -> i64 {
        self.conn()
            .and_then(|c| {
                c.query_row(
                    "SELECT page_count * page_size FROM pragma_page_count, pragma_page_size",
                    [],
                    |r| r.get(0),
                )
                .map_err(|e| MnemoError::Internal(e.to_string()))
            })
            .unwrap_or(0)
    }

    pub fn get_meta(&self, key: &str) -> Option<String> {
        self.conn().ok().and_then(|c| {
            c.query_row("SELECT value FROM mnemo_meta WHERE key = ?1", [key], |r| r.get(0))
                .ok()
        })
    }

    pub fn set_meta(&self, key: &str, value: &str) -> Result<(), MnemoError> {
        let c = self.conn()?;
        c.execute(
            "INSERT OR REPLACE INTO mnemo_meta (key, value) VALUES (?1, ?2)",
            rusqlite::params![key, value],
        )?;
        Ok(())
    }

    /// Lifecycle mode for a tenant. Unknown tenants are persistent.
    pub fn tenant_mode(&self, tenant: &str) -> MemoryMode {
        self.conn()
            .ok()
            .and_then(|c| {
                c.query_row(
                    "SELECT mode FROM tenant_settings WHERE tenant = ?1",
                    [tenant],
                    |r| r.get::<_, String>(0),
                )
                .ok()
            })
            .and_then(|m| MemoryMode::parse(&m).ok())
            .unwrap_or(MemoryMode::Persistent)
    }

    pub fn set_tenant_mode(&self, tenant: &str, mode: MemoryMode) -> Result<(), MnemoError> {
        validate_ident(tenant, "tenant")?;
        self.conn()?.execute(
            "INSERT INTO tenant_settings (tenant, mode, updated_at) VALUES (?1, ?2, ?3) \
             ON CONFLICT(tenant) DO UPDATE SET mode = excluded.mode, updated_at = excluded.updated_at",
            rusqlite::params![tenant, mode.as_str(), now_ms()],
        )?;
        Ok(())
    }

    /// All tenants in humanized mode — the only ones the decay sweep visits.
    pub fn humanized_tenants(&self) -> Vec<String> {
        let Ok(conn) = self.conn() else { return vec![] };
        let Ok(mut stmt) =
            conn.prepare("SELECT tenant FROM tenant_settings WHERE mode = 'humanized'")
        else {
            return vec![];
        };
        stmt.query_map([], |r| r.get(0))
            .map(|iter| iter.filter_map(|r| r.ok()).collect())
            .unwrap_or_default()
    }

    pub fn list_tenants(&self) -> Result<Vec<String>, MnemoError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT DISTINCT tenant FROM memories ORDER BY tenant")?;
        let rows = stmt
            .query_map([], |r| r.get(0))?
            .filter_map(|r| r.ok())
            .collect();
        Ok(rows)
    }

    /// Open (or create) a database at the given path.
    /// Pool size defaults to 8 (1 writer + 7 readers in WAL mode).
    pub fn open(path: &str) -> Result<Self, MnemoError> {
        let pool_size = if path == ":memory:" { 2 } else { 8 };
        let manager = if path == ":memory:" {
            // Shared cache so all pool connections see the same in-memory DB.
            // Each test gets a unique name to avoid cross-test pollution.
            let name = uuid::Uuid::new_v4().to_string();
            SqliteConnectionManager::file(format!("file:{name}?mode=memory&cache=shared"))
        } else {
            SqliteConnectionManager::file(path)
        };
        let pool = Pool::builder()
            .max_size(pool_size)
            .connection_customizer(Box::new(BusyTimeoutCustomizer))
            .build(manager)
            .map_err(|e| MnemoError::Internal(format!("pool: {e}")))?;

        let conn = pool.get().map_err(|e| MnemoError::Internal(e.to_string()))?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        conn.execute_batch(
            "PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON; PRAGMA auto_vacuum=INCREMENTAL;",
        )?;
        conn.execute_batch(SCHEMA)?;
        conn.execute(FTS_SCHEMA, [])?;
        drop(conn);

        let store = Self { pool, vec_index: RwLock::new(vec::VecIndex::new()) };
        store.repair_fts()?;
        store.load_vec_index();
        Ok(store)
    }
}

fn row_to_memory(row: &rusqlite::Row) -> rusqlite::Result<Memory> {
    row_to_memory_impl(row, false)
}

fn row_to_memory_with_embedding(row: &rusqlite::Row) -> rusqlite::Result<Memory> {
    row_to_memory_impl(row, true)
}

fn row_to_memory_impl(row: &rusqlite::Row, include_embedding: bool) -> rusqlite::Result<Memory> {
    let privacy_val: u8 = row.get("privacy")?;
    let tags_str: String = row.get("tags")?;
    let embedding = if include_embedding {
        let blob: Option<Vec<u8>> = row.get("embedding").ok();
        blob.map(|b| crate::embed::bytes_to_embedding(&b))
    } else {
        None
    };
    Ok(Memory {
        id: row.get("id")?,
        tenant: row.get("tenant")?,
        owner: row.get("owner")?,
        content: row.get("content")?,
        content_hash: row.get("content_hash")?,
        category: row.get("category")?,
        privacy: privacy_val.try_into().unwrap_or(Privacy::Team),
        importance: row.get("importance")?,
        created_at: row.get("created_at")?,
        last_accessed: row.get("last_accessed")?,
        access_count: row.get("access_count")?,
        repetition_count: row.get("repetition_count")?,
        decay_rate: row.get("decay_rate")?,
        source: row.get("source")?,
        tags: serde_json::from_str(&tags_str).unwrap_or_default(),
        embedding,
    })
}
