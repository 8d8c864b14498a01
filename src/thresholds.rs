/// Similarity and decay thresholds shared across components.
///
/// Similarity values are Jaccard token overlap; higher = stricter.

/// Insert path: reinforce an existing memory instead of storing a near-duplicate.
pub const INSERT_DEDUP_SIM: f64 = 0.65;

/// How many recent memories the near-duplicate scan considers per insert.
pub const DEDUP_SCAN_LIMIT: usize = 200;

/// Humanized mode: retention below this means the memory is forgotten.
pub const FORGET_THRESHOLD: f64 = 0.05;

/// Importance floor for passive decay. Identity memories get a higher floor —
/// who the user is should survive long idle stretches.
pub const DECAY_FLOOR: f64 = 0.05;
pub const IDENTITY_FLOOR: f64 = 0.30;

/// Sweep: memories idle longer than this lose importance (humanized tenants).
pub const DECAY_IDLE_HOURS: f64 = 72.0;
pub const DECAY_STEP: f64 = 0.02;

/// Focus sessions: boost and duration bounds.
pub const FOCUS_MIN_BOOST: f64 = 1.0;
pub const FOCUS_MAX_BOOST: f64 = 3.0;
pub const FOCUS_MAX_MINUTES: u64 = 24 * 60;
pub const FOCUS_DEFAULT_BOOST: f64 = 1.5;
pub const FOCUS_DEFAULT_MINUTES: u64 = 60;
