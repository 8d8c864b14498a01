//! Humanized forgetting: retention curves and the background sweep.
//!
//! Persistent tenants are untouched. Humanized tenants decay — a memory's
//! retention falls with idle time, reinforcement resets the clock, and
//! memories below the forget threshold are moved to trash ("forgotten"),
//! never hard-deleted.

use serde::Serialize;
use tracing::info;

use crate::store::{Memory, MemoryStore};
use crate::thresholds::{
    DECAY_FLOOR, DECAY_IDLE_HOURS, DECAY_STEP, FORGET_THRESHOLD, IDENTITY_FLOOR,
};

/// Default decay rate per category. Lower = longer-lived.
/// Retention halves roughly every `168 * ln(2) / rate` idle hours.
pub fn default_decay(category: &str) -> f64 {
    match category {
        "identity" => 0.05,
        "preference" => 0.2,
        "decision" => 0.3,
        "fact" => 0.5,
        "task" | "meeting" => 1.0,
        "event" => 2.0,
        "chatter" => 5.0,
        _ => 1.0,
    }
}

/// Retention score: importance discounted by idle time.
/// 1.0 = fully retained, below FORGET_THRESHOLD = forgotten.
pub fn retention(mem: &Memory, now_ms: i64) -> f64 {
    let idle_hours = ((now_ms - mem.last_accessed) as f64 / 3_600_000.0).max(0.0);
    let rate = if mem.decay_rate.is_finite() { mem.decay_rate.clamp(0.0, 10.0) } else { 1.0 };
    mem.importance * (-rate * idle_hours / 168.0).exp()
}

#[derive(Debug, Default, Serialize)]
pub struct SweepReport {
    pub focus_expired: usize,
    pub tenants_swept: usize,
    pub importance_decayed: usize,
    pub forgotten: usize,
}

/// One maintenance pass: expire focus sessions, then decay and forget in
/// every humanized tenant. Safe to run concurrently with API traffic.
pub fn sweep(store: &MemoryStore) -> SweepReport {
    let mut report = SweepReport {
        focus_expired: store.purge_expired_focus().unwrap_or(0),
        ..Default::default()
    };

    for tenant in store.humanized_tenants() {
        report.tenants_swept += 1;
        report.importance_decayed += store
            .decay_importance(&tenant, DECAY_IDLE_HOURS, DECAY_STEP, DECAY_FLOOR, IDENTITY_FLOOR)
            .unwrap_or(0);

        for mem in store.list_decayed(&tenant, FORGET_THRESHOLD) {
            match store.remove_to_trash(&mem.id, "forgotten") {
                Ok(true) => report.forgotten += 1,
                Ok(false) => {}
                Err(e) => tracing::warn!(id = %mem.id, error = %e, "forget failed"),
            }
        }
    }

    if report.forgotten > 0 {
        if let Err(e) = store.vacuum_incremental(256) {
            tracing::warn!(error = %e, "incremental vacuum failed");
        }
    }

    let _ = store.set_meta("last_sweep_ms", &crate::store::now_ms().to_string());
    if report.focus_expired > 0 || report.forgotten > 0 || report.importance_decayed > 0 {
        info!(
            focus_expired = report.focus_expired,
            decayed = report.importance_decayed,
            forgotten = report.forgotten,
            "sweep"
        );
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{now_ms, MemoryInput};

    fn mem_with(importance: f64, decay_rate: f64, idle_hours: f64) -> Memory {
        let store = MemoryStore::open(":memory:").unwrap();
        let mut m = store.insert(MemoryInput::new("retention fixture")).unwrap();
        m.importance = importance;
        m.decay_rate = decay_rate;
        m.last_accessed = now_ms() - (idle_hours * 3_600_000.0) as i64;
        m
    }

    #[test]
    fn fresh_memory_fully_retained() {
        let m = mem_with(0.8, 1.0, 0.0);
        let r = retention(&m, now_ms());
        assert!((r - 0.8).abs() < 1e-6);
    }

    #[test]
    fn retention_falls_with_idle_time() {
        let fresh = mem_with(0.5, 1.0, 1.0);
        let stale = mem_with(0.5, 1.0, 500.0);
        let now = now_ms();
        assert!(retention(&fresh, now) > retention(&stale, now));
    }

    #[test]
    fn chatter_fades_faster_than_identity() {
        let identity = mem_with(0.5, default_decay("identity"), 168.0);
        let chatter = mem_with(0.5, default_decay("chatter"), 168.0);
        let now = now_ms();
        assert!(retention(&identity, now) > retention(&chatter, now));
        // a week-idle chatter memory is effectively gone
        assert!(retention(&chatter, now) < FORGET_THRESHOLD);
    }

    #[test]
    fn unknown_category_gets_neutral_decay() {
        assert_eq!(default_decay("zebra"), 1.0);
    }
}
