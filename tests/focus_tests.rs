use mnemo::error::MnemoError;
use mnemo::store::*;
use mnemo::thresholds::{FOCUS_MAX_BOOST, FOCUS_MAX_MINUTES};

fn test_store() -> MemoryStore {
    MemoryStore::open(":memory:").expect("in-memory store")
}

#[test]
fn activate_and_list() {
    let store = test_store();
    let sessions = store
        .activate_focus("acme", &["task".into(), "meeting".into()], 45, 2.0)
        .unwrap();
    assert_eq!(sessions.len(), 2);

    let active = store.active_focus("acme");
    assert_eq!(active.len(), 2);
    assert!(active.iter().all(|s| (s.boost - 2.0).abs() < f64::EPSILON));
    assert!(active.iter().all(|s| s.expires_at > s.started_at));

    // other tenants are unaffected
    assert!(store.active_focus("globex").is_empty());
}

#[test]
fn empty_categories_rejected() {
    let store = test_store();
    let err = store.activate_focus("acme", &[], 30, 1.5).unwrap_err();
    assert!(matches!(err, MnemoError::Validation(_)));

    let err = store.activate_focus("acme", &["   ".into()], 30, 1.5).unwrap_err();
    assert!(matches!(err, MnemoError::Validation(_)));
}

#[test]
fn boost_and_duration_clamped() {
    let store = test_store();
    let sessions = store
        .activate_focus("acme", &["task".into()], 99_999, 50.0)
        .unwrap();
    let s = &sessions[0];
    assert!((s.boost - FOCUS_MAX_BOOST).abs() < f64::EPSILON);
    let minutes = (s.expires_at - s.started_at) / 60_000;
    assert_eq!(minutes as u64, FOCUS_MAX_MINUTES);

    // sub-1.0 boosts get raised to neutral
    let sessions = store.activate_focus("acme", &["fact".into()], 10, 0.2).unwrap();
    assert!((sessions[0].boost - 1.0).abs() < f64::EPSILON);
}

#[test]
fn reactivation_replaces_not_stacks() {
    let store = test_store();
    store.activate_focus("acme", &["task".into()], 30, 2.0).unwrap();
    store.activate_focus("acme", &["task".into()], 30, 1.5).unwrap();

    let active = store.active_focus("acme");
    assert_eq!(active.len(), 1, "same category replaces the old session");
    assert!((active[0].boost - 1.5).abs() < f64::EPSILON);

    let boosts = store.focus_boosts("acme");
    assert_eq!(boosts.get("task"), Some(&1.5));
}

#[test]
fn categories_normalized_to_lowercase() {
    let store = test_store();
    let sessions = store.activate_focus("acme", &["  Task ".into()], 30, 1.5).unwrap();
    assert_eq!(sessions[0].category, "task");
}

#[test]
fn clear_focus_ends_sessions() {
    let store = test_store();
    store
        .activate_focus("acme", &["task".into(), "fact".into()], 30, 1.5)
        .unwrap();
    assert_eq!(store.clear_focus("acme").unwrap(), 2);
    assert!(store.active_focus("acme").is_empty());
    assert!(store.focus_boosts("acme").is_empty());
}

#[test]
fn purge_leaves_active_sessions_alone() {
    let store = test_store();
    store.activate_focus("acme", &["task".into()], 30, 1.5).unwrap();
    assert_eq!(store.purge_expired_focus().unwrap(), 0);
    assert_eq!(store.active_focus("acme").len(), 1);
}
