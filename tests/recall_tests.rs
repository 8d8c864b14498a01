use mnemo::recall::{search, SearchRequest};
use mnemo::store::*;

fn test_store() -> MemoryStore {
    MemoryStore::open(":memory:").expect("in-memory store")
}

fn req(query: &str) -> SearchRequest {
    SearchRequest {
        query: query.into(),
        ..Default::default()
    }
}

#[test]
fn keyword_search_finds_matches() {
    let store = test_store();
    store.insert(MemoryInput::new("the kubernetes cluster lives in frankfurt")).unwrap();
    store.insert(MemoryInput::new("lunch orders go through the slack channel")).unwrap();

    let resp = search(&store, &req("kubernetes frankfurt"), None);
    assert_eq!(resp.total, 1);
    assert_eq!(resp.memories[0].memory.content, "the kubernetes cluster lives in frankfurt");
    assert_eq!(resp.search_mode, "fts");
}

#[test]
fn search_is_tenant_scoped() {
    let store = test_store();
    store.insert(MemoryInput::new("acme billing runs on stripe").tenant("acme")).unwrap();
    store.insert(MemoryInput::new("globex billing runs on adyen").tenant("globex")).unwrap();

    let mut r = req("billing");
    r.tenant = Some("acme".into());
    let resp = search(&store, &r, None);
    assert_eq!(resp.total, 1);
    assert_eq!(resp.memories[0].memory.tenant, "acme");
}

#[test]
fn org_tier_visible_across_tenants() {
    let store = test_store();
    store
        .insert(MemoryInput::new("company holiday calendar moved to notion").tenant("hq").privacy(3))
        .unwrap();

    let mut r = req("holiday calendar notion");
    r.tenant = Some("acme".into());
    let resp = search(&store, &r, None);
    assert_eq!(resp.total, 1, "org memories cross tenant boundaries");
}

#[test]
fn personal_tier_requires_matching_actor() {
    let store = test_store();
    store
        .insert(
            MemoryInput::new("alice keeps her drafts in dropbox")
                .privacy(1)
                .owner("alice"),
        )
        .unwrap();

    // no actor: invisible
    let resp = search(&store, &req("drafts dropbox"), None);
    assert_eq!(resp.total, 0);

    // wrong actor: invisible
    let mut r = req("drafts dropbox");
    r.actor = Some("bob".into());
    assert_eq!(search(&store, &r, None).total, 0);

    // owner sees it
    let mut r = req("drafts dropbox");
    r.actor = Some("alice".into());
    assert_eq!(search(&store, &r, None).total, 1);
}

#[test]
fn semantic_search_uses_embeddings() {
    let store = test_store();
    let hit = store.insert(MemoryInput::new("vector indexed entry")).unwrap();
    let miss = store.insert(MemoryInput::new("orthogonal entry")).unwrap();
    store.set_embedding(&hit.id, &[1.0, 0.0, 0.0]).unwrap();
    store.set_embedding(&miss.id, &[0.0, 1.0, 0.0]).unwrap();

    let resp = search(&store, &req("unrelated words"), Some(&[1.0, 0.0, 0.0]));
    assert_eq!(resp.search_mode, "semantic+fts");
    assert_eq!(resp.total, 1);
    assert_eq!(resp.memories[0].memory.id, hit.id);
    assert!(resp.memories[0].relevance > 0.99);
}

#[test]
fn focus_boost_reorders_results() {
    let store = test_store();
    store
        .insert(MemoryInput::new("quarterly report deadline friday").category("task"))
        .unwrap();
    store
        .insert(MemoryInput::new("meeting notes deadline friday").category("meeting"))
        .unwrap();

    // without focus, task outranks meeting (category weight 1.0 vs 0.95)
    let resp = search(&store, &req("deadline friday"), None);
    assert_eq!(resp.total, 2);
    assert_eq!(resp.memories[0].memory.category, "task");

    store.activate_focus("default", &["meeting".into()], 30, 2.0).unwrap();
    let resp = search(&store, &req("deadline friday"), None);
    assert_eq!(resp.memories[0].memory.category, "meeting");
    assert_eq!(resp.focus.get("meeting"), Some(&2.0));
}

#[test]
fn humanized_mode_hides_forgotten_memories() {
    let store = test_store();
    store
        .insert(MemoryInput::new("barely remembered detail").importance(0.01))
        .unwrap();

    // persistent tenants always see it
    let resp = search(&store, &req("barely remembered"), None);
    assert_eq!(resp.total, 1);

    // humanized tenants don't: retention 0.01 is below the forget threshold
    store.set_tenant_mode("default", MemoryMode::Humanized).unwrap();
    let resp = search(&store, &req("barely remembered"), None);
    assert_eq!(resp.total, 0);
}

#[test]
fn category_and_tag_filters() {
    let store = test_store();
    store
        .insert(MemoryInput::new("release checklist updated").category("task").tags(vec!["release".into()]))
        .unwrap();
    store
        .insert(MemoryInput::new("release party planned").category("event"))
        .unwrap();

    let mut r = req("release");
    r.categories = Some(vec!["task".into()]);
    let resp = search(&store, &r, None);
    assert_eq!(resp.total, 1);
    assert_eq!(resp.memories[0].memory.category, "task");

    let mut r = req("release");
    r.tags = Some(vec!["release".into()]);
    let resp = search(&store, &r, None);
    assert_eq!(resp.total, 1);
    assert_eq!(resp.memories[0].memory.content, "release checklist updated");
}

#[test]
fn max_privacy_ceiling_excludes_org() {
    let store = test_store();
    store.insert(MemoryInput::new("tenant local deploy notes")).unwrap();
    store
        .insert(MemoryInput::new("org wide deploy announcement").tenant("hq").privacy(3))
        .unwrap();

    let resp = search(&store, &req("deploy"), None);
    assert_eq!(resp.total, 2);

    let mut r = req("deploy");
    r.max_privacy = Some(2);
    let resp = search(&store, &r, None);
    assert_eq!(resp.total, 1);
    assert_eq!(resp.memories[0].memory.content, "tenant local deploy notes");
}

#[test]
fn min_importance_filter() {
    let store = test_store();
    store.insert(MemoryInput::new("important payment fact").importance(0.9)).unwrap();
    store.insert(MemoryInput::new("trivial payment chatter").importance(0.1)).unwrap();

    let mut r = req("payment");
    r.min_importance = Some(0.5);
    let resp = search(&store, &r, None);
    assert_eq!(resp.total, 1);
    assert_eq!(resp.memories[0].memory.content, "important payment fact");
}

#[test]
fn pagination() {
    let store = test_store();
    for i in 0..5 {
        store
            .insert(MemoryInput::new(format!("pagination fixture number {i}")).skip_dedup())
            .unwrap();
    }

    let mut r = req("pagination fixture");
    r.limit = Some(2);
    let page1 = search(&store, &r, None);
    assert_eq!(page1.total, 5);
    assert_eq!(page1.memories.len(), 2);

    r.offset = Some(4);
    let page3 = search(&store, &r, None);
    assert_eq!(page3.memories.len(), 1);
}

#[test]
fn since_until_window_bounds_results() {
    let store = test_store();
    let older = store.insert(MemoryInput::new("window fixture older").skip_dedup()).unwrap();
    std::thread::sleep(std::time::Duration::from_millis(10));
    let cut = now_ms();
    std::thread::sleep(std::time::Duration::from_millis(10));
    let newer = store.insert(MemoryInput::new("window fixture newer").skip_dedup()).unwrap();

    let mut r = req("window fixture");
    assert_eq!(search(&store, &r, None).total, 2);

    r.since = Some(cut);
    let resp = search(&store, &r, None);
    assert_eq!(resp.total, 1);
    assert_eq!(resp.memories[0].memory.id, newer.id);

    r.since = None;
    r.until = Some(cut);
    let resp = search(&store, &r, None);
    assert_eq!(resp.total, 1);
    assert_eq!(resp.memories[0].memory.id, older.id);

    // an empty window excludes everything
    r.since = Some(cut);
    assert_eq!(search(&store, &r, None).total, 0);
}

#[test]
fn min_score_drops_weak_keyword_matches() {
    let store = test_store();
    store.insert(MemoryInput::new("threshold keyword fixture")).unwrap();

    // keyword-only hits top out at 0.5 relevance
    let mut r = req("threshold keyword");
    r.min_score = Some(0.4);
    assert_eq!(search(&store, &r, None).total, 1);

    r.min_score = Some(0.6);
    assert_eq!(search(&store, &r, None).total, 0);
}

#[test]
fn min_score_raises_the_semantic_floor() {
    let store = test_store();
    let strong = store.insert(MemoryInput::new("closely aligned entry")).unwrap();
    let weak = store.insert(MemoryInput::new("loosely aligned entry")).unwrap();
    store.set_embedding(&strong.id, &[1.0, 0.0, 0.0]).unwrap();
    store.set_embedding(&weak.id, &[0.6, 0.8, 0.0]).unwrap();

    // default floor (0.3) admits both: cosines are 1.0 and 0.6
    let resp = search(&store, &req("unrelated words"), Some(&[1.0, 0.0, 0.0]));
    assert_eq!(resp.total, 2);

    let mut r = req("unrelated words");
    r.min_score = Some(0.9);
    let resp = search(&store, &r, Some(&[1.0, 0.0, 0.0]));
    assert_eq!(resp.total, 1);
    assert_eq!(resp.memories[0].memory.id, strong.id);
}

#[test]
fn privacy_promotion_reaches_semantic_search() {
    let store = test_store();
    let mem = store
        .insert(MemoryInput::new("roadmap summary for the platform group").tenant("hq"))
        .unwrap();
    store.set_embedding(&mem.id, &[1.0, 0.0, 0.0]).unwrap();

    // team tier: invisible to other tenants' semantic pass
    let mut r = req("unrelated words");
    r.tenant = Some("acme".into());
    assert_eq!(search(&store, &r, Some(&[1.0, 0.0, 0.0])).total, 0);

    // promoting to org must reach the index without a restart
    store.update_fields(&mem.id, None, None, Some(3), None, None).unwrap();
    let resp = search(&store, &r, Some(&[1.0, 0.0, 0.0]));
    assert_eq!(resp.total, 1);
    assert_eq!(resp.memories[0].memory.id, mem.id);

    // and demoting back hides it again
    store.update_fields(&mem.id, None, None, Some(2), None, None).unwrap();
    assert_eq!(search(&store, &r, Some(&[1.0, 0.0, 0.0])).total, 0);
}

#[test]
fn search_touches_results_unless_dry() {
    let store = test_store();
    let mem = store.insert(MemoryInput::new("reinforced by recall")).unwrap();

    let mut r = req("reinforced recall");
    r.dry = true;
    search(&store, &r, None);
    assert_eq!(store.get(&mem.id).unwrap().unwrap().access_count, 0);

    r.dry = false;
    search(&store, &r, None);
    assert_eq!(store.get(&mem.id).unwrap().unwrap().access_count, 1);
}

#[test]
fn scores_capped_at_one() {
    let store = test_store();
    store
        .insert(MemoryInput::new("maxed out identity entry").category("identity").importance(1.0))
        .unwrap();
    store.activate_focus("default", &["identity".into()], 30, 3.0).unwrap();

    let resp = search(&store, &req("maxed identity entry"), None);
    assert_eq!(resp.total, 1);
    assert!(resp.memories[0].score <= 1.0);
}

#[test]
fn sort_by_recent() {
    let store = test_store();
    store.insert(MemoryInput::new("older sortable entry one").skip_dedup()).unwrap();
    std::thread::sleep(std::time::Duration::from_millis(5));
    let newer = store.insert(MemoryInput::new("newer sortable entry two").skip_dedup()).unwrap();

    let mut r = req("sortable entry");
    r.sort_by = Some("recent".into());
    let resp = search(&store, &r, None);
    assert_eq!(resp.memories[0].memory.id, newer.id);
}
