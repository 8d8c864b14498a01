use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use mnemo::api::router;
use mnemo::{AppState, EmbedCache};
use serde_json::json;
use tower::ServiceExt;

fn test_state(api_key: Option<&str>) -> AppState {
    let store = mnemo::store::MemoryStore::open(":memory:").unwrap();
    AppState {
        store: std::sync::Arc::new(store),
        embed: None,
        api_key: api_key.map(|s| s.to_string()),
        embed_cache: EmbedCache::new(16),
        started_at: std::time::Instant::now(),
    }
}

async fn body_json(resp: axum::response::Response) -> serde_json::Value {
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn json_req(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap()
}

fn get_req(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut b = Request::builder().method("GET").uri(uri);
    if let Some(t) = token {
        b = b.header("authorization", format!("Bearer {t}"));
    }
    b.body(Body::empty()).unwrap()
}

fn empty_req(method: &str, uri: &str) -> Request<Body> {
    Request::builder().method(method).uri(uri).body(Body::empty()).unwrap()
}

// --- Auth ---

#[tokio::test]
async fn auth_rejects_missing_token() {
    let app = router(test_state(Some("secret123")));
    let resp = app.oneshot(get_req("/recent?hours=1", None)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn auth_rejects_wrong_token() {
    let app = router(test_state(Some("secret123")));
    let resp = app
        .oneshot(get_req("/recent?hours=1", Some("wrongtoken")))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn auth_passes_correct_token() {
    let app = router(test_state(Some("secret123")));
    let resp = app
        .oneshot(get_req("/recent?hours=1", Some("secret123")))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn health_is_public_even_with_auth() {
    let app = router(test_state(Some("secret123")));
    let resp = app.oneshot(get_req("/health", None)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["name"], "mnemo");
}

// --- Memories ---

#[tokio::test]
async fn create_and_get_memory() {
    let app = router(test_state(None));
    let resp = app
        .clone()
        .oneshot(json_req(
            "POST",
            "/memories",
            json!({"content": "the ci pipeline uses github actions", "category": "fact"}),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let created = body_json(resp).await;
    let id = created["id"].as_str().unwrap().to_string();

    let resp = app.oneshot(get_req(&format!("/memories/{id}"), None)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let got = body_json(resp).await;
    assert_eq!(got["content"], "the ci pipeline uses github actions");
    assert_eq!(got["category"], "fact");
}

#[tokio::test]
async fn duplicate_create_returns_ok_not_created() {
    let app = router(test_state(None));
    let body = json!({"content": "repeated memory about the same thing"});
    let resp = app.clone().oneshot(json_req("POST", "/memories", body.clone())).await.unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);

    let resp = app.oneshot(json_req("POST", "/memories", body)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let merged = body_json(resp).await;
    assert_eq!(merged["repetition_count"], 1);
}

#[tokio::test]
async fn create_rejects_empty_content() {
    let app = router(test_state(None));
    let resp = app
        .oneshot(json_req("POST", "/memories", json!({"content": "  "})))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body = body_json(resp).await;
    assert!(body["error"].as_str().unwrap().contains("empty"));
}

#[tokio::test]
async fn tenant_header_scopes_writes() {
    let app = router(test_state(None));
    let req = Request::builder()
        .method("POST")
        .uri("/memories")
        .header("content-type", "application/json")
        .header("x-tenant", "acme")
        .body(Body::from(
            serde_json::to_vec(&json!({"content": "scoped by header"})).unwrap(),
        ))
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let created = body_json(resp).await;
    assert_eq!(created["tenant"], "acme");

    let resp = app.oneshot(get_req("/memories?tenant=acme", None)).await.unwrap();
    let listed = body_json(resp).await;
    assert_eq!(listed.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn update_memory_fields() {
    let app = router(test_state(None));
    let resp = app
        .clone()
        .oneshot(json_req("POST", "/memories", json!({"content": "patchable", "importance": 0.4})))
        .await
        .unwrap();
    let id = body_json(resp).await["id"].as_str().unwrap().to_string();

    let resp = app
        .oneshot(json_req(
            "PATCH",
            &format!("/memories/{id}"),
            json!({"category": "decision", "importance": 0.9}),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let updated = body_json(resp).await;
    assert_eq!(updated["category"], "decision");
    assert_eq!(updated["importance"], 0.9);
}

#[tokio::test]
async fn delete_then_restore_via_trash() {
    let app = router(test_state(None));
    let resp = app
        .clone()
        .oneshot(json_req("POST", "/memories", json!({"content": "restorable"})))
        .await
        .unwrap();
    let id = body_json(resp).await["id"].as_str().unwrap().to_string();

    let resp = app
        .clone()
        .oneshot(empty_req("DELETE", &format!("/memories/{id}")))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = app.clone().oneshot(get_req("/trash", None)).await.unwrap();
    let trash = body_json(resp).await;
    assert_eq!(trash.as_array().unwrap().len(), 1);
    assert_eq!(trash[0]["reason"], "deleted");

    let resp = app
        .clone()
        .oneshot(empty_req("POST", &format!("/trash/{id}/restore")))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = app.oneshot(get_req(&format!("/memories/{id}"), None)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn get_missing_returns_404() {
    let app = router(test_state(None));
    let resp = app.oneshot(get_req("/memories/ffffffff", None)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn batch_create() {
    let app = router(test_state(None));
    let resp = app
        .clone()
        .oneshot(json_req(
            "POST",
            "/memories/batch",
            json!([{"content": "batch one"}, {"content": "batch two"}, {"content": ""}]),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body = body_json(resp).await;
    assert_eq!(body["inserted"], 2);
    assert_eq!(body["skipped"], 1);
}

#[tokio::test]
async fn batch_delete_by_tenant() {
    let app = router(test_state(None));
    for content in ["wipe me", "wipe me too"] {
        app.clone()
            .oneshot(json_req(
                "POST",
                "/memories",
                json!({"content": content, "tenant": "doomed", "skip_dedup": true}),
            ))
            .await
            .unwrap();
    }

    let resp = app
        .clone()
        .oneshot(json_req("DELETE", "/memories", json!({"tenant": "doomed"})))
        .await
        .unwrap();
    let body = body_json(resp).await;
    assert_eq!(body["deleted"], 2);
}

// --- Search ---

#[tokio::test]
async fn post_search_keyword_only() {
    let app = router(test_state(None));
    app.clone()
        .oneshot(json_req("POST", "/memories", json!({"content": "the backup job runs nightly"})))
        .await
        .unwrap();

    let resp = app
        .oneshot(json_req("POST", "/search", json!({"query": "backup nightly"})))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["total"], 1);
    assert_eq!(body["search_mode"], "fts");
    assert_eq!(body["memories"][0]["content"], "the backup job runs nightly");
}

#[tokio::test]
async fn search_rejects_empty_query() {
    let app = router(test_state(None));
    let resp = app
        .oneshot(json_req("POST", "/search", json!({"query": "  "})))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn quick_search_returns_compact_results() {
    let app = router(test_state(None));
    app.clone()
        .oneshot(json_req("POST", "/memories", json!({"content": "quick search target"})))
        .await
        .unwrap();

    let resp = app.oneshot(get_req("/search?q=target", None)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    let first = &body.as_array().unwrap()[0];
    assert_eq!(first["id"].as_str().unwrap().len(), 8);
    assert_eq!(first["content"], "quick search target");
    assert_eq!(first["privacy"], "team");
}

// --- Focus & mode ---

#[tokio::test]
async fn focus_lifecycle_over_http() {
    let app = router(test_state(None));
    let resp = app
        .clone()
        .oneshot(json_req(
            "POST",
            "/focus",
            json!({"categories": ["task"], "minutes": 30, "boost": 2.0}),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let sessions = body_json(resp).await;
    assert_eq!(sessions[0]["category"], "task");
    assert_eq!(sessions[0]["boost"], 2.0);

    let resp = app.clone().oneshot(get_req("/focus", None)).await.unwrap();
    assert_eq!(body_json(resp).await.as_array().unwrap().len(), 1);

    let resp = app.clone().oneshot(empty_req("DELETE", "/focus")).await.unwrap();
    assert_eq!(body_json(resp).await["cleared"], 1);

    let resp = app.oneshot(get_req("/focus", None)).await.unwrap();
    assert!(body_json(resp).await.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn mode_toggle_over_http() {
    let app = router(test_state(None));
    let resp = app.clone().oneshot(get_req("/mode?tenant=acme", None)).await.unwrap();
    assert_eq!(body_json(resp).await["mode"], "persistent");

    let resp = app
        .clone()
        .oneshot(json_req("PUT", "/mode", json!({"tenant": "acme", "mode": "humanized"})))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = app.clone().oneshot(get_req("/mode?tenant=acme", None)).await.unwrap();
    assert_eq!(body_json(resp).await["mode"], "humanized");

    let resp = app
        .oneshot(json_req("PUT", "/mode", json!({"mode": "eternal"})))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn manual_sweep_reports() {
    let app = router(test_state(None));
    app.clone()
        .oneshot(json_req(
            "POST",
            "/memories",
            json!({"content": "fading fast", "tenant": "acme", "importance": 0.01}),
        ))
        .await
        .unwrap();
    app.clone()
        .oneshot(json_req("PUT", "/mode", json!({"tenant": "acme", "mode": "humanized"})))
        .await
        .unwrap();

    let resp = app.oneshot(empty_req("POST", "/sweep")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let report = body_json(resp).await;
    assert_eq!(report["forgotten"], 1);
}

// --- Teams & ingest ---

#[tokio::test]
async fn team_mapping_and_ingest() {
    let app = router(test_state(None));
    let resp = app
        .clone()
        .oneshot(json_req(
            "POST",
            "/teams",
            json!({
                "provider": "linear",
                "external_team": "ENG",
                "tenant": "acme",
                "default_category": "task"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);

    let resp = app
        .clone()
        .oneshot(json_req(
            "POST",
            "/ingest",
            json!({
                "provider": "linear",
                "team": "ENG",
                "content": "ENG-421 moved to in progress"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let mem = body_json(resp).await;
    assert_eq!(mem["tenant"], "acme");
    assert_eq!(mem["category"], "task");
    assert_eq!(mem["source"], "linear");
}

#[tokio::test]
async fn ingest_unknown_team_is_404() {
    let app = router(test_state(None));
    let resp = app
        .oneshot(json_req(
            "POST",
            "/ingest",
            json!({"provider": "linear", "team": "NOPE", "content": "lost event"}),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body = body_json(resp).await;
    assert!(body["error"].as_str().unwrap().contains("NOPE"));
}

#[tokio::test]
async fn ingest_event_overrides_mapping_defaults() {
    let app = router(test_state(None));
    app.clone()
        .oneshot(json_req(
            "POST",
            "/teams",
            json!({"provider": "slack", "external_team": "general", "tenant": "acme"}),
        ))
        .await
        .unwrap();

    let resp = app
        .oneshot(json_req(
            "POST",
            "/ingest",
            json!({
                "provider": "slack",
                "team": "general",
                "content": "we decided to drop the legacy endpoint",
                "category": "decision",
                "privacy": 3
            }),
        ))
        .await
        .unwrap();
    let mem = body_json(resp).await;
    assert_eq!(mem["category"], "decision");
    assert_eq!(mem["privacy"], 3);
}

#[tokio::test]
async fn delete_team_mapping_over_http() {
    let app = router(test_state(None));
    let resp = app
        .clone()
        .oneshot(json_req(
            "POST",
            "/teams",
            json!({"provider": "linear", "external_team": "ENG", "tenant": "acme"}),
        ))
        .await
        .unwrap();
    let id = body_json(resp).await["id"].as_str().unwrap().to_string();

    let resp = app
        .clone()
        .oneshot(empty_req("DELETE", &format!("/teams/{id}")))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = app.oneshot(get_req("/teams", None)).await.unwrap();
    assert!(body_json(resp).await.as_array().unwrap().is_empty());
}

// --- Stats & index ---

#[tokio::test]
async fn stats_reflect_inserts() {
    let app = router(test_state(None));
    app.clone()
        .oneshot(json_req("POST", "/memories", json!({"content": "counted", "privacy": 3})))
        .await
        .unwrap();

    let resp = app.oneshot(get_req("/stats", None)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["total"], 1);
    assert_eq!(body["org"], 1);
}

#[tokio::test]
async fn index_lists_endpoints() {
    let app = router(test_state(None));
    let resp = app.oneshot(get_req("/", None)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert!(body["endpoints"].is_object());
    assert_eq!(body["embed_enabled"], false);
}
