mod common;

use std::sync::Arc;

use axum::http::StatusCode;
use backup_service::jobs::{JobKind, JobRegistry};
use chrono::Utc;
use common::{app, body_json, body_text, load_holder, send, write_config, DOCUMENT};
use serde_json::json;

const ALLOWED: &str = "10.0.0.5:40000";
const OUTSIDER: &str = "192.168.1.1:40000";

#[tokio::test]
async fn test_health_and_version() {
    let dir = tempfile::tempdir().unwrap();
    let holder = load_holder(&write_config(dir.path(), "config.yml", DOCUMENT).await).await;
    let app = app(holder, Arc::new(JobRegistry::new()), OUTSIDER);

    let response = send(&app, "GET", "/health", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "OK");

    let version = body_json(send(&app, "GET", "/version", None).await).await;
    assert_eq!(version["name"], "backup-service");
}

#[tokio::test]
async fn test_get_config_materialises_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let holder = load_holder(&write_config(dir.path(), "config.yml", DOCUMENT).await).await;
    let app = app(holder, Arc::new(JobRegistry::new()), OUTSIDER);

    let config = body_json(send(&app, "GET", "/config", None).await).await;
    assert_eq!(config["backup-policies"]["policy"]["retry-policy"]["max-retries"], 3);
    assert_eq!(config["backup-routines"]["daily"]["source-cluster"], "main");

    let routines = body_json(send(&app, "GET", "/config/routines", None).await).await;
    assert!(routines.get("daily").is_some());

    let missing = send(&app, "GET", "/config/storage/nope", None).await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);

    let unknown = send(&app, "GET", "/config/widgets", None).await;
    assert_eq!(unknown.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_add_update_delete_storage() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(dir.path(), "config.yml", DOCUMENT).await;
    let holder = load_holder(&path).await;
    let app = app(holder.clone(), Arc::new(JobRegistry::new()), ALLOWED);

    let body = json!({ "type": "local", "path": "/archive" });
    let created = send(&app, "POST", "/config/storage/archive", Some(body.clone())).await;
    assert_eq!(created.status(), StatusCode::CREATED);

    let duplicate = send(&app, "POST", "/config/storage/archive", Some(body)).await;
    assert_eq!(duplicate.status(), StatusCode::CONFLICT);

    let fetched = body_json(send(&app, "GET", "/config/storage/archive", None).await).await;
    assert_eq!(fetched["path"], "/archive");

    let updated = send(
        &app,
        "PUT",
        "/config/storage/archive",
        Some(json!({ "type": "local", "path": "/archive2" })),
    )
    .await;
    assert_eq!(updated.status(), StatusCode::NO_CONTENT);
    assert_eq!(holder.snapshot().storage["archive"].path(), "/archive2");

    let deleted = send(&app, "DELETE", "/config/storage/archive", None).await;
    assert_eq!(deleted.status(), StatusCode::NO_CONTENT);
    assert!(!holder.snapshot().storage.contains_key("archive"));

    let persisted = tokio::fs::read_to_string(&path).await.unwrap();
    assert!(!persisted.contains("/archive2"));
}

#[tokio::test]
async fn test_rejected_edits_keep_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let holder = load_holder(&write_config(dir.path(), "config.yml", DOCUMENT).await).await;
    let before = holder.snapshot();
    let app = app(holder.clone(), Arc::new(JobRegistry::new()), ALLOWED);

    let in_use = send(&app, "DELETE", "/config/clusters/main", None).await;
    assert_eq!(in_use.status(), StatusCode::CONFLICT);

    let dangling = json!({
        "backup-policy": "policy",
        "source-cluster": "clusterX",
        "storage": "local",
        "interval-cron": "@daily"
    });
    let invalid = send(&app, "PUT", "/config/routines/daily", Some(dangling)).await;
    assert_eq!(invalid.status(), StatusCode::BAD_REQUEST);
    assert!(body_text(invalid).await.contains("clusterX"));

    let malformed = send(&app, "POST", "/config/clusters/other", Some(json!({ "seed-nodes": "x" }))).await;
    assert_eq!(malformed.status(), StatusCode::BAD_REQUEST);

    assert!(Arc::ptr_eq(&before, &holder.snapshot()));
}

#[tokio::test]
async fn test_mutations_are_rate_limited() {
    let dir = tempfile::tempdir().unwrap();
    let holder = load_holder(&write_config(dir.path(), "config.yml", DOCUMENT).await).await;
    let jobs = Arc::new(JobRegistry::new());

    let outsider = app(holder.clone(), jobs.clone(), OUTSIDER);
    assert_eq!(send(&outsider, "POST", "/config/reload", None).await.status(), StatusCode::NO_CONTENT);
    assert_eq!(send(&outsider, "POST", "/config/reload", None).await.status(), StatusCode::NO_CONTENT);
    assert_eq!(
        send(&outsider, "POST", "/config/reload", None).await.status(),
        StatusCode::TOO_MANY_REQUESTS
    );
    // Reads are not admission controlled.
    assert_eq!(send(&outsider, "GET", "/config", None).await.status(), StatusCode::OK);

    let insider = app(holder, jobs, ALLOWED);
    for _ in 0..10 {
        assert_eq!(send(&insider, "POST", "/config/reload", None).await.status(), StatusCode::NO_CONTENT);
    }
}

#[tokio::test]
async fn test_context_path_prefixes_routes() {
    let dir = tempfile::tempdir().unwrap();
    let document = DOCUMENT.replace("  http:\n", "  http:\n    context-path: /api/v1/\n");
    let holder = load_holder(&write_config(dir.path(), "config.yml", &document).await).await;
    let app = app(holder, Arc::new(JobRegistry::new()), OUTSIDER);

    assert_eq!(send(&app, "GET", "/api/v1/health", None).await.status(), StatusCode::OK);
    assert_eq!(send(&app, "GET", "/health", None).await.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_restore_policy_check() {
    let dir = tempfile::tempdir().unwrap();
    let holder = load_holder(&write_config(dir.path(), "config.yml", DOCUMENT).await).await;
    let app = app(holder, Arc::new(JobRegistry::new()), OUTSIDER);

    let contradiction = send(&app, "POST", "/restore/policy", Some(json!({ "replace": true, "unique": true }))).await;
    assert_eq!(contradiction.status(), StatusCode::BAD_REQUEST);
    assert!(body_text(contradiction).await.contains("mutually exclusive"));

    let accepted = send(&app, "POST", "/restore/policy", Some(json!({ "replace": true }))).await;
    assert_eq!(accepted.status(), StatusCode::OK);
    let policy = body_json(accepted).await;
    assert_eq!(policy["replace"], true);
    assert_eq!(policy["retry-policy"]["base-timeout"], 1000);
}

#[tokio::test]
async fn test_running_jobs_are_visible() {
    let dir = tempfile::tempdir().unwrap();
    let holder = load_holder(&write_config(dir.path(), "config.yml", DOCUMENT).await).await;
    let jobs = Arc::new(JobRegistry::new());
    let app = app(holder, jobs.clone(), OUTSIDER);

    assert_eq!(send(&app, "GET", "/jobs/unknown", None).await.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(send(&app, "GET", "/jobs/daily", None).await).await, json!({}));

    let job = jobs.start("daily", JobKind::Full, Utc::now()).unwrap();
    job.tracker().set_total(10);
    job.tracker().add_done(5);

    let current = body_json(send(&app, "GET", "/jobs/daily", None).await).await;
    assert_eq!(current["full"]["percentage-done"], 50);
    assert!(current.get("incremental").is_none());

    let all = body_json(send(&app, "GET", "/jobs", None).await).await;
    assert_eq!(all["daily"]["full"]["done-records"], 5);
}
