//! Shared fixtures for integration tests.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::body::Body;
use axum::extract::connect_info::MockConnectInfo;
use axum::http::{Request, Response};
use axum::Router;
use backup_service::config::ConfigHolder;
use backup_service::http::{AppState, HttpServer};
use backup_service::jobs::JobRegistry;
use backup_service::security::AdmissionControl;
use backup_service::storage::BootstrapOptions;
use tower::ServiceExt;

/// A small valid document. Mutations from 10.0.0.0/24 bypass the limiter;
/// everyone else gets a burst of two.
pub const DOCUMENT: &str = r#"
service:
  http:
    rate:
      tps: 1
      size: 2
      white-list: ["10.0.0.0/24"]
aerospike-clusters:
  main:
    seed-nodes:
      - host-name: localhost
        port: 3000
storage:
  local:
    type: local
    path: /var/backups
backup-policies:
  policy:
    parallel: 4
backup-routines:
  daily:
    backup-policy: policy
    source-cluster: main
    storage: local
    interval-cron: "@daily"
"#;

pub async fn write_config(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    tokio::fs::write(&path, contents).await.unwrap();
    path
}

pub async fn load_holder(path: &Path) -> Arc<ConfigHolder> {
    Arc::new(
        ConfigHolder::load(&path.to_string_lossy(), false, &BootstrapOptions::default())
            .await
            .unwrap(),
    )
}

/// Router over `holder`, with every request appearing to come from `client`.
pub fn app(holder: Arc<ConfigHolder>, jobs: Arc<JobRegistry>, client: &str) -> Router {
    let http = holder.snapshot().service.http.clone();
    let admission = Arc::new(AdmissionControl::new(&http.rate).unwrap());
    let state = AppState {
        holder,
        jobs,
        admission,
        metrics: None,
    };
    let client: SocketAddr = client.parse().unwrap();
    HttpServer::new(state, &http).router().layer(MockConnectInfo(client))
}

pub async fn send(app: &Router, method: &str, uri: &str, body: Option<serde_json::Value>) -> Response<Body> {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    app.clone().oneshot(request).await.unwrap()
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_str(&body_text(response).await).unwrap()
}
