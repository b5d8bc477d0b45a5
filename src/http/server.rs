//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum Router with all handlers
//! - Mount it under the configured context path
//! - Guard mutation routes with admission control
//! - Wire up middleware (tracing, request timeout)
//! - Sweep idle rate-limit buckets while serving

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    middleware,
    routing::{get, post, put, MethodRouter},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::net::TcpListener;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::model::HttpServerConfig;
use crate::config::ConfigHolder;
use crate::http::handlers::*;
use crate::jobs::JobRegistry;
use crate::lifecycle::Shutdown;
use crate::security::{admission_middleware, AdmissionControl};

const SWEEP_INTERVAL: Duration = Duration::from_secs(60);
const BUCKET_IDLE: Duration = Duration::from_secs(300);

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub holder: Arc<ConfigHolder>,
    pub jobs: Arc<JobRegistry>,
    pub admission: Arc<AdmissionControl>,
    pub metrics: Option<PrometheusHandle>,
}

/// HTTP server for the backup service API.
pub struct HttpServer {
    router: Router,
    admission: Arc<AdmissionControl>,
}

/// `/` for an empty or root context path, otherwise `/segment[/segment...]`.
pub fn normalize_context_path(path: &str) -> String {
    let trimmed = path.trim().trim_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        format!("/{trimmed}")
    }
}

impl HttpServer {
    pub fn new(state: AppState, config: &HttpServerConfig) -> Self {
        let admission = state.admission.clone();
        let router = Self::build_router(config, state);
        Self { router, admission }
    }

    /// The assembled router, for driving requests directly.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    #[allow(deprecated)]
    fn build_router(config: &HttpServerConfig, state: AppState) -> Router {
        let guard = middleware::from_fn_with_state(state.admission.clone(), admission_middleware);
        let guarded = |route: MethodRouter<AppState>| route.route_layer(guard.clone());

        let api = Router::new()
            .route("/health", get(health))
            .route("/version", get(version))
            .route("/metrics", get(metrics))
            .route("/config", get(get_config).merge(guarded(put(put_config))))
            .route("/config/reload", guarded(post(reload_config)))
            .route("/config/{collection}", get(list_entities))
            .route(
                "/config/{collection}/{name}",
                get(get_entity).merge(guarded(post(add_entity).put(update_entity).delete(delete_entity))),
            )
            .route("/jobs", get(current_jobs))
            .route("/jobs/{routine}", get(routine_jobs))
            .route("/restore/policy", post(check_restore_policy))
            .with_state(state);

        let context_path = normalize_context_path(&config.context_path);
        let mut router = if context_path == "/" {
            api
        } else {
            Router::new().nest(&context_path, api)
        };

        if let Some(timeout) = config.timeout {
            router = router.layer(TimeoutLayer::new(timeout));
        }
        router.layer(TraceLayer::new_for_http())
    }

    /// Run the server, accepting connections on the given listener until shutdown.
    pub async fn run(self, listener: TcpListener, shutdown: &Shutdown) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let sweeper = tokio::spawn(sweep_buckets(self.admission.clone(), shutdown.clone()));

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        let result = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown.wait())
            .await;

        sweeper.abort();
        tracing::info!("HTTP server stopped");
        result
    }
}

async fn sweep_buckets(admission: Arc<AdmissionControl>, shutdown: Shutdown) {
    let mut stopped = shutdown.subscribe();
    let mut interval = tokio::time::interval(SWEEP_INTERVAL);
    loop {
        tokio::select! {
            _ = interval.tick() => {
                let removed = admission.limiter().sweep_idle(BUCKET_IDLE);
                if removed > 0 {
                    tracing::debug!(removed, "Swept idle rate-limit buckets");
                }
            }
            _ = stopped.recv() => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_context_path() {
        assert_eq!(normalize_context_path("/"), "/");
        assert_eq!(normalize_context_path(""), "/");
        assert_eq!(normalize_context_path("api/v1/"), "/api/v1");
        assert_eq!(normalize_context_path("/backup"), "/backup");
    }
}
