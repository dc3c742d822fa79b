use std::net::SocketAddr;
use std::sync::Arc;

use axum::{Router, routing::get};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use geodash_dataviews::{DataviewBackend, QueryRunner};
use geodash_db_postgres::PostgresRunner;

use crate::{config::AppConfig, handlers, mapconfig_store::MapConfigStore};

/// Shared request state.
#[derive(Clone)]
pub struct AppState {
    pub backend: Arc<DataviewBackend>,
    pub db: Arc<dyn QueryRunner>,
    pub mapconfigs: MapConfigStore,
}

impl AppState {
    pub fn new(backend: DataviewBackend, db: Arc<dyn QueryRunner>, mapconfigs: MapConfigStore) -> Self {
        Self {
            backend: Arc::new(backend),
            db,
            mapconfigs,
        }
    }
}

pub fn build_app(state: AppState, cfg: &AppConfig) -> Router {
    Router::new()
        .route("/healthz", get(handlers::healthz))
        .route("/api/v1/map/{token}/dataview/{name}", get(handlers::get_dataview))
        .route(
            "/api/v1/map/{token}/dataview/{name}/search",
            get(handlers::search_dataview),
        )
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(|req: &axum::http::Request<_>| {
                            tracing::info_span!(
                                "http.request",
                                http.method = %req.method(),
                                http.target = %req.uri(),
                                http.status_code = tracing::field::Empty,
                            )
                        })
                        .on_response(
                            |res: &axum::http::Response<_>,
                             latency: std::time::Duration,
                             span: &tracing::Span| {
                                span.record(
                                    "http.status_code",
                                    tracing::field::display(res.status().as_u16()),
                                );
                                tracing::info!(
                                    http.status = %res.status().as_u16(),
                                    elapsed_ms = %latency.as_millis(),
                                    "request handled"
                                );
                            },
                        ),
                )
                .layer(CorsLayer::permissive())
                .layer(axum::extract::DefaultBodyLimit::max(cfg.server.body_limit_bytes)),
        )
}

pub struct GeodashServer {
    addr: SocketAddr,
    app: Router,
}

impl GeodashServer {
    /// Connect to PostgreSQL, load map configurations and build the router.
    pub async fn from_config(cfg: &AppConfig) -> anyhow::Result<Self> {
        let backend = DataviewBackend::new(cfg.dataviews.clone())?;
        let runner = PostgresRunner::connect(&cfg.storage.postgres).await?;
        let mapconfigs = MapConfigStore::load_dir(&cfg.mapconfigs.dir)?;
        let state = AppState::new(backend, Arc::new(runner), mapconfigs);
        Ok(Self {
            addr: cfg.addr(),
            app: build_app(state, cfg),
        })
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        tracing::info!("listening on {}", self.addr);
        axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        Ok(())
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
