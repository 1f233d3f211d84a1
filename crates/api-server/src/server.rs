//! API server wiring: shared state, the REST router, and the metrics exporter.

use crate::locks::DrawLocks;
use crate::rest::{self, AppState};
use crate::swagger::ApiDoc;
use axum::routing::{get, post};
use axum::Router;
use instantwin_core::config::AppConfig;
use instantwin_flow::{FlowValidator, InMemoryFlowStore};
use instantwin_lottery::{InMemoryHistoryStore, InMemoryPrizeCatalog, LotteryEngine};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Main API server holding the flow store, prize catalog, and draw history.
pub struct ApiServer {
    config: AppConfig,
    state: AppState,
}

impl ApiServer {
    pub fn new(config: AppConfig) -> Self {
        let flows = Arc::new(InMemoryFlowStore::new());
        let catalog = Arc::new(InMemoryPrizeCatalog::new());
        let history = Arc::new(InMemoryHistoryStore::new());

        if config.seed_demo_data {
            match flows.seed_demo_flows() {
                Ok(()) => info!("Seeded demo templates"),
                Err(e) => warn!(error = %e, "Failed to seed demo flows"),
            }
            catalog.seed_demo_prizes();
        }

        let validator = FlowValidator::new(&config.flow);
        let lottery = LotteryEngine::new(&config.lottery, catalog, history.clone());

        let state = AppState {
            validator: Arc::new(validator),
            flows,
            lottery: Arc::new(lottery),
            history,
            draw_locks: Arc::new(DrawLocks::new()),
            node_id: config.node_id.clone(),
            start_time: Instant::now(),
        };

        Self { config, state }
    }

    /// Per-key draw locks, exposed so the caller can prune them periodically.
    pub fn draw_locks(&self) -> Arc<DrawLocks> {
        self.state.draw_locks.clone()
    }

    pub fn router(&self) -> Router {
        Router::new()
            // Flow validation
            .route("/v1/flows/validate", post(rest::handle_validate_flow))
            .route(
                "/v1/templates/:template_id/validation",
                get(rest::handle_validate_template),
            )
            // Lottery
            .route("/v1/lottery/draw", post(rest::handle_draw))
            .route(
                "/v1/lottery/stats/:template_id",
                get(rest::handle_lottery_stats),
            )
            // Operational endpoints
            .route("/health", get(rest::health_check))
            .route("/ready", get(rest::readiness))
            .route("/live", get(rest::liveness))
            .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
            .with_state(self.state.clone())
    }

    /// Start the HTTP REST server.
    pub async fn start_http(&self) -> anyhow::Result<()> {
        let app = self
            .router()
            // Middleware
            .layer(CompressionLayer::new())
            .layer(CorsLayer::permissive())
            .layer(TraceLayer::new_for_http());

        let addr = SocketAddr::new(self.config.api.host.parse()?, self.config.api.http_port);

        info!(addr = %addr, "Starting HTTP server");

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app).await?;

        Ok(())
    }

    /// Start the metrics server on a separate port.
    pub fn start_metrics(&self) -> anyhow::Result<()> {
        if !self.config.metrics.enabled {
            info!("Metrics exporter disabled");
            return Ok(());
        }

        metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(SocketAddr::new(
                self.config.api.host.parse()?,
                self.config.metrics.port,
            ))
            .install()?;

        info!(port = self.config.metrics.port, "Metrics exporter started");
        Ok(())
    }
}
