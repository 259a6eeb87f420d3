pub mod health;
pub mod market;
pub mod positions;
pub mod transactions;

use crate::db::Repository;
use crate::orchestration::PipelineStats;
use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
    pub stats: Arc<PipelineStats>,
}

impl AppState {
    pub fn new(repo: Arc<Repository>, stats: Arc<PipelineStats>) -> Self {
        Self { repo, stats }
    }
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .route("/api/stats", get(health::stats))
        .route("/api/positions", get(positions::get_positions))
        .route("/api/positions/:user_address", get(positions::get_position))
        .route(
            "/api/transactions/:user_address",
            get(transactions::get_transactions),
        )
        .route("/api/market/:asset_address", get(market::get_market_parameters))
        .layer(cors)
        .with_state(state)
}
