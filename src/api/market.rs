use crate::api::AppState;
use crate::domain::{Address, MarketParameters};
use crate::error::AppError;
use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;

/// Observations returned per asset.
pub const MARKET_HISTORY_LIMIT: i64 = 10;

#[derive(Debug, Serialize)]
pub struct MarketParametersResponse {
    pub success: bool,
    pub parameters: Vec<MarketParameters>,
}

pub async fn get_market_parameters(
    Path(asset_address): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<MarketParametersResponse>, AppError> {
    let asset = Address::new(asset_address);
    let parameters = state
        .repo
        .query_market_parameters(&asset, MARKET_HISTORY_LIMIT)
        .await
        .map_err(|e| AppError::Internal(format!("Market parameter query failed: {}", e)))?;

    Ok(Json(MarketParametersResponse {
        success: true,
        parameters,
    }))
}
