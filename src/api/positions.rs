use crate::api::AppState;
use crate::domain::{Address, UserPositionSnapshot};
use crate::error::AppError;
use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct PositionsResponse {
    pub success: bool,
    pub positions: Vec<UserPositionSnapshot>,
}

pub async fn get_positions(
    State(state): State<AppState>,
) -> Result<Json<PositionsResponse>, AppError> {
    let positions = state
        .repo
        .query_position_snapshots()
        .await
        .map_err(|e| AppError::Internal(format!("Position query failed: {}", e)))?;

    Ok(Json(PositionsResponse {
        success: true,
        positions,
    }))
}

/// Zero or one snapshot. The path segment is lower-cased but not validated.
pub async fn get_position(
    Path(user_address): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<PositionsResponse>, AppError> {
    let user = Address::new(user_address);
    let position = state
        .repo
        .get_position_snapshot(&user)
        .await
        .map_err(|e| AppError::Internal(format!("Position query failed: {}", e)))?;

    Ok(Json(PositionsResponse {
        success: true,
        positions: position.into_iter().collect(),
    }))
}
