use crate::api::AppState;
use crate::domain::{Address, TransactionRecord};
use crate::error::AppError;
use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct TransactionsResponse {
    pub success: bool,
    pub transactions: Vec<TransactionDto>,
}

/// Transaction row as served over HTTP; raw amounts are decimal strings.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionDto {
    pub id: String,
    pub user_address: String,
    pub token_address: String,
    pub token_symbol: String,
    pub transaction_type: String,
    pub amount: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interest_rate_mode: Option<u8>,
    #[serde(rename = "useATokens", skip_serializing_if = "Option::is_none")]
    pub use_a_tokens: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub liquidator: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debt_to_cover: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub liquidated_collateral_amount: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub related_address: Option<String>,
    pub block_number: u64,
    pub block_timestamp: u64,
    pub transaction_hash: String,
    pub log_index: u64,
}

impl From<TransactionRecord> for TransactionDto {
    fn from(record: TransactionRecord) -> Self {
        Self {
            id: record.id,
            user_address: record.user_address.into(),
            token_address: record.token_address.into(),
            token_symbol: record.token_symbol,
            transaction_type: record.transaction_type.to_string(),
            amount: record.amount.to_string(),
            interest_rate_mode: record.interest_rate_mode,
            use_a_tokens: record.use_a_tokens,
            liquidator: record.liquidator.map(String::from),
            debt_to_cover: record.debt_to_cover.map(|v| v.to_string()),
            liquidated_collateral_amount: record.liquidated_collateral_amount.map(|v| v.to_string()),
            related_address: record.related_address.map(String::from),
            block_number: record.block_number,
            block_timestamp: record.block_timestamp,
            transaction_hash: record.transaction_hash,
            log_index: record.log_index,
        }
    }
}

/// Transactions for a user, newest block first.
pub async fn get_transactions(
    Path(user_address): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<TransactionsResponse>, AppError> {
    let user = Address::new(user_address);
    let records = state
        .repo
        .query_transactions_for_user(&user)
        .await
        .map_err(|e| AppError::Internal(format!("Transaction query failed: {}", e)))?;

    Ok(Json(TransactionsResponse {
        success: true,
        transactions: records.into_iter().map(TransactionDto::from).collect(),
    }))
}
