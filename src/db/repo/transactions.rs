//! Append-only transaction log operations for the repository.

use crate::domain::{Address, TransactionRecord, TransactionType};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use std::str::FromStr;
use tracing::warn;

use super::{from_db_int, parse_amount, to_db_int, Repository};

impl Repository {
    /// Append a transaction record idempotently.
    ///
    /// Returns `true` if the record was inserted, `false` if a record with the
    /// same id already exists. Existing rows are never modified.
    ///
    /// # Errors
    /// Returns an error if the insert fails.
    pub async fn append_transaction(&self, record: &TransactionRecord) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO user_transactions (
                id, user_address, token_address, token_symbol, transaction_type, amount,
                interest_rate_mode, use_a_tokens, liquidator, debt_to_cover,
                liquidated_collateral_amount, related_address,
                block_number, block_timestamp, transaction_hash, log_index
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO NOTHING
            "#,
        )
        .bind(&record.id)
        .bind(record.user_address.as_str())
        .bind(record.token_address.as_str())
        .bind(&record.token_symbol)
        .bind(record.transaction_type.as_str())
        .bind(record.amount.to_string())
        .bind(record.interest_rate_mode.map(i64::from))
        .bind(record.use_a_tokens)
        .bind(record.liquidator.as_ref().map(|a| a.as_str().to_string()))
        .bind(record.debt_to_cover.map(|v| v.to_string()))
        .bind(record.liquidated_collateral_amount.map(|v| v.to_string()))
        .bind(record.related_address.as_ref().map(|a| a.as_str().to_string()))
        .bind(to_db_int(record.block_number))
        .bind(to_db_int(record.block_timestamp))
        .bind(&record.transaction_hash)
        .bind(to_db_int(record.log_index))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// All transactions where `user` is the primary user, newest block first and
    /// latest log first within a block.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn query_transactions_for_user(
        &self,
        user: &Address,
    ) -> Result<Vec<TransactionRecord>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_address, token_address, token_symbol, transaction_type, amount,
                   interest_rate_mode, use_a_tokens, liquidator, debt_to_cover,
                   liquidated_collateral_amount, related_address,
                   block_number, block_timestamp, transaction_hash, log_index
            FROM user_transactions
            WHERE user_address = ?
            ORDER BY block_number DESC, log_index DESC
            "#,
        )
        .bind(user.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().filter_map(record_from_row).collect())
    }

    /// Count transaction rows.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn count_transactions(&self) -> Result<i64, sqlx::Error> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM user_transactions")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get::<i64, _>("n"))
    }
}

fn record_from_row(row: &SqliteRow) -> Option<TransactionRecord> {
    let id = row.get::<String, _>("id");
    let type_str = row.get::<String, _>("transaction_type");
    let transaction_type = match TransactionType::from_str(&type_str) {
        Ok(t) => t,
        Err(e) => {
            warn!("Skipping transaction {}: {}", id, e);
            return None;
        }
    };

    Some(TransactionRecord {
        user_address: Address::new(row.get::<String, _>("user_address")),
        token_address: Address::new(row.get::<String, _>("token_address")),
        token_symbol: row.get::<String, _>("token_symbol"),
        transaction_type,
        amount: parse_amount("amount", &row.get::<String, _>("amount")),
        interest_rate_mode: row
            .get::<Option<i64>, _>("interest_rate_mode")
            .and_then(|m| u8::try_from(m).ok()),
        use_a_tokens: row.get::<Option<bool>, _>("use_a_tokens"),
        liquidator: row.get::<Option<String>, _>("liquidator").map(Address::new),
        debt_to_cover: row
            .get::<Option<String>, _>("debt_to_cover")
            .map(|v| parse_amount("debt_to_cover", &v)),
        liquidated_collateral_amount: row
            .get::<Option<String>, _>("liquidated_collateral_amount")
            .map(|v| parse_amount("liquidated_collateral_amount", &v)),
        related_address: row
            .get::<Option<String>, _>("related_address")
            .map(Address::new),
        block_number: from_db_int(row.get::<i64, _>("block_number")),
        block_timestamp: from_db_int(row.get::<i64, _>("block_timestamp")),
        transaction_hash: row.get::<String, _>("transaction_hash"),
        log_index: from_db_int(row.get::<i64, _>("log_index")),
        id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_db;
    use alloy_primitives::U256;
    use tempfile::TempDir;

    async fn setup_repo() -> (TempDir, Repository) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir
            .path()
            .join("test.db")
            .to_string_lossy()
            .to_string();
        let pool = init_db(&db_path).await.unwrap();
        (temp_dir, Repository::new(pool))
    }

    fn make_record(id: &str, block_number: u64) -> TransactionRecord {
        let (hash, log_index) = id.rsplit_once('-').unwrap();
        TransactionRecord {
            id: id.to_string(),
            user_address: Address::new("0xaaa".to_string()),
            token_address: Address::new("0xusdc".to_string()),
            token_symbol: "USDC".to_string(),
            transaction_type: TransactionType::Supply,
            amount: U256::from(50_000_000_000u64),
            interest_rate_mode: None,
            use_a_tokens: None,
            liquidator: None,
            debt_to_cover: None,
            liquidated_collateral_amount: None,
            related_address: None,
            block_number,
            block_timestamp: 1_700_000_000,
            transaction_hash: hash.to_string(),
            log_index: log_index.parse().unwrap(),
        }
    }

    #[tokio::test]
    async fn test_append_transaction_idempotent() {
        let (_dir, repo) = setup_repo().await;
        let record = make_record("0xabc-0", 10);

        assert!(repo.append_transaction(&record).await.unwrap());
        assert!(!repo.append_transaction(&record).await.unwrap());
        assert_eq!(repo.count_transactions().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_redelivery_does_not_modify_row() {
        let (_dir, repo) = setup_repo().await;
        let record = make_record("0xabc-0", 10);
        repo.append_transaction(&record).await.unwrap();

        let mut altered = record.clone();
        altered.amount = U256::from(1u64);
        assert!(!repo.append_transaction(&altered).await.unwrap());

        let user = Address::new("0xaaa".to_string());
        let stored = repo.query_transactions_for_user(&user).await.unwrap();
        assert_eq!(stored, vec![record]);
    }

    #[tokio::test]
    async fn test_query_transactions_newest_first() {
        let (_dir, repo) = setup_repo().await;
        repo.append_transaction(&make_record("0xa-0", 10)).await.unwrap();
        repo.append_transaction(&make_record("0xb-0", 30)).await.unwrap();
        repo.append_transaction(&make_record("0xc-0", 20)).await.unwrap();

        let user = Address::new("0xaaa".to_string());
        let blocks: Vec<u64> = repo
            .query_transactions_for_user(&user)
            .await
            .unwrap()
            .iter()
            .map(|r| r.block_number)
            .collect();
        assert_eq!(blocks, vec![30, 20, 10]);
    }

    #[tokio::test]
    async fn test_same_block_orders_by_log_index() {
        let (_dir, repo) = setup_repo().await;
        repo.append_transaction(&make_record("0xab-2", 50)).await.unwrap();
        repo.append_transaction(&make_record("0xab-10", 50)).await.unwrap();
        repo.append_transaction(&make_record("0xab-9", 50)).await.unwrap();
        repo.append_transaction(&make_record("0xcd-0", 51)).await.unwrap();

        let user = Address::new("0xaaa".to_string());
        let ids: Vec<String> = repo
            .query_transactions_for_user(&user)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec!["0xcd-0", "0xab-10", "0xab-9", "0xab-2"]);
    }

    #[tokio::test]
    async fn test_liquidation_fields_roundtrip() {
        let (_dir, repo) = setup_repo().await;
        let liquidator = Address::new("0xccc".to_string());
        let record = TransactionRecord {
            transaction_type: TransactionType::LiquidationCall,
            liquidator: Some(liquidator.clone()),
            debt_to_cover: Some(U256::from(1_000u64)),
            liquidated_collateral_amount: Some(U256::MAX),
            related_address: Some(liquidator),
            ..make_record("0xd-4", 40)
        };
        repo.append_transaction(&record).await.unwrap();

        let stored = repo
            .query_transactions_for_user(&record.user_address)
            .await
            .unwrap();
        assert_eq!(stored, vec![record]);
    }
}
