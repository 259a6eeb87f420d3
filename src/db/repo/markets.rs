//! Market parameter observations for the repository.

use crate::domain::{Address, MarketParameters};
use sqlx::Row;

use super::{from_db_int, to_db_int, Repository};

impl Repository {
    /// Record parameters observed for an asset at a block.
    ///
    /// The first observation per `(asset, block)` wins; later ones are ignored.
    ///
    /// # Errors
    /// Returns an error if the insert fails.
    pub async fn record_market_parameters(
        &self,
        params: &MarketParameters,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO market_parameters (
                asset_address, block_number, symbol, decimals, price_usd, ltv,
                liquidation_threshold, liquidity_index, variable_borrow_index
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(asset_address, block_number) DO NOTHING
            "#,
        )
        .bind(params.asset_address.as_str())
        .bind(to_db_int(params.block_number))
        .bind(&params.symbol)
        .bind(params.decimals.map(i64::from))
        .bind(params.price_usd)
        .bind(params.ltv)
        .bind(params.liquidation_threshold)
        .bind(params.liquidity_index)
        .bind(params.variable_borrow_index)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Most recent observations for an asset, newest block first.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn query_market_parameters(
        &self,
        asset: &Address,
        limit: i64,
    ) -> Result<Vec<MarketParameters>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT asset_address, block_number, symbol, decimals, price_usd, ltv,
                   liquidation_threshold, liquidity_index, variable_borrow_index
            FROM market_parameters
            WHERE asset_address = ?
            ORDER BY block_number DESC
            LIMIT ?
            "#,
        )
        .bind(asset.as_str())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| MarketParameters {
                asset_address: Address::new(row.get::<String, _>("asset_address")),
                block_number: from_db_int(row.get::<i64, _>("block_number")),
                symbol: row.get::<String, _>("symbol"),
                decimals: row
                    .get::<Option<i64>, _>("decimals")
                    .and_then(|d| u8::try_from(d).ok()),
                price_usd: row.get::<Option<f64>, _>("price_usd"),
                ltv: row.get::<f64, _>("ltv"),
                liquidation_threshold: row.get::<f64, _>("liquidation_threshold"),
                liquidity_index: row.get::<f64, _>("liquidity_index"),
                variable_borrow_index: row.get::<f64, _>("variable_borrow_index"),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_db;
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

    fn params(block_number: u64, price: f64) -> MarketParameters {
        MarketParameters {
            asset_address: Address::new("0xusdc".to_string()),
            block_number,
            symbol: "USDC".to_string(),
            decimals: Some(6),
            price_usd: Some(price),
            ltv: 0.75,
            liquidation_threshold: 0.78,
            liquidity_index: 1.02,
            variable_borrow_index: 1.05,
        }
    }

    #[tokio::test]
    async fn test_first_observation_per_block_wins() {
        let (_dir, repo) = setup_repo().await;
        assert!(repo.record_market_parameters(&params(10, 1.0)).await.unwrap());
        assert!(!repo.record_market_parameters(&params(10, 0.99)).await.unwrap());

        let stored = repo
            .query_market_parameters(&Address::new("0xusdc".to_string()), 10)
            .await
            .unwrap();
        assert_eq!(stored, vec![params(10, 1.0)]);
    }

    #[tokio::test]
    async fn test_query_limits_newest_first() {
        let (_dir, repo) = setup_repo().await;
        for block in 1..=12u64 {
            repo.record_market_parameters(&params(block, 1.0))
                .await
                .unwrap();
        }

        let stored = repo
            .query_market_parameters(&Address::new("0xusdc".to_string()), 10)
            .await
            .unwrap();
        assert_eq!(stored.len(), 10);
        assert_eq!(stored[0].block_number, 12);
        assert_eq!(stored[9].block_number, 3);
    }
}
