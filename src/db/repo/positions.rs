//! Current-state position snapshot operations for the repository.

use crate::domain::{Address, UserPositionSnapshot};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use super::Repository;

const SNAPSHOT_COLUMNS: &str = "user_address, total_collateral_usd, total_debt_usd, \
     available_borrows_usd, liquidation_threshold, ltv, health_factor";

impl Repository {
    /// Insert or overwrite the snapshot for a user (last write wins).
    ///
    /// # Errors
    /// Returns an error if the upsert fails.
    pub async fn upsert_position_snapshot(
        &self,
        snapshot: &UserPositionSnapshot,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO user_metrics (
                user_address, total_collateral_usd, total_debt_usd, available_borrows_usd,
                liquidation_threshold, ltv, health_factor, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(user_address) DO UPDATE SET
                total_collateral_usd = excluded.total_collateral_usd,
                total_debt_usd = excluded.total_debt_usd,
                available_borrows_usd = excluded.available_borrows_usd,
                liquidation_threshold = excluded.liquidation_threshold,
                ltv = excluded.ltv,
                health_factor = excluded.health_factor,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(snapshot.user_address.as_str())
        .bind(snapshot.total_collateral_usd)
        .bind(snapshot.total_debt_usd)
        .bind(snapshot.available_borrows_usd)
        .bind(snapshot.liquidation_threshold)
        .bind(snapshot.ltv)
        .bind(snapshot.health_factor)
        .bind(chrono::Utc::now().timestamp_millis())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Snapshot for one user, if any.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn get_position_snapshot(
        &self,
        user: &Address,
    ) -> Result<Option<UserPositionSnapshot>, sqlx::Error> {
        let sql = format!(
            "SELECT {} FROM user_metrics WHERE user_address = ?",
            SNAPSHOT_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(user.as_str())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(snapshot_from_row))
    }

    /// All snapshots, ordered by user address.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn query_position_snapshots(&self) -> Result<Vec<UserPositionSnapshot>, sqlx::Error> {
        let sql = format!(
            "SELECT {} FROM user_metrics ORDER BY user_address ASC",
            SNAPSHOT_COLUMNS
        );
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        Ok(rows.iter().map(snapshot_from_row).collect())
    }

    /// Count snapshot rows.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn count_position_snapshots(&self) -> Result<i64, sqlx::Error> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM user_metrics")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get::<i64, _>("n"))
    }
}

fn snapshot_from_row(row: &SqliteRow) -> UserPositionSnapshot {
    UserPositionSnapshot {
        user_address: Address::new(row.get::<String, _>("user_address")),
        total_collateral_usd: row.get::<f64, _>("total_collateral_usd"),
        total_debt_usd: row.get::<f64, _>("total_debt_usd"),
        available_borrows_usd: row.get::<f64, _>("available_borrows_usd"),
        liquidation_threshold: row.get::<f64, _>("liquidation_threshold"),
        ltv: row.get::<f64, _>("ltv"),
        health_factor: row.get::<f64, _>("health_factor"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_db;
    use crate::domain::HEALTH_FACTOR_SENTINEL;
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

    fn snapshot(user: &str, collateral: f64) -> UserPositionSnapshot {
        UserPositionSnapshot {
            user_address: Address::new(user.to_string()),
            total_collateral_usd: collateral,
            total_debt_usd: 0.0,
            available_borrows_usd: collateral * 0.8,
            liquidation_threshold: 0.85,
            ltv: 0.8,
            health_factor: HEALTH_FACTOR_SENTINEL,
        }
    }

    #[tokio::test]
    async fn test_upsert_overwrites() {
        let (_dir, repo) = setup_repo().await;
        repo.upsert_position_snapshot(&snapshot("0xaaa", 100.0))
            .await
            .unwrap();
        repo.upsert_position_snapshot(&snapshot("0xaaa", 250.5))
            .await
            .unwrap();

        assert_eq!(repo.count_position_snapshots().await.unwrap(), 1);
        let stored = repo
            .get_position_snapshot(&Address::new("0xaaa".to_string()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored, snapshot("0xaaa", 250.5));
    }

    #[tokio::test]
    async fn test_get_missing_snapshot() {
        let (_dir, repo) = setup_repo().await;
        let stored = repo
            .get_position_snapshot(&Address::new("0xnobody".to_string()))
            .await
            .unwrap();
        assert!(stored.is_none());
    }

    #[tokio::test]
    async fn test_query_position_snapshots_sorted() {
        let (_dir, repo) = setup_repo().await;
        repo.upsert_position_snapshot(&snapshot("0xbbb", 1.0))
            .await
            .unwrap();
        repo.upsert_position_snapshot(&snapshot("0xaaa", 2.0))
            .await
            .unwrap();

        let all = repo.query_position_snapshots().await.unwrap();
        let users: Vec<&str> = all.iter().map(|s| s.user_address.as_str()).collect();
        assert_eq!(users, vec!["0xaaa", "0xbbb"]);
    }

    #[tokio::test]
    async fn test_sentinel_health_factor_stored_finite() {
        let (_dir, repo) = setup_repo().await;
        repo.upsert_position_snapshot(&snapshot("0xaaa", 1.0))
            .await
            .unwrap();
        let stored = repo.query_position_snapshots().await.unwrap();
        assert_eq!(stored[0].health_factor, HEALTH_FACTOR_SENTINEL);
    }
}
