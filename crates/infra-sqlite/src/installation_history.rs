// SQLite InstallationTracker Implementation

use crate::error::map_sqlx_error;
use async_trait::async_trait;
use porter_core::error::Result;
use porter_core::port::{InstallationTracker, TimeProvider};
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::debug;

pub struct SqliteInstallationTracker {
    pool: SqlitePool,
    time_provider: Arc<dyn TimeProvider>,
}

impl SqliteInstallationTracker {
    pub fn new(pool: SqlitePool, time_provider: Arc<dyn TimeProvider>) -> Self {
        Self {
            pool,
            time_provider,
        }
    }
}

#[async_trait]
impl InstallationTracker for SqliteInstallationTracker {
    /// Re-importing refreshes `installed_at`
    async fn mark_installed(&self, owner_id: &str) -> Result<()> {
        let now = self.time_provider.now_millis();
        sqlx::query(
            r#"
            INSERT INTO installed_products (owner_id, installed_at) VALUES (?, ?)
            ON CONFLICT(owner_id) DO UPDATE SET installed_at = excluded.installed_at
            "#,
        )
        .bind(owner_id)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        debug!(owner_id = %owner_id, installed_at = now, "Installation recorded");
        Ok(())
    }

    async fn is_installed(&self, owner_id: &str) -> Result<bool> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM installed_products WHERE owner_id = ?")
                .bind(owner_id)
                .fetch_one(&self.pool)
                .await
                .map_err(map_sqlx_error)?;
        Ok(count > 0)
    }

    async fn installed_ids(&self) -> Result<Vec<String>> {
        sqlx::query_scalar::<_, String>("SELECT owner_id FROM installed_products ORDER BY owner_id")
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)
    }
}
