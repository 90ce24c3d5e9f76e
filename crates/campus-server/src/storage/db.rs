//! Database connection and initialization.

pub use campus_core::db::DatabaseError;

campus_core::define_database!(CampusDatabase, "Campus database migrations complete");

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn open_in_memory_runs_migrations() {
        let db = CampusDatabase::open_in_memory().await.unwrap();
        let tables: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN ('users', 'invoices', 'tickets')",
        )
        .fetch_one(db.pool())
        .await
        .unwrap();
        assert_eq!(tables, 3);
    }

    #[tokio::test]
    async fn open_on_disk_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("campus.db");
        CampusDatabase::open(&path).await.unwrap();
        assert!(path.exists());
    }
}
