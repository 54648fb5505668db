use anyhow::Result;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    apply(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Creates the worksheet collection. Safe to run repeatedly.
pub async fn apply(pool: &sqlx::SqlitePool) -> Result<()> {
    // Each row holds one schema-less document as JSON text.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS worksheets (
            id TEXT PRIMARY KEY,
            doc TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_worksheets_created_at ON worksheets(json_extract(doc, '$.createdAt') DESC)",
    )
    .execute(pool)
    .await?;

    tracing::debug!("worksheet schema ready");
    Ok(())
}
