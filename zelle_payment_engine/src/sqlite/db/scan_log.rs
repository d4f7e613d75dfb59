use sqlx::SqliteConnection;

use crate::{
    db_types::{NewScanLogEntry, ScanLogEntry},
    traits::IngestionError,
};

pub async fn insert_entry(
    entry: NewScanLogEntry,
    conn: &mut SqliteConnection,
) -> Result<ScanLogEntry, IngestionError> {
    let errors = serde_json::to_string(&entry.errors)?;
    let entry = sqlx::query_as(
        r#"
            INSERT INTO scan_log (started_at, examined, created, auto_matched, errors, duration_ms)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *;
        "#,
    )
    .bind(entry.started_at)
    .bind(entry.examined)
    .bind(entry.created)
    .bind(entry.auto_matched)
    .bind(errors)
    .bind(entry.duration_ms)
    .fetch_one(conn)
    .await?;
    Ok(entry)
}

pub async fn recent_entries(limit: i64, conn: &mut SqliteConnection) -> Result<Vec<ScanLogEntry>, IngestionError> {
    let entries =
        sqlx::query_as("SELECT * FROM scan_log ORDER BY id DESC LIMIT $1").bind(limit).fetch_all(conn).await?;
    Ok(entries)
}
