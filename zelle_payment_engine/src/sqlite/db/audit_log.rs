use sqlx::SqliteConnection;

use crate::{
    db_types::{AuditEntry, AuditEntryType, NewAuditEntry, PayeeId},
    traits::IngestionError,
};

pub async fn insert_entry(entry: NewAuditEntry, conn: &mut SqliteConnection) -> Result<AuditEntry, IngestionError> {
    let entry = sqlx::query_as(
        r#"
            INSERT INTO audit_log (
                payment_id,
                payee_id,
                entry_type,
                amount,
                balance_due_before,
                balance_due_after,
                total_paid_before,
                total_paid_after,
                receipt_number,
                description
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *;
        "#,
    )
    .bind(entry.payment_id)
    .bind(entry.payee_id)
    .bind(entry.entry_type)
    .bind(entry.amount)
    .bind(entry.balance_due_before)
    .bind(entry.balance_due_after)
    .bind(entry.total_paid_before)
    .bind(entry.total_paid_after)
    .bind(entry.receipt_number)
    .bind(entry.description)
    .fetch_one(conn)
    .await?;
    Ok(entry)
}

/// The most recent `applied` entry for the given payment and payee, if any.
pub async fn last_applied_entry(
    payment_id: i64,
    payee_id: &PayeeId,
    conn: &mut SqliteConnection,
) -> Result<Option<AuditEntry>, IngestionError> {
    let entry = sqlx::query_as(
        r#"
            SELECT * FROM audit_log
            WHERE payment_id = $1 AND payee_id = $2 AND entry_type = $3
            ORDER BY id DESC LIMIT 1
        "#,
    )
    .bind(payment_id)
    .bind(payee_id)
    .bind(AuditEntryType::Applied)
    .fetch_optional(conn)
    .await?;
    Ok(entry)
}

pub async fn entries_for_payee(
    payee_id: &PayeeId,
    conn: &mut SqliteConnection,
) -> Result<Vec<AuditEntry>, IngestionError> {
    let entries = sqlx::query_as("SELECT * FROM audit_log WHERE payee_id = $1 ORDER BY id DESC")
        .bind(payee_id)
        .fetch_all(conn)
        .await?;
    Ok(entries)
}

pub async fn entries_for_payment(
    payment_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<AuditEntry>, IngestionError> {
    let entries = sqlx::query_as("SELECT * FROM audit_log WHERE payment_id = $1 ORDER BY id ASC")
        .bind(payment_id)
        .fetch_all(conn)
        .await?;
    Ok(entries)
}

pub async fn recent_entries(limit: i64, conn: &mut SqliteConnection) -> Result<Vec<AuditEntry>, IngestionError> {
    let entries =
        sqlx::query_as("SELECT * FROM audit_log ORDER BY id DESC LIMIT $1").bind(limit).fetch_all(conn).await?;
    Ok(entries)
}
