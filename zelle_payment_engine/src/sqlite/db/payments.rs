use std::collections::HashSet;

use chrono::{Duration, Utc};
use log::{debug, trace};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};
use zpg_common::{Cents, USD_CURRENCY_CODE};

use crate::{
    db_types::{NewPaymentRecord, PayeeId, PaymentRecord, PaymentStatus},
    traits::{IngestionError, PaymentPage, PaymentQueryFilter, PaymentStats, PeriodSummary, ReviewPlan, StatusSummary},
};

/// Chunk size for `IN (...)` lookups, comfortably below SQLite's bound parameter limit.
const LOOKUP_CHUNK_SIZE: usize = 500;
const RECENT_PERIOD_DAYS: i64 = 7;

/// Inserts the record, or does nothing if a record with the same notification id already exists.
///
/// Returns `None` in the latter case. The check and the insert are a single statement, so two concurrent inserts of
/// the same notification cannot both succeed.
pub async fn idempotent_insert(
    record: NewPaymentRecord,
    conn: &mut SqliteConnection,
) -> Result<Option<PaymentRecord>, IngestionError> {
    let status = record.initial_status();
    let auto_matched = record.payee_id.is_some();
    let payment: Option<PaymentRecord> = sqlx::query_as(
        r#"
            INSERT INTO payments (
                notification_id,
                received_at,
                sender_name,
                sender_address,
                amount,
                currency,
                amount_missing,
                memo,
                confirmation_code,
                institution,
                subject,
                body_snippet,
                payee_id,
                match_strategy,
                auto_matched,
                status
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            ON CONFLICT(notification_id) DO NOTHING
            RETURNING *;
        "#,
    )
    .bind(record.notification_id)
    .bind(record.received_at)
    .bind(record.sender_name)
    .bind(record.sender_address)
    .bind(record.amount)
    .bind(USD_CURRENCY_CODE)
    .bind(record.amount_missing)
    .bind(record.memo)
    .bind(record.confirmation_code)
    .bind(record.institution)
    .bind(record.subject)
    .bind(record.body_snippet)
    .bind(record.payee_id)
    .bind(record.match_strategy)
    .bind(auto_matched)
    .bind(status)
    .fetch_optional(conn)
    .await?;
    if let Some(p) = &payment {
        debug!("🗃️ Payment #{} inserted for notification {} as {}", p.id, p.notification_id, p.status);
    }
    Ok(payment)
}

pub async fn fetch_payment(id: i64, conn: &mut SqliteConnection) -> Result<Option<PaymentRecord>, IngestionError> {
    let payment = sqlx::query_as("SELECT * FROM payments WHERE id = $1").bind(id).fetch_optional(conn).await?;
    Ok(payment)
}

pub async fn fetch_payment_by_notification_id(
    notification_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<PaymentRecord>, IngestionError> {
    let payment = sqlx::query_as("SELECT * FROM payments WHERE notification_id = $1")
        .bind(notification_id)
        .fetch_optional(conn)
        .await?;
    Ok(payment)
}

pub async fn existing_notification_ids(
    ids: &[String],
    conn: &mut SqliteConnection,
) -> Result<HashSet<String>, IngestionError> {
    let mut result = HashSet::with_capacity(ids.len());
    for chunk in ids.chunks(LOOKUP_CHUNK_SIZE) {
        let mut builder =
            QueryBuilder::<Sqlite>::new("SELECT notification_id FROM payments WHERE notification_id IN (");
        let mut list = builder.separated(", ");
        for id in chunk {
            list.push_bind(id);
        }
        builder.push(")");
        let found: Vec<(String,)> = builder.build_query_as().fetch_all(&mut *conn).await?;
        result.extend(found.into_iter().map(|(id,)| id));
    }
    trace!("🗃️ {} of {} notification ids are already stored", result.len(), ids.len());
    Ok(result)
}

fn push_filter(builder: &mut QueryBuilder<'_, Sqlite>, filter: &PaymentQueryFilter) {
    builder.push(" WHERE 1=1");
    if let Some(status) = filter.status {
        builder.push(" AND status = ");
        builder.push_bind(status);
    }
    if let Some(payee_id) = &filter.payee_id {
        builder.push(" AND payee_id = ");
        builder.push_bind(payee_id.clone());
    }
}

/// Returns a page of payments, newest first, along with the number of records matching the filter.
pub async fn search_payments(
    filter: PaymentQueryFilter,
    conn: &mut SqliteConnection,
) -> Result<PaymentPage, IngestionError> {
    let limit = filter.page_size();
    let offset = filter.page_offset();

    let mut count_query = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM payments");
    push_filter(&mut count_query, &filter);
    let (total,): (i64,) = count_query.build_query_as().fetch_one(&mut *conn).await?;

    let mut query = QueryBuilder::<Sqlite>::new("SELECT * FROM payments");
    push_filter(&mut query, &filter);
    query.push(" ORDER BY id DESC LIMIT ");
    query.push_bind(limit);
    query.push(" OFFSET ");
    query.push_bind(offset);
    trace!("🗃️ Executing query: {}", query.sql());
    let payments = query.build_query_as::<PaymentRecord>().fetch_all(&mut *conn).await?;
    Ok(PaymentPage { payments, total, limit, offset })
}

/// Takes the write lock for the current transaction by touching the payment row. Returns false if the payment does
/// not exist.
pub async fn lock_payment(id: i64, conn: &mut SqliteConnection) -> Result<bool, IngestionError> {
    let result =
        sqlx::query("UPDATE payments SET updated_at = updated_at WHERE id = $1").bind(id).execute(conn).await?;
    Ok(result.rows_affected() > 0)
}

/// Writes the record-level changes of a review plan. Balance changes are the caller's responsibility.
pub async fn apply_review(
    id: i64,
    plan: &ReviewPlan,
    applied_payee_id: Option<&PayeeId>,
    conn: &mut SqliteConnection,
) -> Result<PaymentRecord, IngestionError> {
    let verified_at = plan.verified_by.as_ref().map(|_| Utc::now());
    let payment = sqlx::query_as(
        r#"
            UPDATE payments SET
                status = $1,
                payee_id = $2,
                auto_matched = $3,
                applied_payee_id = $4,
                rejection_reason = COALESCE($5, rejection_reason),
                verified_by = COALESCE($6, verified_by),
                verified_at = COALESCE($7, verified_at),
                updated_at = CURRENT_TIMESTAMP
            WHERE id = $8
            RETURNING *;
        "#,
    )
    .bind(plan.status)
    .bind(plan.payee_id.as_ref())
    .bind(plan.auto_matched)
    .bind(applied_payee_id)
    .bind(plan.rejection_reason.as_deref())
    .bind(plan.verified_by.as_deref())
    .bind(verified_at)
    .bind(id)
    .fetch_optional(conn)
    .await?
    .ok_or(IngestionError::PaymentNotFound(id))?;
    Ok(payment)
}

/// Records which payee's balance currently reflects the payment.
pub async fn set_applied_payee(
    id: i64,
    payee_id: Option<&PayeeId>,
    conn: &mut SqliteConnection,
) -> Result<PaymentRecord, IngestionError> {
    let payment = sqlx::query_as(
        "UPDATE payments SET applied_payee_id = $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2 RETURNING *",
    )
    .bind(payee_id)
    .bind(id)
    .fetch_optional(conn)
    .await?
    .ok_or(IngestionError::PaymentNotFound(id))?;
    Ok(payment)
}

pub async fn payment_stats(conn: &mut SqliteConnection) -> Result<PaymentStats, IngestionError> {
    let (total_payments, total_amount): (i64, Cents) =
        sqlx::query_as("SELECT COUNT(*), COALESCE(SUM(amount), 0) FROM payments").fetch_one(&mut *conn).await?;

    let by_status: Vec<(PaymentStatus, i64, Cents)> = sqlx::query_as(
        "SELECT status, COUNT(*), COALESCE(SUM(amount), 0) FROM payments GROUP BY status ORDER BY status",
    )
    .fetch_all(&mut *conn)
    .await?;
    let by_status = by_status
        .into_iter()
        .map(|(status, count, amount)| StatusSummary { status, count, amount })
        .collect::<Vec<_>>();
    let pending_count =
        by_status.iter().find(|s| s.status == PaymentStatus::Pending).map(|s| s.count).unwrap_or_default();

    let (auto_matched,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM payments WHERE auto_matched = 1").fetch_one(&mut *conn).await?;

    let since = Utc::now() - Duration::days(RECENT_PERIOD_DAYS);
    let (recent_count, recent_amount): (i64, Cents) = sqlx::query_as(
        "SELECT COUNT(*), COALESCE(SUM(amount), 0) FROM payments WHERE datetime(created_at) >= datetime($1)",
    )
    .bind(since)
    .fetch_one(&mut *conn)
    .await?;

    let (payees_with_balance,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM payees WHERE balance_due > 0").fetch_one(&mut *conn).await?;

    Ok(PaymentStats {
        total_payments,
        total_amount,
        by_status,
        auto_matched,
        manually_matched: total_payments - auto_matched,
        pending_count,
        recent: PeriodSummary { days: RECENT_PERIOD_DAYS, count: recent_count, amount: recent_amount },
        payees_with_balance,
        last_scan: None,
    })
}
