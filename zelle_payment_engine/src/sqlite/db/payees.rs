use chrono::Utc;
use log::{debug, info, warn};
use sqlx::SqliteConnection;
use zpg_common::Cents;

use super::audit_log;
use crate::{
    db_types::{receipt_number, AuditEntry, AuditEntryType, NewAuditEntry, NewPayee, Payee, PayeeId, PaymentRecord},
    traits::IngestionError,
};

pub async fn fetch_payees(conn: &mut SqliteConnection) -> Result<Vec<Payee>, IngestionError> {
    let payees = sqlx::query_as("SELECT * FROM payees ORDER BY display_name, id").fetch_all(conn).await?;
    Ok(payees)
}

pub async fn fetch_payee(id: &PayeeId, conn: &mut SqliteConnection) -> Result<Option<Payee>, IngestionError> {
    let payee = sqlx::query_as("SELECT * FROM payees WHERE id = $1").bind(id).fetch_optional(conn).await?;
    Ok(payee)
}

pub async fn upsert_payee(payee: NewPayee, conn: &mut SqliteConnection) -> Result<Payee, IngestionError> {
    let payee: Payee = sqlx::query_as(
        r#"
            INSERT INTO payees (id, display_name, contact_address, balance_due) VALUES ($1, $2, $3, $4)
            ON CONFLICT(id) DO UPDATE SET
                display_name = excluded.display_name,
                contact_address = excluded.contact_address,
                balance_due = excluded.balance_due,
                updated_at = CURRENT_TIMESTAMP
            RETURNING *;
        "#,
    )
    .bind(payee.id)
    .bind(payee.display_name)
    .bind(payee.contact_address)
    .bind(payee.balance_due)
    .fetch_one(conn)
    .await?;
    debug!("🗃️ Payee {} ({}) saved", payee.id, payee.display_name);
    Ok(payee)
}

async fn write_balances(
    payee_id: &PayeeId,
    balance_due: Cents,
    total_paid: Cents,
    conn: &mut SqliteConnection,
) -> Result<(), IngestionError> {
    sqlx::query("UPDATE payees SET balance_due = $1, total_paid = $2, updated_at = CURRENT_TIMESTAMP WHERE id = $3")
        .bind(balance_due)
        .bind(total_paid)
        .bind(payee_id)
        .execute(conn)
        .await?;
    Ok(())
}

/// Credits `payment` to the payee: the balance due drops by the payment amount (never below zero) and the total paid
/// rises by the full amount. Writes an `applied` audit entry. A credit that would overflow the total paid is refused
/// with [`IngestionError::InvalidInput`].
///
/// This is not atomic on its own. Call it inside a transaction that already holds the write lock, and pass `&mut *tx`.
pub async fn apply_payment(
    payment: &PaymentRecord,
    payee_id: &PayeeId,
    conn: &mut SqliteConnection,
) -> Result<AuditEntry, IngestionError> {
    let payee = fetch_payee(payee_id, conn).await?.ok_or_else(|| IngestionError::PayeeNotFound(payee_id.clone()))?;
    let balance_due = payee.balance_due.saturating_sub_floor_zero(payment.amount);
    let total_paid = payee.total_paid.checked_add(payment.amount).ok_or_else(|| {
        IngestionError::InvalidInput(format!(
            "Crediting {} to {payee_id} would overflow their total paid of {}",
            payment.amount, payee.total_paid
        ))
    })?;
    write_balances(payee_id, balance_due, total_paid, conn).await?;
    let entry = NewAuditEntry {
        payment_id: payment.id,
        payee_id: payee_id.clone(),
        entry_type: AuditEntryType::Applied,
        amount: payment.amount,
        balance_due_before: payee.balance_due,
        balance_due_after: balance_due,
        total_paid_before: payee.total_paid,
        total_paid_after: total_paid,
        receipt_number: receipt_number(payment.id, Utc::now()),
        description: format!(
            "Zelle payment of {} from {} via {} ({})",
            payment.amount, payment.sender_name, payment.institution, payment.match_strategy
        ),
    };
    let entry = audit_log::insert_entry(entry, conn).await?;
    info!(
        "🗃️ Applied payment #{} of {} to {}. Balance due {} -> {}",
        payment.id, payment.amount, payee_id, entry.balance_due_before, entry.balance_due_after
    );
    Ok(entry)
}

/// Undoes an earlier credit of `payment` to the payee, and writes a `reversed` audit entry.
///
/// The reversal uses the changes recorded in the `applied` audit entry rather than the payment amount, so a payee
/// whose balance due was floored at zero gets back exactly what was deducted. Changes made to the payee by other
/// payments since then are preserved.
pub async fn reverse_payment(
    payment: &PaymentRecord,
    payee_id: &PayeeId,
    conn: &mut SqliteConnection,
) -> Result<AuditEntry, IngestionError> {
    let payee = fetch_payee(payee_id, conn).await?.ok_or_else(|| IngestionError::PayeeNotFound(payee_id.clone()))?;
    let (deducted, credited) = match audit_log::last_applied_entry(payment.id, payee_id, conn).await? {
        Some(applied) => (
            applied.balance_due_before - applied.balance_due_after,
            applied.total_paid_after - applied.total_paid_before,
        ),
        None => {
            warn!(
                "🗃️ No audit entry found for the credit of payment #{} to {payee_id}. Reversing the full amount.",
                payment.id
            );
            (payment.amount, payment.amount)
        },
    };
    let balance_due = payee.balance_due + deducted;
    let total_paid = payee.total_paid - credited;
    write_balances(payee_id, balance_due, total_paid, conn).await?;
    let entry = NewAuditEntry {
        payment_id: payment.id,
        payee_id: payee_id.clone(),
        entry_type: AuditEntryType::Reversed,
        amount: payment.amount,
        balance_due_before: payee.balance_due,
        balance_due_after: balance_due,
        total_paid_before: payee.total_paid,
        total_paid_after: total_paid,
        receipt_number: receipt_number(payment.id, Utc::now()),
        description: format!("Reversed Zelle payment of {} from {}", payment.amount, payment.sender_name),
    };
    let entry = audit_log::insert_entry(entry, conn).await?;
    info!(
        "🗃️ Reversed payment #{} of {} from {}. Balance due {} -> {}",
        payment.id, payment.amount, payee_id, entry.balance_due_before, entry.balance_due_after
    );
    Ok(entry)
}
