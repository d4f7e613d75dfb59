//! `SqliteDatabase` is the concrete SQLite implementation of the Zelle Payment Engine storage backend.
//!
//! It implements all the traits defined in the [`crate::traits`] module.
use std::{collections::HashSet, fmt::Debug};

use log::*;
use sqlx::{migrate::MigrateError, SqlitePool};

use super::db::{audit_log, db_url, new_pool, payees, payments, scan_log};
use crate::{
    db_types::{AuditEntry, NewPayee, NewPaymentRecord, NewScanLogEntry, Payee, PayeeId, PaymentRecord, ScanLogEntry},
    traits::{
        IngestResult,
        IngestionError,
        IngestionStore,
        PayeeManagement,
        PaymentPage,
        PaymentQueryFilter,
        PaymentStats,
        ReviewAction,
        ReviewOutcome,
    },
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl IngestionStore for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn ingest(&self, record: NewPaymentRecord) -> Result<IngestResult, IngestionError> {
        let notification_id = record.notification_id.clone();
        let payee_id = record.payee_id.clone();
        let mut tx = self.pool.begin().await?;
        // The insert is the first statement, so this transaction holds the write lock before touching any balance
        let Some(payment) = payments::idempotent_insert(record, &mut tx).await? else {
            trace!("🗃️ Notification {notification_id} is already recorded. Nothing to do.");
            return Ok(IngestResult::AlreadyExists(notification_id));
        };
        let payment = match payee_id {
            Some(payee_id) => {
                payees::apply_payment(&payment, &payee_id, &mut tx).await?;
                payments::set_applied_payee(payment.id, Some(&payee_id), &mut tx).await?
            },
            None => payment,
        };
        tx.commit().await?;
        info!(
            "🗃️ Recorded payment #{} of {} from {} as {}",
            payment.id, payment.amount, payment.sender_name, payment.status
        );
        Ok(IngestResult::Inserted(payment))
    }

    async fn existing_notification_ids(&self, ids: &[String]) -> Result<HashSet<String>, IngestionError> {
        let mut conn = self.pool.acquire().await?;
        payments::existing_notification_ids(ids, &mut conn).await
    }

    async fn fetch_payment(&self, id: i64) -> Result<Option<PaymentRecord>, IngestionError> {
        let mut conn = self.pool.acquire().await?;
        payments::fetch_payment(id, &mut conn).await
    }

    async fn fetch_payment_by_notification_id(
        &self,
        notification_id: &str,
    ) -> Result<Option<PaymentRecord>, IngestionError> {
        let mut conn = self.pool.acquire().await?;
        payments::fetch_payment_by_notification_id(notification_id, &mut conn).await
    }

    async fn search_payments(&self, filter: PaymentQueryFilter) -> Result<PaymentPage, IngestionError> {
        let mut conn = self.pool.acquire().await?;
        payments::search_payments(filter, &mut conn).await
    }

    async fn review_payment(&self, id: i64, action: ReviewAction) -> Result<ReviewOutcome, IngestionError> {
        let mut tx = self.pool.begin().await?;
        if !payments::lock_payment(id, &mut tx).await? {
            return Err(IngestionError::PaymentNotFound(id));
        }
        let payment = payments::fetch_payment(id, &mut tx).await?.ok_or(IngestionError::PaymentNotFound(id))?;
        let Some(plan) = action.plan(&payment)? else {
            debug!("🗃️ {} on payment #{id} changes nothing. It is already {}", action.name(), payment.status);
            return Ok(ReviewOutcome { payment, changed: false, audit_entries: vec![] });
        };
        if let Some(payee_id) = &plan.apply_to {
            if payees::fetch_payee(payee_id, &mut tx).await?.is_none() {
                return Err(IngestionError::PayeeNotFound(payee_id.clone()));
            }
        }
        let mut audit_entries = Vec::with_capacity(2);
        if let Some(payee_id) = &plan.reverse_from {
            audit_entries.push(payees::reverse_payment(&payment, payee_id, &mut tx).await?);
        }
        if let Some(payee_id) = &plan.apply_to {
            audit_entries.push(payees::apply_payment(&payment, payee_id, &mut tx).await?);
        }
        let applied = plan.applied_payee_id(payment.applied_payee_id.as_ref());
        let updated = payments::apply_review(id, &plan, applied.as_ref(), &mut tx).await?;
        tx.commit().await?;
        info!("🗃️ Payment #{id} moved from {} to {} by {}", payment.status, updated.status, action.name());
        Ok(ReviewOutcome { payment: updated, changed: true, audit_entries })
    }

    async fn payment_stats(&self) -> Result<PaymentStats, IngestionError> {
        let mut conn = self.pool.acquire().await?;
        let mut stats = payments::payment_stats(&mut conn).await?;
        stats.last_scan = scan_log::recent_entries(1, &mut conn).await?.into_iter().next();
        Ok(stats)
    }

    async fn append_scan_log(&self, entry: NewScanLogEntry) -> Result<ScanLogEntry, IngestionError> {
        let mut conn = self.pool.acquire().await?;
        scan_log::insert_entry(entry, &mut conn).await
    }

    async fn recent_scans(&self, limit: i64) -> Result<Vec<ScanLogEntry>, IngestionError> {
        let mut conn = self.pool.acquire().await?;
        scan_log::recent_entries(limit, &mut conn).await
    }

    async fn audit_history(&self, limit: i64) -> Result<Vec<AuditEntry>, IngestionError> {
        let mut conn = self.pool.acquire().await?;
        audit_log::recent_entries(limit, &mut conn).await
    }

    async fn close(&mut self) -> Result<(), IngestionError> {
        self.pool.close().await;
        Ok(())
    }
}

impl PayeeManagement for SqliteDatabase {
    async fn fetch_payees(&self) -> Result<Vec<Payee>, IngestionError> {
        let mut conn = self.pool.acquire().await?;
        payees::fetch_payees(&mut conn).await
    }

    async fn fetch_payee(&self, id: &PayeeId) -> Result<Option<Payee>, IngestionError> {
        let mut conn = self.pool.acquire().await?;
        payees::fetch_payee(id, &mut conn).await
    }

    async fn upsert_payee(&self, payee: NewPayee) -> Result<Payee, IngestionError> {
        let mut conn = self.pool.acquire().await?;
        payees::upsert_payee(payee, &mut conn).await
    }

    async fn audit_entries_for_payee(&self, id: &PayeeId) -> Result<Vec<AuditEntry>, IngestionError> {
        let mut conn = self.pool.acquire().await?;
        audit_log::entries_for_payee(id, &mut conn).await
    }
}

impl SqliteDatabase {
    /// Creates a new database API object, using the URL in `ZPG_DATABASE_URL`.
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        trace!("🗃️ Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    /// Brings the schema up to date. Migrations are embedded at compile time.
    pub async fn run_migrations(&self) -> Result<(), MigrateError> {
        sqlx::migrate!("./src/sqlite/migrations").run(&self.pool).await?;
        debug!("🗃️ Database migrations complete");
        Ok(())
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// The audit entries for a single payment, oldest first.
    pub async fn audit_entries_for_payment(&self, payment_id: i64) -> Result<Vec<AuditEntry>, IngestionError> {
        let mut conn = self.pool.acquire().await?;
        audit_log::entries_for_payment(payment_id, &mut conn).await
    }
}
