use std::{collections::HashSet, future::Future};

use thiserror::Error;

use crate::{
    db_types::{AuditEntry, NewPaymentRecord, NewScanLogEntry, PayeeId, PaymentRecord, ScanLogEntry},
    traits::{
        data_objects::{IngestResult, PaymentPage, PaymentQueryFilter, PaymentStats, ReviewAction, ReviewOutcome},
        PayeeManagement,
    },
};

#[derive(Debug, Clone, Error)]
pub enum IngestionError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Payment {0} does not exist")]
    PaymentNotFound(i64),
    #[error("Payee {0} does not exist")]
    PayeeNotFound(PayeeId),
    #[error("Invalid state transition: {0}")]
    InvalidTransition(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Could not serialize or deserialize data: {0}")]
    Serialization(String),
}

impl From<sqlx::Error> for IngestionError {
    fn from(e: sqlx::Error) -> Self {
        IngestionError::DatabaseError(e.to_string())
    }
}

impl From<serde_json::Error> for IngestionError {
    fn from(e: serde_json::Error) -> Self {
        IngestionError::Serialization(e.to_string())
    }
}

/// This trait defines the highest level of behaviour for storage backends of the Zelle Payment Engine.
///
/// Implementations must guarantee that:
/// * At most one payment record ever exists per notification id, even when several scans race each other.
/// * A payee's balances change only in the same atomic transaction that changes a payment record's status, and each
///   payment's amount is reflected in at most one payee's balances at any time.
/// * Every balance change produces an audit entry in the same transaction.
pub trait IngestionStore: Clone + PayeeManagement + Send + Sync + 'static {
    /// The URL of the database
    fn url(&self) -> &str;

    /// Stores a new payment record, unless one already exists for the same notification id.
    ///
    /// If the record was matched to a payee, it is stored as `auto_verified` and the payee's balance is updated (with
    /// an audit entry) in the same transaction as the insert. Otherwise it is stored as `pending`.
    ///
    /// Finding an existing record is not an error: [`IngestResult::AlreadyExists`] is returned instead, and nothing is
    /// modified.
    fn ingest(&self, record: NewPaymentRecord) -> impl Future<Output = Result<IngestResult, IngestionError>> + Send;

    /// Returns the subset of `ids` for which a payment record already exists.
    fn existing_notification_ids(
        &self,
        ids: &[String],
    ) -> impl Future<Output = Result<HashSet<String>, IngestionError>> + Send;

    fn fetch_payment(&self, id: i64) -> impl Future<Output = Result<Option<PaymentRecord>, IngestionError>> + Send;

    fn fetch_payment_by_notification_id(
        &self,
        notification_id: &str,
    ) -> impl Future<Output = Result<Option<PaymentRecord>, IngestionError>> + Send;

    /// Lists payment records, most recent first, along with the total number of records that match the filter.
    fn search_payments(
        &self,
        filter: PaymentQueryFilter,
    ) -> impl Future<Output = Result<PaymentPage, IngestionError>> + Send;

    /// Applies a review action to a payment record in a single atomic transaction.
    ///
    /// The transition is validated with [`ReviewAction::plan`] against the record as it exists inside the
    /// transaction, so two concurrent reviews of the same record cannot both apply a balance change.
    fn review_payment(
        &self,
        id: i64,
        action: ReviewAction,
    ) -> impl Future<Output = Result<ReviewOutcome, IngestionError>> + Send;

    fn payment_stats(&self) -> impl Future<Output = Result<PaymentStats, IngestionError>> + Send;

    fn append_scan_log(
        &self,
        entry: NewScanLogEntry,
    ) -> impl Future<Output = Result<ScanLogEntry, IngestionError>> + Send;

    /// The most recent scan log entries, newest first.
    fn recent_scans(&self, limit: i64) -> impl Future<Output = Result<Vec<ScanLogEntry>, IngestionError>> + Send;

    /// The most recent audit entries across all payees, newest first.
    fn audit_history(&self, limit: i64) -> impl Future<Output = Result<Vec<AuditEntry>, IngestionError>> + Send;

    /// Closes the database connection.
    fn close(&mut self) -> impl Future<Output = Result<(), IngestionError>> + Send;
}
