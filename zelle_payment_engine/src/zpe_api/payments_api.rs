//! Manual review and reporting over stored payment records.

use std::fmt::Debug;

use log::*;
use serde::{Deserialize, Serialize};
use zpg_common::Cents;

use crate::{
    db_types::{AuditEntry, NewPayee, Payee, PayeeId, PaymentRecord, PaymentStatus, ScanLogEntry},
    traits::{IngestionError, IngestionStore, PaymentPage, PaymentQueryFilter, PaymentStats, ReviewAction, ReviewOutcome},
};

/// A payee together with its audit trail, newest entry first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayeeHistory {
    pub payee: Payee,
    pub entries: Vec<AuditEntry>,
}

/// `PaymentsApi` is the reviewer-facing API: listing and inspecting payment records, the verify, reject and rematch
/// transitions, payee management and reporting.
///
/// All state changes go through [`IngestionStore::review_payment`], so each call either fully applies (status change,
/// balance changes and audit entries together) or changes nothing.
pub struct PaymentsApi<B> {
    db: B,
}

impl<B: Debug> Debug for PaymentsApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PaymentsApi ({:?})", self.db)
    }
}

impl<B> PaymentsApi<B>
where B: IngestionStore
{
    pub fn new(db: B) -> Self {
        Self { db }
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    /// Lists payment records, newest first, optionally restricted to one status.
    pub async fn list_payments(
        &self,
        status: Option<PaymentStatus>,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<PaymentPage, IngestionError> {
        let filter = PaymentQueryFilter { status, payee_id: None, limit, offset };
        self.db.search_payments(filter).await
    }

    pub async fn search_payments(&self, filter: PaymentQueryFilter) -> Result<PaymentPage, IngestionError> {
        self.db.search_payments(filter).await
    }

    /// Fetches a single payment record. A missing record is reported as [`IngestionError::PaymentNotFound`].
    pub async fn payment(&self, id: i64) -> Result<PaymentRecord, IngestionError> {
        self.db.fetch_payment(id).await?.ok_or(IngestionError::PaymentNotFound(id))
    }

    /// Confirms a payment.
    ///
    /// With no `payee_id`, the payee the record is already matched to (if any) is kept. Naming a different payee than
    /// the automatic match moves the credit: the earlier balance change is reversed and the new payee is credited.
    /// Verifying an already verified record again is a no-op.
    pub async fn verify(
        &self,
        id: i64,
        payee_id: Option<PayeeId>,
        verified_by: &str,
    ) -> Result<ReviewOutcome, IngestionError> {
        trace!("Verify payment #{id} for {payee_id:?} by {verified_by}");
        self.db.review_payment(id, ReviewAction::verify(payee_id, verified_by)).await
    }

    /// Rejects a payment. Balances are left as they are. Rejection is final.
    pub async fn reject(&self, id: i64, reason: Option<String>) -> Result<ReviewOutcome, IngestionError> {
        self.db.review_payment(id, ReviewAction::reject(reason)).await
    }

    /// Assigns a payment to `payee_id` and marks it verified, moving any earlier credit to the new payee.
    pub async fn rematch(&self, id: i64, payee_id: PayeeId, verified_by: &str) -> Result<ReviewOutcome, IngestionError> {
        self.db.review_payment(id, ReviewAction::rematch(payee_id, verified_by)).await
    }

    pub async fn stats(&self) -> Result<PaymentStats, IngestionError> {
        self.db.payment_stats().await
    }

    pub async fn payees(&self) -> Result<Vec<Payee>, IngestionError> {
        self.db.fetch_payees().await
    }

    pub async fn upsert_payee(&self, payee: NewPayee) -> Result<Payee, IngestionError> {
        if payee.id.as_str().trim().is_empty() {
            return Err(IngestionError::InvalidInput("A payee needs a non-empty id".into()));
        }
        if payee.balance_due < Cents::default() {
            return Err(IngestionError::InvalidInput(format!(
                "The balance due for {} cannot be negative ({})",
                payee.id, payee.balance_due
            )));
        }
        self.db.upsert_payee(payee).await
    }

    pub async fn payee_history(&self, id: &PayeeId) -> Result<PayeeHistory, IngestionError> {
        let payee = self.db.fetch_payee(id).await?.ok_or_else(|| IngestionError::PayeeNotFound(id.clone()))?;
        let entries = self.db.audit_entries_for_payee(id).await?;
        Ok(PayeeHistory { payee, entries })
    }

    pub async fn audit_history(&self, limit: i64) -> Result<Vec<AuditEntry>, IngestionError> {
        self.db.audit_history(limit.max(1)).await
    }

    pub async fn recent_scans(&self, limit: i64) -> Result<Vec<ScanLogEntry>, IngestionError> {
        self.db.recent_scans(limit.max(1)).await
    }
}
