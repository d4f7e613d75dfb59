use serde::{Deserialize, Serialize};
use zpg_common::Cents;

use crate::{
    db_types::{AuditEntry, PayeeId, PaymentRecord, PaymentStatus, ScanLogEntry},
    traits::IngestionError,
};

pub const DEFAULT_PAGE_SIZE: i64 = 100;
pub const MAX_PAGE_SIZE: i64 = 1_000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum IngestResult {
    /// The record was new and has been stored.
    Inserted(PaymentRecord),
    /// A record for this notification id already existed. Nothing was changed.
    AlreadyExists(String),
}

impl IngestResult {
    pub fn is_inserted(&self) -> bool {
        matches!(self, IngestResult::Inserted(_))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PaymentQueryFilter {
    pub status: Option<PaymentStatus>,
    pub payee_id: Option<PayeeId>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl PaymentQueryFilter {
    pub fn with_status(mut self, status: PaymentStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_payee_id(mut self, payee_id: PayeeId) -> Self {
        self.payee_id = Some(payee_id);
        self
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_offset(mut self, offset: i64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// The page size, clamped to `1..=MAX_PAGE_SIZE`.
    pub fn page_size(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
    }

    pub fn page_offset(&self) -> i64 {
        self.offset.unwrap_or_default().max(0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentPage {
    pub payments: Vec<PaymentRecord>,
    /// The number of records matching the filter, ignoring paging.
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusSummary {
    pub status: PaymentStatus,
    pub count: i64,
    pub amount: Cents,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PeriodSummary {
    pub days: i64,
    pub count: i64,
    pub amount: Cents,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PaymentStats {
    pub total_payments: i64,
    pub total_amount: Cents,
    pub by_status: Vec<StatusSummary>,
    pub auto_matched: i64,
    pub manually_matched: i64,
    pub pending_count: i64,
    pub recent: PeriodSummary,
    pub payees_with_balance: i64,
    pub last_scan: Option<ScanLogEntry>,
}

/// A manual review action on a payment record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ReviewAction {
    /// Confirm the payment, optionally overriding the matched payee.
    Verify { payee_id: Option<PayeeId>, verified_by: String },
    Reject { reason: Option<String> },
    /// Reassign the payment to a different payee and confirm it.
    Rematch { payee_id: PayeeId, verified_by: String },
}

/// The changes a review action makes to a payment record. Produced by [`ReviewAction::plan`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewPlan {
    pub status: PaymentStatus,
    pub payee_id: Option<PayeeId>,
    pub auto_matched: bool,
    /// The payee whose earlier credit for this payment must be undone.
    pub reverse_from: Option<PayeeId>,
    /// The payee to credit with this payment.
    pub apply_to: Option<PayeeId>,
    pub rejection_reason: Option<String>,
    pub verified_by: Option<String>,
}

impl ReviewPlan {
    /// The payee whose balance reflects the payment once the plan has been carried out.
    pub fn applied_payee_id(&self, current: Option<&PayeeId>) -> Option<PayeeId> {
        match (&self.apply_to, &self.reverse_from) {
            (Some(p), _) => Some(p.clone()),
            (None, Some(_)) => None,
            (None, None) => current.cloned(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewOutcome {
    pub payment: PaymentRecord,
    /// False when the action was an idempotent repeat and nothing was modified.
    pub changed: bool,
    /// The audit entries written by this action, in the order they were written.
    pub audit_entries: Vec<AuditEntry>,
}

impl ReviewAction {
    pub fn verify(payee_id: Option<PayeeId>, verified_by: &str) -> Self {
        Self::Verify { payee_id, verified_by: verified_by.to_string() }
    }

    pub fn reject(reason: Option<String>) -> Self {
        Self::Reject { reason }
    }

    pub fn rematch(payee_id: PayeeId, verified_by: &str) -> Self {
        Self::Rematch { payee_id, verified_by: verified_by.to_string() }
    }

    /// Decides what this action does to `payment`.
    ///
    /// Returns `Ok(None)` when the action is an idempotent repeat of an earlier one, and
    /// [`IngestionError::InvalidTransition`] when the action is not allowed in the record's current state.
    ///
    /// | from \ action  | verify                   | reject   | rematch  |
    /// |----------------|--------------------------|----------|----------|
    /// | pending        | verified                 | rejected | verified |
    /// | auto_verified  | verified                 | rejected | verified |
    /// | verified       | no-op (same/no payee)    | invalid  | verified |
    /// | rejected       | invalid                  | invalid  | invalid  |
    ///
    /// Whenever the payee that should be credited differs from the payee that currently is, the earlier credit is
    /// reversed and the new payee credited.
    pub fn plan(&self, payment: &PaymentRecord) -> Result<Option<ReviewPlan>, IngestionError> {
        use PaymentStatus::*;
        let invalid = |what: &str| -> Result<Option<ReviewPlan>, IngestionError> {
            let msg = format!("Cannot {what} payment {} in state {}", payment.id, payment.status);
            Err(IngestionError::InvalidTransition(msg))
        };
        match (self, payment.status) {
            (_, Rejected) => invalid(self.name()),
            (ReviewAction::Verify { payee_id, .. }, Verified) => match payee_id {
                None => Ok(None),
                Some(p) if payment.payee_id.as_ref() == Some(p) => Ok(None),
                Some(_) => Err(IngestionError::InvalidTransition(format!(
                    "Payment {} is already verified to a different payee. Use rematch to reassign it",
                    payment.id
                ))),
            },
            (ReviewAction::Verify { payee_id, verified_by }, Pending | AutoVerified) => {
                let target = payee_id.clone().or_else(|| payment.payee_id.clone());
                let auto_matched = payment.auto_matched && target == payment.payee_id;
                Ok(Some(Self::confirm(payment, target, auto_matched, verified_by)))
            },
            (ReviewAction::Reject { reason }, Pending | AutoVerified) => Ok(Some(ReviewPlan {
                status: Rejected,
                payee_id: payment.payee_id.clone(),
                auto_matched: payment.auto_matched,
                reverse_from: None,
                apply_to: None,
                rejection_reason: reason.clone(),
                verified_by: None,
            })),
            (ReviewAction::Reject { .. }, Verified) => invalid("reject"),
            (ReviewAction::Rematch { payee_id, .. }, Verified) if payment.payee_id.as_ref() == Some(payee_id) => {
                Ok(None)
            },
            (ReviewAction::Rematch { payee_id, verified_by }, Pending | AutoVerified | Verified) => {
                Ok(Some(Self::confirm(payment, Some(payee_id.clone()), false, verified_by)))
            },
        }
    }

    fn confirm(payment: &PaymentRecord, target: Option<PayeeId>, auto_matched: bool, verified_by: &str) -> ReviewPlan {
        let current = payment.applied_payee_id.clone();
        let (reverse_from, apply_to) = match (&current, &target) {
            (Some(c), Some(t)) if c == t => (None, None),
            (Some(c), Some(t)) => (Some(c.clone()), Some(t.clone())),
            (None, Some(t)) => (None, Some(t.clone())),
            // Confirming without a payee never touches balances
            (_, None) => (None, None),
        };
        ReviewPlan {
            status: PaymentStatus::Verified,
            payee_id: target,
            auto_matched,
            reverse_from,
            apply_to,
            rejection_reason: None,
            verified_by: Some(verified_by.to_string()),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ReviewAction::Verify { .. } => "verify",
            ReviewAction::Reject { .. } => "reject",
            ReviewAction::Rematch { .. } => "rematch",
        }
    }
}
