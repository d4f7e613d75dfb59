use std::fmt::Display;

use serde::{Deserialize, Serialize};
use zpg_common::Cents;

use crate::db_types::{MatchStrategy, PayeeId, PaymentRecord, PaymentStatus};

/// A failure recorded during a scan. Failures tied to one message carry its id; failures that abandoned the whole
/// batch (the source was unreachable, say) do not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanError {
    pub notification_id: Option<String>,
    pub message: String,
}

impl ScanError {
    pub fn for_message<S: Into<String>, M: Display>(notification_id: S, message: M) -> Self {
        Self { notification_id: Some(notification_id.into()), message: message.to_string() }
    }

    pub fn for_batch<M: Display>(message: M) -> Self {
        Self { notification_id: None, message: message.to_string() }
    }
}

impl Display for ScanError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.notification_id {
            Some(id) => write!(f, "Notification {id}: {}", self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

/// A short description of a payment record created by a scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannedPayment {
    pub payment_id: i64,
    pub notification_id: String,
    pub sender_name: String,
    pub amount: Cents,
    pub status: PaymentStatus,
    pub payee_id: Option<PayeeId>,
    pub match_strategy: MatchStrategy,
}

impl From<&PaymentRecord> for ScannedPayment {
    fn from(p: &PaymentRecord) -> Self {
        Self {
            payment_id: p.id,
            notification_id: p.notification_id.clone(),
            sender_name: p.sender_name.clone(),
            amount: p.amount,
            status: p.status,
            payee_id: p.payee_id.clone(),
            match_strategy: p.match_strategy,
        }
    }
}

/// The result of one scan.
///
/// Counts are always reported, even when the scan was cut short.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanSummary {
    /// Candidate ids reported by the source for the lookback window, after removing duplicates.
    pub examined: i64,
    /// New payment records stored by this scan.
    pub created: i64,
    /// How many of the new records were attributed to a payee automatically.
    pub auto_matched: i64,
    /// Ids that already had a payment record, including those stored by a concurrent scan while this one ran.
    pub skipped: i64,
    /// Messages that were fetched but did not look like a payment notification.
    pub not_payments: i64,
    pub errors: Vec<ScanError>,
    pub duration_ms: i64,
    pub payments: Vec<ScannedPayment>,
}

impl ScanSummary {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// The error messages, in the form they are written to the scan log.
    pub fn error_messages(&self) -> Vec<String> {
        self.errors.iter().map(|e| e.to_string()).collect()
    }
}

impl Display for ScanSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} examined, {} new ({} auto-matched), {} already recorded, {} not payments, {} errors in {}ms",
            self.examined,
            self.created,
            self.auto_matched,
            self.skipped,
            self.not_payments,
            self.errors.len(),
            self.duration_ms
        )
    }
}
