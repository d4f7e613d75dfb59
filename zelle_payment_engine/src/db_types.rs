use crate::{
    helpers::{ExtractedFields, MatchResult},
    source::RawNotification,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use std::{fmt::Display, str::FromStr};
use thiserror::Error;
use zpg_common::Cents;

/// Sender name recorded when no extraction rule produced a name.
pub const UNKNOWN_SENDER: &str = "Unknown Sender";
/// Institution label recorded when no keyword matched.
pub const UNKNOWN_INSTITUTION: &str = "Unknown Bank";
/// Maximum number of body characters kept on a payment record for manual review.
pub const BODY_SNIPPET_LENGTH: usize = 500;

#[derive(Debug, Clone, Error)]
#[error("Conversion error: {0}")]
pub struct ConversionError(String);

//--------------------------------------        PayeeId        ---------------------------------------------------------
/// The opaque identifier of a payee (typically a member id or slug).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct PayeeId(pub String);

impl PayeeId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<S: Into<String>> From<S> for PayeeId {
    fn from(value: S) -> Self {
        Self(value.into())
    }
}

impl Display for PayeeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

//--------------------------------------     PaymentStatus     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// Recorded, but not attributed to a payee with confidence. Awaiting manual review.
    Pending,
    /// Matched to a payee during ingestion. The payee balance has already been updated.
    AutoVerified,
    /// Confirmed by a human reviewer.
    Verified,
    /// Rejected by a human reviewer. Terminal.
    Rejected,
}

impl PaymentStatus {
    /// `rejected` is the only terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, PaymentStatus::Rejected)
    }
}

impl Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentStatus::Pending => write!(f, "pending"),
            PaymentStatus::AutoVerified => write!(f, "auto_verified"),
            PaymentStatus::Verified => write!(f, "verified"),
            PaymentStatus::Rejected => write!(f, "rejected"),
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "auto_verified" => Ok(Self::AutoVerified),
            "verified" => Ok(Self::Verified),
            "rejected" => Ok(Self::Rejected),
            s => Err(ConversionError(format!("Invalid payment status: {s}"))),
        }
    }
}

//--------------------------------------     MatchStrategy     ---------------------------------------------------------
/// The matcher tier that produced a payee match, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MatchStrategy {
    AddressMatch,
    MemoMatch,
    NameExact,
    NamePartial,
    NoMatch,
}

impl Display for MatchStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            MatchStrategy::AddressMatch => "address_match",
            MatchStrategy::MemoMatch => "memo_match",
            MatchStrategy::NameExact => "name_exact",
            MatchStrategy::NamePartial => "name_partial",
            MatchStrategy::NoMatch => "no_match",
        };
        write!(f, "{s}")
    }
}

//--------------------------------------     PaymentRecord     ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub id: i64,
    /// The source's identifier for the notification this record was created from. Unique.
    pub notification_id: String,
    pub received_at: DateTime<Utc>,
    pub sender_name: String,
    pub sender_address: String,
    pub amount: Cents,
    pub currency: String,
    /// True when no amount could be extracted. `amount` is zero in that case.
    pub amount_missing: bool,
    pub memo: Option<String>,
    pub confirmation_code: Option<String>,
    pub institution: String,
    pub subject: String,
    pub body_snippet: String,
    pub payee_id: Option<PayeeId>,
    pub match_strategy: MatchStrategy,
    pub auto_matched: bool,
    /// The payee whose balance currently reflects this payment, if any.
    pub applied_payee_id: Option<PayeeId>,
    pub status: PaymentStatus,
    pub rejection_reason: Option<String>,
    pub verified_by: Option<String>,
    pub verified_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PaymentRecord {
    pub fn is_applied(&self) -> bool {
        self.applied_payee_id.is_some()
    }
}

//--------------------------------------   NewPaymentRecord    ---------------------------------------------------------
#[derive(Debug, Clone)]
pub struct NewPaymentRecord {
    pub notification_id: String,
    pub received_at: DateTime<Utc>,
    pub sender_name: String,
    pub sender_address: String,
    pub amount: Cents,
    pub amount_missing: bool,
    pub memo: Option<String>,
    pub confirmation_code: Option<String>,
    pub institution: String,
    pub subject: String,
    pub body_snippet: String,
    pub payee_id: Option<PayeeId>,
    pub match_strategy: MatchStrategy,
}

impl NewPaymentRecord {
    /// Assembles a new record from a decoded notification, the fields extracted from it, and the matcher's verdict.
    pub fn new(notification: &RawNotification, fields: ExtractedFields, matched: MatchResult) -> Self {
        let amount_missing = fields.amount.is_none();
        let body_snippet = notification.body.chars().take(BODY_SNIPPET_LENGTH).collect();
        Self {
            notification_id: notification.id.clone(),
            received_at: notification.received_at,
            sender_name: fields.sender_name.unwrap_or_else(|| UNKNOWN_SENDER.to_string()),
            sender_address: notification.sender_address.clone(),
            amount: fields.amount.unwrap_or_default(),
            amount_missing,
            memo: fields.memo,
            confirmation_code: fields.confirmation_code,
            institution: fields.institution,
            subject: notification.subject.clone(),
            body_snippet,
            payee_id: matched.payee_id,
            match_strategy: matched.strategy,
        }
    }

    /// A record is auto-verified on ingestion exactly when the matcher attributed it to a payee.
    pub fn initial_status(&self) -> PaymentStatus {
        if self.payee_id.is_some() {
            PaymentStatus::AutoVerified
        } else {
            PaymentStatus::Pending
        }
    }
}

//--------------------------------------         Payee         ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Payee {
    pub id: PayeeId,
    pub display_name: String,
    pub contact_address: Option<String>,
    /// Outstanding balance. Never negative.
    pub balance_due: Cents,
    pub total_paid: Cents,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Payee {
    /// The last whitespace-separated token of the display name, if there is one.
    pub fn surname(&self) -> Option<&str> {
        self.display_name.split_whitespace().last()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPayee {
    pub id: PayeeId,
    pub display_name: String,
    #[serde(default)]
    pub contact_address: Option<String>,
    #[serde(default)]
    pub balance_due: Cents,
}

impl NewPayee {
    pub fn new<I: Into<PayeeId>, S: Into<String>>(id: I, display_name: S) -> Self {
        Self { id: id.into(), display_name: display_name.into(), contact_address: None, balance_due: Cents::default() }
    }

    pub fn with_contact_address<S: Into<String>>(mut self, address: S) -> Self {
        self.contact_address = Some(address.into());
        self
    }

    pub fn with_balance_due(mut self, balance: Cents) -> Self {
        self.balance_due = balance;
        self
    }
}

//--------------------------------------      AuditEntry       ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AuditEntryType {
    /// A payment was credited to the payee.
    Applied,
    /// An earlier credit was undone because the payment was reassigned to a different payee.
    Reversed,
}

impl Display for AuditEntryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuditEntryType::Applied => write!(f, "applied"),
            AuditEntryType::Reversed => write!(f, "reversed"),
        }
    }
}

/// An immutable record of a single balance mutation.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: i64,
    pub payment_id: i64,
    pub payee_id: PayeeId,
    pub entry_type: AuditEntryType,
    pub amount: Cents,
    pub balance_due_before: Cents,
    pub balance_due_after: Cents,
    pub total_paid_before: Cents,
    pub total_paid_after: Cents,
    pub receipt_number: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewAuditEntry {
    pub payment_id: i64,
    pub payee_id: PayeeId,
    pub entry_type: AuditEntryType,
    pub amount: Cents,
    pub balance_due_before: Cents,
    pub balance_due_after: Cents,
    pub total_paid_before: Cents,
    pub total_paid_after: Cents,
    pub receipt_number: String,
    pub description: String,
}

/// Receipt numbers have the form `ZP-YYYYMMDD-NNNN`, where `NNNN` is the zero-padded payment id.
pub fn receipt_number(payment_id: i64, date: DateTime<Utc>) -> String {
    format!("ZP-{}-{payment_id:04}", date.format("%Y%m%d"))
}

//--------------------------------------     ScanLogEntry      ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ScanLogEntry {
    pub id: i64,
    pub started_at: DateTime<Utc>,
    pub examined: i64,
    pub created: i64,
    pub auto_matched: i64,
    #[sqlx(json)]
    pub errors: Vec<String>,
    pub duration_ms: i64,
}

#[derive(Debug, Clone)]
pub struct NewScanLogEntry {
    pub started_at: DateTime<Utc>,
    pub examined: i64,
    pub created: i64,
    pub auto_matched: i64,
    pub errors: Vec<String>,
    pub duration_ms: i64,
}
