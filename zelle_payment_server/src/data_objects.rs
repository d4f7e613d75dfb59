use serde::{Deserialize, Serialize};
use zelle_payment_engine::{
    db_types::{PayeeId, PaymentRecord, PaymentStatus, ScanLogEntry},
    traits::PaymentStats,
    PollerStatus,
};

pub const DEFAULT_REVIEWER: &str = "admin";
pub const DEFAULT_HISTORY_LIMIT: i64 = 100;
pub const POLLER_STATUS_SCANS: i64 = 10;

/// The lookback that `POST /api/scan` uses when the request does not specify one.
#[derive(Debug, Clone, Copy)]
pub struct ScanDefaults {
    pub days_back: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanRequest {
    pub days_back: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PaymentListQuery {
    pub status: Option<PaymentStatus>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VerifyRequest {
    pub payee_id: Option<PayeeId>,
    pub verified_by: Option<String>,
}

impl VerifyRequest {
    pub fn reviewer(&self) -> &str {
        reviewer_or_default(&self.verified_by)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RejectRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchRequest {
    pub payee_id: PayeeId,
    pub verified_by: Option<String>,
}

impl MatchRequest {
    pub fn reviewer(&self) -> &str {
        reviewer_or_default(&self.verified_by)
    }
}

fn reviewer_or_default(name: &Option<String>) -> &str {
    name.as_deref().map(str::trim).filter(|s| !s.is_empty()).unwrap_or(DEFAULT_REVIEWER)
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<i64>,
}

impl HistoryQuery {
    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_HISTORY_LIMIT)
    }
}

/// The result of a review action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewResponse {
    pub payment: PaymentRecord,
    pub changed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsResponse {
    #[serde(flatten)]
    pub stats: PaymentStats,
    pub poller: PollerStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    #[serde(flatten)]
    pub poller: PollerStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollerStatusResponse {
    #[serde(flatten)]
    pub status: PollerStatus,
    pub recent_scans: Vec<ScanLogEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollerActionResponse {
    /// False if the poller was already in the requested state.
    pub changed: bool,
    #[serde(flatten)]
    pub status: PollerStatus,
}
