//! # Storage contracts
//!
//! This module defines the interface contracts that storage *backends* of the Zelle Payment Engine implement.
//!
//! * [`IngestionStore`] is the highest level of behaviour. It stores payment records exactly once per notification,
//!   runs the review state machine (verify, reject, rematch) atomically together with the matching balance updates,
//!   and keeps the scan log.
//! * [`PayeeManagement`] covers the payee records themselves and their audit trail.
//!
//! The state machine rules are backend-independent and live in [`ReviewAction::plan`], so every backend reaches the
//! same verdict for the same record and action.
mod data_objects;
mod ingestion_store;
mod payee_management;

pub use data_objects::{
    IngestResult,
    PaymentPage,
    PaymentQueryFilter,
    PaymentStats,
    PeriodSummary,
    ReviewAction,
    ReviewOutcome,
    ReviewPlan,
    StatusSummary,
    DEFAULT_PAGE_SIZE,
    MAX_PAGE_SIZE,
};
pub use ingestion_store::{IngestionError, IngestionStore};
pub use payee_management::PayeeManagement;
