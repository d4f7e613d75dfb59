//! Zelle Payment Engine
//!
//! The Zelle Payment Engine turns an inbox of bank notification emails into a reconciled ledger of payments. It
//! periodically scans the inbox, decides heuristically which messages announce an incoming Zelle payment, pulls the
//! payment details out of free text, tries to attribute the payment to a known payee, and records the result exactly
//! once while keeping payee balances consistent.
//!
//! The library is divided into these sections:
//! 1. Notification sources ([`mod@source`]). A source is anything that can list message ids received since a date
//!    and return the raw bytes of one message. A maildir-style directory adapter and an in-memory adapter are
//!    provided.
//! 2. Heuristics ([`mod@helpers`]). The classifier, field extractor and payee matcher are pure functions over text.
//! 3. Storage ([`mod@traits`] and [`mod@sqlite`]). The [`IngestionStore`] trait is the contract for durable,
//!    idempotent storage of payment records, payee balances, the audit trail and the scan log. SQLite is the supplied
//!    backend.
//! 4. The public API ([`mod@zpe_api`]). [`ScanEngine`] runs one scan over a batch of notifications, [`Poller`] drives
//!    the scan engine in the background, and [`PaymentsApi`] provides the manual review operations (verify, reject,
//!    rematch) and reporting queries.
pub mod db_types;
pub mod helpers;
pub mod source;
pub mod traits;
pub mod zpe_api;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
pub use traits::{IngestResult, IngestionError, IngestionStore, PayeeManagement};
pub use zpe_api::{
    payments_api::{PayeeHistory, PaymentsApi},
    poller::{Poller, PollerConfig, PollerStatus},
    scan_engine::{ScanEngine, MAX_LOOKBACK_DAYS},
    scan_objects::{ScanError, ScanSummary, ScannedPayment},
};
