//! # Zelle payment engine public API
//!
//! * [`scan_engine`] runs one best-effort pass over the notifications in a lookback window.
//! * [`poller`] drives the scan engine on a fixed interval in the background.
//! * [`payments_api`] provides manual review (verify, reject, rematch), payee management and reporting.
//!
//! Like the rest of the engine, each API is created by handing it a storage backend that implements
//! [`crate::IngestionStore`]:
//!
//! ```rust,ignore
//! use zelle_payment_engine::{source::MaildirSource, PaymentsApi, ScanEngine, SqliteDatabase};
//! let db = SqliteDatabase::new_with_url("sqlite://data/zelle_payments.db", 5).await?;
//! let engine = ScanEngine::new(MaildirSource::new("data/inbox"), db.clone());
//! let summary = engine.scan(30).await;
//! let api = PaymentsApi::new(db);
//! let pending = api.list_payments(Some(PaymentStatus::Pending), None, None).await?;
//! ```

pub mod payments_api;
pub mod poller;
pub mod scan_engine;
pub mod scan_objects;
