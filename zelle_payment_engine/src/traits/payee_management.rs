use std::future::Future;

use crate::{
    db_types::{AuditEntry, NewPayee, Payee, PayeeId},
    traits::IngestionError,
};

/// Payee records and their balance history.
///
/// Balances are never written through this trait directly, except when a payee is created or its details are
/// corrected with [`PayeeManagement::upsert_payee`]. Day-to-day balance changes happen only as a side effect of
/// [`crate::IngestionStore`] operations.
pub trait PayeeManagement {
    /// All payees, ordered by display name.
    fn fetch_payees(&self) -> impl Future<Output = Result<Vec<Payee>, IngestionError>> + Send;

    fn fetch_payee(&self, id: &PayeeId) -> impl Future<Output = Result<Option<Payee>, IngestionError>> + Send;

    /// Creates a payee, or updates the name, contact address and balance due of an existing one. `total_paid` is
    /// left untouched on update.
    fn upsert_payee(&self, payee: NewPayee) -> impl Future<Output = Result<Payee, IngestionError>> + Send;

    /// The audit trail of a single payee, newest first.
    fn audit_entries_for_payee(
        &self,
        id: &PayeeId,
    ) -> impl Future<Output = Result<Vec<AuditEntry>, IngestionError>> + Send;
}
