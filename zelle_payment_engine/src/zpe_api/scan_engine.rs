use std::{collections::HashSet, fmt::Debug, sync::Arc, time::Instant};

use chrono::{DateTime, Duration, Utc};
use log::*;

use crate::{
    db_types::{NewPaymentRecord, NewScanLogEntry, Payee, UNKNOWN_SENDER},
    helpers::{extract_fields, is_payment_notification, match_payee},
    source::{NotificationSource, RawNotification, SourceError},
    traits::{IngestResult, IngestionStore},
    zpe_api::scan_objects::{ScanError, ScanSummary, ScannedPayment},
};

/// Lookback windows are capped at this many days (about a century).
pub const MAX_LOOKBACK_DAYS: u32 = 36_500;

/// The start of a lookback window of `lookback_days` days ending now. Windows longer than [`MAX_LOOKBACK_DAYS`] are
/// shortened to it.
pub fn lookback_start(lookback_days: u32) -> DateTime<Utc> {
    let days = i64::from(lookback_days.min(MAX_LOOKBACK_DAYS));
    Utc::now().checked_sub_signed(Duration::days(days)).unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// `ScanEngine` runs a single pass over the notifications received in a lookback window, and stores a payment record
/// for every new payment notification it finds.
///
/// Scans are best-effort. A message that cannot be fetched or decoded is recorded as an error in the summary and the
/// rest of the batch carries on. Only a failure to reach the source or the store before the batch starts ends a scan
/// early. Either way a scan log entry is written.
///
/// Several scans may run at the same time (a manual scan alongside the poller, say). They do not coordinate with
/// each other; the store's per-notification idempotency guarantees that every notification is recorded once.
pub struct ScanEngine<S, B> {
    source: Arc<S>,
    db: B,
}

impl<S, B: Clone> Clone for ScanEngine<S, B> {
    fn clone(&self) -> Self {
        Self { source: Arc::clone(&self.source), db: self.db.clone() }
    }
}

impl<S, B> Debug for ScanEngine<S, B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ScanEngine")
    }
}

/// What happened to a single candidate message.
enum Processed {
    Created(ScannedPayment),
    AlreadyRecorded,
    NotAPayment,
}

impl<S, B> ScanEngine<S, B> {
    pub fn new(source: S, db: B) -> Self {
        Self { source: Arc::new(source), db }
    }

    /// Creates a scan engine over a source that is shared with other components.
    pub fn with_shared_source(source: Arc<S>, db: B) -> Self {
        Self { source, db }
    }

    pub fn source(&self) -> &S {
        self.source.as_ref()
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}

impl<S, B> ScanEngine<S, B>
where
    S: NotificationSource,
    B: IngestionStore,
{
    /// Scans the notifications received in the last `lookback_days` days, up to [`MAX_LOOKBACK_DAYS`].
    ///
    /// This never fails as a whole. Everything that went wrong is reported in [`ScanSummary::errors`].
    pub async fn scan(&self, lookback_days: u32) -> ScanSummary {
        let started_at = Utc::now();
        let timer = Instant::now();
        let mut summary = ScanSummary::default();
        if let Err(e) = self.run_batch(lookback_days, &mut summary).await {
            error!("📨️ Scan abandoned. {e}");
            summary.errors.push(e);
        }
        summary.duration_ms = i64::try_from(timer.elapsed().as_millis()).unwrap_or(i64::MAX);
        let entry = NewScanLogEntry {
            started_at,
            examined: summary.examined,
            created: summary.created,
            auto_matched: summary.auto_matched,
            errors: summary.error_messages(),
            duration_ms: summary.duration_ms,
        };
        if let Err(e) = self.db.append_scan_log(entry).await {
            error!("📨️ Could not write the scan log entry. {e}");
        }
        if summary.created > 0 {
            info!("📨️ Scan complete. {summary}");
        } else {
            debug!("📨️ Scan complete. {summary}");
        }
        summary
    }

    async fn run_batch(&self, lookback_days: u32, summary: &mut ScanSummary) -> Result<(), ScanError> {
        if lookback_days > MAX_LOOKBACK_DAYS {
            warn!("📨️ A lookback of {lookback_days} days is too long. Scanning the last {MAX_LOOKBACK_DAYS} days instead");
        }
        let since = lookback_start(lookback_days);
        let ids = self.source.search_since(since).await.map_err(ScanError::for_batch)?;
        let mut seen = HashSet::with_capacity(ids.len());
        let ids = ids.into_iter().filter(|id| seen.insert(id.clone())).collect::<Vec<_>>();
        summary.examined = ids.len() as i64;
        if ids.is_empty() {
            trace!("📨️ No notifications since {since}");
            return Ok(());
        }

        let existing = self
            .db
            .existing_notification_ids(&ids)
            .await
            .map_err(|e| ScanError::for_batch(format!("Could not check for existing records. {e}")))?;
        summary.skipped += existing.len() as i64;
        let new_ids = ids.into_iter().filter(|id| !existing.contains(id)).collect::<Vec<_>>();
        debug!("📨️ {} candidate notifications since {since}. {} are new", summary.examined, new_ids.len());
        if new_ids.is_empty() {
            return Ok(());
        }

        let payees = self
            .db
            .fetch_payees()
            .await
            .map_err(|e| ScanError::for_batch(format!("Could not load payees. {e}")))?;

        for id in new_ids {
            match self.process_message(&id, &payees).await {
                Ok(Processed::Created(payment)) => {
                    summary.created += 1;
                    if payment.payee_id.is_some() {
                        summary.auto_matched += 1;
                    }
                    summary.payments.push(payment);
                },
                Ok(Processed::AlreadyRecorded) => summary.skipped += 1,
                Ok(Processed::NotAPayment) => summary.not_payments += 1,
                Err(ProcessError::SourceDown(e)) => {
                    // No point fetching the rest of the batch
                    return Err(ScanError::for_batch(e));
                },
                Err(ProcessError::Message(e)) => {
                    warn!("📨️ Skipping notification. {e}");
                    summary.errors.push(e);
                },
            }
        }
        Ok(())
    }

    async fn process_message(&self, id: &str, payees: &[Payee]) -> Result<Processed, ProcessError> {
        let bytes = self.source.fetch(id).await.map_err(|e| match e {
            SourceError::Unavailable(_) => ProcessError::SourceDown(e),
            e => ProcessError::Message(ScanError::for_message(id, e)),
        })?;
        let notification =
            RawNotification::from_rfc822(id, &bytes).map_err(|e| ProcessError::Message(ScanError::for_message(id, e)))?;
        if !is_payment_notification(&notification.subject, &notification.sender_address, &notification.body) {
            trace!("📨️ Notification {id} ({}) is not a payment notification", notification.subject);
            return Ok(Processed::NotAPayment);
        }
        let fields = extract_fields(&notification.subject, &notification.sender_address, &notification.body);
        let sender_name = fields.sender_name.clone().unwrap_or_else(|| UNKNOWN_SENDER.to_string());
        let matched = match_payee(payees, &sender_name, &notification.sender_address, fields.memo.as_deref());
        let record = NewPaymentRecord::new(&notification, fields, matched);
        let result = self
            .db
            .ingest(record)
            .await
            .map_err(|e| ProcessError::Message(ScanError::for_message(id, format!("Could not store payment. {e}"))))?;
        match result {
            IngestResult::Inserted(payment) => Ok(Processed::Created(ScannedPayment::from(&payment))),
            IngestResult::AlreadyExists(_) => {
                debug!("📨️ Notification {id} was recorded by a concurrent scan");
                Ok(Processed::AlreadyRecorded)
            },
        }
    }
}

enum ProcessError {
    SourceDown(SourceError),
    Message(ScanError),
}
