use chrono::{Duration, Utc};
use cucumber::{gherkin::Step, then, when};
use zelle_payment_engine::{
    db_types::{AuditEntryType, MatchStrategy, PayeeId, PaymentRecord, PaymentStatus},
    source::RawNotification,
    IngestionError,
    IngestionStore,
    PayeeManagement,
    ScanEngine,
};
use zpg_common::Cents;

use crate::cucumber::ZelleWorld;

#[when(expr = "the bank sends notification {word} from {string} with subject {string}")]
async fn bank_sends_notification(world: &mut ZelleWorld, id: String, from: String, subject: String, step: &Step) {
    let body = step.docstring.as_deref().map(str::trim).unwrap_or_default().to_string();
    let notification = RawNotification::new(id, Utc::now() - Duration::minutes(5), from, subject, body);
    world.system().inbox.add_notification(&notification);
}

#[when(expr = "I scan the last {int} days")]
async fn scan(world: &mut ZelleWorld, days: u32) {
    let summary = world.system().engine.scan(days).await;
    world.last_scan = Some(summary);
}

#[when(expr = "two scans of the last {int} days run at the same time")]
async fn concurrent_scans(world: &mut ZelleWorld, days: u32) {
    let system = world.system();
    let other = ScanEngine::new(system.inbox.clone(), system.db.clone());
    let (a, b) = tokio::join!(system.engine.scan(days), other.scan(days));
    assert!(a.errors.is_empty() && b.errors.is_empty(), "Scan errors: {:?} {:?}", a.errors, b.errors);
    let mut combined = a.clone();
    combined.created += b.created;
    combined.skipped += b.skipped;
    combined.auto_matched += b.auto_matched;
    assert!(a.created <= 1 && b.created <= 1);
    world.last_scan = Some(combined);
}

#[when(expr = "{word} verifies the payment for notification {word}")]
async fn verify(world: &mut ZelleWorld, who: String, notification_id: String) {
    let payment = payment_for(world, &notification_id).await;
    world.last_review = Some(world.api().verify(payment.id, None, &who).await);
}

#[when(expr = "{word} verifies the payment for notification {word} as paid by {word}")]
async fn verify_with_payee(world: &mut ZelleWorld, who: String, notification_id: String, payee_id: String) {
    let payment = payment_for(world, &notification_id).await;
    world.last_review = Some(world.api().verify(payment.id, Some(PayeeId::from(payee_id)), &who).await);
}

#[when(expr = "the payment for notification {word} is rejected because {string}")]
async fn reject(world: &mut ZelleWorld, notification_id: String, reason: String) {
    let payment = payment_for(world, &notification_id).await;
    world.last_review = Some(world.api().reject(payment.id, Some(reason)).await);
}

#[when(expr = "{word} rematches the payment for notification {word} to {word}")]
async fn rematch(world: &mut ZelleWorld, who: String, notification_id: String, payee_id: String) {
    let payment = payment_for(world, &notification_id).await;
    world.last_review = Some(world.api().rematch(payment.id, PayeeId::from(payee_id), &who).await);
}

async fn payment_for(world: &ZelleWorld, notification_id: &str) -> PaymentRecord {
    world
        .db()
        .fetch_payment_by_notification_id(notification_id)
        .await
        .expect("Error fetching payment")
        .unwrap_or_else(|| panic!("No payment recorded for notification {notification_id}"))
}

#[then(expr = "the scan created {int} payment(s) with {int} auto-matched")]
async fn scan_created(world: &mut ZelleWorld, created: i64, auto_matched: i64) {
    let summary = world.last_scan();
    assert_eq!(summary.created, created, "{summary}");
    assert_eq!(summary.auto_matched, auto_matched, "{summary}");
}

#[then(expr = "the scan skipped {int} notification(s)")]
async fn scan_skipped(world: &mut ZelleWorld, skipped: i64) {
    assert_eq!(world.last_scan().skipped, skipped);
}

#[then(expr = "there is exactly {int} payment record(s)")]
async fn payment_count(world: &mut ZelleWorld, count: i64) {
    let page = world.api().list_payments(None, None, None).await.expect("Error listing payments");
    assert_eq!(page.total, count);
}

#[then(expr = "the payment for notification {word} has status {word}")]
async fn payment_status(world: &mut ZelleWorld, notification_id: String, status: String) {
    let payment = payment_for(world, &notification_id).await;
    let expected: PaymentStatus = status.parse().expect("Invalid status");
    assert_eq!(payment.status, expected);
}

#[then(expr = "the payment for notification {word} is matched to {word} by {word}")]
async fn payment_matched(world: &mut ZelleWorld, notification_id: String, payee_id: String, strategy: String) {
    let payment = payment_for(world, &notification_id).await;
    assert_eq!(payment.payee_id, Some(PayeeId::from(payee_id)));
    let strategies = strategy.split('/').collect::<Vec<_>>();
    assert!(strategies.contains(&payment.match_strategy.to_string().as_str()), "{}", payment.match_strategy);
}

#[then(expr = "the payment for notification {word} is not matched")]
async fn payment_not_matched(world: &mut ZelleWorld, notification_id: String) {
    let payment = payment_for(world, &notification_id).await;
    assert_eq!(payment.payee_id, None);
    assert_eq!(payment.match_strategy, MatchStrategy::NoMatch);
}

#[then(expr = "the payment for notification {word} is for {float} USD")]
async fn payment_amount(world: &mut ZelleWorld, notification_id: String, amount: f64) {
    let payment = payment_for(world, &notification_id).await;
    assert_eq!(payment.amount, Cents::from((amount * 100.0).round() as i64));
}

#[then(expr = "payee {word} owes {float} USD and has paid {float} USD")]
async fn payee_balances(world: &mut ZelleWorld, payee_id: String, due: f64, paid: f64) {
    let payee = world.db().fetch_payee(&PayeeId::from(payee_id)).await.expect("Error fetching payee").expect("No payee");
    assert_eq!(payee.balance_due, Cents::from((due * 100.0).round() as i64), "balance due");
    assert_eq!(payee.total_paid, Cents::from((paid * 100.0).round() as i64), "total paid");
}

#[then(expr = "payee {word} has {int} audit entries")]
async fn audit_entry_count(world: &mut ZelleWorld, payee_id: String, count: usize) {
    let entries = world.db().audit_entries_for_payee(&PayeeId::from(payee_id)).await.expect("Error fetching history");
    assert_eq!(entries.len(), count);
}

#[then(expr = "the latest audit entry for payee {word} is a {word}")]
async fn latest_audit_entry(world: &mut ZelleWorld, payee_id: String, entry_type: String) {
    let entries = world.db().audit_entries_for_payee(&PayeeId::from(payee_id)).await.expect("Error fetching history");
    let expected = match entry_type.as_str() {
        "credit" => AuditEntryType::Applied,
        "reversal" => AuditEntryType::Reversed,
        other => panic!("Unknown audit entry type {other}"),
    };
    assert_eq!(entries.first().map(|e| e.entry_type), Some(expected));
}

#[then("the review made no changes")]
async fn review_no_changes(world: &mut ZelleWorld) {
    match world.last_review.as_ref().expect("No review has run") {
        Ok(outcome) => assert!(!outcome.changed),
        Err(e) => assert!(matches!(e, IngestionError::InvalidTransition(_)), "{e}"),
    }
}

#[then("the review is refused as an invalid transition")]
async fn review_invalid(world: &mut ZelleWorld) {
    let result = world.last_review.as_ref().expect("No review has run");
    assert!(matches!(result, Err(IngestionError::InvalidTransition(_))), "{result:?}");
}

#[then("the review succeeded")]
async fn review_succeeded(world: &mut ZelleWorld) {
    let result = world.last_review.as_ref().expect("No review has run");
    assert!(matches!(result, Ok(outcome) if outcome.changed), "{result:?}");
}
