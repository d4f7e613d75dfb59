use chrono::{Duration, Utc};
use zelle_payment_engine::source::{MemorySource, RawNotification};

pub fn notification(id: &str, from: &str, subject: &str, body: &str) -> RawNotification {
    RawNotification::new(id, Utc::now() - Duration::hours(1), from, subject, body)
}

/// A Chase notification for a payment from Sunil Banerjee with a memo naming the family.
pub fn banerjee_payment(id: &str) -> RawNotification {
    notification(
        id,
        "no.reply.alerts@chase.com",
        "You received $150.00 from Sunil Banerjee via Zelle",
        "Sunil Banerjee sent you $150.00.\nMemo: Membership - Sunil Banerjee Family\nConfirmation: ABC123XYZ",
    )
}

/// A payment that matches nobody.
pub fn donation(id: &str) -> RawNotification {
    notification(
        id,
        "alerts@unknownbank.example",
        "Zelle: You received $75.00",
        "A payment has arrived.\nMemo: Saraswati Puja donation",
    )
}

pub fn newsletter(id: &str) -> RawNotification {
    notification(id, "news@example.com", "Our spring newsletter", "Nothing about money in here.")
}

pub fn inbox_with(notifications: &[RawNotification]) -> MemorySource {
    let source = MemorySource::new();
    for n in notifications {
        source.add_notification(n);
    }
    source
}
