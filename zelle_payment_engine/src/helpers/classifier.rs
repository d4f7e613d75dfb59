use once_cell::sync::Lazy;
use regex::Regex;

use super::RuleSet;

/// Domains that banks use to send payment notifications.
pub const NOTIFICATION_DOMAINS: [&str; 10] = [
    "chase.com",
    "bankofamerica.com",
    "wellsfargo.com",
    "usbank.com",
    "pnc.com",
    "capitalone.com",
    "zellepay.com",
    "notify.zelle.com",
    "alerts.chase.com",
    "ealerts.bankofamerica.com",
];

static SUBJECT_PHRASES: Lazy<RuleSet> = Lazy::new(|| {
    RuleSet::new()
        .case_insensitive("received_from", r"(?:You\s+)?(?:received|got)\s+\$[\d,]+(?:\.\d{2})?\s+(?:from|via)\s+")
        .case_insensitive("zelle_payment_from", r"Zelle\s+(?:payment|transfer)\s+(?:from|received)")
        .case_insensitive("amount_zelle_payment", r"\$[\d,]+(?:\.\d{2})?\s+Zelle\s+(?:payment|deposit)")
        .case_insensitive("zelle_notification", r"(?:New\s+)?Zelle\s+(?:payment\s+)?notification")
        .case_insensitive("received_through_zelle", r"You\s+(?:have\s+)?received\s+.*\s+through\s+Zelle")
        .case_insensitive("zelle_you_received", r"Zelle®?\s*[:,]?\s*(?:You\s+)?(?:received|got)")
        .case_insensitive("received_via_zelle", r"payment\s+received\s+via\s+Zelle")
        .case_insensitive("direct_deposit", r"Direct\s+deposit.*Zelle")
        .case_insensitive("money_received", r"Money\s+received.*Zelle")
        .case_insensitive("chase", r"Chase.*Zelle.*received")
        .case_insensitive("wells_fargo", r"Wells\s+Fargo.*Zelle")
        .case_insensitive("bank_of_america", r"Bank\s+of\s+America.*Zelle")
});

static DOLLAR_AMOUNT: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"\$[\d,]+(?:\.\d{2})?").ok());

/// Decides whether a message announces an incoming payment.
///
/// Any one of these signals is sufficient:
/// 1. The subject contains a known payment phrase.
/// 2. The sender belongs to a known bank notification domain and the message mentions "zelle".
/// 3. The message mentions "zelle" and contains a dollar amount.
///
/// This is a heuristic. False positives are tolerated, since unmatched records are held for manual review.
pub fn is_payment_notification(subject: &str, sender_address: &str, body: &str) -> bool {
    if SUBJECT_PHRASES.any_match(subject) {
        return true;
    }
    let text = format!("{subject} {sender_address} {body}").to_lowercase();
    let mentions_zelle = text.contains("zelle");
    if !mentions_zelle {
        return false;
    }
    let sender = sender_address.to_lowercase();
    if NOTIFICATION_DOMAINS.iter().any(|domain| sender.contains(domain)) {
        return true;
    }
    DOLLAR_AMOUNT.as_ref().map(|re| re.is_match(&text)).unwrap_or(false)
}
