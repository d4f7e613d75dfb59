//! Extracts structured payment fields from the free text of a notification.
//!
//! Every field has its own [`RuleSet`]. The rule sets are ranked lists held as data, so adding support for a new bank
//! format is a matter of adding a rule in the right position rather than editing control flow.
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use zpg_common::Cents;

use super::RuleSet;
use crate::db_types::UNKNOWN_INSTITUTION;

/// Capitalised words that the sender-name rules pick up from bank boilerplate rather than from a person's name.
const NAME_NOISE: [&str; 11] =
    ["Zelle", "Chase", "Wells", "Fargo", "Bank", "America", "Direct", "Deposit", "Payment", "Your", "The"];

/// Keyword to institution label. Order matters: "zelle" is the weakest signal and is checked last.
const INSTITUTIONS: [(&str, &str); 7] = [
    ("chase", "Chase"),
    ("bankofamerica", "Bank of America"),
    ("wellsfargo", "Wells Fargo"),
    ("usbank", "US Bank"),
    ("pnc", "PNC"),
    ("capitalone", "Capital One"),
    ("zelle", "Zelle Direct"),
];

/// Amounts above this are taken to be misreads (account or reference numbers) and rejected.
pub const MAX_PLAUSIBLE_AMOUNT: Cents = Cents::from_dollars(1_000_000);

static AMOUNT_RULES: Lazy<RuleSet> = Lazy::new(|| {
    RuleSet::new()
        .case_insensitive("currency_symbol", r"\$\s*([\d,]+(?:\.\d{2})?)")
        .case_insensitive("currency_word", r"([\d,]+(?:\.\d{2})?)\s*(?:USD|dollars?)")
        .case_insensitive("amount_label", r"amount[:\s]*\$?\s*([\d,]+(?:\.\d{2})?)")
        .case_insensitive("received_label", r"received[:\s]*\$?\s*([\d,]+(?:\.\d{2})?)")
});

// Names are recognised by capitalisation, so these rules are case-sensitive.
static SENDER_RULES: Lazy<RuleSet> = Lazy::new(|| {
    const NAME: &str = r"([A-Z][a-zA-Z]+(?:\s+[A-Z][a-zA-Z]+){0,3})";
    RuleSet::new()
        .case_sensitive("from_name", &format!(r"from\s+{NAME}"))
        .case_sensitive("name_sent_you", &format!(r"{NAME}\s+sent\s+you"))
        .case_sensitive("sent_by_name", &format!(r"(?:sent|paid)\s+by\s+{NAME}"))
        .case_sensitive("zelle_from_name", &format!(r"Zelle.*?from\s+{NAME}"))
});

static MEMO_RULES: Lazy<RuleSet> = Lazy::new(|| {
    RuleSet::new()
        .case_insensitive("memo_label", r#"\b(?:memo|note|message|description)[:\s]*["“]?([^"”\n]{3,80})"#)
        .case_insensitive("for_label", r#"\b(?:for|regarding)[:\s]*["“]?([^"”\n]{3,80})"#)
        .case_insensitive("membership", r"Membership\s*[-–]\s*([A-Z][a-zA-Z\s]+)")
});

static CONFIRMATION_RULES: Lazy<RuleSet> = Lazy::new(|| {
    RuleSet::new()
        .case_insensitive(
            "confirmation_label",
            r"(?:confirmation|reference|transaction|ref)\s*(?:#|number|code|id)?[:\s]*([A-Z0-9]{6,20})",
        )
        .case_insensitive("id_label", r"(?:ID|Id)[:\s]*([A-Z0-9]{6,20})")
});

/// The fields pulled out of a notification. `None` means no rule produced a value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedFields {
    pub amount: Option<Cents>,
    pub sender_name: Option<String>,
    pub memo: Option<String>,
    pub confirmation_code: Option<String>,
    pub institution: String,
}

/// Runs every field's rule set over the notification text.
///
/// The amount and sender name are searched for in the subject and body together, the memo and confirmation code in
/// the body alone, and the institution in the sender address and body.
pub fn extract_fields(subject: &str, sender_address: &str, body: &str) -> ExtractedFields {
    ExtractedFields {
        amount: extract_amount(&format!("{subject} {body}")),
        sender_name: extract_sender_name(subject, body),
        memo: extract_memo(body),
        confirmation_code: extract_confirmation_code(body),
        institution: extract_institution(sender_address, body),
    }
}

/// Thousands separators are stripped before parsing, so `$1,500.00` yields 150,000 cents. A capture above
/// [`MAX_PLAUSIBLE_AMOUNT`] is rejected and the next rule is tried.
pub fn extract_amount(text: &str) -> Option<Cents> {
    AMOUNT_RULES
        .first_accepted(text, |s| Cents::from_str(&s.replace(',', "")).ok().filter(|a| *a <= MAX_PLAUSIBLE_AMOUNT))
        .map(|(_, amount)| amount)
}

pub fn extract_sender_name(subject: &str, body: &str) -> Option<String> {
    let combined = format!("{subject}\n{body}");
    SENDER_RULES
        .first_accepted(&combined, |s| {
            let name = s.trim();
            let first = name.split_whitespace().next()?;
            (!NAME_NOISE.contains(&first)).then(|| name.to_string())
        })
        .map(|(_, name)| name)
}

pub fn extract_memo(body: &str) -> Option<String> {
    MEMO_RULES.first_accepted(body, non_empty).map(|(_, memo)| memo)
}

pub fn extract_confirmation_code(body: &str) -> Option<String> {
    CONFIRMATION_RULES.first_accepted(body, non_empty).map(|(_, code)| code)
}

pub fn extract_institution(sender_address: &str, body: &str) -> String {
    let text = format!("{sender_address} {body}").to_lowercase();
    INSTITUTIONS
        .iter()
        .find(|(keyword, _)| text.contains(keyword))
        .map(|(_, label)| label.to_string())
        .unwrap_or_else(|| UNKNOWN_INSTITUTION.to_string())
}

fn non_empty(s: &str) -> Option<String> {
    let s = s.trim();
    (!s.is_empty()).then(|| s.to_string())
}
