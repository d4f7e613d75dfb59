//! Text heuristics for payment notifications.
//!
//! Everything in this module is a pure function over strings. Nothing here touches the database or the inbox, which
//! keeps the heuristics cheap to test and safe to call from any task.
mod classifier;
mod field_extractor;
mod payee_matcher;
mod rules;

pub use classifier::{is_payment_notification, NOTIFICATION_DOMAINS};
pub use field_extractor::{extract_fields, ExtractedFields};
pub use payee_matcher::{match_payee, MatchResult};
pub use rules::{Rule, RuleSet};
