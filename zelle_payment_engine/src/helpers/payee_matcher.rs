use log::trace;
use serde::{Deserialize, Serialize};

use crate::db_types::{MatchStrategy, Payee, PayeeId, UNKNOWN_SENDER};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchResult {
    pub payee_id: Option<PayeeId>,
    pub strategy: MatchStrategy,
}

impl MatchResult {
    pub fn no_match() -> Self {
        Self { payee_id: None, strategy: MatchStrategy::NoMatch }
    }

    fn matched(payee: &Payee, strategy: MatchStrategy) -> Self {
        trace!("🔎️ Matched payee {} ({}) using {strategy}", payee.id, payee.display_name);
        Self { payee_id: Some(payee.id.clone()), strategy }
    }

    pub fn is_match(&self) -> bool {
        self.payee_id.is_some()
    }
}

/// Attributes a payment to one of `payees`.
///
/// The strategies are tried in strict priority order, and each one considers every payee before the next strategy is
/// attempted. The first payee (in slice order) that satisfies the highest-priority strategy wins.
///
/// 1. `address_match`: the sender address equals the payee's contact address, ignoring case.
/// 2. `memo_match`: the memo contains the payee's full display name or surname, ignoring case.
/// 3. `name_exact`: the sender name equals the payee's display name, ignoring case.
/// 4. `name_partial`: the payee's surname is contained in the sender name, or the sender name is contained in the
///    payee's display name.
///
/// Empty names never match anything, and the strategies that compare against the sender name are skipped entirely when
/// the sender is unknown.
pub fn match_payee(payees: &[Payee], sender_name: &str, sender_address: &str, memo: Option<&str>) -> MatchResult {
    let address = sender_address.trim().to_lowercase();
    if !address.is_empty() {
        let found = payees.iter().find(|p| {
            p.contact_address.as_deref().map(|a| a.trim().to_lowercase() == address).unwrap_or(false)
        });
        if let Some(payee) = found {
            return MatchResult::matched(payee, MatchStrategy::AddressMatch);
        }
    }

    let memo = memo.map(|m| m.trim().to_lowercase()).unwrap_or_default();
    if !memo.is_empty() {
        let found = payees.iter().find(|p| {
            let full = p.display_name.trim().to_lowercase();
            let surname = surname(p);
            (!full.is_empty() && memo.contains(&full)) || (!surname.is_empty() && memo.contains(&surname))
        });
        if let Some(payee) = found {
            return MatchResult::matched(payee, MatchStrategy::MemoMatch);
        }
    }

    let name = sender_name.trim().to_lowercase();
    if name.is_empty() || sender_name.trim() == UNKNOWN_SENDER {
        return MatchResult::no_match();
    }
    let found = payees.iter().find(|p| {
        let full = p.display_name.trim().to_lowercase();
        !full.is_empty() && full == name
    });
    if let Some(payee) = found {
        return MatchResult::matched(payee, MatchStrategy::NameExact);
    }
    let found = payees.iter().find(|p| {
        let full = p.display_name.trim().to_lowercase();
        let surname = surname(p);
        (!surname.is_empty() && name.contains(&surname)) || (!full.is_empty() && full.contains(&name))
    });
    match found {
        Some(payee) => MatchResult::matched(payee, MatchStrategy::NamePartial),
        None => MatchResult::no_match(),
    }
}

fn surname(payee: &Payee) -> String {
    payee.surname().map(str::to_lowercase).unwrap_or_default()
}
