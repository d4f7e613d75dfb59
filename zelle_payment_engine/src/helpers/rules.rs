use regex::{Regex, RegexBuilder};

/// A single named extraction rule. The first capture group of `pattern` is the candidate value.
#[derive(Debug, Clone)]
pub struct Rule {
    pub name: &'static str,
    pub pattern: Regex,
}

impl Rule {
    /// Compiles a rule from a pattern that is known to be valid at build time. Rules are static data, so an invalid
    /// pattern is a programming error and is caught by the unit tests that touch every rule set.
    fn compile(name: &'static str, pattern: &str, case_insensitive: bool) -> Option<Self> {
        RegexBuilder::new(pattern)
            .case_insensitive(case_insensitive)
            .build()
            .map_err(|e| log::error!("Extraction rule '{name}' does not compile. {e}"))
            .ok()
            .map(|pattern| Self { name, pattern })
    }

    /// Returns the first capture group of the leftmost match, if any.
    pub fn capture<'a>(&self, text: &'a str) -> Option<&'a str> {
        self.pattern.captures(text).and_then(|c| c.get(1)).map(|m| m.as_str())
    }
}

/// An ordered list of extraction rules.
///
/// Rules are tried in order and the first one that yields an acceptable value wins. Only the leftmost match of each
/// rule is considered: if it is rejected by the acceptance function, the next rule is tried, not the next match.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn case_insensitive(mut self, name: &'static str, pattern: &str) -> Self {
        self.rules.extend(Rule::compile(name, pattern, true));
        self
    }

    pub fn case_sensitive(mut self, name: &'static str, pattern: &str) -> Self {
        self.rules.extend(Rule::compile(name, pattern, false));
        self
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Applies the rules in rank order and returns the first value accepted by `accept`, along with the name of the
    /// rule that produced it.
    pub fn first_accepted<T, F>(&self, text: &str, accept: F) -> Option<(&'static str, T)>
    where F: Fn(&str) -> Option<T> {
        self.rules.iter().find_map(|rule| rule.capture(text).and_then(&accept).map(|v| (rule.name, v)))
    }

    /// Returns true if any rule matches anywhere in `text`.
    pub fn any_match(&self, text: &str) -> bool {
        self.rules.iter().any(|rule| rule.pattern.is_match(text))
    }
}
