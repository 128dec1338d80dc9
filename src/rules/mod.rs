//! Ordered regex rewriting.
//!
//! A [`RuleEngine`] applies every rule exactly once, in declaration order,
//! feeding each rule's output to the next. Order is part of the contract:
//! string interpolation must be extracted before variable sigils are
//! stripped, sigils must be gone before cmdlet substitution runs, and so on.

pub mod lexical;

use crate::error::ConversionError;
use crate::syntax;
use crate::types::ConversionLevel;
use regex_lite::{Captures, Regex};

/// What a rule substitutes for each match
#[derive(Clone)]
pub enum Replacement {
    /// Replacement template with `${n}` back-references
    Template(String),
    /// Structural rewrite that a template cannot express
    Callback(fn(&Captures<'_>) -> String),
}

impl std::fmt::Debug for Replacement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Replacement::Template(t) => write!(f, "Template({:?})", t),
            Replacement::Callback(_) => write!(f, "Callback"),
        }
    }
}

/// Where in a statement a rule may match
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleScope {
    /// String literals are masked before matching
    Code,
    /// The rule sees string literals and handles them itself
    Anywhere,
}

#[derive(Debug, Clone)]
pub struct ConversionRule {
    pub name: &'static str,
    pub pattern: Regex,
    pub replacement: Replacement,
    pub level: ConversionLevel,
    pub scope: RuleScope,
    pub description: &'static str,
}

impl ConversionRule {
    fn build(
        name: &'static str,
        pattern: &str,
        replacement: Replacement,
        description: &'static str,
    ) -> Result<Self, ConversionError> {
        let pattern = Regex::new(pattern).map_err(|e| ConversionError::Rule {
            rule: name.to_string(),
            message: e.to_string(),
        })?;
        Ok(Self {
            name,
            pattern,
            replacement,
            level: ConversionLevel::Full,
            scope: RuleScope::Code,
            description,
        })
    }

    pub fn template(
        name: &'static str,
        pattern: &str,
        template: impl Into<String>,
        description: &'static str,
    ) -> Result<Self, ConversionError> {
        Self::build(
            name,
            pattern,
            Replacement::Template(template.into()),
            description,
        )
    }

    pub fn callback(
        name: &'static str,
        pattern: &str,
        callback: fn(&Captures<'_>) -> String,
        description: &'static str,
    ) -> Result<Self, ConversionError> {
        Self::build(name, pattern, Replacement::Callback(callback), description)
    }

    /// Tag the rule with the conversion level that enables it
    pub fn at_level(mut self, level: ConversionLevel) -> Self {
        self.level = level;
        self
    }

    /// Let the rule match inside string literals
    pub fn anywhere(mut self) -> Self {
        self.scope = RuleScope::Anywhere;
        self
    }

    /// Apply this rule to `text`, ignoring level gating
    pub fn apply(&self, text: &str) -> String {
        match self.scope {
            RuleScope::Anywhere => self.substitute(text),
            RuleScope::Code => match mask_strings(text) {
                Some((masked, literals)) => unmask(&self.substitute(&masked), &literals),
                None => self.substitute(text),
            },
        }
    }

    fn substitute(&self, text: &str) -> String {
        match &self.replacement {
            Replacement::Template(template) => self
                .pattern
                .replace_all(text, template.as_str())
                .into_owned(),
            Replacement::Callback(callback) => self
                .pattern
                .replace_all(text, |caps: &Captures<'_>| callback(caps))
                .into_owned(),
        }
    }
}

/// Apply `rules` to `text` in order, skipping rules `level` does not permit
pub fn apply(rules: &[ConversionRule], text: &str, level: ConversionLevel) -> String {
    rules
        .iter()
        .filter(|rule| level.permits(rule.level))
        .fold(text.to_string(), |acc, rule| rule.apply(&acc))
}

/// An ordered, immutable rule table
#[derive(Debug, Clone)]
pub struct RuleEngine {
    rules: Vec<ConversionRule>,
}

impl RuleEngine {
    pub fn new(rules: Vec<ConversionRule>) -> Self {
        Self { rules }
    }

    /// The general lexical table (sigils, operators, literals, hashtables)
    pub fn lexical(bridge_handle: &str) -> Result<Self, ConversionError> {
        Ok(Self::new(lexical::rules(bridge_handle)?))
    }

    pub fn rules(&self) -> &[ConversionRule] {
        &self.rules
    }

    pub fn into_rules(self) -> Vec<ConversionRule> {
        self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn apply(&self, text: &str, level: ConversionLevel) -> String {
        apply(&self.rules, text, level)
    }
}

// ============================================================================
// String masking
// ============================================================================

const MASK_OPEN: char = '\u{E000}';
const MASK_CLOSE: char = '\u{E001}';
const MASK_BASE: u32 = 0xE100;
const MASK_LIMIT: usize = 0xF8FF - 0xE100;

/// Replace every string literal with an opaque token.
///
/// Returns `None` when the text has no literals, or more than the token
/// space can encode; callers then match against the raw text.
fn mask_strings(text: &str) -> Option<(String, Vec<String>)> {
    let ranges: Vec<(usize, usize)> = syntax::string_ranges(text)
        .into_iter()
        .filter(|&(start, _)| matches!(text.as_bytes()[start], b'"' | b'\''))
        .collect();
    if ranges.is_empty() || ranges.len() > MASK_LIMIT {
        return None;
    }

    let mut masked = String::with_capacity(text.len());
    let mut literals = Vec::with_capacity(ranges.len());
    let mut last = 0;
    for (idx, (start, end)) in ranges.into_iter().enumerate() {
        masked.push_str(&text[last..start]);
        masked.push(MASK_OPEN);
        masked.push(char::from_u32(MASK_BASE + idx as u32)?);
        masked.push(MASK_CLOSE);
        literals.push(text[start..end].to_string());
        last = end;
    }
    masked.push_str(&text[last..]);
    Some((masked, literals))
}

fn unmask(text: &str, literals: &[String]) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch != MASK_OPEN {
            out.push(ch);
            continue;
        }
        let idx = chars
            .next()
            .map(|c| (c as u32).wrapping_sub(MASK_BASE) as usize);
        if chars.peek() == Some(&MASK_CLOSE) {
            chars.next();
        }
        if let Some(literal) = idx.and_then(|i| literals.get(i)) {
            out.push_str(literal);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(pattern: &str, template: &str) -> ConversionRule {
        ConversionRule::template("test", pattern, template, "test rule").unwrap()
    }

    // ============================================================================
    // RULE TESTS
    // ============================================================================

    #[test]
    fn test_template_back_references() {
        let r = rule(r"(\w+)\+\+", "${1} += 1");
        assert_eq!(r.apply("count++"), "count += 1");
    }

    #[test]
    fn test_callback_rule() {
        fn upper(caps: &Captures<'_>) -> String {
            caps[1].to_uppercase()
        }
        let r = ConversionRule::callback("upper", r"<(\w+)>", upper, "uppercase tags").unwrap();
        assert_eq!(r.apply("a <b> c"), "a B c");
    }

    #[test]
    fn test_inert_rule_leaves_text() {
        let r = rule(r"never-matches-\d{9}", "x");
        assert_eq!(r.apply("unchanged"), "unchanged");
    }

    #[test]
    fn test_invalid_pattern_is_rule_error() {
        let err = ConversionRule::template("broken", "(unclosed", "", "bad").unwrap_err();
        assert!(matches!(err, ConversionError::Rule { .. }));
    }

    #[test]
    fn test_code_scope_skips_string_literals() {
        let r = rule(r"!", "not ");
        assert_eq!(r.apply("!done -and \"Done!\""), "not done -and \"Done!\"");
    }

    #[test]
    fn test_anywhere_scope_sees_literals() {
        let r = rule(r"!", "?").anywhere();
        assert_eq!(r.apply("\"Done!\""), "\"Done?\"");
    }

    // ============================================================================
    // ENGINE TESTS
    // ============================================================================

    #[test]
    fn test_rules_apply_in_order_single_pass() {
        let rules = vec![rule("a", "b"), rule("b", "c")];
        assert_eq!(apply(&rules, "a", ConversionLevel::Full), "c");

        let reversed = vec![rule("b", "c"), rule("a", "b")];
        assert_eq!(apply(&reversed, "a", ConversionLevel::Full), "b");
    }

    #[test]
    fn test_level_gating() {
        let rules = vec![
            rule("x", "full"),
            rule("y", "hybrid").at_level(ConversionLevel::Hybrid),
            rule("z", "bridge").at_level(ConversionLevel::Bridge),
        ];
        assert_eq!(apply(&rules, "x y z", ConversionLevel::Full), "full y z");
        assert_eq!(apply(&rules, "x y z", ConversionLevel::Hybrid), "full hybrid z");
        assert_eq!(
            apply(&rules, "x y z", ConversionLevel::Bridge),
            "full hybrid bridge"
        );
    }

    #[test]
    fn test_mask_round_trip_preserves_text() {
        let text = "a 'b' \"c\" d";
        let (masked, literals) = mask_strings(text).unwrap();
        assert!(!masked.contains('\''));
        assert_eq!(literals.len(), 2);
        assert_eq!(unmask(&masked, &literals), text);
    }

    #[test]
    fn test_mask_none_without_literals() {
        assert!(mask_strings("a + b").is_none());
    }
}
