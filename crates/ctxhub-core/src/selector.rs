//! Selector rules that decide whether a provider applies to a document.
//!
//! A [`Selector`] is an ordered list of [`SelectorRule`]s. Matching a document
//! yields a score: `0` when no rule applies, otherwise the highest score of
//! any matching rule. Specific rules outrank the `'*'` wildcard, so the score
//! doubles as a precedence signal.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::document::DocumentContext;

/// Score of the bare `'*'` wildcard rule.
pub const WILDCARD_SCORE: u32 = 1;
/// Score of a filter whose language is `'*'`.
pub const ANY_LANGUAGE_SCORE: u32 = 5;
/// Score of an exact language or pattern match.
pub const EXACT_SCORE: u32 = 10;

/// A filter over document properties. Every field that is set must match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentFilter {
    /// Language id, or `"*"` for any language.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    /// Glob matched against the document URI path (e.g. `**/*.ts`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
}

impl DocumentFilter {
    /// A filter matching a single language.
    pub fn language(language: impl Into<String>) -> Self {
        Self {
            language: Some(language.into()),
            pattern: None,
        }
    }

    /// A filter matching documents whose path matches a glob.
    pub fn pattern(pattern: impl Into<String>) -> Self {
        Self {
            language: None,
            pattern: Some(pattern.into()),
        }
    }

    /// Restrict this filter to documents whose path matches a glob.
    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    fn score(&self, document: &DocumentContext) -> u32 {
        let mut score = 0;

        if let Some(language) = &self.language {
            if language == "*" {
                score = score.max(ANY_LANGUAGE_SCORE);
            } else if *language == document.language_id {
                score = score.max(EXACT_SCORE);
            } else {
                return 0;
            }
        }

        if let Some(pattern) = &self.pattern {
            if glob_matches(pattern, document.path()) {
                score = score.max(EXACT_SCORE);
            } else {
                return 0;
            }
        }

        score
    }
}

/// Invalid globs never match.
fn glob_matches(pattern: &str, path: &str) -> bool {
    globset::GlobBuilder::new(pattern)
        .literal_separator(false)
        .build()
        .map(|glob| glob.compile_matcher().is_match(path))
        .unwrap_or(false)
}

/// One rule of a selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectorRule {
    /// `'*'`: matches every document with the lowest score.
    Wildcard,
    /// A bare language id string.
    Language(String),
    /// A `{language?, pattern?}` filter.
    Filter(DocumentFilter),
    /// A rule whose shape was not understood; never matches.
    Unrecognized(Value),
}

impl SelectorRule {
    /// Score this rule against a document (`0` = no match).
    pub fn score(&self, document: &DocumentContext) -> u32 {
        match self {
            SelectorRule::Wildcard => WILDCARD_SCORE,
            SelectorRule::Language(language) if *language == document.language_id => EXACT_SCORE,
            SelectorRule::Language(_) => 0,
            SelectorRule::Filter(filter) => filter.score(document),
            SelectorRule::Unrecognized(_) => 0,
        }
    }
}

impl From<Value> for SelectorRule {
    fn from(value: Value) -> Self {
        match value {
            Value::String(s) if s == "*" => SelectorRule::Wildcard,
            Value::String(s) => SelectorRule::Language(s),
            Value::Object(_) => match serde_json::from_value::<DocumentFilter>(value.clone()) {
                Ok(filter) => SelectorRule::Filter(filter),
                Err(_) => SelectorRule::Unrecognized(value),
            },
            other => SelectorRule::Unrecognized(other),
        }
    }
}

impl Serialize for SelectorRule {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            SelectorRule::Wildcard => serializer.serialize_str("*"),
            SelectorRule::Language(language) => serializer.serialize_str(language),
            SelectorRule::Filter(filter) => filter.serialize(serializer),
            SelectorRule::Unrecognized(value) => value.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for SelectorRule {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(SelectorRule::from)
    }
}

/// Ordered set of match rules for one provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Selector(Vec<SelectorRule>);

impl Selector {
    /// Build a selector from explicit rules.
    pub fn new(rules: Vec<SelectorRule>) -> Self {
        Self(rules)
    }

    /// `['*']`: applies to every document.
    pub fn wildcard() -> Self {
        Self(vec![SelectorRule::Wildcard])
    }

    /// `[{language}]`: applies to one language.
    pub fn language(language: impl Into<String>) -> Self {
        Self(vec![SelectorRule::Filter(DocumentFilter::language(language))])
    }

    /// The rules in declaration order.
    pub fn rules(&self) -> &[SelectorRule] {
        &self.0
    }

    /// Score this selector against a document: the best rule wins, `0` means
    /// the provider does not apply.
    pub fn match_score(&self, document: &DocumentContext) -> u32 {
        self.0
            .iter()
            .map(|rule| rule.score(document))
            .max()
            .unwrap_or(0)
    }
}

impl From<Vec<SelectorRule>> for Selector {
    fn from(rules: Vec<SelectorRule>) -> Self {
        Self(rules)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn md_doc() -> DocumentContext {
        DocumentContext::new("file:///test.txt", "md")
    }

    #[test]
    fn test_wildcard_matches_with_lowest_score() {
        assert_eq!(Selector::wildcard().match_score(&md_doc()), WILDCARD_SCORE);
    }

    #[test]
    fn test_language_filter_outranks_wildcard() {
        let selector = Selector::new(vec![
            SelectorRule::Wildcard,
            SelectorRule::Filter(DocumentFilter::language("md")),
        ]);
        assert_eq!(selector.match_score(&md_doc()), EXACT_SCORE);
    }

    #[test]
    fn test_language_mismatch_scores_zero() {
        assert_eq!(Selector::language("typescript").match_score(&md_doc()), 0);
    }

    #[test]
    fn test_any_language_filter() {
        assert_eq!(
            Selector::language("*").match_score(&md_doc()),
            ANY_LANGUAGE_SCORE
        );
    }

    #[test]
    fn test_pattern_filter() {
        let matching = Selector::new(vec![SelectorRule::Filter(DocumentFilter::pattern(
            "**/*.txt",
        ))]);
        let other = Selector::new(vec![SelectorRule::Filter(DocumentFilter::pattern(
            "**/*.rs",
        ))]);
        assert_eq!(matching.match_score(&md_doc()), EXACT_SCORE);
        assert_eq!(other.match_score(&md_doc()), 0);
    }

    #[test]
    fn test_all_filter_fields_must_match() {
        let filter = DocumentFilter::language("md").with_pattern("**/*.rs");
        let selector = Selector::new(vec![SelectorRule::Filter(filter)]);
        assert_eq!(selector.match_score(&md_doc()), 0);
    }

    #[test]
    fn test_empty_filter_and_empty_selector_never_match() {
        let selector = Selector::new(vec![SelectorRule::Filter(DocumentFilter::default())]);
        assert_eq!(selector.match_score(&md_doc()), 0);
        assert_eq!(Selector::default().match_score(&md_doc()), 0);
    }

    #[test]
    fn test_invalid_glob_never_matches() {
        let selector = Selector::new(vec![SelectorRule::Filter(DocumentFilter::pattern("a[b"))]);
        assert_eq!(selector.match_score(&md_doc()), 0);
    }

    #[test]
    fn test_deserialize_mixed_rules() {
        let selector: Selector =
            serde_json::from_value(json!(["*", "md", {"language": "rust"}, 42])).unwrap();
        assert_eq!(
            selector.rules(),
            &[
                SelectorRule::Wildcard,
                SelectorRule::Language("md".to_string()),
                SelectorRule::Filter(DocumentFilter::language("rust")),
                SelectorRule::Unrecognized(json!(42)),
            ]
        );
        assert_eq!(selector.match_score(&md_doc()), EXACT_SCORE);
    }

    #[test]
    fn test_unrecognized_rule_never_matches() {
        let selector = Selector::new(vec![SelectorRule::from(json!({"language": 3}))]);
        assert_eq!(selector.match_score(&md_doc()), 0);
    }

    #[test]
    fn test_serialize_round_trips_shape() {
        let selector = Selector::new(vec![
            SelectorRule::Wildcard,
            SelectorRule::Filter(DocumentFilter::language("md")),
        ]);
        assert_eq!(
            serde_json::to_value(&selector).unwrap(),
            json!(["*", {"language": "md"}])
        );
    }
}
