//! Experiment-driven feature values.
//!
//! The completion pipeline carries a set of experiment variables with every
//! request. Two of them concern this engine: a comma-separated allow-list of
//! provider ids and a time budget. [`FeatureService`] is the seam through
//! which the registry reads them; [`ExperimentFeatures`] is the default
//! implementation that reads the variables directly.

use std::collections::HashMap;

use serde_json::Value;

/// Experiment variable holding the provider allow-list (`"*"` or `"a,b"`).
pub const CONTEXT_PROVIDERS_VARIABLE: &str = "contextproviders";
/// Experiment variable holding the time budget in milliseconds.
pub const TIME_BUDGET_VARIABLE: &str = "contextprovidertimebudget";
/// Time budget used when neither configuration nor experiments set one.
pub const DEFAULT_TIME_BUDGET_MS: u64 = 150;

/// Experiment variables attached to one completion request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExperimentContext {
    variables: HashMap<String, Value>,
}

impl ExperimentContext {
    /// An empty experiment context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a variable.
    pub fn with_variable(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }

    /// Look up a variable.
    pub fn variable(&self, name: &str) -> Option<&Value> {
        self.variables.get(name)
    }
}

/// Source of experiment-controlled values consumed by the registry.
pub trait FeatureService: Send + Sync {
    /// Time budget for provider resolution in milliseconds (0 = no deadline).
    fn context_provider_time_budget(&self, experiments: &ExperimentContext) -> u64;

    /// Provider ids enabled by experiment (`"*"` enables all).
    fn enabled_context_providers(&self, experiments: &ExperimentContext) -> Vec<String>;
}

/// Reads feature values straight from the experiment variables.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExperimentFeatures;

impl FeatureService for ExperimentFeatures {
    fn context_provider_time_budget(&self, experiments: &ExperimentContext) -> u64 {
        match experiments.variable(TIME_BUDGET_VARIABLE) {
            Some(Value::Number(n)) => n.as_u64().unwrap_or(DEFAULT_TIME_BUDGET_MS),
            Some(Value::String(s)) => s.trim().parse().unwrap_or(DEFAULT_TIME_BUDGET_MS),
            _ => DEFAULT_TIME_BUDGET_MS,
        }
    }

    fn enabled_context_providers(&self, experiments: &ExperimentContext) -> Vec<String> {
        match experiments.variable(CONTEXT_PROVIDERS_VARIABLE) {
            Some(Value::String(list)) => list
                .split(',')
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(str::to_string)
                .collect(),
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_budget() {
        let features = ExperimentFeatures;
        assert_eq!(
            features.context_provider_time_budget(&ExperimentContext::new()),
            DEFAULT_TIME_BUDGET_MS
        );
    }

    #[test]
    fn test_budget_from_variable() {
        let features = ExperimentFeatures;
        let numeric = ExperimentContext::new().with_variable(TIME_BUDGET_VARIABLE, 10);
        let textual = ExperimentContext::new().with_variable(TIME_BUDGET_VARIABLE, " 25 ");
        let garbage = ExperimentContext::new().with_variable(TIME_BUDGET_VARIABLE, "soon");
        assert_eq!(features.context_provider_time_budget(&numeric), 10);
        assert_eq!(features.context_provider_time_budget(&textual), 25);
        assert_eq!(
            features.context_provider_time_budget(&garbage),
            DEFAULT_TIME_BUDGET_MS
        );
    }

    #[test]
    fn test_allow_list_parsing() {
        let features = ExperimentFeatures;
        let exp = ExperimentContext::new().with_variable(CONTEXT_PROVIDERS_VARIABLE, "a, b,,c");
        assert_eq!(features.enabled_context_providers(&exp), vec!["a", "b", "c"]);

        let empty = ExperimentContext::new().with_variable(CONTEXT_PROVIDERS_VARIABLE, "");
        assert!(features.enabled_context_providers(&empty).is_empty());
        assert!(
            features
                .enabled_context_providers(&ExperimentContext::new())
                .is_empty()
        );
    }
}
