//! Context provider registry.
//!
//! Owns the ordered provider list and orchestrates one resolution round per
//! completion request:
//!
//! 1. return the memoized result for a completion id seen before,
//! 2. bail out with nothing when the caller already cancelled,
//! 3. pick enabled providers (debug mode, configuration or experiment
//!    allow-list),
//! 4. score each against the document,
//! 5. race every match concurrently under one [`ResolutionSignal`],
//! 6. record resolutions in the statistics store and memoize the result.

use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::{SystemTime, UNIX_EPOCH};

use ctxhub_config::{AppConfig, ContextProvidersConfig};
use futures::future::join_all;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::document::DocumentContext;
use crate::features::{ExperimentContext, ExperimentFeatures, FeatureService};
use crate::racer::{self, ResolutionSignal, ResolvedProviderResult};
use crate::resolver::{ContextResolver, NO_DEADLINE, ResolveRequest};
use crate::runtime_mode::RuntimeMode;
use crate::selector::Selector;
use crate::statistics::ContextProviderStatistics;

/// Errors from provider registration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistrationError {
    #[error("context provider id must not be empty")]
    EmptyId,

    #[error("context provider id must not contain ',': {0}")]
    InvalidId(String),

    #[error("context provider already registered: {0}")]
    Duplicate(String),
}

/// A registered unit supplying context for completion requests.
pub struct ContextProvider {
    id: String,
    selector: Selector,
    resolver: Arc<dyn ContextResolver>,
}

impl ContextProvider {
    /// Create a provider.
    pub fn new(
        id: impl Into<String>,
        selector: Selector,
        resolver: Arc<dyn ContextResolver>,
    ) -> Self {
        Self {
            id: id.into(),
            selector,
            resolver,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn selector(&self) -> &Selector {
        &self.selector
    }

    pub fn resolver(&self) -> &dyn ContextResolver {
        self.resolver.as_ref()
    }
}

impl std::fmt::Debug for ContextProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextProvider")
            .field("id", &self.id)
            .field("selector", &self.selector)
            .finish_non_exhaustive()
    }
}

/// Memoized result of the most recent completion id.
struct CachedResolution {
    completion_id: String,
    results: Vec<ResolvedProviderResult>,
}

/// Registry of context providers and entry point for resolution.
pub struct ContextProviderRegistry {
    providers: RwLock<Vec<Arc<ContextProvider>>>,
    config: RwLock<ContextProvidersConfig>,
    runtime_mode: RuntimeMode,
    features: Arc<dyn FeatureService>,
    statistics: Arc<ContextProviderStatistics>,
    cache: Mutex<Option<CachedResolution>>,
}

impl ContextProviderRegistry {
    /// Create an empty registry with the given provider configuration.
    pub fn new(config: ContextProvidersConfig) -> Self {
        Self {
            providers: RwLock::new(Vec::new()),
            config: RwLock::new(config),
            runtime_mode: RuntimeMode::default(),
            features: Arc::new(ExperimentFeatures),
            statistics: Arc::new(ContextProviderStatistics::default()),
            cache: Mutex::new(None),
        }
    }

    /// Create a registry from the application configuration and the
    /// process environment.
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self::new(config.context_providers.clone())
            .with_runtime_mode(RuntimeMode::from_env().with_config(&config.runtime))
    }

    pub fn with_runtime_mode(mut self, runtime_mode: RuntimeMode) -> Self {
        self.runtime_mode = runtime_mode;
        self
    }

    pub fn with_features(mut self, features: Arc<dyn FeatureService>) -> Self {
        self.features = features;
        self
    }

    pub fn with_statistics(mut self, statistics: Arc<ContextProviderStatistics>) -> Self {
        self.statistics = statistics;
        self
    }

    /// The statistics store this registry reads and writes.
    pub fn statistics(&self) -> &Arc<ContextProviderStatistics> {
        &self.statistics
    }

    /// Replace the provider configuration used by subsequent resolutions.
    pub fn update_config(&self, config: ContextProvidersConfig) {
        *self.config.write().unwrap_or_else(PoisonError::into_inner) = config;
    }

    /// Register a provider. Ids must be non-empty, comma-free and unique.
    pub fn register_context_provider(
        &self,
        provider: ContextProvider,
    ) -> Result<(), RegistrationError> {
        if provider.id.is_empty() {
            return Err(RegistrationError::EmptyId);
        }
        if provider.id.contains(',') {
            return Err(RegistrationError::InvalidId(provider.id));
        }

        let mut providers = self.providers.write().unwrap_or_else(PoisonError::into_inner);
        if providers.iter().any(|p| p.id == provider.id) {
            return Err(RegistrationError::Duplicate(provider.id));
        }
        info!(provider_id = %provider.id, "Registered context provider");
        providers.push(Arc::new(provider));
        Ok(())
    }

    /// Remove a provider. Unknown ids are ignored.
    pub fn unregister_context_provider(&self, id: &str) {
        let mut providers = self.providers.write().unwrap_or_else(PoisonError::into_inner);
        let before = providers.len();
        providers.retain(|p| p.id != id);
        if providers.len() < before {
            info!(provider_id = %id, "Unregistered context provider");
        }
    }

    /// Registered providers in registration order.
    pub fn providers(&self) -> Vec<Arc<ContextProvider>> {
        self.providers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn cached(&self, completion_id: &str) -> Option<Vec<ResolvedProviderResult>> {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .filter(|cached| cached.completion_id == completion_id)
            .map(|cached| cached.results.clone())
    }

    fn store(&self, completion_id: &str, results: &[ResolvedProviderResult]) {
        *self.cache.lock().unwrap_or_else(PoisonError::into_inner) = Some(CachedResolution {
            completion_id: completion_id.to_string(),
            results: results.to_vec(),
        });
    }

    fn is_enabled(
        &self,
        provider_id: &str,
        config: &ContextProvidersConfig,
        experiment_allow_list: &[String],
    ) -> bool {
        self.runtime_mode.debug
            || config.allows(provider_id)
            || experiment_allow_list
                .iter()
                .any(|id| id == "*" || id == provider_id)
    }

    /// Resolve context from every enabled provider matching `document`.
    ///
    /// Matched providers come first, in registration order, followed by
    /// providers that were not enabled or did not match (`match_score` 0).
    /// Individual provider failures never fail the call; a cancelled
    /// `cancellation` token makes the call return promptly with whatever was
    /// collected so far.
    pub async fn resolve_all_providers(
        &self,
        completion_id: &str,
        opportunity_id: &str,
        document: &DocumentContext,
        experiments: &ExperimentContext,
        cancellation: Option<&CancellationToken>,
        data: Option<Value>,
    ) -> Vec<ResolvedProviderResult> {
        if let Some(cached) = self.cached(completion_id) {
            debug!(completion_id, "Returning cached context provider results");
            return cached;
        }
        if cancellation.is_some_and(CancellationToken::is_cancelled) {
            debug!(completion_id, "Completion already cancelled, skipping context providers");
            return Vec::new();
        }

        let providers = self.providers();
        let config = self
            .config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let experiment_allow_list = self.features.enabled_context_providers(experiments);

        let mut matched = Vec::new();
        let mut unmatched = Vec::new();
        for provider in &providers {
            let score = if self.is_enabled(&provider.id, &config, &experiment_allow_list) {
                provider.selector.match_score(document)
            } else {
                0
            };
            if score > 0 {
                matched.push((provider, score));
            } else {
                unmatched.push(ResolvedProviderResult::unmatched(provider.id.as_str()));
            }
        }

        let time_budget_ms = config
            .time_budget_ms
            .unwrap_or_else(|| self.features.context_provider_time_budget(experiments));
        let timeout_end_ms = if time_budget_ms == 0 {
            NO_DEADLINE
        } else {
            epoch_millis().saturating_add(time_budget_ms)
        };
        debug!(
            completion_id,
            matched = matched.len(),
            time_budget_ms,
            "Resolving context providers"
        );

        let previous = self.statistics.previous_statistics_for(completion_id);
        let current = self.statistics.statistics_for_completion(completion_id);

        let signal = ResolutionSignal::new(time_budget_ms, cancellation);
        let racers = matched.iter().map(|(provider, score)| {
            let request = ResolveRequest {
                completion_id: completion_id.to_string(),
                opportunity_id: opportunity_id.to_string(),
                document_context: document.clone(),
                time_budget_ms,
                timeout_end_ms,
                data: data.clone(),
                previous_usage_statistics: previous.as_ref().and_then(|p| p.get(&provider.id)),
            };
            racer::race(
                &provider.id,
                *score,
                provider.resolver.as_ref(),
                request,
                &signal,
            )
        });

        let mut results = join_all(racers).await;
        results.extend(unmatched);

        for result in &results {
            current.set_last_resolution(&result.provider_id, result.resolution);
        }
        self.store(completion_id, &results);
        results
    }
}

impl Default for ContextProviderRegistry {
    fn default() -> Self {
        Self::new(ContextProvidersConfig::default())
    }
}

fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    use crate::resolver::ResolverOutput;

    struct Empty;

    impl ContextResolver for Empty {
        fn resolve(&self, _request: ResolveRequest, _token: CancellationToken) -> ResolverOutput<'_> {
            ResolverOutput::stream(stream::empty())
        }
    }

    fn provider(id: &str) -> ContextProvider {
        ContextProvider::new(id, Selector::wildcard(), Arc::new(Empty))
    }

    #[test]
    fn test_register_provider() {
        let registry = ContextProviderRegistry::default();
        registry.register_context_provider(provider("traitProvider")).unwrap();

        let providers = registry.providers();
        assert_eq!(providers.len(), 1);
        assert_eq!(providers[0].id(), "traitProvider");
    }

    #[test]
    fn test_rejects_comma_in_id() {
        let registry = ContextProviderRegistry::default();
        assert_eq!(
            registry.register_context_provider(provider("in,validProvider")),
            Err(RegistrationError::InvalidId("in,validProvider".to_string()))
        );
        assert!(registry.providers().is_empty());
    }

    #[test]
    fn test_rejects_empty_id() {
        let registry = ContextProviderRegistry::default();
        assert_eq!(
            registry.register_context_provider(provider("")),
            Err(RegistrationError::EmptyId)
        );
    }

    #[test]
    fn test_rejects_duplicate_id() {
        let registry = ContextProviderRegistry::default();
        registry.register_context_provider(provider("p")).unwrap();
        assert_eq!(
            registry.register_context_provider(provider("p")),
            Err(RegistrationError::Duplicate("p".to_string()))
        );
        assert_eq!(registry.providers().len(), 1);
    }

    #[test]
    fn test_unregister_is_idempotent() {
        let registry = ContextProviderRegistry::default();
        registry.register_context_provider(provider("a")).unwrap();
        registry.register_context_provider(provider("b")).unwrap();

        registry.unregister_context_provider("a");
        registry.unregister_context_provider("a");
        registry.unregister_context_provider("missing");

        let ids: Vec<String> = registry.providers().iter().map(|p| p.id().to_string()).collect();
        assert_eq!(ids, vec!["b".to_string()]);
    }

    #[test]
    fn test_registration_order_is_kept() {
        let registry = ContextProviderRegistry::default();
        for id in ["c", "a", "b"] {
            registry.register_context_provider(provider(id)).unwrap();
        }
        let ids: Vec<String> = registry.providers().iter().map(|p| p.id().to_string()).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_error_display() {
        assert_eq!(
            RegistrationError::Duplicate("p".to_string()).to_string(),
            "context provider already registered: p"
        );
    }
}
