//! Per-completion context provider statistics.
//!
//! Every completion id gets a [`CompletionStatistics`] record holding, per
//! provider, how its items were used and how its last resolution ended. The
//! registry reads the record of the *previous* completion to tell providers
//! how their context fared, and writes the resolution outcome of the current
//! one.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};

use crate::racer::Resolution;

/// Number of completions whose statistics are retained.
pub const DEFAULT_CAPACITY: usize = 25;

/// How much of a provider's context made it into the prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Usage {
    Full,
    Partial,
    None,
    /// Items were resolved but their content was not used.
    NoneContent,
    Error,
}

/// Usage and resolution of one provider in one completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageStatistics {
    pub usage: Usage,
    pub resolution: Resolution,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Statistics of one completion.
#[derive(Debug, Default)]
pub struct CompletionStatistics {
    statistics: Mutex<HashMap<String, UsageStatistics>>,
    last_resolution: Mutex<HashMap<String, Resolution>>,
}

impl CompletionStatistics {
    /// Store the usage statistics of a provider.
    pub fn set(&self, provider_id: &str, statistics: UsageStatistics) {
        lock(&self.statistics).insert(provider_id.to_string(), statistics);
    }

    /// Usage statistics of a provider, if recorded.
    pub fn get(&self, provider_id: &str) -> Option<UsageStatistics> {
        lock(&self.statistics).get(provider_id).copied()
    }

    /// Record how a provider's items were used, keeping its last resolution.
    pub fn set_usage(&self, provider_id: &str, usage: Usage) {
        let resolution = self.last_resolution(provider_id).unwrap_or(Resolution::None);
        self.set(provider_id, UsageStatistics { usage, resolution });
    }

    /// Record the outcome of a provider's resolution.
    pub fn set_last_resolution(&self, provider_id: &str, resolution: Resolution) {
        lock(&self.last_resolution).insert(provider_id.to_string(), resolution);
    }

    /// Last recorded resolution of a provider.
    pub fn last_resolution(&self, provider_id: &str) -> Option<Resolution> {
        lock(&self.last_resolution).get(provider_id).copied()
    }
}

#[derive(Debug, Default)]
struct StatisticsStore {
    /// Completion ids, oldest first.
    order: VecDeque<String>,
    by_completion: HashMap<String, Arc<CompletionStatistics>>,
}

/// Bounded store of per-completion statistics.
#[derive(Debug)]
pub struct ContextProviderStatistics {
    store: Mutex<StatisticsStore>,
    capacity: usize,
}

impl ContextProviderStatistics {
    /// Create a store retaining the given number of completions.
    pub fn new(capacity: usize) -> Self {
        Self {
            store: Mutex::new(StatisticsStore::default()),
            capacity: capacity.max(1),
        }
    }

    /// Statistics for a completion, created on first access.
    pub fn statistics_for_completion(&self, completion_id: &str) -> Arc<CompletionStatistics> {
        let mut store = lock(&self.store);
        if let Some(existing) = store.by_completion.get(completion_id) {
            return Arc::clone(existing);
        }

        if store.order.len() >= self.capacity {
            if let Some(evicted) = store.order.pop_front() {
                store.by_completion.remove(&evicted);
            }
        }
        let created = Arc::new(CompletionStatistics::default());
        store.order.push_back(completion_id.to_string());
        store
            .by_completion
            .insert(completion_id.to_string(), Arc::clone(&created));
        created
    }

    /// Statistics of the completion seen just before `completion_id`.
    ///
    /// For a completion id that has not been seen yet, that is the most
    /// recent completion.
    pub fn previous_statistics_for(
        &self,
        completion_id: &str,
    ) -> Option<Arc<CompletionStatistics>> {
        let store = lock(&self.store);
        let previous_id = match store.order.iter().position(|id| id == completion_id) {
            Some(0) => return None,
            Some(ix) => store.order.get(ix - 1)?,
            None => store.order.back()?,
        };
        store.by_completion.get(previous_id).cloned()
    }
}

impl Default for ContextProviderStatistics {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
