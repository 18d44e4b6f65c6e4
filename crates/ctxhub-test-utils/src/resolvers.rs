//! Scripted resolvers for registry and racer tests.
//!
//! [`TestResolver`] answers with a fixed script and records how it was
//! called (request, cancellation token, fallback invocations) so tests can
//! assert on both sides of the contract.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use ctxhub_core::item::RawItem;
use ctxhub_core::resolver::{ContextResolver, ResolveError, ResolveRequest, ResolverOutput};
use futures::{StreamExt, stream};
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

/// A `Trait` item as a provider would produce it.
pub fn trait_item(name: &str, value: &str, id: &str) -> RawItem {
    json!({ "name": name, "value": value, "id": id })
}

enum Script {
    /// One future, answering after a delay.
    Answer {
        delay_ms: u64,
        answer: Result<RawItem, ResolveError>,
    },
    /// A stream yielding each step after its delay.
    Steps(Vec<(u64, Result<RawItem, ResolveError>)>),
    /// A future that only completes, with a cancellation error, once its
    /// token is cancelled.
    UntilCancelled,
}

/// A resolver following a fixed script.
pub struct TestResolver {
    script: Script,
    fallback: Option<Vec<RawItem>>,
    calls: AtomicUsize,
    fallback_calls: AtomicUsize,
    last_request: Mutex<Option<ResolveRequest>>,
    last_token: Mutex<Option<CancellationToken>>,
}

impl TestResolver {
    fn with_script(script: Script) -> Self {
        Self {
            script,
            fallback: None,
            calls: AtomicUsize::new(0),
            fallback_calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
            last_token: Mutex::new(None),
        }
    }

    /// Answer immediately with `answer` (an item or an array of items).
    pub fn returning(answer: Value) -> Self {
        Self::returning_after(0, answer)
    }

    /// Answer with `answer` after `delay_ms`.
    pub fn returning_after(delay_ms: u64, answer: Value) -> Self {
        Self::with_script(Script::Answer {
            delay_ms,
            answer: Ok(answer),
        })
    }

    /// Fail immediately with `error`.
    pub fn failing(error: ResolveError) -> Self {
        Self::with_script(Script::Answer {
            delay_ms: 0,
            answer: Err(error),
        })
    }

    /// Yield `(delay_ms, item)` steps one by one.
    pub fn streaming(steps: Vec<(u64, Result<RawItem, ResolveError>)>) -> Self {
        Self::with_script(Script::Steps(steps))
    }

    /// Stay pending until cancelled, then fail with [`ResolveError::Cancelled`].
    pub fn until_cancelled() -> Self {
        Self::with_script(Script::UntilCancelled)
    }

    /// Items returned by [`ContextResolver::resolve_on_timeout`].
    pub fn with_fallback(mut self, items: Vec<RawItem>) -> Self {
        self.fallback = Some(items);
        self
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Number of `resolve` calls.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Number of `resolve_on_timeout` calls.
    pub fn fallback_calls(&self) -> usize {
        self.fallback_calls.load(Ordering::SeqCst)
    }

    /// The request of the most recent `resolve` call.
    pub fn last_request(&self) -> Option<ResolveRequest> {
        self.last_request
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The token handed to the most recent `resolve` call.
    pub fn last_token(&self) -> Option<CancellationToken> {
        self.last_token
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl ContextResolver for TestResolver {
    fn resolve(&self, request: ResolveRequest, token: CancellationToken) -> ResolverOutput<'_> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self
            .last_request
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(request);
        *self.last_token.lock().unwrap_or_else(PoisonError::into_inner) = Some(token.clone());

        match &self.script {
            Script::Answer { delay_ms, answer } => {
                let (delay_ms, answer) = (*delay_ms, answer.clone());
                ResolverOutput::items(async move {
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                    answer
                })
            }
            Script::Steps(steps) => {
                ResolverOutput::stream(stream::iter(steps.clone()).then(|(delay_ms, item)| async move {
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                    item
                }))
            }
            Script::UntilCancelled => ResolverOutput::items(async move {
                token.cancelled().await;
                Err(ResolveError::Cancelled)
            }),
        }
    }

    fn resolve_on_timeout(&self, _request: &ResolveRequest) -> Option<Vec<RawItem>> {
        self.fallback_calls.fetch_add(1, Ordering::SeqCst);
        self.fallback.clone()
    }
}
