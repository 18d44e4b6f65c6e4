//! Resolution racer: runs one provider's resolver against the clock.
//!
//! Every resolution in a `resolve_all_providers` call shares one
//! [`ResolutionSignal`], which composes the caller's cancellation token with
//! the time-budget deadline. [`race`] consumes the resolver's item stream
//! until it ends, fails, or the signal fires, and never waits for a
//! resolver to acknowledge cancellation: the resolver's future is dropped as
//! soon as the outcome is known.
//!
//! ```text
//!   Idle ──resolve()──▶ Running ──stream ends──────────────▶ full
//!                          │ ──cancellation error──────────▶ none / partial
//!                          │ ──other error─────────────────▶ error   (logged)
//!                          │ ──deadline (+ fallback)───────▶ none / partial
//!                          └ ──caller cancelled────────────▶ none / partial
//! ```

use std::time::Duration;

use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::item::{self, ContextItem, RawItem};
use crate::resolver::{ContextResolver, ResolveError, ResolveRequest};

/// Outcome category of running one provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resolution {
    /// The resolver finished within the budget.
    Full,
    /// The resolver was interrupted but some items were collected.
    Partial,
    /// Nothing was collected, or the provider did not apply.
    None,
    /// The resolver failed.
    Error,
}

impl Resolution {
    fn interrupted_with(items: &[RawItem]) -> Self {
        if items.is_empty() {
            Resolution::None
        } else {
            Resolution::Partial
        }
    }
}

/// Result of one provider for one completion request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedProviderResult {
    pub provider_id: String,
    /// Selector specificity; `0` means the provider did not apply.
    pub match_score: u32,
    pub resolution: Resolution,
    pub resolution_time_ms: u64,
    pub data: Vec<ContextItem>,
}

impl ResolvedProviderResult {
    /// Result of a provider that was not raced (not enabled or not matching).
    pub fn unmatched(provider_id: impl Into<String>) -> Self {
        Self {
            provider_id: provider_id.into(),
            match_score: 0,
            resolution: Resolution::None,
            resolution_time_ms: 0,
            data: Vec::new(),
        }
    }
}

/// What stopped a resolution before its resolver finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interruption {
    /// The time budget ran out.
    Deadline,
    /// The caller cancelled the request.
    Cancelled,
}

/// The caller's cancellation token and the time-budget deadline, composed
/// into one signal shared by every racer of a call.
#[derive(Debug, Clone)]
pub struct ResolutionSignal {
    token: CancellationToken,
    external: Option<CancellationToken>,
    deadline: Option<Instant>,
    budget_ms: u64,
}

impl ResolutionSignal {
    /// Start the clock. A budget of `0` means no deadline.
    pub fn new(budget_ms: u64, external: Option<&CancellationToken>) -> Self {
        let token = external.map_or_else(CancellationToken::new, CancellationToken::child_token);
        let deadline = (budget_ms > 0).then(|| Instant::now() + Duration::from_millis(budget_ms));
        Self {
            token,
            external: external.cloned(),
            deadline,
            budget_ms,
        }
    }

    /// The composed token; cancelled by either authority.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn budget_ms(&self) -> u64 {
        self.budget_ms
    }

    /// Wait until the deadline passes or the caller cancels.
    ///
    /// Whichever racer observes the deadline first cancels the composed
    /// token, so every resolver's token reports cancellation.
    pub async fn interrupted(&self) -> Interruption {
        let why = match self.deadline {
            Some(deadline) => tokio::select! {
                () = self.token.cancelled() => self.classify(),
                () = tokio::time::sleep_until(deadline) => Interruption::Deadline,
            },
            None => {
                self.token.cancelled().await;
                self.classify()
            }
        };
        self.token.cancel();
        why
    }

    fn classify(&self) -> Interruption {
        if self
            .external
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
        {
            Interruption::Cancelled
        } else {
            Interruption::Deadline
        }
    }
}

enum End {
    Finished,
    Failed(ResolveError),
    Interrupted(Interruption),
}

/// Run one matched provider's resolver under the shared signal.
pub async fn race(
    provider_id: &str,
    match_score: u32,
    resolver: &dyn ContextResolver,
    request: ResolveRequest,
    signal: &ResolutionSignal,
) -> ResolvedProviderResult {
    let start = Instant::now();
    let token = signal.token().child_token();
    let mut stream = resolver.resolve(request.clone(), token.clone()).into_stream();
    let mut items: Vec<RawItem> = Vec::new();

    let interrupted = signal.interrupted();
    tokio::pin!(interrupted);

    let end = loop {
        tokio::select! {
            next = stream.next() => match next {
                Some(Ok(item)) => items.push(item),
                Some(Err(e)) => break End::Failed(e),
                None => break End::Finished,
            },
            why = &mut interrupted => break End::Interrupted(why),
        }
    };
    drop(stream);

    let resolution = match end {
        End::Finished => Resolution::Full,
        End::Failed(e) if e.is_cancellation() => {
            debug!(provider_id = %provider_id, "Context provider cancelled its resolution");
            Resolution::interrupted_with(&items)
        }
        End::Failed(e) => {
            error!(provider_id = %provider_id, error = %e, "Error resolving context from provider {provider_id}");
            items.clear();
            Resolution::Error
        }
        End::Interrupted(Interruption::Deadline) => {
            token.cancel();
            info!(
                provider_id = %provider_id,
                budget_ms = signal.budget_ms(),
                "Context provider {provider_id} exceeded time budget of {}ms",
                signal.budget_ms()
            );
            if let Some(fallback) = resolver.resolve_on_timeout(&request) {
                items.extend(fallback);
            }
            Resolution::interrupted_with(&items)
        }
        End::Interrupted(Interruption::Cancelled) => {
            token.cancel();
            debug!(provider_id = %provider_id, "Resolution cancelled by caller");
            Resolution::interrupted_with(&items)
        }
    };

    ResolvedProviderResult {
        provider_id: provider_id.to_string(),
        match_score,
        resolution,
        resolution_time_ms: u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
        data: item::normalize_all(items),
    }
}
