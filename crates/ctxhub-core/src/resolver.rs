//! The resolver capability every context provider implements.
//!
//! A resolver either returns one future (yielding a single item or a JSON
//! array of items) or a stream of items. The racer converts both shapes into
//! one stream up front so the rest of the pipeline has a single code path.

use futures::{StreamExt, stream};
use serde::Serialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::document::DocumentContext;
use crate::item::RawItem;
use crate::statistics::UsageStatistics;
use crate::{BoxFuture, BoxStream};

/// `timeout_end_ms` value used when the time budget is infinite.
pub const NO_DEADLINE: u64 = 9_007_199_254_740_991;

/// Errors a resolver may fail with.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    /// The resolver observed its cancellation token and stopped.
    #[error("resolution cancelled")]
    Cancelled,

    #[error("resolution failed: {0}")]
    Failed(String),
}

impl ResolveError {
    /// Whether this is the expected outcome of cancellation rather than a failure.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, ResolveError::Cancelled)
    }
}

/// Request passed to a resolver.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveRequest {
    /// Cache/statistics key of the logical completion request.
    pub completion_id: String,
    /// Caller's operation id for this completion opportunity.
    pub opportunity_id: String,
    pub document_context: DocumentContext,
    /// Time budget in milliseconds (0 = no deadline).
    pub time_budget_ms: u64,
    /// Deadline as milliseconds since the Unix epoch, or [`NO_DEADLINE`].
    pub timeout_end_ms: u64,
    /// Caller-supplied extra data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// What happened to this provider's items in the previous completion.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_usage_statistics: Option<UsageStatistics>,
}

/// The two shapes a resolver may answer in.
pub enum ResolverOutput<'a> {
    /// A single future yielding one item, or a JSON array of items.
    Items(BoxFuture<'a, Result<RawItem, ResolveError>>),
    /// Items yielded one by one.
    Stream(BoxStream<'a, Result<RawItem, ResolveError>>),
}

impl<'a> ResolverOutput<'a> {
    /// Wrap a future.
    pub fn items<F>(future: F) -> Self
    where
        F: Future<Output = Result<RawItem, ResolveError>> + Send + 'a,
    {
        ResolverOutput::Items(Box::pin(future))
    }

    /// Wrap a stream.
    pub fn stream<S>(stream: S) -> Self
    where
        S: futures::Stream<Item = Result<RawItem, ResolveError>> + Send + 'a,
    {
        ResolverOutput::Stream(Box::pin(stream))
    }

    /// Collapse both shapes into one item stream.
    ///
    /// An array answered by a future contributes each element; any other
    /// value contributes itself.
    pub fn into_stream(self) -> BoxStream<'a, Result<RawItem, ResolveError>> {
        match self {
            ResolverOutput::Stream(s) => s,
            ResolverOutput::Items(future) => Box::pin(
                stream::once(future)
                    .map(|answer| {
                        let items: Vec<Result<RawItem, ResolveError>> = match answer {
                            Ok(Value::Array(items)) => items.into_iter().map(Ok).collect(),
                            Ok(item) => vec![Ok(item)],
                            Err(e) => vec![Err(e)],
                        };
                        stream::iter(items)
                    })
                    .flatten(),
            ),
        }
    }
}

/// Capability implemented by every context provider.
///
/// Implementations must be `Send + Sync`; the registry shares them across
/// concurrent resolutions behind an `Arc`.
pub trait ContextResolver: Send + Sync {
    /// Start resolving context for `request`.
    ///
    /// `token` is cancelled when the time budget runs out or the caller
    /// cancels; resolvers should observe it and stop producing items.
    fn resolve(&self, request: ResolveRequest, token: CancellationToken) -> ResolverOutput<'_>;

    /// Fallback items used when the time budget runs out.
    ///
    /// Only called when the deadline interrupts the resolution.
    fn resolve_on_timeout(&self, _request: &ResolveRequest) -> Option<Vec<RawItem>> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn drain(output: ResolverOutput<'_>) -> Vec<Result<RawItem, ResolveError>> {
        output.into_stream().collect().await
    }

    #[tokio::test]
    async fn test_array_answer_is_flattened() {
        let output = ResolverOutput::items(async { Ok(json!([{"a": 1}, {"b": 2}])) });
        assert_eq!(drain(output).await, vec![Ok(json!({"a": 1})), Ok(json!({"b": 2}))]);
    }

    #[tokio::test]
    async fn test_single_answer_is_one_item() {
        let output = ResolverOutput::items(async { Ok(json!({"name": "n", "value": "v"})) });
        assert_eq!(drain(output).await.len(), 1);
    }

    #[tokio::test]
    async fn test_error_answer_passes_through() {
        let output = ResolverOutput::items(async { Err(ResolveError::Failed("boom".to_string())) });
        assert_eq!(
            drain(output).await,
            vec![Err(ResolveError::Failed("boom".to_string()))]
        );
    }

    #[tokio::test]
    async fn test_stream_is_unchanged() {
        let output = ResolverOutput::stream(stream::iter(vec![Ok(json!(1)), Ok(json!(2))]));
        assert_eq!(drain(output).await, vec![Ok(json!(1)), Ok(json!(2))]);
    }

    #[test]
    fn test_cancellation_flavour() {
        assert!(ResolveError::Cancelled.is_cancellation());
        assert!(!ResolveError::Failed("x".to_string()).is_cancellation());
    }
}
