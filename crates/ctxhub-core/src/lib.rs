#![deny(unsafe_code)]

//! Context provider resolution engine.
//!
//! Coordinates pluggable context providers that feed a code-completion
//! pipeline. The [`ContextProviderRegistry`] matches providers against the
//! current document, races every matching resolver under one shared time
//! budget and cancellation signal, normalizes what they return, and memoizes
//! the result per completion id.

use std::future::Future;
use std::pin::Pin;

use futures::Stream;

/// Boxed `Send` future returned through `dyn ContextResolver`.
///
/// Resolvers live behind `Arc<dyn ContextResolver>`, so their answers cannot
/// be opaque `async fn` types.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Boxed stream counterpart of [`BoxFuture`], used by streaming resolvers.
pub type BoxStream<'a, T> = Pin<Box<dyn Stream<Item = T> + Send + 'a>>;

/// Document the completion is requested for.
pub mod document;
/// Experiment-driven feature values (allow-list, time budget).
pub mod features;
/// Context item shape and normalization of raw provider output.
pub mod item;
/// Single-provider resolution under a deadline and cancellation.
pub mod racer;
/// Top-level provider registry and result cache.
pub mod registry;
/// Resolver capability implemented by context providers.
pub mod resolver;
/// Debug runtime mode detection.
pub mod runtime_mode;
/// Selector rules and document match scoring.
pub mod selector;
/// Per-completion usage and resolution statistics.
pub mod statistics;

pub use document::{DocumentContext, Position};
pub use features::{ExperimentContext, ExperimentFeatures, FeatureService};
pub use item::{ContextItem, ItemBody, RawItem};
pub use racer::{Resolution, ResolvedProviderResult};
pub use registry::{ContextProvider, ContextProviderRegistry, RegistrationError};
pub use resolver::{ContextResolver, ResolveError, ResolveRequest, ResolverOutput};
pub use runtime_mode::RuntimeMode;
pub use selector::{DocumentFilter, Selector, SelectorRule};
pub use statistics::{ContextProviderStatistics, Usage, UsageStatistics};
