#![deny(unsafe_code)]

//! Shared test utilities for the ctxhub workspace.
//!
//! Scripted resolvers, config builders and log capture, so that individual
//! crate tests stay concise.
//!
//! Add this crate as a `[dev-dependency]` in any workspace member:
//!
//! ```toml
//! [dev-dependencies]
//! ctxhub-test-utils = { workspace = true }
//! ```

pub mod config;
pub mod log_capture;
pub mod resolvers;
