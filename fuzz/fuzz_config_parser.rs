//! Fuzz target for the TOML configuration parser.
//!
//! Run with: cargo +nightly fuzz run fuzz_config_parser
//!
//! Feeds arbitrary text through `AppConfig::parse()`, covering both TOML
//! decoding and provider allow-list validation.

#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(config) = ctxhub_config::AppConfig::parse(s) {
            // Anything that parses must also pass validation on its own.
            assert!(config.validate().is_ok());
            assert!(config.context_providers.enabled.iter().all(|id| !id.contains(',')));
        }
    }
});
