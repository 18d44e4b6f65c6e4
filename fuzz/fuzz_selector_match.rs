//! Fuzz target for selector scoring.
//!
//! Run with: cargo +nightly fuzz run fuzz_selector_match
//!
//! Splits the input into a glob pattern, a language id and a document URI,
//! then scores every selector shape against the document.

#![no_main]

use ctxhub_core::selector::{ANY_LANGUAGE_SCORE, DocumentFilter, EXACT_SCORE, WILDCARD_SCORE};
use ctxhub_core::{DocumentContext, Selector, SelectorRule};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(s) = std::str::from_utf8(data) else {
        return;
    };
    let mut parts = s.splitn(3, '\n');
    let pattern = parts.next().unwrap_or_default();
    let language = parts.next().unwrap_or_default();
    let uri = parts.next().unwrap_or_default();

    let document = DocumentContext::new(uri, language);
    let selector = Selector::new(vec![
        SelectorRule::Language(language.to_string()),
        SelectorRule::Filter(DocumentFilter::pattern(pattern)),
        SelectorRule::Filter(DocumentFilter::language("*").with_pattern(pattern)),
    ]);

    let score = selector.match_score(&document);
    assert!([0, WILDCARD_SCORE, ANY_LANGUAGE_SCORE, EXACT_SCORE].contains(&score));
    assert_eq!(Selector::wildcard().match_score(&document), WILDCARD_SCORE);
});
