//! Fuzz target for replace rule compilation and rewriting.
//!
//! Arbitrary JSON must either compile or be rejected with reasons, and a
//! compiled rewriter must never panic on arbitrary tokens.

#![no_main]

use libfuzzer_sys::fuzz_target;
use rewriter_registry::rewrite::{ReplaceRewriterFactory, Rewriter, RewriterFactory};

fuzz_target!(|data: (&str, Vec<String>)| {
    let (config, mut tokens) = data;

    let Ok(config) = serde_json::from_str::<serde_json::Value>(config) else {
        return;
    };

    match ReplaceRewriterFactory.compile("fuzz", &config) {
        Ok(rewriter) => {
            let mut log = Vec::new();
            rewriter.rewrite(&mut tokens, &mut log);
        }
        Err(reasons) => assert!(!reasons.is_empty()),
    }
});
