//! Fuzz target for output term templates and wildcard splicing.
//!
//! Templates render as prefix + capture + suffix, and applying an
//! instruction to any span never panics and inserts every term in order.

#![no_main]

use libfuzzer_sys::fuzz_target;
use rewriter_registry::rewrite::{TermTemplate, WildcardReplaceInstruction};

fuzz_target!(|data: (Vec<&str>, Vec<String>, &str, u8, u8)| {
    let (templates, mut sequence, capture, start, len) = data;

    for template in &templates {
        let compiled = TermTemplate::compile(template);
        let rendered = compiled.render(capture);
        if compiled.is_templated() {
            assert!(rendered.contains(capture));
            assert_eq!(rendered.len(), template.len() - 2 + capture.len());
        } else {
            assert_eq!(&rendered, template);
        }
    }

    if sequence.is_empty() {
        return;
    }
    let start = start as usize % sequence.len();
    let end = (start + len as usize).min(sequence.len());
    let original_len = sequence.len();

    let instruction = WildcardReplaceInstruction::new(&templates);
    let mut log = Vec::new();
    let inserted = instruction.apply(&mut sequence, start, end, capture, &mut log);

    assert_eq!(inserted, templates.len());
    assert_eq!(log.len(), end - start);
    assert_eq!(sequence.len(), original_len - (end - start) + inserted);
});
