// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Term rewrite instructions.
//!
//! An instruction replaces a matched span of a token sequence with its
//! configured output terms. Two flavours exist:
//!
//! - [`TermsReplaceInstruction`]: fixed output; removed tokens are logged as
//!   [`MatchType::Exact`](crate::sink::MatchType::Exact).
//! - [`WildcardReplaceInstruction`]: output terms may embed the text captured
//!   by a wildcard through the `$1` placeholder; removed tokens are logged as
//!   [`MatchType::Affix`](crate::sink::MatchType::Affix).
//!
//! # Splicing
//!
//! ```text
//! sequence:  [A, B, C]      span [1, 2)      capture "abc"
//! templates: ["pre-$1-post", "literalOnly"]
//!
//! result:    [A, "pre-abc-post", "literalOnly", C]
//! ```
//!
//! Output terms are inserted at the span start in configured order.

use crate::sink::MatchLog;

/// Marker replaced by the wildcard capture. Only its first occurrence counts.
pub const WILDCARD_PLACEHOLDER: &str = "$1";

/// One compiled output term.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TermTemplate {
    /// Emitted as-is; the capture is ignored.
    Literal(String),
    /// Emitted as `prefix + capture + suffix`.
    Templated { prefix: String, suffix: String },
}

impl TermTemplate {
    /// Compile a configured output term.
    ///
    /// A second `$1` is kept verbatim inside the suffix.
    pub fn compile(template: &str) -> Self {
        match template.find(WILDCARD_PLACEHOLDER) {
            Some(pos) => TermTemplate::Templated {
                prefix: template[..pos].to_string(),
                suffix: template[pos + WILDCARD_PLACEHOLDER.len()..].to_string(),
            },
            None => TermTemplate::Literal(template.to_string()),
        }
    }

    pub fn render(&self, capture: &str) -> String {
        match self {
            TermTemplate::Literal(text) => text.clone(),
            TermTemplate::Templated { prefix, suffix } => {
                let mut out = String::with_capacity(prefix.len() + capture.len() + suffix.len());
                out.push_str(prefix);
                out.push_str(capture);
                out.push_str(suffix);
                out
            }
        }
    }

    pub fn is_templated(&self) -> bool {
        matches!(self, TermTemplate::Templated { .. })
    }
}

/// Clamp a span to the sequence bounds.
///
/// `end` is cut to `len` and `start` to `end`, in every build profile. An
/// out-of-range span therefore never panics; it shrinks towards the tail.
fn clamp_span(len: usize, start: usize, end: usize) -> (usize, usize) {
    let end = end.min(len);
    (start.min(end), end)
}

/// Replace a span with templated terms built from a wildcard capture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WildcardReplaceInstruction {
    terms: Vec<TermTemplate>,
}

impl WildcardReplaceInstruction {
    pub fn new<I, S>(templates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            terms: templates
                .into_iter()
                .map(|t| TermTemplate::compile(t.as_ref()))
                .collect(),
        }
    }

    pub fn terms(&self) -> &[TermTemplate] {
        &self.terms
    }

    /// Remove `[start, end)` from `sequence`, logging each removed token as
    /// an affix match, and insert the rendered terms at `start`.
    ///
    /// A span reaching past the sequence is clamped to it first, so
    /// `start > len` appends and `start > end` removes nothing.
    ///
    /// Returns the number of inserted terms.
    pub fn apply(
        &self,
        sequence: &mut Vec<String>,
        start: usize,
        end: usize,
        capture: &str,
        log: &mut Vec<MatchLog>,
    ) -> usize {
        let (start, end) = clamp_span(sequence.len(), start, end);
        let replacement = self.terms.iter().map(|t| t.render(capture));
        let removed: Vec<String> = sequence.splice(start..end, replacement).collect();
        log.extend(removed.into_iter().map(MatchLog::affix));
        self.terms.len()
    }
}

/// Replace a span with fixed terms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TermsReplaceInstruction {
    terms: Vec<String>,
}

impl TermsReplaceInstruction {
    pub fn new<I, S>(terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            terms: terms.into_iter().map(Into::into).collect(),
        }
    }

    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    /// Remove `[start, end)`, logging exact matches, and insert the terms.
    ///
    /// The span is clamped like [`WildcardReplaceInstruction::apply`].
    pub fn apply(
        &self,
        sequence: &mut Vec<String>,
        start: usize,
        end: usize,
        log: &mut Vec<MatchLog>,
    ) -> usize {
        let (start, end) = clamp_span(sequence.len(), start, end);
        let removed: Vec<String> = sequence.splice(start..end, self.terms.iter().cloned()).collect();
        log.extend(removed.into_iter().map(MatchLog::exact));
        self.terms.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MatchType;

    fn seq(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_compile_literal() {
        assert_eq!(
            TermTemplate::compile("plain"),
            TermTemplate::Literal("plain".to_string())
        );
    }

    #[test]
    fn test_compile_splits_on_first_marker_only() {
        let template = TermTemplate::compile("a$1b$1c");
        assert_eq!(
            template,
            TermTemplate::Templated {
                prefix: "a".to_string(),
                suffix: "b$1c".to_string()
            }
        );
        assert_eq!(template.render("X"), "aXb$1c");
    }

    #[test]
    fn test_empty_capture_concatenates() {
        assert_eq!(TermTemplate::compile("x$1y").render(""), "xy");
        assert_eq!(TermTemplate::compile("$1").render(""), "");
    }

    #[test]
    fn test_splice_example() {
        let instruction = WildcardReplaceInstruction::new(["pre-$1-post", "literalOnly"]);
        let mut sequence = seq(&["A", "B", "C"]);
        let mut log = Vec::new();

        let inserted = instruction.apply(&mut sequence, 1, 2, "abc", &mut log);

        assert_eq!(inserted, 2);
        assert_eq!(sequence, seq(&["A", "pre-abc-post", "literalOnly", "C"]));
        assert_eq!(log, vec![MatchLog::affix("B")]);
    }

    #[test]
    fn test_zero_templates_is_pure_removal() {
        let instruction = WildcardReplaceInstruction::new(Vec::<String>::new());
        let mut sequence = seq(&["A", "B", "C", "D"]);
        let mut log = Vec::new();

        assert_eq!(instruction.apply(&mut sequence, 1, 3, "x", &mut log), 0);
        assert_eq!(sequence, seq(&["A", "D"]));
        assert_eq!(log.len(), 2);
        assert!(log.iter().all(|m| m.match_type == MatchType::Affix));
    }

    #[test]
    fn test_insert_at_end_of_sequence() {
        let instruction = WildcardReplaceInstruction::new(["$1s", "$1"]);
        let mut sequence = seq(&["cheap", "phone"]);
        let mut log = Vec::new();

        instruction.apply(&mut sequence, 1, 2, "phone", &mut log);
        assert_eq!(sequence, seq(&["cheap", "phones", "phone"]));
    }

    #[test]
    fn test_out_of_range_span_is_clamped() {
        let instruction = WildcardReplaceInstruction::new(["$1!"]);

        let mut sequence = seq(&["A", "B", "C"]);
        let mut log = Vec::new();
        assert_eq!(instruction.apply(&mut sequence, 1, 10, "x", &mut log), 1);
        assert_eq!(sequence, seq(&["A", "x!"]));
        assert_eq!(log, vec![MatchLog::affix("B"), MatchLog::affix("C")]);

        let mut sequence = seq(&["A", "B"]);
        let mut log = Vec::new();
        instruction.apply(&mut sequence, 7, 9, "y", &mut log);
        assert_eq!(sequence, seq(&["A", "B", "y!"]));
        assert!(log.is_empty());

        let mut sequence = seq(&["A", "B", "C"]);
        let mut log = Vec::new();
        instruction.apply(&mut sequence, 2, 1, "z", &mut log);
        assert_eq!(sequence, seq(&["A", "z!", "B", "C"]));
        assert!(log.is_empty());

        let terms = TermsReplaceInstruction::new(["t"]);
        let mut sequence = seq(&["A"]);
        let mut log = Vec::new();
        terms.apply(&mut sequence, 0, 5, &mut log);
        assert_eq!(sequence, seq(&["t"]));
        assert_eq!(log, vec![MatchLog::exact("A")]);
    }

    #[test]
    fn test_terms_instruction_logs_exact() {
        let instruction = TermsReplaceInstruction::new(["notebook", "computer"]);
        let mut sequence = seq(&["cheap", "laptop"]);
        let mut log = Vec::new();

        assert_eq!(instruction.apply(&mut sequence, 1, 2, &mut log), 2);
        assert_eq!(sequence, seq(&["cheap", "notebook", "computer"]));
        assert_eq!(log, vec![MatchLog::exact("laptop")]);
    }

    #[test]
    fn test_apply_is_deterministic() {
        let instruction = WildcardReplaceInstruction::new(["$1-a", "b", "c-$1"]);
        let mut first = seq(&["x", "y"]);
        let mut second = first.clone();
        instruction.apply(&mut first, 0, 1, "cap", &mut Vec::new());
        instruction.apply(&mut second, 0, 1, "cap", &mut Vec::new());
        assert_eq!(first, second);
    }
}
