// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! The built-in `replace` rewriter.
//!
//! # Config
//!
//! ```json
//! {
//!   "ignore_case": true,
//!   "rules": [
//!     { "input": "laptop",   "output": ["notebook"] },
//!     { "input": "cheap *",  "output": ["budget", "$1"] },
//!     { "input": "*phones",  "output": ["$1phone"] }
//!   ]
//! }
//! ```
//!
//! `input` is one or more whitespace-separated terms. The last term may end
//! in `*` (prefix match, capture is the rest of the token); a single-term
//! input may instead start with `*` (suffix match, capture is the leading
//! part). Captures are taken from the case-folded token when `ignore_case`
//! is on.

use super::instruction::{TermsReplaceInstruction, WildcardReplaceInstruction, WILDCARD_PLACEHOLDER};
use super::{Rewriter, RewriterFactory};
use crate::sink::MatchLog;
use serde::Deserialize;
use std::borrow::Cow;
use std::collections::HashSet;
use std::sync::Arc;

const WILDCARD: char = '*';

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ReplaceConfig {
    #[serde(default = "default_ignore_case")]
    ignore_case: bool,
    #[serde(default)]
    rules: Vec<RuleConfig>,
}

fn default_ignore_case() -> bool {
    true
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RuleConfig {
    input: String,
    #[serde(default)]
    output: Vec<String>,
}

#[derive(Debug, Clone)]
enum Pattern {
    /// All terms match whole tokens.
    Exact(Vec<String>),
    /// Leading whole terms, then a token starting with `prefix`.
    Prefix { head: Vec<String>, prefix: String },
    /// One token ending with `suffix`.
    Suffix(String),
}

#[derive(Debug, Clone)]
enum Action {
    Terms(TermsReplaceInstruction),
    Wildcard(WildcardReplaceInstruction),
}

#[derive(Debug, Clone)]
struct Rule {
    pattern: Pattern,
    action: Action,
}

/// Span matched at one position, with the wildcard capture if any.
struct Match<'a> {
    len: usize,
    capture: Option<Cow<'a, str>>,
}

fn fold(token: &str, ignore_case: bool) -> Cow<'_, str> {
    if ignore_case && token.chars().any(char::is_uppercase) {
        Cow::Owned(token.to_lowercase())
    } else {
        Cow::Borrowed(token)
    }
}

impl Pattern {
    fn parse(input: &str) -> std::result::Result<Self, String> {
        let terms: Vec<&str> = input.split_whitespace().collect();
        let Some((last, head)) = terms.split_last() else {
            return Err("input must not be empty".to_string());
        };

        if let Some(bad) = head.iter().find(|t| t.contains(WILDCARD)) {
            return Err(format!(
                "input '{}': wildcard only allowed in the last term (found in '{}')",
                input, bad
            ));
        }

        let stars = last.matches(WILDCARD).count();
        if stars == 0 {
            return Ok(Pattern::Exact(terms.iter().map(|t| t.to_string()).collect()));
        }
        if *last == "*" {
            return Err(format!("input '{}': a wildcard needs a literal part", input));
        }
        if stars == 1 && last.ends_with(WILDCARD) {
            return Ok(Pattern::Prefix {
                head: head.iter().map(|t| t.to_string()).collect(),
                prefix: last[..last.len() - 1].to_string(),
            });
        }
        if stars == 1 && last.starts_with(WILDCARD) && head.is_empty() {
            return Ok(Pattern::Suffix(last[1..].to_string()));
        }
        Err(format!("input '{}': invalid wildcard placement", input))
    }

    fn lowercase(self) -> Self {
        let lower = |terms: Vec<String>| -> Vec<String> {
            terms.into_iter().map(|t| t.to_lowercase()).collect()
        };
        match self {
            Pattern::Exact(terms) => Pattern::Exact(lower(terms)),
            Pattern::Prefix { head, prefix } => Pattern::Prefix {
                head: lower(head),
                prefix: prefix.to_lowercase(),
            },
            Pattern::Suffix(suffix) => Pattern::Suffix(suffix.to_lowercase()),
        }
    }

    fn is_wildcard(&self) -> bool {
        !matches!(self, Pattern::Exact(_))
    }

    /// Canonical form used to detect duplicate inputs.
    fn key(&self) -> String {
        match self {
            Pattern::Exact(terms) => terms.join(" "),
            Pattern::Prefix { head, prefix } => {
                let mut key = head.join(" ");
                if !key.is_empty() {
                    key.push(' ');
                }
                key.push_str(prefix);
                key.push(WILDCARD);
                key
            }
            Pattern::Suffix(suffix) => format!("{}{}", WILDCARD, suffix),
        }
    }

    fn match_at<'a>(&self, tokens: &'a [String], pos: usize, ignore_case: bool) -> Option<Match<'a>> {
        let rest = tokens.get(pos..)?;
        let whole = |terms: &[String]| {
            terms.len() <= rest.len()
                && terms
                    .iter()
                    .zip(rest)
                    .all(|(term, token)| fold(token, ignore_case) == term.as_str())
        };

        match self {
            Pattern::Exact(terms) => whole(terms).then_some(Match {
                len: terms.len(),
                capture: None,
            }),
            Pattern::Prefix { head, prefix } => {
                if !whole(head) {
                    return None;
                }
                let token = rest.get(head.len())?;
                let capture = match fold(token, ignore_case) {
                    Cow::Borrowed(t) => Cow::Borrowed(t.strip_prefix(prefix.as_str())?),
                    Cow::Owned(t) => Cow::Owned(t.strip_prefix(prefix.as_str())?.to_string()),
                };
                Some(Match {
                    len: head.len() + 1,
                    capture: Some(capture),
                })
            }
            Pattern::Suffix(suffix) => {
                let token = rest.first()?;
                let capture = match fold(token, ignore_case) {
                    Cow::Borrowed(t) => Cow::Borrowed(t.strip_suffix(suffix.as_str())?),
                    Cow::Owned(t) => Cow::Owned(t.strip_suffix(suffix.as_str())?.to_string()),
                };
                Some(Match {
                    len: 1,
                    capture: Some(capture),
                })
            }
        }
    }
}

/// Compiled `replace` rewriter.
#[derive(Debug, Clone)]
pub struct ReplaceRewriter {
    ignore_case: bool,
    rules: Vec<Rule>,
}

impl ReplaceRewriter {
    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    pub fn ignore_case(&self) -> bool {
        self.ignore_case
    }

    fn compile(config: ReplaceConfig) -> std::result::Result<Self, Vec<String>> {
        let mut reasons = Vec::new();
        let mut seen = HashSet::new();
        let mut rules = Vec::with_capacity(config.rules.len());

        for (index, rule) in config.rules.into_iter().enumerate() {
            let pattern = match Pattern::parse(&rule.input) {
                Ok(p) if config.ignore_case => p.lowercase(),
                Ok(p) => p,
                Err(reason) => {
                    reasons.push(format!("rule {}: {}", index, reason));
                    continue;
                }
            };

            if !seen.insert(pattern.key()) {
                reasons.push(format!("rule {}: duplicate input '{}'", index, rule.input.trim()));
                continue;
            }

            if let Some(empty) = rule.output.iter().position(|t| t.trim().is_empty()) {
                reasons.push(format!("rule {}: output term {} is empty", index, empty));
                continue;
            }

            let action = if pattern.is_wildcard() {
                Action::Wildcard(WildcardReplaceInstruction::new(&rule.output))
            } else {
                if let Some(term) = rule.output.iter().find(|t| t.contains(WILDCARD_PLACEHOLDER)) {
                    reasons.push(format!(
                        "rule {}: output '{}' uses {} but input '{}' has no wildcard",
                        index,
                        term,
                        WILDCARD_PLACEHOLDER,
                        rule.input.trim()
                    ));
                    continue;
                }
                Action::Terms(TermsReplaceInstruction::new(rule.output))
            };

            rules.push(Rule { pattern, action });
        }

        if reasons.is_empty() {
            Ok(Self {
                ignore_case: config.ignore_case,
                rules,
            })
        } else {
            Err(reasons)
        }
    }

    /// Apply the first rule matching at `pos`; returns where scanning resumes.
    fn apply_at(&self, tokens: &mut Vec<String>, pos: usize, log: &mut Vec<MatchLog>) -> Option<usize> {
        let view: &[String] = tokens;
        let (rule, len, capture) = self.rules.iter().find_map(|rule| {
            rule.pattern
                .match_at(view, pos, self.ignore_case)
                .map(|m| (rule, m.len, m.capture.map(Cow::into_owned)))
        })?;

        let inserted = match &rule.action {
            Action::Terms(instruction) => instruction.apply(tokens, pos, pos + len, log),
            Action::Wildcard(instruction) => {
                let capture = capture.unwrap_or_default();
                instruction.apply(tokens, pos, pos + len, &capture, log)
            }
        };
        Some(pos + inserted)
    }
}

impl Rewriter for ReplaceRewriter {
    fn rewrite(&self, tokens: &mut Vec<String>, log: &mut Vec<MatchLog>) {
        let mut pos = 0;
        while pos < tokens.len() {
            pos = match self.apply_at(tokens, pos, log) {
                Some(next) => next,
                None => pos + 1,
            };
        }
    }
}

/// Factory for [`ReplaceRewriter`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ReplaceRewriterFactory;

impl RewriterFactory for ReplaceRewriterFactory {
    fn kind(&self) -> &str {
        "replace"
    }

    fn compile(
        &self,
        _rewriter_id: &str,
        config: &serde_json::Value,
    ) -> std::result::Result<Arc<dyn Rewriter>, Vec<String>> {
        let config: ReplaceConfig = serde_json::from_value(config.clone())
            .map_err(|e| vec![format!("invalid replace config: {}", e)])?;
        let rewriter = ReplaceRewriter::compile(config)?;
        Ok(Arc::new(rewriter))
    }
}
