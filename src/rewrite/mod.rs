// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Rewriter factories and the term rewrite engine.
//!
//! A [`RewriterFactory`] turns the opaque `config` of a definition into an
//! executable [`Rewriter`]. Factories are looked up by the definition's
//! `type` in a [`FactoryRegistry`].
//!
//! # Built-in Factories
//!
//! | Kind | Factory | Description |
//! |------|---------|-------------|
//! | `replace` | [`ReplaceRewriterFactory`] | Term and wildcard replacement rules |

pub mod instruction;
mod replace;

pub use instruction::{
    TermTemplate, TermsReplaceInstruction, WildcardReplaceInstruction, WILDCARD_PLACEHOLDER,
};
pub use replace::{ReplaceRewriter, ReplaceRewriterFactory};

use crate::sink::MatchLog;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Executable, immutable rule processor.
///
/// Implementations are shared between query threads and must not hold
/// per-call state.
pub trait Rewriter: Send + Sync {
    /// Rewrite `tokens` in place, appending every matched token to `log`.
    fn rewrite(&self, tokens: &mut Vec<String>, log: &mut Vec<MatchLog>);
}

/// Compiles one kind of rewriter.
pub trait RewriterFactory: Send + Sync {
    /// Name used in the definition's `type` field.
    fn kind(&self) -> &str;

    /// Compile `config`, or return every problem found in it.
    fn compile(
        &self,
        rewriter_id: &str,
        config: &serde_json::Value,
    ) -> std::result::Result<Arc<dyn Rewriter>, Vec<String>>;
}

/// Factories by kind name.
#[derive(Clone, Default)]
pub struct FactoryRegistry {
    factories: HashMap<String, Arc<dyn RewriterFactory>>,
}

impl FactoryRegistry {
    /// Registry with no factories.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in factories.
    pub fn with_builtins() -> Self {
        Self::new().with_factory(Arc::new(ReplaceRewriterFactory))
    }

    /// Register `factory` under its kind, replacing any previous one.
    pub fn with_factory(mut self, factory: Arc<dyn RewriterFactory>) -> Self {
        self.register(factory);
        self
    }

    pub fn register(&mut self, factory: Arc<dyn RewriterFactory>) {
        self.factories.insert(factory.kind().to_string(), factory);
    }

    pub fn get(&self, kind: &str) -> Option<&Arc<dyn RewriterFactory>> {
        self.factories.get(kind)
    }

    /// Registered kind names, sorted.
    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        kinds
    }
}

impl fmt::Debug for FactoryRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FactoryRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Upper;

    impl Rewriter for Upper {
        fn rewrite(&self, tokens: &mut Vec<String>, _log: &mut Vec<MatchLog>) {
            for token in tokens.iter_mut() {
                *token = token.to_uppercase();
            }
        }
    }

    struct UpperFactory;

    impl RewriterFactory for UpperFactory {
        fn kind(&self) -> &str {
            "upper"
        }

        fn compile(
            &self,
            _rewriter_id: &str,
            _config: &serde_json::Value,
        ) -> std::result::Result<Arc<dyn Rewriter>, Vec<String>> {
            Ok(Arc::new(Upper))
        }
    }

    #[test]
    fn test_builtins_contain_replace() {
        let registry = FactoryRegistry::with_builtins();
        assert_eq!(registry.kinds(), vec!["replace"]);
        assert!(registry.get("replace").is_some());
        assert!(registry.get("synonyms").is_none());
    }

    #[test]
    fn test_custom_factory() {
        let registry = FactoryRegistry::with_builtins().with_factory(Arc::new(UpperFactory));
        assert_eq!(registry.kinds(), vec!["replace", "upper"]);

        let rewriter = registry.get("upper").unwrap().compile("r", &json!({})).unwrap();
        let mut tokens = vec!["a".to_string()];
        rewriter.rewrite(&mut tokens, &mut Vec::new());
        assert_eq!(tokens, vec!["A".to_string()]);
    }

    #[test]
    fn test_debug_lists_kinds() {
        let registry = FactoryRegistry::with_builtins();
        assert_eq!(format!("{:?}", registry), r#"FactoryRegistry { kinds: ["replace"] }"#);
    }
}
