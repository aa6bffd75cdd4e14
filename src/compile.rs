// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Definition compilation.
//!
//! Turns a [`RewriterDefinition`] into a [`CompiledRewriter`]: looks up the
//! factory, compiles the config, and resolves every sink name. All problems
//! are collected so one validation round trip reports everything.

use crate::definition::{content_hash, RewriterDefinition};
use crate::error::{RegistryError, Result};
use crate::rewrite::{FactoryRegistry, Rewriter};
use crate::sink::{MatchLog, RewriteLog, Sink, SinkRegistry};
use crate::store::Document;
use std::fmt;
use std::sync::Arc;

/// Executable rewriter with its sinks resolved.
///
/// Immutable once built; a redefinition produces a new instance.
pub struct CompiledRewriter {
    id: String,
    kind: String,
    content_hash: String,
    sink_names: Vec<String>,
    sinks: Vec<Arc<dyn Sink>>,
    rewriter: Arc<dyn Rewriter>,
}

impl CompiledRewriter {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Hash of the stored document this was compiled from.
    pub fn content_hash(&self) -> &str {
        &self.content_hash
    }

    pub fn sink_names(&self) -> &[String] {
        &self.sink_names
    }

    /// Rewrite `tokens` in place and return what matched.
    ///
    /// When anything matched, every sink receives one [`RewriteLog`].
    pub fn apply(&self, tokens: &mut Vec<String>) -> Vec<MatchLog> {
        let mut matches = Vec::new();
        self.rewriter.rewrite(tokens, &mut matches);

        if !matches.is_empty() && !self.sinks.is_empty() {
            let entry = RewriteLog {
                rewriter_id: self.id.clone(),
                matches: matches.clone(),
            };
            for sink in &self.sinks {
                sink.log(&entry);
            }
        }
        matches
    }
}

impl fmt::Debug for CompiledRewriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledRewriter")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("content_hash", &self.content_hash)
            .field("sinks", &self.sink_names)
            .finish()
    }
}

/// Compile a definition, or return every reason it cannot be compiled.
pub fn compile_definition(
    rewriter_id: &str,
    definition: &RewriterDefinition,
    content_hash: String,
    factories: &FactoryRegistry,
    sinks: &dyn SinkRegistry,
) -> std::result::Result<CompiledRewriter, Vec<String>> {
    let mut reasons = Vec::new();

    let rewriter = match factories.get(&definition.kind) {
        Some(factory) => match factory.compile(rewriter_id, &definition.config) {
            Ok(rewriter) => Some(rewriter),
            Err(errors) => {
                reasons.extend(errors);
                None
            }
        },
        None => {
            reasons.push(format!(
                "Unknown rewriter type '{}' (known: {})",
                definition.kind,
                factories.kinds().join(", ")
            ));
            None
        }
    };

    let mut resolved = Vec::with_capacity(definition.sinks.len());
    let mut missing = Vec::new();
    for name in &definition.sinks {
        match sinks.resolve(name) {
            Some(sink) => resolved.push(sink),
            None => missing.push(name.as_str()),
        }
    }
    if !missing.is_empty() {
        reasons.push(format!(
            "One or more info logging sinks do not exist: {}",
            missing.join(", ")
        ));
    }

    match rewriter {
        Some(rewriter) if reasons.is_empty() => Ok(CompiledRewriter {
            id: rewriter_id.to_string(),
            kind: definition.kind.clone(),
            content_hash,
            sink_names: definition.sinks.clone(),
            sinks: resolved,
            rewriter,
        }),
        _ => Err(reasons),
    }
}

/// Compile a stored document.
///
/// The document passed validation when it was saved, so a failure here is
/// reported as [`RegistryError::CompileDrift`].
pub fn compile_document(
    document: &Document,
    factories: &FactoryRegistry,
    sinks: &dyn SinkRegistry,
) -> Result<CompiledRewriter> {
    let definition = RewriterDefinition::from_document(document)?;
    compile_definition(
        &document.rewriter_id,
        &definition,
        content_hash(document),
        factories,
        sinks,
    )
    .map_err(|reasons| RegistryError::CompileDrift {
        rewriter_id: document.rewriter_id.clone(),
        reasons,
    })
}
