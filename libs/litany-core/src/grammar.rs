//! Grammar entity model

use crate::error::Result;
use crate::examples::{index_document, DocumentIndex};
use crate::transform::Pipeline;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

static LAZY_ROOT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^lazy\w+$").unwrap());

/// One named grammar as held by the cache
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Grammar {
    /// Unique name (file base name, or supplied by the composer)
    pub name: String,
    /// Backing file; absent for grammars that only ever came from composition
    pub source_path: Option<PathBuf>,
    /// Document as read or synthesized
    pub raw_xml: String,
    /// Document after the transform pipeline
    pub transformed_xml: String,
    /// Whether the engine should listen for this grammar
    pub enabled: bool,
    /// Set when a bare hotword item was made optional
    pub wake_word_injected: bool,
    /// Last successful load, never moves backwards
    pub last_modified: DateTime<Utc>,
    /// File modification time seen at the last file load
    #[serde(skip)]
    pub source_modified: Option<DateTime<Utc>>,
    /// rule id -> example utterance
    pub examples: HashMap<String, String>,
}

/// A document that has made it through the pipeline and the example index.
///
/// Only prepared documents can be turned into or applied to a [`Grammar`],
/// so a half-transformed entity cannot exist.
#[derive(Debug, Clone)]
pub struct PreparedGrammar {
    raw_xml: String,
    transformed_xml: String,
    wake_word_injected: bool,
    index: DocumentIndex,
}

impl PreparedGrammar {
    /// Transform and index a raw document
    pub fn prepare(pipeline: &Pipeline, raw_xml: impl Into<String>) -> Result<Self> {
        let raw_xml = raw_xml.into();
        let transformed = pipeline.run(&raw_xml)?;
        let index = index_document(&transformed.xml)?;

        Ok(Self {
            raw_xml,
            transformed_xml: transformed.xml,
            wake_word_injected: transformed.wake_word_injected,
            index,
        })
    }

    /// Transformed document text
    pub fn transformed_xml(&self) -> &str {
        &self.transformed_xml
    }

    /// `root` attribute of the document's root element
    pub fn root_rule(&self) -> Option<&str> {
        self.index.root_rule.as_deref()
    }

    /// Whether a grammar loaded from `path` with this content starts disabled
    pub fn is_lazy(&self, path: Option<&Path>) -> bool {
        is_lazy(path, self.root_rule())
    }
}

impl Grammar {
    /// Create an entity from a prepared document
    pub fn new(name: impl Into<String>, prepared: PreparedGrammar, at: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            source_path: None,
            raw_xml: prepared.raw_xml,
            transformed_xml: prepared.transformed_xml,
            enabled: true,
            wake_word_injected: prepared.wake_word_injected,
            last_modified: at,
            source_modified: None,
            examples: prepared.index.examples,
        }
    }

    /// Replace content and flags with a newly prepared document
    pub fn apply(&mut self, prepared: PreparedGrammar, at: DateTime<Utc>) {
        self.raw_xml = prepared.raw_xml;
        self.transformed_xml = prepared.transformed_xml;
        self.wake_word_injected = prepared.wake_word_injected;
        self.examples = prepared.index.examples;
        self.touch(at);
    }

    /// Advance `last_modified`, ignoring timestamps older than the current one
    pub fn touch(&mut self, at: DateTime<Utc>) {
        if at > self.last_modified {
            self.last_modified = at;
        }
    }

    /// Example utterance for a rule of this grammar
    pub fn example(&self, rule_id: &str) -> Option<&str> {
        self.examples.get(rule_id).map(String::as_str)
    }
}

/// Lazy grammars load disabled: either the path mentions "lazy" or the whole
/// root rule name is `lazy` followed by word characters.
pub fn is_lazy(path: Option<&Path>, root_rule: Option<&str>) -> bool {
    let lazy_path = path
        .map(|p| p.to_string_lossy().to_lowercase().contains("lazy"))
        .unwrap_or(false);
    let lazy_root = root_rule.map(|r| LAZY_ROOT_RE.is_match(r)).unwrap_or(false);

    lazy_path || lazy_root
}
