//! Recognition engine adapter
//!
//! The acoustic engine lives outside this daemon. [`SpeechEngine`] is the
//! surface Litany drives; [`MemoryEngine`] is the in-process binding used by
//! `litanyd` and the tests.

use litany_core::{Grammar, LitanyError, Result};
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

/// Operations Litany needs from a recognition engine.
///
/// `load_grammar` replaces any grammar already bound under the same name.
pub trait SpeechEngine: Send + Sync + 'static {
    /// Engine-specific compiled form
    type Compiled: Send;

    /// Build the compiled form of a transformed document
    fn compile_from_xml(&self, name: &str, xml: &str) -> Result<Self::Compiled>;

    /// Bind a compiled grammar under `name`
    fn load_grammar(&self, name: &str, compiled: Self::Compiled) -> Result<()>;

    /// Drop the grammar bound under `name`, if any
    fn unload_grammar(&self, name: &str);

    /// Toggle whether the engine listens for `name`
    fn set_enabled(&self, name: &str, enabled: bool);

    /// Names currently bound
    fn loaded_grammars(&self) -> Vec<String>;
}

/// Compile and install one grammar
pub fn push_grammar<E: SpeechEngine + ?Sized>(engine: &E, grammar: &Grammar) -> Result<()> {
    let compiled = engine.compile_from_xml(&grammar.name, &grammar.transformed_xml)?;
    install(engine, &grammar.name, compiled, grammar.enabled)
}

/// Install an already compiled grammar and apply its enabled flag
pub fn install<E: SpeechEngine + ?Sized>(
    engine: &E,
    name: &str,
    compiled: E::Compiled,
    enabled: bool,
) -> Result<()> {
    engine.load_grammar(name, compiled)?;
    engine.set_enabled(name, enabled);
    Ok(())
}

/// Grammar as "compiled" by the in-memory engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledGrammar {
    pub root_rule: Option<String>,
    pub rule_count: usize,
}

#[derive(Debug, Clone)]
struct Binding {
    compiled: CompiledGrammar,
    enabled: bool,
}

/// Most recent `load_grammar` calls kept by [`MemoryEngine`]
pub const LOAD_HISTORY_LIMIT: usize = 256;

#[derive(Debug, Default)]
struct EngineState {
    bindings: HashMap<String, Binding>,
    loads: VecDeque<String>,
}

/// In-process engine: validates documents and records bindings
#[derive(Debug, Default)]
pub struct MemoryEngine {
    state: Mutex<EngineState>,
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Enabled flag of a bound grammar
    pub fn is_enabled(&self, name: &str) -> Option<bool> {
        self.state().bindings.get(name).map(|b| b.enabled)
    }

    /// Compiled form of a bound grammar
    pub fn compiled(&self, name: &str) -> Option<CompiledGrammar> {
        self.state().bindings.get(name).map(|b| b.compiled.clone())
    }

    /// The last [`LOAD_HISTORY_LIMIT`] `load_grammar` calls, oldest first
    pub fn load_history(&self) -> Vec<String> {
        self.state().loads.iter().cloned().collect()
    }
}

impl SpeechEngine for MemoryEngine {
    type Compiled = CompiledGrammar;

    fn compile_from_xml(&self, name: &str, xml: &str) -> Result<CompiledGrammar> {
        let options = roxmltree::ParsingOptions {
            allow_dtd: true,
            ..roxmltree::ParsingOptions::default()
        };
        let doc = roxmltree::Document::parse_with_options(xml, options).map_err(|e| {
            LitanyError::Compile {
                name: name.to_string(),
                message: e.to_string(),
            }
        })?;

        let root = doc.root_element();
        if root.tag_name().name() != "grammar" {
            return Err(LitanyError::Compile {
                name: name.to_string(),
                message: format!("root element is <{}>", root.tag_name().name()),
            });
        }

        let rule_count = root
            .children()
            .filter(|n| n.is_element() && n.tag_name().name() == "rule")
            .count();

        Ok(CompiledGrammar {
            root_rule: root.attribute("root").map(str::to_string),
            rule_count,
        })
    }

    fn load_grammar(&self, name: &str, compiled: CompiledGrammar) -> Result<()> {
        let mut state = self.state();
        if state.bindings.remove(name).is_some() {
            debug!("Unbound previous grammar: {}", name);
        }
        state.bindings.insert(
            name.to_string(),
            Binding {
                compiled,
                enabled: true,
            },
        );
        if state.loads.len() == LOAD_HISTORY_LIMIT {
            state.loads.pop_front();
        }
        state.loads.push_back(name.to_string());
        Ok(())
    }

    fn unload_grammar(&self, name: &str) {
        self.state().bindings.remove(name);
    }

    fn set_enabled(&self, name: &str, enabled: bool) {
        if let Some(binding) = self.state().bindings.get_mut(name) {
            binding.enabled = enabled;
        }
    }

    fn loaded_grammars(&self) -> Vec<String> {
        self.state().bindings.keys().cloned().collect()
    }
}
