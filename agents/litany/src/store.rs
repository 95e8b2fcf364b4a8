//! Grammar store: the name -> grammar cache and its query surface

use crate::engine::{push_grammar, SpeechEngine};
use crate::scanner::{ScanReport, Scanner};
use anyhow::Result;
use chrono::{DateTime, Utc};
use litany_core::{Grammar, LitanyError, Pipeline, PreparedGrammar};
use std::collections::HashMap;
use std::path::Path;
use tokio::sync::{Mutex, MutexGuard, RwLock};
use tracing::{debug, info, warn};

/// Proof that the caller holds a store's reload gate.
///
/// Scans, compositions and engine pushes all require one, so they can never
/// interleave with each other. A guard only admits calls on the store that
/// issued it; passing it to another store panics.
pub struct ReloadGuard<'a> {
    _guard: MutexGuard<'a, ()>,
    owner: &'a GrammarStore,
}

/// Grammar cache shared by the watch loop, the composer and the IPC surface
pub struct GrammarStore {
    grammars: RwLock<HashMap<String, Grammar>>,
    pipeline: Pipeline,
    gate: Mutex<()>,
}

impl GrammarStore {
    /// Create an empty store using `pipeline` for every load
    pub fn new(pipeline: Pipeline) -> Self {
        Self {
            grammars: RwLock::new(HashMap::new()),
            pipeline,
            gate: Mutex::new(()),
        }
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Wait for exclusive access to mutate the store and drive the engine
    pub async fn exclusive(&self) -> ReloadGuard<'_> {
        ReloadGuard {
            _guard: self.gate.lock().await,
            owner: self,
        }
    }

    fn admit(&self, gate: &ReloadGuard<'_>) {
        assert!(
            std::ptr::eq(gate.owner, self),
            "reload guard used on a store that did not issue it"
        );
    }

    /// Scan `root` and swap the result in.
    ///
    /// The scan runs on a copy of the map; readers keep seeing the previous
    /// state until the finished copy replaces it.
    pub async fn scan(&self, gate: &ReloadGuard<'_>, root: &Path, depth: usize) -> Result<ScanReport> {
        self.admit(gate);
        let mut snapshot = self.grammars.read().await.clone();
        let pipeline = self.pipeline.clone();
        let root = root.to_path_buf();

        let (snapshot, report) = tokio::task::spawn_blocking(move || {
            let mut report = ScanReport::default();
            Scanner::new(&pipeline).load(&mut snapshot, &root, depth, &mut report);
            (snapshot, report)
        })
        .await?;

        *self.grammars.write().await = snapshot;
        Ok(report)
    }

    /// Apply a composed document to `name`, creating the grammar if needed.
    ///
    /// The recorded file mtime is cleared, so the next scan reloads the
    /// backing file over the composed content.
    pub async fn apply_composed(
        &self,
        gate: &ReloadGuard<'_>,
        name: &str,
        prepared: PreparedGrammar,
        at: DateTime<Utc>,
    ) -> Grammar {
        self.admit(gate);
        let mut grammars = self.grammars.write().await;
        match grammars.get_mut(name) {
            Some(grammar) => {
                grammar.apply(prepared, at);
                grammar.source_modified = None;
                grammar.clone()
            }
            None => {
                let grammar = Grammar::new(name, prepared, at);
                grammars.insert(name.to_string(), grammar.clone());
                grammar
            }
        }
    }

    // ========== Queries ==========

    /// Exact-name lookup
    pub async fn find_by_name(&self, name: &str) -> Option<Grammar> {
        self.grammars.read().await.get(name).cloned()
    }

    /// Whether a grammar is cached under `name`
    pub async fn contains(&self, name: &str) -> bool {
        self.grammars.read().await.contains_key(name)
    }

    /// Example for a rule id from any grammar that defines it.
    ///
    /// When several grammars share the id, which one answers is unspecified.
    pub async fn find_example_by_rule_id(&self, rule_id: &str) -> Option<String> {
        self.grammars
            .read()
            .await
            .values()
            .find_map(|g| g.example(rule_id).map(str::to_string))
    }

    /// Set the store-side enabled flag; returns false for unknown names
    pub async fn set_enabled(&self, gate: &ReloadGuard<'_>, name: &str, enabled: bool) -> bool {
        self.admit(gate);
        match self.grammars.write().await.get_mut(name) {
            Some(grammar) => {
                grammar.enabled = enabled;
                true
            }
            None => false,
        }
    }

    /// Cached grammar names, sorted
    pub async fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.grammars.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    pub async fn len(&self) -> usize {
        self.grammars.read().await.len()
    }

    // ========== Engine sync ==========

    /// Push the store's enabled flags onto the grammars the engine has bound
    pub async fn sync_enabled_to_engine<E: SpeechEngine>(&self, gate: &ReloadGuard<'_>, engine: &E) -> usize {
        self.admit(gate);
        let grammars = self.grammars.read().await;
        let mut synced = 0;

        for name in engine.loaded_grammars() {
            if let Some(grammar) = grammars.get(&name) {
                engine.set_enabled(&name, grammar.enabled);
                synced += 1;
            }
        }

        debug!("Synced enabled state of {} grammars", synced);
        synced
    }

    /// Compile and load one grammar into the engine
    pub async fn push_one<E: SpeechEngine>(
        &self,
        gate: &ReloadGuard<'_>,
        engine: &E,
        name: &str,
    ) -> litany_core::Result<()> {
        self.admit(gate);
        let grammars = self.grammars.read().await;
        let grammar = grammars
            .get(name)
            .ok_or_else(|| LitanyError::NotFound(name.to_string()))?;
        push_grammar(engine, grammar)
    }

    /// Compile and load every cached grammar; returns how many succeeded
    pub async fn push_all<E: SpeechEngine>(&self, gate: &ReloadGuard<'_>, engine: &E) -> usize {
        self.admit(gate);
        let grammars = self.grammars.read().await;
        let mut pushed = 0;

        for grammar in grammars.values() {
            match push_grammar(engine, grammar) {
                Ok(()) => pushed += 1,
                Err(e) => warn!("Failed to push grammar {}: {}", grammar.name, e),
            }
        }

        info!("Pushed {}/{} grammars to engine", pushed, grammars.len());
        pushed
    }
}
