//! Runtime grammar composition
//!
//! Lets a control surface replace the body of a single grammar without
//! touching the filesystem. Only the composed grammar is pushed to the
//! engine.

use crate::engine::{install, SpeechEngine};
use crate::store::GrammarStore;
use chrono::Utc;
use litany_core::{synthesize, Dialect, Grammar, LitanyError, PreparedGrammar, Result};
use std::sync::Arc;
use tracing::{info, warn};

pub struct Composer<E: SpeechEngine> {
    store: Arc<GrammarStore>,
    engine: Arc<E>,
    create_missing: bool,
}

impl<E: SpeechEngine> Composer<E> {
    pub fn new(store: Arc<GrammarStore>, engine: Arc<E>, create_missing: bool) -> Self {
        Self {
            store,
            engine,
            create_missing,
        }
    }

    /// Wrap `rule_body` into a full grammar named `name` and load it.
    ///
    /// Fails with `NotFound` for unknown names unless creation is allowed.
    /// Nothing in the store changes unless the engine accepted the document.
    pub async fn compose(&self, name: &str, rule_body: &str, dialect: Dialect) -> Result<Grammar> {
        let gate = self.store.exclusive().await;

        if !self.create_missing && !self.store.contains(name).await {
            return Err(LitanyError::NotFound(name.to_string()));
        }

        let pipeline = self.store.pipeline();
        let xml = synthesize(name, rule_body, dialect, pipeline.language());
        let prepared = PreparedGrammar::prepare(pipeline, xml).map_err(|e| {
            warn!("Composed grammar {} rejected: {}", name, e);
            e
        })?;

        let compiled = self
            .engine
            .compile_from_xml(name, prepared.transformed_xml())
            .map_err(|e| {
                warn!("Engine rejected composed grammar {}: {}", name, e);
                e
            })?;

        let grammar = self.store.apply_composed(&gate, name, prepared, Utc::now()).await;
        install(self.engine.as_ref(), name, compiled, grammar.enabled)?;

        info!("Composed grammar {} ({})", name, dialect);
        Ok(grammar)
    }
}
