//! File watching for live grammar reload

use crate::engine::SpeechEngine;
use crate::scanner::{is_grammar_file, ScanReport};
use crate::store::GrammarStore;
use anyhow::Result;
use notify::event::{AccessKind, AccessMode, CreateKind, MetadataKind, ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Full rescan followed by a bulk engine push, as one critical section
pub struct Reloader<E: SpeechEngine> {
    store: Arc<GrammarStore>,
    engine: Arc<E>,
    root: PathBuf,
    depth: usize,
}

impl<E: SpeechEngine> Reloader<E> {
    pub fn new(store: Arc<GrammarStore>, engine: Arc<E>, root: PathBuf, depth: usize) -> Self {
        Self {
            store,
            engine,
            root,
            depth,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Rescan the grammar root and reload everything into the engine
    pub async fn reload(&self) -> Result<ScanReport> {
        let gate = self.store.exclusive().await;

        let report = self.store.scan(&gate, &self.root, self.depth).await?;
        let pushed = self.store.push_all(&gate, self.engine.as_ref()).await;

        info!(
            "Reloaded grammars from {:?}: {} loaded, {} unchanged, {} rejected, {} failed, {} pushed",
            self.root, report.loaded, report.unchanged, report.rejected, report.failed, pushed
        );
        Ok(report)
    }
}

/// Watches the grammar root and feeds a single reload consumer
pub struct GrammarWatcher {
    _watcher: RecommendedWatcher,
    paused: Arc<AtomicBool>,
    events: mpsc::UnboundedReceiver<PathBuf>,
}

impl GrammarWatcher {
    /// Start watching `root` recursively
    pub fn new(root: &Path) -> Result<Self> {
        let (tx, events) = mpsc::unbounded_channel();
        let paused = Arc::new(AtomicBool::new(false));
        let callback_paused = Arc::clone(&paused);

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            match res {
                Ok(event) => {
                    if callback_paused.load(Ordering::Acquire) || !is_reload_trigger(&event.kind) {
                        return;
                    }
                    if let Some(path) = event.paths.into_iter().find(|p| is_grammar_file(p)) {
                        let _ = tx.send(path);
                    }
                }
                Err(e) => warn!("Grammar watch error: {}", e),
            }
        })?;

        watcher.watch(root, RecursiveMode::Recursive)?;
        info!("Watching grammars in {:?}", root);

        Ok(Self {
            _watcher: watcher,
            paused,
            events,
        })
    }

    /// Serve reload requests until the watcher goes away.
    ///
    /// Notifications are switched off for the duration of each reload;
    /// changes landing in that window are dropped.
    pub async fn run<E: SpeechEngine>(mut self, reloader: Arc<Reloader<E>>) {
        while let Some(path) = self.events.recv().await {
            self.paused.store(true, Ordering::Release);
            debug!("Grammar change detected: {:?}", path);

            if let Err(e) = reloader.reload().await {
                error!("Grammar reload failed: {}", e);
            }

            while self.events.try_recv().is_ok() {}
            self.paused.store(false, Ordering::Release);
        }
    }
}

/// Events that mean a grammar's content or size may have changed.
///
/// Opening a file for writing is not one of them; the close that follows
/// the write is.
pub fn is_reload_trigger(kind: &EventKind) -> bool {
    match kind {
        EventKind::Create(CreateKind::File | CreateKind::Any) => true,
        EventKind::Modify(
            ModifyKind::Any
            | ModifyKind::Data(_)
            | ModifyKind::Metadata(MetadataKind::WriteTime | MetadataKind::Any)
            | ModifyKind::Name(RenameMode::To | RenameMode::Both),
        ) => true,
        EventKind::Access(AccessKind::Close(AccessMode::Write)) => true,
        _ => false,
    }
}
