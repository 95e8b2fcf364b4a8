//! Grammar directory scanner
//!
//! Works on a plain map so the store can scan a snapshot off-lock and swap
//! the result in afterwards.

use chrono::{DateTime, Utc};
use litany_core::{Grammar, LitanyError, Pipeline, PreparedGrammar, Result};
use serde::Serialize;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Aggregate outcome of one scan
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScanReport {
    pub loaded: usize,
    pub unchanged: usize,
    pub rejected: usize,
    pub failed: usize,
}

impl ScanReport {
    fn record(&mut self, outcome: FileOutcome) {
        match outcome {
            FileOutcome::Loaded => self.loaded += 1,
            FileOutcome::Unchanged => self.unchanged += 1,
            FileOutcome::Rejected => self.rejected += 1,
            FileOutcome::Failed => self.failed += 1,
        }
    }

    /// Files looked at
    pub fn total(&self) -> usize {
        self.loaded + self.unchanged + self.rejected + self.failed
    }
}

/// What happened to a single file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOutcome {
    Loaded,
    Unchanged,
    Rejected,
    Failed,
}

/// Loads grammar files into a name -> grammar map
pub struct Scanner<'a> {
    pipeline: &'a Pipeline,
}

impl<'a> Scanner<'a> {
    pub fn new(pipeline: &'a Pipeline) -> Self {
        Self { pipeline }
    }

    /// Scan `path` down to `depth` levels: subdirectories first, then the
    /// `*.xml` files of `path` itself, each group in path order.
    ///
    /// A root that is a regular file is skipped.
    pub fn load(
        &self,
        grammars: &mut HashMap<String, Grammar>,
        path: &Path,
        depth: usize,
        report: &mut ScanReport,
    ) {
        if depth == 0 {
            return;
        }
        if path.is_file() {
            debug!("Skipping non-directory grammar root {:?}", path);
            return;
        }

        let entries = match std::fs::read_dir(path) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Failed to read grammar directory {:?}: {}", path, e);
                return;
            }
        };

        let mut paths: Vec<PathBuf> = entries.filter_map(|e| e.ok()).map(|e| e.path()).collect();
        paths.sort();

        let (dirs, files): (Vec<PathBuf>, Vec<PathBuf>) = paths.into_iter().partition(|p| p.is_dir());

        for dir in &dirs {
            self.load(grammars, dir, depth - 1, report);
        }

        for file in files.iter().filter(|p| is_grammar_file(p)) {
            report.record(self.load_file(grammars, file));
        }
    }

    /// Load one grammar file, logging and absorbing any failure
    pub fn load_file(&self, grammars: &mut HashMap<String, Grammar>, path: &Path) -> FileOutcome {
        match self.try_load_file(grammars, path) {
            Ok(outcome) => outcome,
            Err(e) if e.is_silent() => {
                debug!("Skipping {:?}: {}", path, e);
                FileOutcome::Rejected
            }
            Err(e) => {
                warn!("Failed to load grammar {:?}: {}", path, e);
                FileOutcome::Failed
            }
        }
    }

    fn try_load_file(&self, grammars: &mut HashMap<String, Grammar>, path: &Path) -> Result<FileOutcome> {
        let name = grammar_name(path)
            .ok_or_else(|| LitanyError::Parse(format!("no usable file name in {:?}", path)))?;

        let metadata = std::fs::metadata(path).map_err(|e| LitanyError::io(path, e))?;
        let modified: DateTime<Utc> = metadata
            .modified()
            .map_err(|e| LitanyError::io(path, e))?
            .into();

        if let Some(existing) = grammars.get(name) {
            let same_source = existing.source_path.as_deref() == Some(path);
            if same_source && existing.source_modified == Some(modified) {
                return Ok(FileOutcome::Unchanged);
            }
        }

        let raw = std::fs::read_to_string(path).map_err(|e| LitanyError::io(path, e))?;
        let prepared = PreparedGrammar::prepare(self.pipeline, raw)?;
        let enabled = !prepared.is_lazy(Some(path));

        let grammar = match grammars.entry(name.to_string()) {
            Entry::Occupied(entry) => {
                let grammar = entry.into_mut();
                grammar.apply(prepared, modified);
                grammar
            }
            Entry::Vacant(entry) => entry.insert(Grammar::new(name, prepared, modified)),
        };
        grammar.source_path = Some(path.to_path_buf());
        grammar.source_modified = Some(modified);
        grammar.enabled = enabled;

        debug!("Loaded grammar {} from {:?} (enabled: {})", name, path, enabled);
        Ok(FileOutcome::Loaded)
    }
}

/// Grammar name for a file: its base name without extension
pub fn grammar_name(path: &Path) -> Option<&str> {
    path.file_stem().and_then(|s| s.to_str()).filter(|s| !s.is_empty())
}

/// Whether a path looks like a grammar document (`*.xml`, any case)
pub fn is_grammar_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("xml"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::{Duration, SystemTime};
    use tempfile::tempdir;

    fn pipeline() -> Pipeline {
        Pipeline::new("fr-FR", "JARVIS").unwrap()
    }

    fn grammar_doc(root: &str, item: &str) -> String {
        format!(
            r#"<grammar version="1.0" xml:lang="fr-FR" mode="voice" root="{root}" xmlns="http://www.w3.org/2001/06/grammar">
  <rule id="{root}" scope="public">
    <example>SARAH {item}</example>
    <item>{item}</item>
  </rule>
</grammar>"#
        )
    }

    fn write(path: &Path, content: &str, age_secs: u64) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
        let mtime = SystemTime::now() - Duration::from_secs(age_secs);
        fs::File::options()
            .write(true)
            .open(path)
            .unwrap()
            .set_modified(mtime)
            .unwrap();
    }

    fn scan(pipeline: &Pipeline, grammars: &mut HashMap<String, Grammar>, root: &Path, depth: usize) -> ScanReport {
        let mut report = ScanReport::default();
        Scanner::new(pipeline).load(grammars, root, depth, &mut report);
        report
    }

    #[test]
    fn test_distinct_names_load() {
        let dir = tempdir().unwrap();
        write(&dir.path().join("time.xml"), &grammar_doc("time", "heure"), 60);
        write(&dir.path().join("meteo.XML"), &grammar_doc("meteo", "météo"), 60);
        write(&dir.path().join("sub/music.xml"), &grammar_doc("music", "musique"), 60);
        write(&dir.path().join("notes.txt"), "not a grammar", 60);

        let pipeline = pipeline();
        let mut grammars = HashMap::new();
        let report = scan(&pipeline, &mut grammars, dir.path(), 2);

        assert_eq!(grammars.len(), 3);
        assert_eq!(report.loaded, 3);
        assert_eq!(report.total(), 3);
        assert_eq!(grammars["time"].example("time"), Some("heure"));
        assert!(grammars["time"].enabled);
    }

    #[test]
    fn test_zero_depth_loads_nothing() {
        let dir = tempdir().unwrap();
        write(&dir.path().join("time.xml"), &grammar_doc("time", "heure"), 60);

        let pipeline = pipeline();
        let mut grammars = HashMap::new();
        let report = scan(&pipeline, &mut grammars, dir.path(), 0);

        assert!(grammars.is_empty());
        assert_eq!(report, ScanReport::default());
    }

    #[test]
    fn test_depth_bounds_recursion() {
        let dir = tempdir().unwrap();
        write(&dir.path().join("a/top.xml"), &grammar_doc("top", "un"), 60);
        write(&dir.path().join("a/b/deep.xml"), &grammar_doc("deep", "deux"), 60);

        let pipeline = pipeline();
        let mut grammars = HashMap::new();
        scan(&pipeline, &mut grammars, dir.path(), 2);

        assert!(grammars.contains_key("top"));
        assert!(!grammars.contains_key("deep"));
    }

    #[test]
    fn test_file_root_is_skipped() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("time.xml");
        write(&file, &grammar_doc("time", "heure"), 60);

        let pipeline = pipeline();
        let mut grammars = HashMap::new();
        scan(&pipeline, &mut grammars, &file, 2);

        assert!(grammars.is_empty());
    }

    #[test]
    fn test_unchanged_file_is_not_reloaded() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("time.xml");
        write(&path, &grammar_doc("time", "heure"), 60);

        let pipeline = pipeline();
        let scanner = Scanner::new(&pipeline);
        let mut grammars = HashMap::new();

        assert_eq!(scanner.load_file(&mut grammars, &path), FileOutcome::Loaded);
        let first = grammars["time"].clone();

        assert_eq!(scanner.load_file(&mut grammars, &path), FileOutcome::Unchanged);
        let second = &grammars["time"];
        assert_eq!(second.last_modified, first.last_modified);
        assert_eq!(second.transformed_xml, first.transformed_xml);
    }

    #[test]
    fn test_modified_file_is_reloaded() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("time.xml");
        write(&path, &grammar_doc("time", "heure"), 120);

        let pipeline = pipeline();
        let scanner = Scanner::new(&pipeline);
        let mut grammars = HashMap::new();
        scanner.load_file(&mut grammars, &path);
        let before = grammars["time"].last_modified;

        write(&path, &grammar_doc("time", "minute"), 10);
        assert_eq!(scanner.load_file(&mut grammars, &path), FileOutcome::Loaded);

        assert_eq!(grammars["time"].example("time"), Some("minute"));
        assert!(grammars["time"].last_modified > before);
    }

    #[test]
    fn test_colliding_names_last_path_wins() {
        let dir = tempdir().unwrap();
        write(&dir.path().join("a/time.xml"), &grammar_doc("time", "from a"), 60);
        write(&dir.path().join("b/time.xml"), &grammar_doc("time", "from b"), 60);

        let pipeline = pipeline();
        let mut grammars = HashMap::new();
        let report = scan(&pipeline, &mut grammars, dir.path(), 2);

        assert_eq!(grammars.len(), 1);
        assert_eq!(report.loaded, 2);
        assert_eq!(grammars["time"].example("time"), Some("from b"));
        assert_eq!(
            grammars["time"].source_path.as_deref(),
            Some(dir.path().join("b/time.xml").as_path())
        );
    }

    #[test]
    fn test_language_mismatch_is_not_cached() {
        let dir = tempdir().unwrap();
        let doc = grammar_doc("time", "hour").replace("fr-FR", "en-US");
        write(&dir.path().join("time.xml"), &doc, 60);

        let pipeline = pipeline();
        let mut grammars = HashMap::new();
        let report = scan(&pipeline, &mut grammars, dir.path(), 2);

        assert!(grammars.is_empty());
        assert_eq!(report.rejected, 1);
        assert_eq!(report.failed, 0);
    }

    #[test]
    fn test_broken_file_keeps_last_good_state() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("time.xml");
        write(&path, &grammar_doc("time", "heure"), 120);

        let pipeline = pipeline();
        let mut grammars = HashMap::new();
        scan(&pipeline, &mut grammars, dir.path(), 2);

        write(&path, r#"<grammar xml:lang="fr-FR"><rule id="time">"#, 10);
        write(&dir.path().join("other.xml"), &grammar_doc("other", "autre"), 10);
        let report = scan(&pipeline, &mut grammars, dir.path(), 2);

        assert_eq!(report.failed, 1);
        assert_eq!(report.loaded, 1);
        assert_eq!(grammars["time"].example("time"), Some("heure"));
        assert!(grammars.contains_key("other"));
    }

    #[test]
    fn test_lazy_grammars_load_disabled() {
        let dir = tempdir().unwrap();
        write(&dir.path().join("lazy/weather.xml"), &grammar_doc("weather", "météo"), 60);
        write(&dir.path().join("radio.xml"), &grammar_doc("lazyRadio", "radio"), 60);
        write(&dir.path().join("time.xml"), &grammar_doc("time", "heure"), 60);

        let pipeline = pipeline();
        let mut grammars = HashMap::new();
        scan(&pipeline, &mut grammars, dir.path(), 2);

        assert!(!grammars["weather"].enabled);
        assert!(!grammars["radio"].enabled);
        assert!(grammars["time"].enabled);
    }

    #[test]
    fn test_hotword_is_injected() {
        let dir = tempdir().unwrap();
        let doc = r#"<grammar xml:lang="fr-FR" root="hello"><rule id="hello"><item>SARAH</item><item>bonjour</item></rule></grammar>"#;
        write(&dir.path().join("hello.xml"), doc, 60);

        let pipeline = pipeline();
        let mut grammars = HashMap::new();
        scan(&pipeline, &mut grammars, dir.path(), 1);

        let hello = &grammars["hello"];
        assert!(hello.wake_word_injected);
        assert!(hello.transformed_xml.contains(r#"<item repeat="0-1">JARVIS</item>"#));
        assert!(hello.raw_xml.contains("<item>SARAH</item>"));
    }
}
