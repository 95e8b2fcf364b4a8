//! Litany configuration

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LitanyConfig {
    /// Root directory holding `*.xml` grammars
    pub grammar_dir: PathBuf,
    /// Language tag every grammar must declare
    pub language: String,
    /// Wake word substituted for the template token
    pub hotword: String,
    /// Directory levels scanned below the root, root included
    pub scan_depth: usize,
    pub watch: WatchConfig,
    pub compose: ComposeConfig,
}

impl Default for LitanyConfig {
    fn default() -> Self {
        Self {
            grammar_dir: PathBuf::from("/grimoire/litany/grammars"),
            language: "fr-FR".to_string(),
            hotword: "SARAH".to_string(),
            scan_depth: 2,
            watch: WatchConfig::default(),
            compose: ComposeConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ComposeConfig {
    /// Allow composing a grammar no file has provided yet
    #[serde(default)]
    pub create_missing: bool,
}

fn default_true() -> bool { true }

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<LitanyConfig> {
    if path.exists() {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&content)?)
    } else {
        Ok(LitanyConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(&dir.path().join("absent.yaml")).unwrap();

        assert_eq!(config.language, "fr-FR");
        assert_eq!(config.hotword, "SARAH");
        assert_eq!(config.scan_depth, 2);
        assert!(config.watch.enabled);
        assert!(!config.compose.create_missing);
    }

    #[test]
    fn test_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("litany.yaml");
        std::fs::write(
            &path,
            "language: en-US\nhotword: jarvis\ncompose:\n  create_missing: true\n",
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.language, "en-US");
        assert_eq!(config.hotword, "jarvis");
        assert!(config.compose.create_missing);
        assert!(config.watch.enabled);
        assert_eq!(config.scan_depth, 2);
    }
}
