//! Grammar text transform pipeline
//!
//! Every step is a plain string rewrite applied before the document is ever
//! parsed as XML:
//!
//! 1. language gate
//! 2. hotword substitution
//! 3. optional-hotword wrapping

use crate::error::{LitanyError, Result};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

/// Placeholder token grammar authors write where the wake word goes
pub const TEMPLATE_TOKEN: &str = "SARAH";

static TEMPLATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!("(?i){}", TEMPLATE_TOKEN)).unwrap());

/// Output of a successful pipeline run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transformed {
    /// Rewritten document text
    pub xml: String,
    /// Whether at least one bare hotword item was made optional
    pub wake_word_injected: bool,
}

/// Configured transform pipeline
#[derive(Debug, Clone)]
pub struct Pipeline {
    language: String,
    hotword: String,
    optional_item: Regex,
}

impl Pipeline {
    /// Build a pipeline for a target language tag and hotword
    pub fn new(language: impl Into<String>, hotword: impl AsRef<str>) -> Result<Self> {
        let language = language.into();
        let hotword = hotword.as_ref().trim().to_uppercase();

        if language.trim().is_empty() {
            return Err(LitanyError::Config("language tag is empty".into()));
        }
        if hotword.is_empty() {
            return Err(LitanyError::Config("hotword is empty".into()));
        }

        let optional_item = item_regex(&hotword)?;

        Ok(Self {
            language,
            hotword,
            optional_item,
        })
    }

    /// Configured language tag
    pub fn language(&self) -> &str {
        &self.language
    }

    /// Configured hotword, upper-cased
    pub fn hotword(&self) -> &str {
        &self.hotword
    }

    /// Run all steps, short-circuiting on a language mismatch
    pub fn run(&self, raw: &str) -> Result<Transformed> {
        if !declares_language(raw, &self.language) {
            return Err(LitanyError::LanguageMismatch {
                expected: self.language.clone(),
            });
        }

        let substituted = substitute_hotword(raw, &self.hotword);
        let (xml, wake_word_injected) = self.wrap_optional(&substituted);

        Ok(Transformed {
            xml,
            wake_word_injected,
        })
    }

    fn wrap_optional(&self, xml: &str) -> (String, bool) {
        rewrite_optional_items(&self.optional_item, xml, &self.hotword)
    }
}

/// Whether the text carries `xml:lang="<language>"`, ignoring case
pub fn declares_language(xml: &str, language: &str) -> bool {
    let needle = format!("xml:lang=\"{}\"", language).to_lowercase();
    xml.to_lowercase().contains(&needle)
}

/// Replace the template token with the upper-cased hotword.
///
/// Occurrences directly preceded by `/` are kept, so URI-like strings such
/// as `http://host/SARAH` survive.
pub fn substitute_hotword(xml: &str, hotword: &str) -> String {
    let hotword = hotword.to_uppercase();
    let mut out = String::with_capacity(xml.len());
    let mut last = 0;

    for m in TEMPLATE_RE.find_iter(xml) {
        out.push_str(&xml[last..m.start()]);
        if xml[..m.start()].ends_with('/') {
            out.push_str(m.as_str());
        } else {
            out.push_str(&hotword);
        }
        last = m.end();
    }
    out.push_str(&xml[last..]);
    out
}

/// Give every `<item>` whose whole content is the hotword a 0-1 repeat.
///
/// Returns the rewritten text and whether anything was rewritten. Items
/// already carrying a `repeat` attribute are left alone.
pub fn wrap_optional_hotword(xml: &str, hotword: &str) -> Result<(String, bool)> {
    let hotword = hotword.to_uppercase();
    let re = item_regex(&hotword)?;
    Ok(rewrite_optional_items(&re, xml, &hotword))
}

fn item_regex(hotword: &str) -> Result<Regex> {
    let pattern = format!(r"(?i)<item\b([^>]*)>\s*{}\s*</item>", regex::escape(hotword));
    Regex::new(&pattern).map_err(|e| LitanyError::Config(e.to_string()))
}

fn rewrite_optional_items(re: &Regex, xml: &str, hotword: &str) -> (String, bool) {
    let mut injected = false;

    let out = re.replace_all(xml, |caps: &Captures| {
        let attrs = caps.get(1).map(|m| m.as_str()).unwrap_or("");
        if attrs.to_lowercase().contains("repeat") || attrs.trim_end().ends_with('/') {
            return caps[0].to_string();
        }
        injected = true;
        format!("<item{} repeat=\"0-1\">{}</item>", attrs.trim_end(), hotword)
    });

    (out.into_owned(), injected)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FR_GRAMMAR: &str = r#"<grammar version="1.0" xml:lang="fr-FR" mode="voice" root="ruleTime" xmlns="http://www.w3.org/2001/06/grammar" tag-format="semantics/1.0">
  <rule id="ruleTime" scope="public">
    <example>Sarah quelle heure est-il ?</example>
    <item>SARAH</item>
    <item>quelle heure est-il</item>
  </rule>
</grammar>"#;

    #[test]
    fn test_declares_language_ignores_case() {
        assert!(declares_language(FR_GRAMMAR, "fr-FR"));
        assert!(declares_language(FR_GRAMMAR, "FR-fr"));
        assert!(!declares_language(FR_GRAMMAR, "en-US"));
    }

    #[test]
    fn test_substitute_skips_slash_prefixed_token() {
        assert_eq!(substitute_hotword("a/SARAH", "jarvis"), "a/SARAH");
        assert_eq!(substitute_hotword("call SARAH now", "jarvis"), "call JARVIS now");
        assert_eq!(substitute_hotword("call sarah now", "Jarvis"), "call JARVIS now");
        assert_eq!(
            substitute_hotword("SARAH and Sarah", "jarvis"),
            "JARVIS and JARVIS"
        );
    }

    #[test]
    fn test_wrap_optional_hotword() {
        let (out, injected) = wrap_optional_hotword("<item>JARVIS</item>", "jarvis").unwrap();
        assert!(injected);
        assert_eq!(out, r#"<item repeat="0-1">JARVIS</item>"#);

        let (out, injected) =
            wrap_optional_hotword("<item>\n   jarvis  </item>", "JARVIS").unwrap();
        assert!(injected);
        assert_eq!(out, r#"<item repeat="0-1">JARVIS</item>"#);
    }

    #[test]
    fn test_wrap_leaves_other_items() {
        let src = r#"<item>JARVIS please</item><item repeat="1-2">JARVIS</item>"#;
        let (out, injected) = wrap_optional_hotword(src, "JARVIS").unwrap();
        assert!(!injected);
        assert_eq!(out, src);
    }

    #[test]
    fn test_pipeline_rewrites_item() {
        let pipeline = Pipeline::new("fr-FR", "jarvis").unwrap();
        let out = pipeline.run(FR_GRAMMAR).unwrap();

        assert!(out.wake_word_injected);
        assert!(out.xml.contains(r#"<item repeat="0-1">JARVIS</item>"#));
        assert!(out.xml.contains("<example>JARVIS quelle heure est-il ?</example>"));
        // namespace URI untouched
        assert!(out.xml.contains("http://www.w3.org/2001/06/grammar"));
    }

    #[test]
    fn test_pipeline_rejects_other_language() {
        let pipeline = Pipeline::new("fr-FR", "JARVIS").unwrap();
        let doc = r#"<grammar xml:lang="en-US" root="x"><rule id="x"><item>SARAH</item></rule></grammar>"#;

        let err = pipeline.run(doc).unwrap_err();
        assert!(matches!(err, LitanyError::LanguageMismatch { .. }));
    }

    #[test]
    fn test_pipeline_requires_hotword() {
        assert!(Pipeline::new("fr-FR", "  ").is_err());
        assert!(Pipeline::new("", "JARVIS").is_err());
    }
}
