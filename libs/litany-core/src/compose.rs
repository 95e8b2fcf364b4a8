//! Grammar document synthesis for runtime composition

use serde::{Deserialize, Serialize};
use std::fmt;

/// SRGS namespace declared by synthesized grammars
pub const SRGS_NAMESPACE: &str = "http://www.w3.org/2001/06/grammar";

/// Tag-format dialect of a synthesized grammar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dialect {
    /// W3C semantics, results written to `out`
    #[default]
    Semantics,
    /// Microsoft semantics, results written to `$`
    SemanticsMs,
}

impl Dialect {
    /// Value of the grammar's `tag-format` attribute
    pub fn tag_format(&self) -> &'static str {
        match self {
            Dialect::Semantics => "semantics/1.0",
            Dialect::SemanticsMs => "semantics-ms/1.0",
        }
    }

    /// Variable the rule's tags write their result to
    pub fn result_variable(&self) -> &'static str {
        match self {
            Dialect::Semantics => "out",
            Dialect::SemanticsMs => "$",
        }
    }

    /// Script that initializes the rule's action object
    pub fn initializer(&self) -> String {
        format!("{}.action=new Object();", self.result_variable())
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag_format())
    }
}

/// Build a complete grammar document around a single rule body.
///
/// The body is inserted verbatim; it still goes through the transform
/// pipeline afterwards like any file-backed grammar.
pub fn synthesize(name: &str, rule_body: &str, dialect: Dialect, language: &str) -> String {
    format!(
        concat!(
            "<grammar version=\"1.0\" xml:lang=\"{lang}\" mode=\"voice\" root=\"{name}\" ",
            "xmlns=\"{ns}\" tag-format=\"{format}\">\n",
            "  <rule id=\"{name}\" scope=\"public\">\n",
            "    <tag>{init}</tag>\n",
            "    {body}\n",
            "  </rule>\n",
            "</grammar>\n",
        ),
        lang = language,
        name = name,
        ns = SRGS_NAMESPACE,
        format = dialect.tag_format(),
        init = dialect.initializer(),
        body = rule_body.trim(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::examples::index_document;

    #[test]
    fn test_synthesize_semantics() {
        let xml = synthesize("greet", "<item>bonjour</item>", Dialect::Semantics, "fr-FR");

        assert!(xml.contains(r#"xml:lang="fr-FR""#));
        assert!(xml.contains(r#"root="greet""#));
        assert!(xml.contains(r#"tag-format="semantics/1.0""#));
        assert!(xml.contains("<tag>out.action=new Object();</tag>"));

        let index = index_document(&xml).unwrap();
        assert_eq!(index.root_rule.as_deref(), Some("greet"));
    }

    #[test]
    fn test_synthesize_semantics_ms() {
        let xml = synthesize("greet", "<item>hello</item>", Dialect::SemanticsMs, "en-US");
        assert!(xml.contains(r#"tag-format="semantics-ms/1.0""#));
        assert!(xml.contains("<tag>$.action=new Object();</tag>"));
        assert!(!xml.contains("out.action"));
    }

    #[test]
    fn test_dialect_serde_names() {
        let d: Dialect = serde_json::from_str("\"semantics_ms\"").unwrap();
        assert_eq!(d, Dialect::SemanticsMs);
    }
}
