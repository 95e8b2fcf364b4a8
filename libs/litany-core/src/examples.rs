//! Example index: one representative utterance per rule

use crate::error::Result;
use std::collections::HashMap;

/// Facts pulled out of a transformed grammar document in a single parse
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentIndex {
    /// `root` attribute of the root element
    pub root_rule: Option<String>,
    /// rule id -> example text
    pub examples: HashMap<String, String>,
}

/// Parse a transformed document and index it
pub fn index_document(xml: &str) -> Result<DocumentIndex> {
    let options = roxmltree::ParsingOptions {
        allow_dtd: true,
        ..roxmltree::ParsingOptions::default()
    };
    let doc = roxmltree::Document::parse_with_options(xml, options)?;
    let root = doc.root_element();

    Ok(DocumentIndex {
        root_rule: root.attribute("root").map(str::to_string),
        examples: extract_examples(&doc),
    })
}

/// Map each top-level rule id to the text of its first non-`example` child.
///
/// Comments and text between rules are skipped. When the same id appears
/// twice, the first rule wins.
pub fn extract_examples(doc: &roxmltree::Document) -> HashMap<String, String> {
    let mut examples = HashMap::new();

    for rule in doc.root_element().children().filter(|n| n.is_element()) {
        let Some(id) = rule.attribute("id") else {
            continue;
        };
        if examples.contains_key(id) {
            continue;
        }

        let sample = rule
            .children()
            .filter(|n| n.is_element())
            .find(|n| n.tag_name().name() != "example");

        if let Some(sample) = sample {
            examples.insert(id.to_string(), text_content(sample));
        }
    }

    examples
}

fn text_content(node: roxmltree::Node) -> String {
    let text: String = node
        .descendants()
        .filter(|n| n.is_text())
        .filter_map(|n| n.text())
        .collect();
    text.trim().to_string()
}
