//! Template AST
//!
//! The markup parser is not part of this crate. Whatever parses templates
//! hands over a tree of [`AstNode`]s: elements with raw attribute strings and
//! text nodes with raw text. Directive and interpolation markers are still
//! unprocessed at this point; tree construction interprets them.
//!
//! The AST deserializes from JSON, so a parser written in another process or
//! language can supply it:
//!
//! ```json
//! { "kind": "element", "tag": "p", "attributes": { ":title": "user.name" },
//!   "children": [ { "kind": "text", "raw": "Hi {{ user.name }}" } ] }
//! ```

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A node of a parsed template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AstNode {
    Element {
        tag: String,
        #[serde(default)]
        attributes: IndexMap<String, String>,
        #[serde(default)]
        children: Vec<AstNode>,
    },
    Text {
        raw: String,
    },
}

impl AstNode {
    pub fn element(tag: impl Into<String>) -> Self {
        Self::Element {
            tag: tag.into(),
            attributes: IndexMap::new(),
            children: Vec::new(),
        }
    }

    pub fn text(raw: impl Into<String>) -> Self {
        Self::Text { raw: raw.into() }
    }

    /// Builder: set a raw attribute. No effect on text nodes.
    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        if let Self::Element { attributes, .. } = &mut self {
            attributes.insert(name.into(), value.into());
        }
        self
    }

    /// Builder: append a child. No effect on text nodes.
    pub fn child(mut self, child: AstNode) -> Self {
        if let Self::Element { children, .. } = &mut self {
            children.push(child);
        }
        self
    }

    /// Parse an AST from JSON.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_from_json() {
        let ast = AstNode::from_json(
            r#"{ "kind": "element", "tag": "p", "attributes": { ":title": "user.name" },
                 "children": [ { "kind": "text", "raw": "Hi {{ user.name }}" } ] }"#,
        )
        .unwrap();

        let expected = AstNode::element("p")
            .attr(":title", "user.name")
            .child(AstNode::text("Hi {{ user.name }}"));
        assert_eq!(ast, expected);
    }

    #[test]
    fn attributes_and_children_default_to_empty() {
        let ast = AstNode::from_json(r#"{ "kind": "element", "tag": "br" }"#).unwrap();
        assert_eq!(ast, AstNode::element("br"));
    }
}
