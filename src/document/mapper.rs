//! Structure Mapper
//!
//! Converts one completed branch into an array-wrapped [`Document`]:
//!
//! - attributes become keys (or one nested document under `attributes`)
//! - each child element is appended under its own name
//! - text of a leaf element becomes a plain string; text of an element that
//!   also produced keys goes under the text key (`val`)
//!
//! The transform is structural. Whether a name occurs once or many times
//! never changes the shape of the result.

use serde::{Deserialize, Serialize};

use super::value::{Document, Value};
use crate::branch::BranchNode;
use crate::error::{IngestError, Result};

/// How element attributes are stored
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributeMode {
    /// Each attribute becomes a key next to the child elements
    #[default]
    Flatten,
    /// All attributes go into one document under `attributes_key`
    Nested,
}

/// Which text values get leading and trailing whitespace removed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrimPolicy {
    /// Text of elements without child elements
    #[default]
    Leaves,
    All,
    Never,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MappingConfig {
    pub attributes: AttributeMode,
    pub attributes_key: String,
    pub text_key: String,
    pub trim: TrimPolicy,
    /// Keep empty elements and attribute values as `""`
    pub keep_empty: bool,
}

impl Default for MappingConfig {
    fn default() -> Self {
        MappingConfig {
            attributes: AttributeMode::Flatten,
            attributes_key: "attributes".to_string(),
            text_key: "val".to_string(),
            trim: TrimPolicy::Leaves,
            keep_empty: false,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct StructureMapper {
    config: MappingConfig,
}

impl StructureMapper {
    pub fn new(config: MappingConfig) -> Self {
        StructureMapper { config }
    }

    pub fn config(&self) -> &MappingConfig {
        &self.config
    }

    /// Map a branch rooted at `E` to `{E: [value(E)]}`
    ///
    /// Returns `None` when the whole branch is empty and empty values are
    /// not kept. Elements are visited with an explicit stack, so nesting
    /// depth is bounded only by memory.
    pub fn map(&self, mut node: BranchNode) -> Result<Option<Document>> {
        let name = std::mem::take(&mut node.name);
        if name.is_empty() {
            return Err(empty_name(String::new()));
        }
        let mut stack = vec![self.open(name, node, &[])?];

        loop {
            let Some(top) = stack.last_mut() else {
                return Ok(None);
            };
            if let Some(mut child) = top.children.next() {
                let key = std::mem::take(&mut child.name);
                if key.is_empty() {
                    return Err(empty_name(path_of(&stack, None)));
                }
                let frame = self.open(key, child, &stack)?;
                stack.push(frame);
                continue;
            }

            let Some(Frame { key, doc, text, has_children, .. }) = stack.pop() else {
                return Ok(None);
            };
            let value = self.close(doc, text, has_children);
            match stack.last_mut() {
                Some(parent) => {
                    if let Some(value) = value {
                        parent.doc.push(key, value);
                    }
                }
                None => {
                    return Ok(value.map(|value| {
                        let mut doc = Document::new();
                        doc.push(key, value);
                        doc
                    }))
                }
            }
        }
    }

    /// Start an element: map its attributes and queue its children
    fn open(&self, key: String, mut node: BranchNode, ancestors: &[Frame]) -> Result<Frame> {
        let mut doc = Document::new();
        self.map_attributes(std::mem::take(&mut node.attributes), &mut doc)
            .map_err(|e| within(e, path_of(ancestors, Some(key.as_str()))))?;
        let children = std::mem::take(&mut node.children);
        Ok(Frame {
            key,
            doc,
            has_children: !children.is_empty(),
            children: children.into_iter(),
            text: std::mem::take(&mut node.text),
        })
    }

    /// Value of a finished element from its keys and text
    fn close(&self, mut doc: Document, text: String, has_children: bool) -> Option<Value> {
        let text = self.clean_text(text, has_children);

        if doc.is_empty() {
            return match text {
                Some(text) => Some(Value::Text(text)),
                None if self.config.keep_empty => Some(Value::Text(String::new())),
                None => None,
            };
        }
        if let Some(text) = text {
            doc.push(self.config.text_key.as_str(), text);
        }
        Some(Value::Document(doc))
    }

    fn map_attributes(&self, attributes: Vec<(String, String)>, doc: &mut Document) -> Result<()> {
        let mut nested = Document::new();
        for (key, value) in attributes {
            if key.is_empty() {
                return Err(IngestError::Mapping {
                    message: "attribute has an empty name".to_string(),
                    path: String::new(),
                });
            }
            if value.is_empty() && !self.config.keep_empty {
                continue;
            }
            match self.config.attributes {
                AttributeMode::Flatten => doc.push(key, value),
                AttributeMode::Nested => nested.push(key, value),
            }
        }
        if !nested.is_empty() {
            doc.push(self.config.attributes_key.as_str(), nested);
        }
        Ok(())
    }

    /// Apply the trim policy; whitespace-only text counts as absent
    fn clean_text(&self, text: String, has_children: bool) -> Option<String> {
        if text.trim().is_empty() {
            return None;
        }
        let trim = match self.config.trim {
            TrimPolicy::Leaves => !has_children,
            TrimPolicy::All => true,
            TrimPolicy::Never => false,
        };
        if trim {
            let trimmed = text.trim();
            if trimmed.len() != text.len() {
                return Some(trimmed.to_string());
            }
        }
        Some(text)
    }
}

/// One element being mapped
struct Frame {
    key: String,
    /// Attributes and the children mapped so far
    doc: Document,
    children: std::vec::IntoIter<BranchNode>,
    text: String,
    has_children: bool,
}

/// `a/b/c` from the open frames, optionally followed by one more name
fn path_of(frames: &[Frame], last: Option<&str>) -> String {
    let mut names: Vec<&str> = frames.iter().map(|f| f.key.as_str()).collect();
    names.extend(last);
    names.join("/")
}

fn empty_name(path: String) -> IngestError {
    IngestError::Mapping {
        message: "element has an empty name".to_string(),
        path,
    }
}

/// Attach the element path to a mapping error
fn within(error: IngestError, path: String) -> IngestError {
    match error {
        IngestError::Mapping { message, .. } => IngestError::Mapping { message, path },
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn el(name: &str) -> BranchNode {
        BranchNode::new(name, Vec::new())
    }

    fn map(node: BranchNode) -> serde_json::Value {
        StructureMapper::default()
            .map(node)
            .unwrap()
            .expect("non-empty branch")
            .to_json()
            .unwrap()
    }

    #[test]
    fn test_single_child_is_wrapped() {
        let node = el("thing").with_child(el("name").with_text("Bob"));
        assert_eq!(map(node), json!({"thing": [{"name": ["Bob"]}]}));
    }

    #[test]
    fn test_interleaved_siblings_collect_in_order() {
        let node = el("thing")
            .with_child(el("name").with_text("Bob"))
            .with_child(el("type").with_text("Monster"))
            .with_child(el("name").with_text("Alice"));
        let doc = StructureMapper::default().map(node).unwrap().unwrap();

        assert_eq!(
            serde_json::to_string(&doc).unwrap(),
            r#"{"thing":[{"name":["Bob","Alice"],"type":["Monster"]}]}"#
        );
    }

    #[test]
    fn test_shape_does_not_depend_on_cardinality() {
        let one = el("sublabels").with_child(el("label").with_text("A"));
        let two = el("sublabels")
            .with_child(el("label").with_text("A"))
            .with_child(el("label").with_text("B"));
        assert_eq!(map(one), json!({"sublabels": [{"label": ["A"]}]}));
        assert_eq!(map(two), json!({"sublabels": [{"label": ["A", "B"]}]}));
    }

    #[test]
    fn test_attributes_flatten_before_children_and_text_key_last() {
        let node = el("artist")
            .with_attribute("id", "7")
            .with_child(el("name").with_attribute("lang", "en").with_text(" Bob "))
            .with_child(el("bio").with_text("x"));
        let doc = StructureMapper::default().map(node).unwrap().unwrap();

        assert_eq!(
            serde_json::to_string(&doc).unwrap(),
            r#"{"artist":[{"id":["7"],"name":[{"lang":["en"],"val":["Bob"]}],"bio":["x"]}]}"#
        );
    }

    #[test]
    fn test_nested_attribute_mode() {
        let mapper = StructureMapper::new(MappingConfig {
            attributes: AttributeMode::Nested,
            ..MappingConfig::default()
        });
        let node = el("image").with_attribute("uri", "a.jpg").with_attribute("width", "600");
        let doc = mapper.map(node).unwrap().unwrap();
        assert_eq!(
            doc.to_json().unwrap(),
            json!({"image": [{"attributes": [{"uri": ["a.jpg"], "width": ["600"]}]}]})
        );
    }

    #[test]
    fn test_attribute_and_child_share_key() {
        let node = el("a").with_attribute("n", "1").with_child(el("n").with_text("2"));
        assert_eq!(map(node), json!({"a": [{"n": ["1", "2"]}]}));
    }

    #[test]
    fn test_empty_values_dropped_by_default() {
        let node = el("r")
            .with_attribute("blank", "")
            .with_child(el("empty"))
            .with_child(el("ws").with_text("  \n "))
            .with_child(el("kept").with_text("k"));
        assert_eq!(map(node), json!({"r": [{"kept": ["k"]}]}));

        assert!(StructureMapper::default().map(el("r").with_child(el("e"))).unwrap().is_none());
    }

    #[test]
    fn test_keep_empty() {
        let mapper = StructureMapper::new(MappingConfig {
            keep_empty: true,
            ..MappingConfig::default()
        });
        let node = el("r").with_attribute("blank", "").with_child(el("empty"));
        let doc = mapper.map(node).unwrap().unwrap();
        assert_eq!(doc.to_json().unwrap(), json!({"r": [{"blank": [""], "empty": [""]}]}));
    }

    #[test]
    fn test_trim_policies() {
        let mixed = || el("p").with_text("  lead ").with_child(el("b").with_text(" bold "));

        assert_eq!(map(mixed()), json!({"p": [{"b": ["bold"], "val": ["  lead "]}]}));

        let all = StructureMapper::new(MappingConfig {
            trim: TrimPolicy::All,
            ..MappingConfig::default()
        });
        assert_eq!(
            all.map(mixed()).unwrap().unwrap().to_json().unwrap(),
            json!({"p": [{"b": ["bold"], "val": ["lead"]}]})
        );

        let never = StructureMapper::new(MappingConfig {
            trim: TrimPolicy::Never,
            ..MappingConfig::default()
        });
        assert_eq!(
            never.map(mixed()).unwrap().unwrap().to_json().unwrap(),
            json!({"p": [{"b": [" bold "], "val": ["  lead "]}]})
        );
    }

    #[test]
    fn test_empty_attribute_name_reports_element_path() {
        let node = el("r").with_child(el("a").with_child(el("b").with_attribute("", "v")));
        match StructureMapper::default().map(node) {
            Err(IngestError::Mapping { path, .. }) => assert_eq!(path, "r/a/b"),
            other => panic!("expected mapping error, got {:?}", other),
        }
    }

    #[test]
    fn test_deeply_nested_branch() {
        const DEPTH: usize = 200_000;
        let mut node = el("d").with_text("x");
        for _ in 1..DEPTH {
            node = el("d").with_child(node);
        }
        let doc = StructureMapper::default()
            .map(el("item").with_child(node))
            .unwrap()
            .unwrap();

        let mut out = Vec::new();
        doc.write_json(&mut out).unwrap();
        let expected = format!(
            "{{\"item\":[{}\"x\"{}]}}",
            "{\"d\":[".repeat(DEPTH),
            "]}".repeat(DEPTH)
        );
        assert!(out == expected.as_bytes());
    }

    #[test]
    fn test_empty_name_is_mapping_error() {
        let node = el("r").with_child(el("a").with_child(el("")));
        match StructureMapper::default().map(node) {
            Err(IngestError::Mapping { path, .. }) => assert_eq!(path, "r/a"),
            other => panic!("expected mapping error, got {:?}", other),
        }
    }
}
