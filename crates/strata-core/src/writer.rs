//! Canonical JSON emission
//!
//! Serializes a configuration tree back to the document form the reader
//! accepts, using the inverse name-prefix convention: `#name` for Values,
//! `&name` for References (present only when writing a pre-resolution
//! tree), plain names for Objects and DerivedObjects. Member order follows
//! the tree's insertion order; Value payloads pass through verbatim.

use serde_json::{Map, Value as JsonValue};

use crate::node::{ConfigNode, DerivedNode, ObjectNode};
use crate::result::Result;

/// Emit a full document: `{"config": ...}`.
pub fn to_document(root: &ObjectNode) -> JsonValue {
    let mut doc = Map::new();
    doc.insert("config".to_string(), to_json(root));
    JsonValue::Object(doc)
}

/// Emit the configuration object itself.
pub fn to_json(root: &ObjectNode) -> JsonValue {
    emit_object(root)
}

/// Emit a full document as pretty-printed JSON text.
pub fn to_document_string(root: &ObjectNode) -> Result<String> {
    Ok(serde_json::to_string_pretty(&to_document(root))?)
}

fn emit_object(object: &ObjectNode) -> JsonValue {
    let mut map = Map::new();
    for (member, node) in object.iter() {
        match node {
            ConfigNode::Value(value) => {
                map.insert(format!("#{member}"), value.clone());
            }
            ConfigNode::Reference(path) => {
                map.insert(format!("&{member}"), JsonValue::String(path.to_string()));
            }
            ConfigNode::Object(inner) => {
                map.insert(member.to_string(), emit_object(inner));
            }
            ConfigNode::Derived(derived) => {
                map.insert(member.to_string(), emit_derived(derived));
            }
        }
    }
    JsonValue::Object(map)
}

fn emit_derived(derived: &DerivedNode) -> JsonValue {
    let mut map = Map::new();
    let base = if derived.bases().len() == 1 {
        JsonValue::String(derived.bases()[0].to_string())
    } else {
        JsonValue::Array(
            derived
                .bases()
                .iter()
                .map(|b| JsonValue::String(b.to_string()))
                .collect(),
        )
    };
    map.insert("base".to_string(), base);
    if let JsonValue::Object(overrides) = emit_object(derived.overrides()) {
        for (member, value) in overrides {
            map.insert(member, value);
        }
    }
    JsonValue::Object(map)
}
