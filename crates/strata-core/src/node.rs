//! Configuration node model
//!
//! A configuration tree is a rooted tree of [`ConfigNode`]s. Each node is
//! one of four variants: a `Value` leaf holding an opaque JSON scalar or
//! array, an `Object` holding an ordered Name-to-child mapping, a
//! `Reference` holding a path to substitute at resolution, or a `Derived`
//! node describing base-object merging plus overrides.
//!
//! Objects exclusively own their children and preserve insertion order
//! across insert/remove/replace, which makes writer output and member
//! iteration deterministic. Trees are plain owned values: cloning a node
//! deep-clones a detached subtree, and the parent relation is derived from
//! a node's location path rather than stored back-pointers (see the
//! resolver's located traversal helpers).

use std::fmt;

use indexmap::IndexMap;
use indexmap::map::Entry;
use serde_json::Value as JsonValue;

use crate::error::StrataError;
use crate::name;
use crate::path::NodePath;
use crate::result::Result;

/// Discriminator for the four node variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Value,
    Object,
    Reference,
    Derived,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NodeKind::Value => "value",
            NodeKind::Object => "object",
            NodeKind::Reference => "reference",
            NodeKind::Derived => "derived object",
        };
        f.write_str(s)
    }
}

/// A node of the configuration tree.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigNode {
    /// A leaf literal: a JSON scalar or array
    Value(JsonValue),
    /// An ordered mapping from Names to owned children
    Object(ObjectNode),
    /// An unresolved alias to another node
    Reference(NodePath),
    /// Pre-resolution inheritance: bases merged in order, then overrides
    Derived(DerivedNode),
}

impl ConfigNode {
    pub fn kind(&self) -> NodeKind {
        match self {
            ConfigNode::Value(_) => NodeKind::Value,
            ConfigNode::Object(_) => NodeKind::Object,
            ConfigNode::Reference(_) => NodeKind::Reference,
            ConfigNode::Derived(_) => NodeKind::Derived,
        }
    }

    pub fn is_value(&self) -> bool {
        matches!(self, ConfigNode::Value(_))
    }

    pub fn is_object(&self) -> bool {
        matches!(self, ConfigNode::Object(_))
    }

    pub fn as_value(&self) -> Option<&JsonValue> {
        match self {
            ConfigNode::Value(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectNode> {
        match self {
            ConfigNode::Object(object) => Some(object),
            _ => None,
        }
    }

    pub fn as_object_mut(&mut self) -> Option<&mut ObjectNode> {
        match self {
            ConfigNode::Object(object) => Some(object),
            _ => None,
        }
    }

    /// Whether this subtree contains no Reference or Derived node.
    pub fn is_fully_resolved(&self) -> bool {
        match self {
            ConfigNode::Value(_) => true,
            ConfigNode::Object(object) => object.is_fully_resolved(),
            ConfigNode::Reference(_) | ConfigNode::Derived(_) => false,
        }
    }
}

/// An ordered mapping from member Names to owned child nodes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectNode {
    members: IndexMap<String, ConfigNode>,
}

impl ObjectNode {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains(&self, member: &str) -> bool {
        self.members.contains_key(member)
    }

    pub fn get(&self, member: &str) -> Option<&ConfigNode> {
        self.members.get(member)
    }

    pub fn get_mut(&mut self, member: &str) -> Option<&mut ConfigNode> {
        self.members.get_mut(member)
    }

    /// Ordered member iteration.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ConfigNode)> {
        self.members.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Member names in insertion order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.members.keys().map(String::as_str)
    }

    /// Insert a new member at the end. Fails on an invalid name or when the
    /// name is already present.
    pub fn insert(&mut self, member: impl Into<String>, node: ConfigNode) -> Result<()> {
        let member = member.into();
        name::validate(&member)?;
        match self.members.entry(member) {
            Entry::Occupied(slot) => Err(StrataError::parse_error(format!(
                "duplicate member '{}'",
                slot.key()
            ))),
            Entry::Vacant(slot) => {
                slot.insert(node);
                Ok(())
            }
        }
    }

    /// Replace an existing member in place, preserving its position.
    pub fn replace(&mut self, member: &str, node: ConfigNode) -> Result<()> {
        match self.members.get_mut(member) {
            Some(slot) => {
                *slot = node;
                Ok(())
            }
            None => Err(StrataError::parse_error(format!(
                "cannot replace missing member '{member}'"
            ))),
        }
    }

    /// Remove a member by name, preserving the order of the remainder.
    pub fn remove(&mut self, member: &str) -> Option<ConfigNode> {
        self.members.shift_remove(member)
    }

    /// Walk a path downward from this object.
    ///
    /// Absolute paths treat this object as the document root. Relative
    /// paths must be purely downward; a leading `..` or an alias anchor
    /// cannot be resolved without resolution context and yields `None`, as
    /// does any step through a non-object or a missing member.
    pub fn node_at(&self, path: &NodePath) -> Option<&ConfigNode> {
        if path.is_alias() {
            return None;
        }
        let mut segments = path.segments().iter();
        let first = match segments.next() {
            Some(first) => first,
            None => return None,
        };
        if first == crate::path::PARENT_SEGMENT {
            return None;
        }
        let mut current = self.get(first)?;
        for segment in segments {
            current = current.as_object()?.get(segment)?;
        }
        Some(current)
    }

    /// Convenience accessor for a `Value` payload at `path`.
    pub fn value_at(&self, path: &NodePath) -> Option<&JsonValue> {
        self.node_at(path)?.as_value()
    }

    /// Whether every subtree member is free of Reference and Derived nodes.
    pub fn is_fully_resolved(&self) -> bool {
        self.members.values().all(ConfigNode::is_fully_resolved)
    }

    /// Merge `other` into `self` for document assembly: objects merge
    /// member-wise and recursively, anything else colliding with an
    /// existing member is fatal. On collision the offending member path
    /// (relative to `prefix`) is returned for error reporting.
    pub(crate) fn attach(
        &mut self,
        other: ObjectNode,
        prefix: &str,
    ) -> std::result::Result<(), String> {
        for (member, node) in other.members {
            match self.members.entry(member) {
                Entry::Occupied(mut slot) => {
                    let at = format!("{prefix}/{}", slot.key());
                    match (slot.get_mut(), node) {
                        (ConfigNode::Object(existing), ConfigNode::Object(incoming)) => {
                            existing.attach(incoming, &at)?;
                        }
                        _ => return Err(at),
                    }
                }
                Entry::Vacant(slot) => {
                    slot.insert(node);
                }
            }
        }
        Ok(())
    }

    /// Merge `other` into `self` using derivation rules: a missing member is
    /// inserted at the end; when both sides are objects they merge
    /// recursively; otherwise the incoming side replaces the existing
    /// member in place.
    pub fn merge_from(&mut self, other: ObjectNode) {
        for (member, incoming) in other.members {
            match self.members.entry(member) {
                Entry::Occupied(mut slot) => {
                    let both_objects = slot.get().is_object() && incoming.is_object();
                    if both_objects {
                        if let (ConfigNode::Object(existing), ConfigNode::Object(merged)) =
                            (slot.get_mut(), incoming)
                        {
                            existing.merge_from(merged);
                        }
                    } else {
                        slot.insert(incoming);
                    }
                }
                Entry::Vacant(slot) => {
                    slot.insert(incoming);
                }
            }
        }
    }
}

impl IntoIterator for ObjectNode {
    type Item = (String, ConfigNode);
    type IntoIter = indexmap::map::IntoIter<String, ConfigNode>;

    fn into_iter(self) -> Self::IntoIter {
        self.members.into_iter()
    }
}

/// Pre-resolution inheritance: an ordered base list plus overrides.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedNode {
    bases: Vec<NodePath>,
    overrides: ObjectNode,
}

impl DerivedNode {
    /// A derived object needs at least one base.
    pub fn new(bases: Vec<NodePath>, overrides: ObjectNode) -> Result<Self> {
        if bases.is_empty() {
            return Err(StrataError::parse_error(
                "derived object has an empty base list",
            ));
        }
        Ok(Self { bases, overrides })
    }

    pub fn bases(&self) -> &[NodePath] {
        &self.bases
    }

    pub fn overrides(&self) -> &ObjectNode {
        &self.overrides
    }

    pub fn into_overrides(self) -> ObjectNode {
        self.overrides
    }
}
