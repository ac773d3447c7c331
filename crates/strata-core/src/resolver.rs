//! Reference and derivation resolution
//!
//! The resolver runs after reading completes and rewrites the tree until no
//! Reference or Derived node remains. It iterates in passes: every pass
//! walks a read-only snapshot of the tree in document order (parents before
//! children, objects in insertion order), computes the set of rewrites that
//! can be performed, and commits them afterwards, so reads within a pass
//! never observe writes from the same pass.
//!
//! A Reference target or a derivation base is only consumed once its whole
//! subtree is free of unresolved nodes; until then the dependent node is
//! deferred to a later pass. Deep clones are therefore always fully
//! resolved and relative paths inside copied subtrees never re-resolve
//! against their new location.
//!
//! A pass that fails to reduce the number of unresolved nodes while some
//! remain means a cycle or a dangling reference; resolution fails listing
//! every remaining node together with its target path. A hard pass cap
//! bounds pathological inputs.

use indexmap::IndexMap;
use tracing::debug;

use crate::error::{StrataError, UnresolvedNode};
use crate::node::{ConfigNode, DerivedNode, ObjectNode};
use crate::path::{NodePath, PathRoot};
use crate::result::Result;

/// Default bound on resolver passes.
pub const DEFAULT_MAX_PASSES: usize = 64;

/// Fixed-point resolver for a configuration tree.
#[derive(Debug, Clone)]
pub struct Resolver {
    aliases: IndexMap<String, ConfigNode>,
    max_passes: usize,
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new()
    }
}

impl Resolver {
    pub fn new() -> Self {
        Self {
            aliases: IndexMap::new(),
            max_passes: DEFAULT_MAX_PASSES,
        }
    }

    /// Resolver with include-alias roots consulted before normal traversal.
    pub fn with_aliases(aliases: IndexMap<String, ObjectNode>) -> Self {
        Self {
            aliases: aliases
                .into_iter()
                .map(|(alias, object)| (alias, ConfigNode::Object(object)))
                .collect(),
            max_passes: DEFAULT_MAX_PASSES,
        }
    }

    /// Override the pass cap.
    pub fn max_passes(mut self, max_passes: usize) -> Self {
        self.max_passes = max_passes.max(1);
        self
    }

    /// Resolve `root`, consuming it and producing a tree with no Reference
    /// or Derived node. On failure the partial tree is dropped.
    pub fn resolve(&self, root: ObjectNode) -> Result<ObjectNode> {
        let mut tree = root;
        let mut remaining = count_unresolved(&tree);
        if remaining == 0 {
            return Ok(tree);
        }

        for pass in 1..=self.max_passes {
            let snapshot = ConfigNode::Object(tree.clone());
            let mut rewrites: Vec<(NodePath, ConfigNode)> = Vec::new();
            let mut pending: Vec<UnresolvedNode> = Vec::new();

            if let ConfigNode::Object(snapshot_root) = &snapshot {
                self.collect(&snapshot, snapshot_root, &NodePath::root(), &mut rewrites, &mut pending)?;
            }

            for (location, node) in rewrites {
                commit(&mut tree, &location, node)?;
            }

            let now = count_unresolved(&tree);
            debug!(pass, resolved = remaining - now, remaining = now, "resolver pass");
            if now == 0 {
                return Ok(tree);
            }
            if now >= remaining {
                return Err(StrataError::cycle_error(pending));
            }
            remaining = now;
        }

        let mut leftovers = Vec::new();
        unresolved_nodes(&tree, &NodePath::root(), &mut leftovers);
        Err(StrataError::cycle_error(leftovers))
    }

    /// Walk one pass over the snapshot, recording rewrites and deferrals.
    fn collect(
        &self,
        snapshot: &ConfigNode,
        object: &ObjectNode,
        location: &NodePath,
        rewrites: &mut Vec<(NodePath, ConfigNode)>,
        pending: &mut Vec<UnresolvedNode>,
    ) -> Result<()> {
        for (member, child) in object.iter() {
            let child_location = location.child(member);
            match child {
                ConfigNode::Value(_) => {}
                ConfigNode::Object(inner) => {
                    self.collect(snapshot, inner, &child_location, rewrites, pending)?;
                }
                ConfigNode::Reference(target) => {
                    match self.locate(snapshot, location, target)? {
                        Some(node) if node.is_fully_resolved() => {
                            rewrites.push((child_location, node.clone()));
                        }
                        _ => pending.push(UnresolvedNode {
                            location: child_location.to_string(),
                            target: target.to_string(),
                        }),
                    }
                }
                ConfigNode::Derived(derived) => {
                    self.materialize(snapshot, location, &child_location, derived, rewrites, pending)?;
                }
            }
        }
        Ok(())
    }

    /// Merge a derived node's bases and overrides once every base resolves
    /// to a fully-resolved object. A base that resolves to anything else is
    /// a merge error; a base that is missing or still unresolved defers the
    /// whole node.
    fn materialize(
        &self,
        snapshot: &ConfigNode,
        parent: &NodePath,
        location: &NodePath,
        derived: &DerivedNode,
        rewrites: &mut Vec<(NodePath, ConfigNode)>,
        pending: &mut Vec<UnresolvedNode>,
    ) -> Result<()> {
        let mut merged = ObjectNode::new();
        for base in derived.bases() {
            match self.locate(snapshot, parent, base)? {
                Some(node) if node.is_fully_resolved() => match node.as_object() {
                    Some(object) => merged.merge_from(object.clone()),
                    None => {
                        return Err(StrataError::merge_error(
                            location.to_string(),
                            base.to_string(),
                        ));
                    }
                },
                _ => {
                    pending.push(UnresolvedNode {
                        location: location.to_string(),
                        target: base.to_string(),
                    });
                    return Ok(());
                }
            }
        }
        merged.merge_from(derived.overrides().clone());
        rewrites.push((location.clone(), ConfigNode::Object(merged)));
        Ok(())
    }

    /// Locate a target node in the snapshot. Alias-anchored paths consult
    /// the alias table before any tree traversal; relative paths are
    /// composed with the containing object's location, which surfaces a
    /// path error when `..` escapes the document root.
    fn locate<'a>(
        &'a self,
        snapshot: &'a ConfigNode,
        parent: &NodePath,
        target: &NodePath,
    ) -> Result<Option<&'a ConfigNode>> {
        if let PathRoot::Alias(alias) = target.root_kind() {
            return Ok(self
                .aliases
                .get(alias)
                .and_then(|root| walk(root, target.segments())));
        }
        let absolute = if target.is_absolute() {
            target.clone()
        } else {
            parent.append(target)?
        };
        Ok(walk(snapshot, absolute.segments()))
    }
}

fn walk<'a>(start: &'a ConfigNode, segments: &[String]) -> Option<&'a ConfigNode> {
    let mut current = start;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// Replace the child slot at `location`, preserving name and position.
fn commit(tree: &mut ObjectNode, location: &NodePath, node: ConfigNode) -> Result<()> {
    let (last, parents) = location.segments().split_last().ok_or_else(|| {
        StrataError::path_error(location.to_string(), "cannot rewrite the document root")
    })?;
    let mut current = tree;
    for segment in parents {
        current = current
            .get_mut(segment)
            .and_then(ConfigNode::as_object_mut)
            .ok_or_else(|| {
                StrataError::path_error(location.to_string(), "rewrite slot disappeared during commit")
            })?;
    }
    current.replace(last, node)
}

fn count_unresolved(object: &ObjectNode) -> usize {
    object
        .iter()
        .map(|(_, child)| match child {
            ConfigNode::Value(_) => 0,
            ConfigNode::Object(inner) => count_unresolved(inner),
            ConfigNode::Reference(_) => 1,
            ConfigNode::Derived(derived) => 1 + count_unresolved(derived.overrides()),
        })
        .sum()
}

fn unresolved_nodes(object: &ObjectNode, location: &NodePath, out: &mut Vec<UnresolvedNode>) {
    for (member, child) in object.iter() {
        let child_location = location.child(member);
        match child {
            ConfigNode::Value(_) => {}
            ConfigNode::Object(inner) => unresolved_nodes(inner, &child_location, out),
            ConfigNode::Reference(target) => out.push(UnresolvedNode {
                location: child_location.to_string(),
                target: target.to_string(),
            }),
            ConfigNode::Derived(derived) => {
                out.push(UnresolvedNode {
                    location: child_location.to_string(),
                    target: derived.bases()[0].to_string(),
                });
                unresolved_nodes(derived.overrides(), &child_location, out);
            }
        }
    }
}
