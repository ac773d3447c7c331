//! Node path language
//!
//! Paths address nodes within a configuration tree. They are `/`-separated
//! sequences of Names with `..` denoting parent traversal. A leading `/`
//! makes a path absolute (anchored at the document root); otherwise it is
//! relative to some object. A first segment of the form `$name` anchors the
//! path at an include alias instead (see the reader), making sibling
//! documents addressable during resolution.
//!
//! Paths are immutable values, compare structurally, and are stored
//! normalized: adjacent `name/..` pairs are collapsed at parse and append
//! time, so a `..` segment survives only at the front of a relative path.

use std::fmt;
use std::str::FromStr;

use crate::error::StrataError;
use crate::name;
use crate::result::Result;

/// The parent-traversal segment.
pub const PARENT_SEGMENT: &str = "..";

/// Where a path is anchored.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathRoot {
    /// Anchored at the document root (leading `/`)
    Absolute,
    /// Anchored at some object supplied at resolution time
    Relative,
    /// Anchored at the root of an include alias (`$name/...`)
    Alias(String),
}

/// An immutable, normalized node path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodePath {
    root: PathRoot,
    segments: Vec<String>,
}

impl NodePath {
    /// The canonical root path `/`.
    pub fn root() -> Self {
        Self {
            root: PathRoot::Absolute,
            segments: Vec::new(),
        }
    }

    /// Parse a path from its textual form.
    ///
    /// Empty text is invalid, as is any empty non-leading segment. Every
    /// segment must be `..` or satisfy Name syntax; `$name` is accepted as
    /// the first segment of a non-absolute path. The parsed path is
    /// normalized, and normalization must not escape the root of an
    /// absolute or alias-anchored path.
    pub fn parse(text: &str) -> Result<Self> {
        if text.is_empty() {
            return Err(StrataError::path_error(text, "empty path"));
        }

        let (mut root, rest) = match text.strip_prefix('/') {
            Some(rest) => (PathRoot::Absolute, rest),
            None => (PathRoot::Relative, text),
        };
        if root == PathRoot::Absolute && rest.is_empty() {
            return Ok(Self::root());
        }

        let mut raw: Vec<&str> = rest.split('/').collect();
        if root == PathRoot::Relative {
            if let Some(alias) = raw.first().and_then(|s| s.strip_prefix('$')) {
                name::validate(alias)?;
                root = PathRoot::Alias(alias.to_string());
                raw.remove(0);
            }
        }

        let mut segments = Vec::with_capacity(raw.len());
        for segment in raw {
            if segment.is_empty() {
                return Err(StrataError::path_error(text, "empty segment"));
            }
            if segment != PARENT_SEGMENT {
                name::validate(segment)?;
            }
            segments.push(segment.to_string());
        }

        let segments = normalize(&root, segments, text)?;
        Ok(Self { root, segments })
    }

    /// Compose `self` followed by `other`.
    ///
    /// If `other` is not relative the result is `other` unchanged. Otherwise
    /// the segments are concatenated and normalized; collapsing past the
    /// root of an absolute or alias-anchored path is a path error.
    pub fn append(&self, other: &NodePath) -> Result<NodePath> {
        if !other.is_relative() {
            return Ok(other.clone());
        }
        let mut segments = self.segments.clone();
        segments.extend(other.segments.iter().cloned());
        let context = format!("{self} + {other}");
        let segments = normalize(&self.root, segments, &context)?;
        Ok(NodePath {
            root: self.root.clone(),
            segments,
        })
    }

    /// Extend this path by one (already validated) member name.
    pub(crate) fn child(&self, member: &str) -> NodePath {
        let mut segments = self.segments.clone();
        segments.push(member.to_string());
        NodePath {
            root: self.root.clone(),
            segments,
        }
    }

    pub fn root_kind(&self) -> &PathRoot {
        &self.root
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn is_absolute(&self) -> bool {
        self.root == PathRoot::Absolute
    }

    pub fn is_relative(&self) -> bool {
        self.root == PathRoot::Relative
    }

    pub fn is_alias(&self) -> bool {
        matches!(self.root, PathRoot::Alias(_))
    }

    /// Whether this is the canonical root path `/`.
    pub fn is_root(&self) -> bool {
        self.is_absolute() && self.segments.is_empty()
    }
}

/// Collapse `name/..` pairs, erroring when `..` would climb past the anchor
/// of an absolute or alias path. Leading `..` segments of relative paths are
/// preserved.
fn normalize(root: &PathRoot, segments: Vec<String>, context: &str) -> Result<Vec<String>> {
    let mut out: Vec<String> = Vec::with_capacity(segments.len());
    for segment in segments {
        if segment == PARENT_SEGMENT {
            match out.last() {
                Some(last) if last != PARENT_SEGMENT => {
                    out.pop();
                }
                _ if *root == PathRoot::Relative => out.push(segment),
                _ => {
                    return Err(StrataError::path_error(context, "path escapes the root"));
                }
            }
        } else {
            out.push(segment);
        }
    }
    Ok(out)
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.root {
            PathRoot::Absolute => write!(f, "/{}", self.segments.join("/")),
            PathRoot::Relative => write!(f, "{}", self.segments.join("/")),
            PathRoot::Alias(alias) => {
                write!(f, "${alias}")?;
                if !self.segments.is_empty() {
                    write!(f, "/{}", self.segments.join("/"))?;
                }
                Ok(())
            }
        }
    }
}

impl FromStr for NodePath {
    type Err = StrataError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
