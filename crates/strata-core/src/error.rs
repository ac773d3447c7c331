//! Error types and handling for configuration loading and resolution

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// A node left unresolved after the resolver reached a fixed point.
///
/// Carries the absolute location of the offending node and the target path
/// it could not resolve, so cycles and dangling references can be diagnosed
/// directly from the error message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnresolvedNode {
    /// Absolute location of the unresolved node in the tree
    pub location: String,
    /// The reference or derivation base path that failed to resolve
    pub target: String,
}

impl fmt::Display for UnresolvedNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.location, self.target)
    }
}

fn fmt_unresolved(nodes: &[UnresolvedNode]) -> String {
    let items: Vec<String> = nodes.iter().map(UnresolvedNode::to_string).collect();
    items.join(", ")
}

/// Main error type for configuration operations
#[derive(Debug, Error)]
pub enum StrataError {
    /// An identifier that does not match Name syntax
    #[error("invalid name '{name}'")]
    NameError { name: String },

    /// Malformed path text or traversal escaping the root
    #[error("path error in '{path}': {message}")]
    PathError { path: String, message: String },

    /// Malformed document, wrong member shape, or forbidden collision
    #[error("parse error: {message}")]
    ParseError { message: String },

    /// Unknown or malformed `${...}` substitution
    #[error("environment variable error for '{name}': {message}")]
    EnvError { name: String, message: String },

    /// Include file missing/unreadable or destination collision
    #[error("include error for '{path}': {message}")]
    IncludeError { path: String, message: String },

    /// A derivation base resolved to something other than an object
    #[error("merge error at '{location}': base '{target}' does not resolve to an object")]
    MergeError { location: String, target: String },

    /// Unresolved nodes remain after a non-productive resolver pass.
    ///
    /// Reports cycles and dangling references together, one entry per
    /// remaining node.
    #[error("resolution stalled with {} unresolved node(s): {}", .nodes.len(), fmt_unresolved(.nodes))]
    CycleError { nodes: Vec<UnresolvedNode> },

    /// Consumer-supplied validator or typed-binding failure
    #[error("validation error for '{name}': {message}")]
    ValidationError { name: String, message: String },

    /// File system I/O errors
    #[error("IO error for path '{path}': {source}")]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Error kind enumeration for categorizing errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Name,
    Path,
    Parse,
    Env,
    Include,
    Merge,
    Cycle,
    Validation,
    Io,
}

impl StrataError {
    /// Get the error kind for this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            StrataError::NameError { .. } => ErrorKind::Name,
            StrataError::PathError { .. } => ErrorKind::Path,
            StrataError::ParseError { .. } => ErrorKind::Parse,
            StrataError::EnvError { .. } => ErrorKind::Env,
            StrataError::IncludeError { .. } => ErrorKind::Include,
            StrataError::MergeError { .. } => ErrorKind::Merge,
            StrataError::CycleError { .. } => ErrorKind::Cycle,
            StrataError::ValidationError { .. } => ErrorKind::Validation,
            StrataError::IoError { .. } => ErrorKind::Io,
        }
    }

    /// Create a name error
    pub fn name_error(name: impl Into<String>) -> Self {
        Self::NameError { name: name.into() }
    }

    /// Create a path error
    pub fn path_error(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::PathError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a parse error
    pub fn parse_error(message: impl Into<String>) -> Self {
        Self::ParseError {
            message: message.into(),
        }
    }

    /// Create an environment variable error
    pub fn env_error(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::EnvError {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Create an include error
    pub fn include_error(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::IncludeError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a merge error
    pub fn merge_error(location: impl Into<String>, target: impl Into<String>) -> Self {
        Self::MergeError {
            location: location.into(),
            target: target.into(),
        }
    }

    /// Create a cycle/unresolved error
    pub fn cycle_error(nodes: Vec<UnresolvedNode>) -> Self {
        Self::CycleError { nodes }
    }

    /// Create a validation error
    pub fn validation_error(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ValidationError {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Create an IO error with path context
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::IoError {
            path: path.into(),
            source,
        }
    }
}

/// Convert from std::io::Error
impl From<std::io::Error> for StrataError {
    fn from(err: std::io::Error) -> Self {
        Self::IoError {
            path: PathBuf::new(),
            source: err,
        }
    }
}

/// Convert from serde_json::Error
impl From<serde_json::Error> for StrataError {
    fn from(err: serde_json::Error) -> Self {
        Self::ParseError {
            message: err.to_string(),
        }
    }
}
