//! Document reading
//!
//! The reader turns raw JSON documents into unresolved configuration trees.
//! A document is a top-level JSON object with a required `config` member and
//! optional `env` and `includes` members:
//!
//! ```json
//! {
//!   "env": { "STAGE": "prod" },
//!   "includes": [
//!     { "type": "file", "path": "common.json", "destination_node": "/common" }
//!   ],
//!   "config": {
//!     "#name": "service-${STAGE}",
//!     "&alias": "/common/defaults",
//!     "derived": { "base": "/common/defaults", "#retries": 5 }
//!   }
//! }
//! ```
//!
//! Member names are sigil-keyed: `#name` builds a Value leaf, `&name` builds
//! a Reference whose string payload is parsed as a path, and a plain name
//! with an object payload builds an Object, or a DerivedObject when the
//! payload carries a `base` member. String values are env-expanded while the
//! tree is built.
//!
//! `env` entries are expanded (against the process environment and any
//! overrides injected by outer documents, never against their own siblings)
//! and injected before the first include is opened; includes are then read
//! in listed order by a recursive reader sharing the same expander. Each
//! include's document is remapped from its `source_node` to its
//! `destination_node` and attached to the including document, and its root
//! is registered under the `$<file-stem>` alias for cross-document
//! references. The document's own `config` is attached last; all attachment
//! collisions except object-into-object merging are fatal.

use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use tracing::debug;

use crate::env::EnvExpander;
use crate::error::StrataError;
use crate::name;
use crate::node::{ConfigNode, DerivedNode, ObjectNode};
use crate::path::NodePath;
use crate::resolver::{DEFAULT_MAX_PASSES, Resolver};
use crate::result::Result;

/// Bound on include nesting; exceeding it means an include cycle.
pub const MAX_INCLUDE_DEPTH: usize = 32;

/// An include descriptor from the `includes` array.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct IncludeSpec {
    #[serde(rename = "type")]
    kind: IncludeKind,
    #[serde(default)]
    path: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default = "root_path_text")]
    source_node: String,
    #[serde(default = "root_path_text")]
    destination_node: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum IncludeKind {
    File,
    #[serde(alias = "environment-variable")]
    EnvironmentVariable,
}

fn root_path_text() -> String {
    "/".to_string()
}

/// A fully-read document tree whose references are not yet resolved.
#[derive(Debug, Clone)]
pub struct UnresolvedConfig {
    root: ObjectNode,
    aliases: IndexMap<String, ObjectNode>,
    max_passes: usize,
}

impl UnresolvedConfig {
    pub fn root(&self) -> &ObjectNode {
        &self.root
    }

    pub fn into_root(self) -> ObjectNode {
        self.root
    }

    /// Alias names registered while reading, in registration order.
    pub fn alias_names(&self) -> impl Iterator<Item = &str> {
        self.aliases.keys().map(String::as_str)
    }

    /// Run the resolver over this tree.
    pub fn resolve(self) -> Result<ObjectNode> {
        Resolver::with_aliases(self.aliases)
            .max_passes(self.max_passes)
            .resolve(self.root)
    }
}

/// Reads configuration documents into unresolved trees.
pub struct ConfigReader {
    working_dir: PathBuf,
    expander: EnvExpander,
    max_passes: usize,
}

impl ConfigReader {
    /// Reader over the process environment, resolving include paths against
    /// `working_dir`.
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self::with_expander(working_dir, EnvExpander::from_process_env())
    }

    /// Reader with an explicit environment expander.
    pub fn with_expander(working_dir: impl Into<PathBuf>, expander: EnvExpander) -> Self {
        Self {
            working_dir: working_dir.into(),
            expander,
            max_passes: DEFAULT_MAX_PASSES,
        }
    }

    /// Override the resolver pass cap used by [`ConfigReader::load`].
    pub fn max_passes(mut self, max_passes: usize) -> Self {
        self.max_passes = max_passes;
        self
    }

    /// Read a document file into an unresolved tree.
    pub fn read(&mut self, file: impl AsRef<Path>) -> Result<UnresolvedConfig> {
        let path = self.locate_file(file.as_ref());
        let mut aliases = IndexMap::new();
        let root = self.read_file(&path, &NodePath::root(), &NodePath::root(), &mut aliases, 0)?;
        Ok(UnresolvedConfig {
            root,
            aliases,
            max_passes: self.max_passes,
        })
    }

    /// Read an in-memory document into an unresolved tree. Includes are
    /// still resolved against the working directory.
    pub fn read_str(&mut self, document: &str) -> Result<UnresolvedConfig> {
        let raw: JsonValue = serde_json::from_str(document)?;
        let mut aliases = IndexMap::new();
        let root = self.read_document(raw, "<inline>", &mut aliases, 0)?;
        Ok(UnresolvedConfig {
            root,
            aliases,
            max_passes: self.max_passes,
        })
    }

    /// Read and resolve a document file.
    pub fn load(&mut self, file: impl AsRef<Path>) -> Result<ObjectNode> {
        self.read(file)?.resolve()
    }

    /// Read and resolve an in-memory document.
    pub fn load_str(&mut self, document: &str) -> Result<ObjectNode> {
        self.read_str(document)?.resolve()
    }

    fn locate_file(&self, file: &Path) -> PathBuf {
        if file.is_absolute() {
            file.to_path_buf()
        } else {
            self.working_dir.join(file)
        }
    }

    fn read_file(
        &mut self,
        path: &Path,
        source: &NodePath,
        destination: &NodePath,
        aliases: &mut IndexMap<String, ObjectNode>,
        depth: usize,
    ) -> Result<ObjectNode> {
        if depth > MAX_INCLUDE_DEPTH {
            return Err(StrataError::include_error(
                path.display().to_string(),
                format!("include depth exceeds {MAX_INCLUDE_DEPTH} (include cycle?)"),
            ));
        }
        debug!(file = %path.display(), depth, "reading configuration document");
        let text = fs::read_to_string(path).map_err(|source_err| {
            if depth == 0 {
                StrataError::io_error(path, source_err)
            } else {
                StrataError::include_error(path.display().to_string(), source_err.to_string())
            }
        })?;
        let raw: JsonValue = serde_json::from_str(&text)
            .map_err(|e| StrataError::parse_error(format!("{}: {e}", path.display())))?;
        let origin = path.display().to_string();
        let root = self.read_document(raw, &origin, aliases, depth)?;

        // expose the document root (pre-remap) to later siblings and the
        // including document under $<file-stem>
        if depth > 0 {
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                if name::is_valid(stem) {
                    debug!(alias = %format!("${stem}"), file = %path.display(), "registered include alias");
                    aliases.insert(stem.to_string(), root.clone());
                } else {
                    debug!(file = %path.display(), "file stem is not a valid alias name, skipping alias");
                }
            }
        }

        remap(root, source, destination, &origin)
    }

    fn read_document(
        &mut self,
        raw: JsonValue,
        origin: &str,
        aliases: &mut IndexMap<String, ObjectNode>,
        depth: usize,
    ) -> Result<ObjectNode> {
        let JsonValue::Object(mut doc) = raw else {
            return Err(StrataError::parse_error(format!(
                "{origin}: document is not a JSON object"
            )));
        };
        for key in doc.keys() {
            if !matches!(key.as_str(), "config" | "env" | "includes") {
                return Err(StrataError::parse_error(format!(
                    "{origin}: unknown top-level member '{key}'"
                )));
            }
        }

        // env overrides are injected before any include is opened
        if let Some(env) = doc.get("env") {
            self.inject_env_overrides(env, origin)?;
        }

        let mut root = ObjectNode::new();
        if let Some(includes) = doc.get("includes") {
            let JsonValue::Array(entries) = includes else {
                return Err(StrataError::parse_error(format!(
                    "{origin}: 'includes' must be an array"
                )));
            };
            for (index, entry) in entries.iter().enumerate() {
                self.read_include(entry, index, origin, &mut root, aliases, depth)?;
            }
        }

        let Some(config) = doc.remove("config") else {
            return Err(StrataError::parse_error(format!(
                "{origin}: missing required member 'config'"
            )));
        };
        let own = self.parse_config_object(&config, origin)?;
        root.attach(own, "").map_err(|member| {
            StrataError::parse_error(format!(
                "{origin}: member '{member}' collides with included configuration"
            ))
        })?;

        Ok(root)
    }

    /// Expand and inject one document's `env` section. Every value is
    /// expanded against the expander state as of section entry, so entries
    /// may chain off outer variables but never off their own siblings.
    fn inject_env_overrides(&mut self, env: &JsonValue, origin: &str) -> Result<()> {
        let JsonValue::Object(entries) = env else {
            return Err(StrataError::parse_error(format!(
                "{origin}: 'env' must be a JSON object"
            )));
        };
        let mut expanded = Vec::with_capacity(entries.len());
        for (key, value) in entries {
            name::validate(key)?;
            let text = match value {
                JsonValue::String(s) => self.expander.expand(s)?,
                JsonValue::Number(n) => n.to_string(),
                JsonValue::Bool(b) => b.to_string(),
                _ => {
                    return Err(StrataError::parse_error(format!(
                        "{origin}: env entry '{key}' must be a scalar"
                    )));
                }
            };
            expanded.push((key.clone(), text));
        }
        for (key, value) in expanded {
            self.expander.set_override(key, value)?;
        }
        Ok(())
    }

    fn read_include(
        &mut self,
        entry: &JsonValue,
        index: usize,
        origin: &str,
        root: &mut ObjectNode,
        aliases: &mut IndexMap<String, ObjectNode>,
        depth: usize,
    ) -> Result<()> {
        let spec: IncludeSpec = serde_json::from_value(entry.clone())
            .map_err(|e| StrataError::parse_error(format!("{origin}: include #{index}: {e}")))?;

        let file = match spec.kind {
            IncludeKind::File => {
                let path = spec.path.ok_or_else(|| {
                    StrataError::parse_error(format!(
                        "{origin}: include #{index} of type 'file' needs a 'path'"
                    ))
                })?;
                self.expander.expand(&path)?
            }
            IncludeKind::EnvironmentVariable => {
                let variable = spec.name.ok_or_else(|| {
                    StrataError::parse_error(format!(
                        "{origin}: include #{index} of type 'environment_variable' needs a 'name'"
                    ))
                })?;
                self.expander
                    .get(&variable)
                    .ok_or_else(|| StrataError::env_error(variable.as_str(), "variable is not set"))?
                    .to_string()
            }
        };

        let source = parse_root_path(&spec.source_node, origin, "source_node")?;
        let destination = parse_root_path(&spec.destination_node, origin, "destination_node")?;
        let path = self.locate_file(Path::new(&file));
        let contribution = self.read_file(&path, &source, &destination, aliases, depth + 1)?;

        root.attach(contribution, "").map_err(|member| {
            StrataError::include_error(file, format!("destination collision at member '{member}'"))
        })
    }

    /// Map a JSON object to configuration members using the name-prefix
    /// convention: `#name` is a Value, `&name` is a Reference, a plain name
    /// is an Object or, when a `base` member is present, a DerivedObject.
    fn parse_config_object(&self, value: &JsonValue, origin: &str) -> Result<ObjectNode> {
        let JsonValue::Object(members) = value else {
            return Err(StrataError::parse_error(format!(
                "{origin}: expected a JSON object of configuration members"
            )));
        };
        let mut object = ObjectNode::new();
        for (key, member_value) in members {
            if let Some(member) = key.strip_prefix('#') {
                object.insert(member, self.parse_value(member_value, origin, member)?)?;
            } else if let Some(member) = key.strip_prefix('&') {
                let JsonValue::String(text) = member_value else {
                    return Err(StrataError::parse_error(format!(
                        "{origin}: reference '{key}' must hold a path string"
                    )));
                };
                object.insert(member, ConfigNode::Reference(NodePath::parse(text)?))?;
            } else {
                let JsonValue::Object(sub) = member_value else {
                    return Err(StrataError::parse_error(format!(
                        "{origin}: member '{key}' must hold an object (value members use the '#' prefix)"
                    )));
                };
                let node = if let Some(base_value) = sub.get("base") {
                    self.parse_derived(sub, base_value, origin, key)?
                } else {
                    ConfigNode::Object(self.parse_config_object(member_value, origin)?)
                };
                object.insert(key.as_str(), node)?;
            }
        }
        Ok(object)
    }

    fn parse_value(&self, value: &JsonValue, origin: &str, member: &str) -> Result<ConfigNode> {
        match value {
            JsonValue::Object(_) => Err(StrataError::parse_error(format!(
                "{origin}: value member '{member}' cannot hold an object"
            ))),
            JsonValue::String(text) => Ok(ConfigNode::Value(JsonValue::String(
                self.expander.expand(text)?,
            ))),
            other => Ok(ConfigNode::Value(other.clone())),
        }
    }

    fn parse_derived(
        &self,
        sub: &serde_json::Map<String, JsonValue>,
        base_value: &JsonValue,
        origin: &str,
        key: &str,
    ) -> Result<ConfigNode> {
        let mut bases = Vec::new();
        match base_value {
            JsonValue::String(text) => bases.push(NodePath::parse(text)?),
            JsonValue::Array(entries) => {
                for entry in entries {
                    let JsonValue::String(text) = entry else {
                        return Err(StrataError::parse_error(format!(
                            "{origin}: derived member '{key}': base entries must be path strings"
                        )));
                    };
                    bases.push(NodePath::parse(text)?);
                }
            }
            _ => {
                return Err(StrataError::parse_error(format!(
                    "{origin}: derived member '{key}': 'base' must be a path string or array of path strings"
                )));
            }
        }
        if bases.is_empty() {
            return Err(StrataError::parse_error(format!(
                "{origin}: derived member '{key}' has an empty base list"
            )));
        }

        let mut remaining = serde_json::Map::new();
        for (k, v) in sub {
            if k != "base" {
                remaining.insert(k.clone(), v.clone());
            }
        }
        let overrides = self.parse_config_object(&JsonValue::Object(remaining), origin)?;
        Ok(ConfigNode::Derived(DerivedNode::new(bases, overrides)?))
    }
}

fn parse_root_path(text: &str, origin: &str, field: &str) -> Result<NodePath> {
    let path = NodePath::parse(text)?;
    if !path.is_absolute() {
        return Err(StrataError::parse_error(format!(
            "{origin}: '{field}' must be an absolute path, got '{text}'"
        )));
    }
    Ok(path)
}

/// Detach the `source` subtree from a freshly-read document and re-root it
/// under `destination`, creating intermediate objects as needed.
fn remap(
    root: ObjectNode,
    source: &NodePath,
    destination: &NodePath,
    origin: &str,
) -> Result<ObjectNode> {
    if source.is_root() && destination.is_root() {
        return Ok(root);
    }

    let subtree = if source.is_root() {
        ConfigNode::Object(root)
    } else {
        let mut current = ConfigNode::Object(root);
        for segment in source.segments() {
            let ConfigNode::Object(mut object) = current else {
                return Err(StrataError::include_error(
                    origin.to_string(),
                    format!("source node '{source}' walks through a non-object"),
                ));
            };
            current = object.remove(segment).ok_or_else(|| {
                StrataError::include_error(
                    origin.to_string(),
                    format!("source node '{source}' not found"),
                )
            })?;
        }
        current
    };

    if destination.is_root() {
        return match subtree {
            ConfigNode::Object(object) => Ok(object),
            other => Err(StrataError::include_error(
                origin.to_string(),
                format!(
                    "source node '{source}' is a {} but destination '/' requires an object",
                    other.kind()
                ),
            )),
        };
    }

    let mut result = ObjectNode::new();
    let (last, parents) = destination
        .segments()
        .split_last()
        .ok_or_else(|| {
            StrataError::parse_error(format!("{origin}: empty destination path"))
        })?;
    let mut cursor = &mut result;
    for segment in parents {
        cursor.insert(segment.as_str(), ConfigNode::Object(ObjectNode::new()))?;
        cursor = cursor
            .get_mut(segment)
            .and_then(ConfigNode::as_object_mut)
            .ok_or_else(|| {
                StrataError::parse_error(format!(
                    "{origin}: failed to create destination '{destination}'"
                ))
            })?;
    }
    cursor.insert(last.as_str(), subtree)?;
    Ok(result)
}
