//! Strata Core
//!
//! Core engine for layered, reference-resolving configuration trees.
//! This crate parses JSON configuration documents extended with typed node
//! kinds, cross-file includes, and a node path language; expands
//! environment-variable substitutions; resolves all references and
//! derivations to a canonical tree; and projects resolved trees onto
//! strongly-typed records.

pub mod env;
pub mod error;
pub mod item;
pub mod name;
pub mod node;
pub mod path;
pub mod reader;
pub mod resolver;
pub mod result;
pub mod writer;

// Re-export commonly used types
pub use env::EnvExpander;
pub use error::{ErrorKind, StrataError, UnresolvedNode};
pub use item::{
    ConfigItem, FromConfigValue, ToConfigValue, load_optional, load_optional_item,
    load_optional_item_at_path, load_optional_map, load_optional_sequence,
    load_optional_validated, load_required, load_required_item, load_required_item_at_path,
    load_required_map, load_required_sequence, load_required_validated, range_validator,
    store_item, store_item_at_path, store_map, store_value, store_value_at_path,
};
pub use node::{ConfigNode, DerivedNode, NodeKind, ObjectNode};
pub use path::{NodePath, PathRoot};
pub use reader::{ConfigReader, UnresolvedConfig};
pub use resolver::{DEFAULT_MAX_PASSES, Resolver};
pub use result::Result;

/// Initialize the tracing subscriber for logging
pub fn init_tracing() {
    use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("strata=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_file(true)
                .with_line_number(true),
        )
        .init();
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
