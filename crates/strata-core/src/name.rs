//! Name syntax validation
//!
//! A Name is the identifier used for object members, path segments, and
//! environment variable references: the first character is a letter or
//! underscore, the remaining characters are letters, digits, or underscores.

use crate::error::StrataError;
use crate::result::Result;

/// Check whether `name` satisfies Name syntax.
pub fn is_valid(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Validate `name`, producing a [`StrataError::NameError`] on failure.
pub fn validate(name: &str) -> Result<()> {
    if is_valid(name) {
        Ok(())
    } else {
        Err(StrataError::name_error(name))
    }
}
