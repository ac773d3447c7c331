//! Environment variable expansion
//!
//! Substitutes `${IDENT}` occurrences inside string values, where IDENT
//! satisfies Name syntax. Expansion is single-pass: substituted text is not
//! re-scanned. A literal `$` not followed by `{` passes through unchanged.
//!
//! The expander captures the process environment once at construction and
//! never rereads it. Overrides injected from document `env` sections take
//! precedence over the captured environment.

use std::collections::HashMap;

use crate::error::StrataError;
use crate::name;
use crate::result::Result;

/// Single-pass `${IDENT}` expander over a fixed variable set.
#[derive(Debug, Clone, Default)]
pub struct EnvExpander {
    variables: HashMap<String, String>,
    overrides: HashMap<String, String>,
}

impl EnvExpander {
    /// Create an expander over an explicit variable set.
    pub fn new(variables: HashMap<String, String>) -> Self {
        Self {
            variables,
            overrides: HashMap::new(),
        }
    }

    /// Create an expander over a snapshot of the process environment.
    pub fn from_process_env() -> Self {
        Self::new(std::env::vars().collect())
    }

    /// Inject an override. Overrides shadow captured variables.
    pub fn set_override(&mut self, variable: impl Into<String>, value: impl Into<String>) -> Result<()> {
        let variable = variable.into();
        name::validate(&variable)?;
        self.overrides.insert(variable, value.into());
        Ok(())
    }

    /// Look up a variable, overrides first.
    pub fn get(&self, variable: &str) -> Option<&str> {
        self.overrides
            .get(variable)
            .or_else(|| self.variables.get(variable))
            .map(String::as_str)
    }

    /// Expand all `${IDENT}` references in `input`.
    pub fn expand(&self, input: &str) -> Result<String> {
        let mut out = String::with_capacity(input.len());
        let mut chars = input.chars().peekable();

        while let Some(c) = chars.next() {
            if c != '$' {
                out.push(c);
                continue;
            }
            if chars.peek() != Some(&'{') {
                out.push('$');
                continue;
            }
            chars.next();

            let mut ident = String::new();
            let mut terminated = false;
            for c in chars.by_ref() {
                if c == '}' {
                    terminated = true;
                    break;
                }
                ident.push(c);
            }
            if !terminated {
                return Err(StrataError::env_error(
                    ident,
                    "unterminated '${' substitution",
                ));
            }
            if !name::is_valid(&ident) {
                return Err(StrataError::env_error(
                    ident,
                    "substitution is not a valid variable name",
                ));
            }
            match self.get(&ident) {
                Some(value) => out.push_str(value),
                None => {
                    return Err(StrataError::env_error(ident, "variable is not set"));
                }
            }
        }

        Ok(out)
    }
}
