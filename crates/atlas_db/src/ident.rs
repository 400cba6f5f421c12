//! SQL identifier validation for dynamically named staging/master tables.
//!
//! Table and column names arrive from the catalog and from operator input;
//! they are interpolated into SQL text (binds cannot carry identifiers), so
//! every one of them passes through here first.

use crate::error::{DbError, Result};

/// Validate an identifier and return it wrapped in double quotes.
///
/// Only `[A-Za-z_][A-Za-z0-9_]*` is accepted. Anything else is rejected
/// rather than escaped.
pub fn quote_ident(name: &str) -> Result<String> {
    validate_ident(name)?;
    Ok(format!("\"{}\"", name))
}

pub(crate) fn validate_ident(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid_first = chars
        .next()
        .map(|c| c.is_ascii_alphabetic() || c == '_')
        .unwrap_or(false);
    if !valid_first || !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(DbError::identifier(format!(
            "'{}' is not a valid table or column name",
            name
        )));
    }
    Ok(())
}
