//! Row extraction: turning an input table into an ordered sequence of
//! [`InputRow`] records.
//!
//! The mapping of which two columns hold the full name and the username is
//! either supplied explicitly or auto-detected from conventional header
//! spellings. Missing and blank cells are normalized to empty strings so
//! prompt building downstream never has to deal with nulls.

use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{EnrichmentError, Result};
use crate::types::InputRow;

/// Conventional header spellings, matched case-insensitively.
const FULL_NAME_HEADERS: [&str; 3] = ["full name", "fullname", "full_name"];
const USERNAME_HEADERS: [&str; 3] = ["username", "user name", "user_name"];

/// Which two input columns hold the full name and the username.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMapping {
    pub full_name: String,
    pub username: String,
}

impl ColumnMapping {
    pub fn new(full_name: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            full_name: full_name.into(),
            username: username.into(),
        }
    }

    /// Auto-detect a mapping from conventional header spellings.
    ///
    /// Returns `None` when either column cannot be identified; callers are
    /// expected to fall back to an explicit mapping.
    pub fn detect(df: &DataFrame) -> Option<Self> {
        let full_name = find_header(df, &FULL_NAME_HEADERS)?;
        let username = find_header(df, &USERNAME_HEADERS)?;
        debug!(%full_name, %username, "auto-detected column mapping");
        Some(Self {
            full_name,
            username,
        })
    }

    /// Verify that both mapped columns exist in the frame.
    pub fn validate(&self, df: &DataFrame) -> Result<()> {
        for name in [&self.full_name, &self.username] {
            if df.column(name).is_err() {
                return Err(EnrichmentError::ColumnNotFound(name.clone()));
            }
        }
        Ok(())
    }
}

fn find_header(df: &DataFrame, wanted: &[&str]) -> Option<String> {
    df.get_column_names().iter().find_map(|name| {
        let normalized = name.as_str().trim().to_ascii_lowercase();
        wanted
            .iter()
            .any(|w| *w == normalized)
            .then(|| name.to_string())
    })
}

/// Extract the ordered input rows from a frame using the given mapping.
///
/// Cell values are trimmed; nulls become empty strings; non-string columns
/// (numeric usernames and the like) are rendered through a string cast.
pub fn extract_rows(df: &DataFrame, mapping: &ColumnMapping) -> Result<Vec<InputRow>> {
    mapping.validate(df)?;

    let full_names = column_as_strings(df, &mapping.full_name)?;
    let usernames = column_as_strings(df, &mapping.username)?;

    let rows: Vec<InputRow> = full_names
        .into_iter()
        .zip(usernames)
        .map(|(full_name, username)| InputRow {
            full_name,
            username,
        })
        .collect();

    debug!(rows = rows.len(), "extracted input rows");
    Ok(rows)
}

fn column_as_strings(df: &DataFrame, name: &str) -> Result<Vec<String>> {
    let col = df
        .column(name)
        .map_err(|_| EnrichmentError::ColumnNotFound(name.to_string()))?;
    let series = col.as_materialized_series().cast(&DataType::String)?;
    let chunked = series.str()?;

    Ok(chunked
        .into_iter()
        .map(|value| value.map(|s| s.trim().to_string()).unwrap_or_default())
        .collect())
}

// ============================================================================
// Tests
// ============================================================================
