use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One input record: a profile to be enriched.
///
/// Rows are unique by position in the input sequence, not by content;
/// duplicates are processed like any other row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputRow {
    pub full_name: String,
    pub username: String,
}

impl InputRow {
    pub fn new(full_name: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            full_name: full_name.into(),
            username: username.into(),
        }
    }

    /// Label used in logs and progress summaries: the username when present,
    /// the full name otherwise.
    pub fn label(&self) -> &str {
        if self.username.is_empty() {
            &self.full_name
        } else {
            &self.username
        }
    }
}

/// The five-field structured output produced by inference for one row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub gender: String,
    pub origin: String,
    pub language: String,
    pub persona: String,
    /// Overall confidence in [0.0, 1.0]. Out-of-range model values are
    /// clamped at parse time; missing or non-numeric values become 0.0.
    pub confidence: f64,
}

/// A model reply that could not be decoded into a [`Prediction`].
///
/// The raw text is preserved verbatim for diagnostics; the `Display`
/// rendering truncates it to keep log lines and error markers readable.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("Could not parse model reply: {}", self.snippet())]
pub struct ParseFailure {
    raw: String,
}

impl ParseFailure {
    const SNIPPET_LEN: usize = 80;

    pub fn new(raw: impl Into<String>) -> Self {
        Self { raw: raw.into() }
    }

    /// The unmodified reply text.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    fn snippet(&self) -> String {
        let trimmed = self.raw.trim();
        if trimmed.chars().count() <= Self::SNIPPET_LEN {
            trimmed.to_string()
        } else {
            let head: String = trimmed.chars().take(Self::SNIPPET_LEN).collect();
            format!("{head}...")
        }
    }
}

/// What happened to a single row: a prediction, or an error marker.
///
/// Error markers absorb per-row provider failures and parse failures so
/// one bad row never aborts the batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowOutcome {
    Prediction(Prediction),
    Error { message: String },
}

impl RowOutcome {
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }
}

/// An [`InputRow`] merged with its [`RowOutcome`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRow {
    pub input: InputRow,
    pub outcome: RowOutcome,
}

impl ResultRow {
    pub fn new(input: InputRow, outcome: RowOutcome) -> Self {
        Self { input, outcome }
    }

    pub fn is_error(&self) -> bool {
        self.outcome.is_error()
    }

    /// The prediction, if this row succeeded.
    pub fn prediction(&self) -> Option<&Prediction> {
        match &self.outcome {
            RowOutcome::Prediction(p) => Some(p),
            RowOutcome::Error { .. } => None,
        }
    }

    /// One-line description for progress events and logs.
    pub fn summary(&self) -> String {
        match &self.outcome {
            RowOutcome::Prediction(p) => {
                format!("{}: {} ({:.2})", self.input.label(), p.persona, p.confidence)
            }
            RowOutcome::Error { message } => {
                format!("{}: {}", self.input.label(), message)
            }
        }
    }
}

/// The terminal value of one run: every processed row, in input order.
///
/// `stopped_early` is true when the run was cancelled before reaching the
/// last row; the rows collected up to that point are fully populated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultSet {
    pub rows: Vec<ResultRow>,
    pub stopped_early: bool,
}

impl ResultSet {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Number of rows carrying a prediction.
    pub fn success_count(&self) -> usize {
        self.rows.iter().filter(|r| !r.is_error()).count()
    }

    /// Number of rows carrying an error marker.
    pub fn error_count(&self) -> usize {
        self.rows.iter().filter(|r| r.is_error()).count()
    }
}

// ============================================================================
// Tests
// ============================================================================
