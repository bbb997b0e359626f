//! Writing the enriched table.
//!
//! The artifact is the original table with five appended prediction columns,
//! written as CSV next to the input file under a fixed `_output` suffix.
//! After a cancelled run only the processed rows are written; skipped rows
//! are omitted, not padded with blanks.

use std::fs::File;
use std::path::{Path, PathBuf};

use polars::prelude::*;
use tracing::info;

use crate::error::{Result, ResultExt};
use crate::types::{ResultSet, RowOutcome};

/// The five columns appended to the original table, in artifact order.
pub const PREDICTION_COLUMNS: [&str; 5] = [
    "predicted_gender",
    "predicted_origin",
    "predicted_language",
    "persona",
    "confidence",
];

/// Sibling path for the enriched table: `profiles.csv` -> `profiles_output.csv`.
pub fn output_path_for(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");
    input.with_file_name(format!("{stem}_output.csv"))
}

/// Write the enriched table for one run.
///
/// `df` is the original input frame; it is sliced to the number of processed
/// rows (relevant after cancellation) and the five prediction columns are
/// appended. Error-marker rows get empty strings in the four text columns
/// and `0.0` confidence; the progress stream and logs carry the message.
pub fn write_enriched_csv(df: &DataFrame, results: &ResultSet, path: &Path) -> Result<()> {
    let processed = results.len();
    let mut out = df.slice(0, processed);

    let mut genders = Vec::with_capacity(processed);
    let mut origins = Vec::with_capacity(processed);
    let mut languages = Vec::with_capacity(processed);
    let mut personas = Vec::with_capacity(processed);
    let mut confidences = Vec::with_capacity(processed);

    for row in &results.rows {
        match &row.outcome {
            RowOutcome::Prediction(p) => {
                genders.push(p.gender.clone());
                origins.push(p.origin.clone());
                languages.push(p.language.clone());
                personas.push(p.persona.clone());
                confidences.push(p.confidence);
            }
            RowOutcome::Error { .. } => {
                genders.push(String::new());
                origins.push(String::new());
                languages.push(String::new());
                personas.push(String::new());
                confidences.push(0.0);
            }
        }
    }

    out.with_column(Column::new(PREDICTION_COLUMNS[0].into(), genders))
        .context("Appending predicted_gender column")?;
    out.with_column(Column::new(PREDICTION_COLUMNS[1].into(), origins))
        .context("Appending predicted_origin column")?;
    out.with_column(Column::new(PREDICTION_COLUMNS[2].into(), languages))
        .context("Appending predicted_language column")?;
    out.with_column(Column::new(PREDICTION_COLUMNS[3].into(), personas))
        .context("Appending persona column")?;
    out.with_column(Column::new(PREDICTION_COLUMNS[4].into(), confidences))
        .context("Appending confidence column")?;

    let mut file = File::create(path)?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .finish(&mut out)
        .context("Writing enriched CSV")?;

    info!(
        path = %path.display(),
        rows = processed,
        stopped_early = results.stopped_early,
        "Wrote enriched table"
    );
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
