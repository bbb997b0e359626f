//! Integration tests for the enrichment pipeline.
//!
//! These exercise the batch runner end to end with stub providers: full
//! runs, cancellation after k rows, per-row failure absorption, and the
//! CSV round trip from fixture to enriched artifact.

use persona_pipeline::ai::AIProvider;
use persona_pipeline::{
    BatchRunner, CancellationToken, ColumnMapping, EnrichmentError, InputRow, PipelineConfig,
    ProgressEvent, Result, RowStatus, extract_rows, output_path_for, write_enriched_csv,
};
use polars::io::csv::read::CsvReadOptions;
use polars::prelude::*;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

// ============================================================================
// Helper Functions
// ============================================================================

fn fixtures_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn load_profiles() -> DataFrame {
    let path = fixtures_path().join("profiles.csv");
    CsvReadOptions::default()
        .with_has_header(true)
        .try_into_reader_with_file_path(Some(path))
        .expect("Failed to create CSV reader")
        .finish()
        .expect("Failed to read fixture CSV")
}

fn sample_rows(n: usize) -> Vec<InputRow> {
    (0..n)
        .map(|i| InputRow::new(format!("Person {i}"), format!("user_{i}")))
        .collect()
}

fn fast_config() -> PipelineConfig {
    // 6000 rpm -> 10ms spacing; fast but still goes through the limiter.
    PipelineConfig::builder()
        .requests_per_minute(6000)
        .build()
        .unwrap()
}

/// Provider stub that always returns a well-formed reply.
struct AlwaysOkProvider;

impl AIProvider for AlwaysOkProvider {
    fn infer(&self, _prompt: &str) -> Result<String> {
        Ok(
            "Gender: Female\nOrigin: Brazilian\nLanguage: Portuguese\nPersona: Fashion Blogger\nConfidence: 0.85"
                .to_string(),
        )
    }

    fn name(&self) -> &str {
        "AlwaysOk"
    }
}

/// Provider stub failing on exactly one call index.
struct FailOnProvider {
    fail_on: usize,
    calls: AtomicUsize,
}

impl FailOnProvider {
    fn new(fail_on: usize) -> Self {
        Self {
            fail_on,
            calls: AtomicUsize::new(0),
        }
    }
}

impl AIProvider for FailOnProvider {
    fn infer(&self, _prompt: &str) -> Result<String> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call == self.fail_on {
            Err(EnrichmentError::Provider(
                "quota exceeded (429)".to_string(),
            ))
        } else {
            Ok("Gender: Male\nOrigin: Japanese\nLanguage: Japanese\nPersona: Photographer\nConfidence: 0.9"
                .to_string())
        }
    }

    fn name(&self) -> &str {
        "FailOn"
    }
}

// ============================================================================
// Full-run properties
// ============================================================================

#[test]
fn test_full_run_preserves_length_and_order() {
    let runner = BatchRunner::builder()
        .config(fast_config())
        .provider(Arc::new(AlwaysOkProvider))
        .build()
        .unwrap();

    let result = runner.process(sample_rows(6)).unwrap();

    assert_eq!(result.len(), 6);
    assert!(!result.stopped_early);
    assert_eq!(result.error_count(), 0);
    for (i, row) in result.rows.iter().enumerate() {
        assert_eq!(row.input.username, format!("user_{i}"));
        let prediction = row.prediction().expect("Every row should have a prediction");
        assert_eq!(prediction.confidence, 0.85);
    }
}

#[test]
fn test_progress_events_one_per_row_strictly_ordered() {
    let events: Arc<Mutex<Vec<ProgressEvent>>> = Arc::new(Mutex::new(Vec::new()));
    let events_clone = events.clone();

    let runner = BatchRunner::builder()
        .config(fast_config())
        .provider(Arc::new(AlwaysOkProvider))
        .on_progress(move |event| {
            events_clone.lock().unwrap().push(event);
        })
        .build()
        .unwrap();

    runner.process(sample_rows(5)).unwrap();

    let events = events.lock().unwrap();
    assert_eq!(events.len(), 5);
    for (i, event) in events.iter().enumerate() {
        assert_eq!(event.index, i, "Events must arrive in input order");
        assert_eq!(event.total, 5);
    }
}

// ============================================================================
// Cancellation properties
// ============================================================================

#[test]
fn test_cancel_after_k_rows_yields_k_results() {
    let k = 3;
    let token = CancellationToken::new();
    let token_for_callback = token.clone();
    let processed = Arc::new(AtomicUsize::new(0));
    let processed_clone = processed.clone();

    let runner = BatchRunner::builder()
        .config(fast_config())
        .provider(Arc::new(AlwaysOkProvider))
        .cancellation_token(token)
        .on_progress(move |_event| {
            // Cancel from the driver side after exactly k rows.
            if processed_clone.fetch_add(1, Ordering::SeqCst) + 1 == k {
                token_for_callback.cancel();
            }
        })
        .build()
        .unwrap();

    let result = runner.process(sample_rows(10)).unwrap();

    assert_eq!(result.len(), k);
    assert!(result.stopped_early);
    // Every recorded row is fully populated; no partial ResultRow.
    for row in &result.rows {
        assert!(row.prediction().is_some());
    }
}

#[test]
fn test_already_cancelled_run_yields_empty_partial() {
    let token = CancellationToken::new();
    token.cancel();

    let runner = BatchRunner::builder()
        .config(fast_config())
        .provider(Arc::new(AlwaysOkProvider))
        .cancellation_token(token)
        .build()
        .unwrap();

    let result = runner.process(sample_rows(4)).unwrap();
    assert!(result.is_empty());
    assert!(result.stopped_early);
}

#[test]
fn test_double_cancel_is_idempotent() {
    let token = CancellationToken::new();
    token.cancel();
    token.cancel();
    assert!(token.is_cancelled());

    let runner = BatchRunner::builder()
        .config(fast_config())
        .provider(Arc::new(AlwaysOkProvider))
        .cancellation_token(token)
        .build()
        .unwrap();

    // Same observable behavior as a single cancel: clean empty partial.
    let result = runner.process(sample_rows(4)).unwrap();
    assert!(result.is_empty());
    assert!(result.stopped_early);
}

#[test]
fn test_cancel_from_another_thread_mid_run() {
    let token = CancellationToken::new();
    let canceller = token.clone();

    // 600 rpm -> 100ms per row; cancel lands mid-run.
    let config = PipelineConfig::builder()
        .requests_per_minute(600)
        .build()
        .unwrap();

    let runner = BatchRunner::builder()
        .config(config)
        .provider(Arc::new(AlwaysOkProvider))
        .cancellation_token(token)
        .build()
        .unwrap();

    let handle = std::thread::spawn(move || {
        std::thread::sleep(std::time::Duration::from_millis(250));
        canceller.cancel();
    });

    let result = runner.process(sample_rows(50)).unwrap();
    handle.join().unwrap();

    assert!(result.stopped_early);
    assert!(result.len() < 50, "Cancellation should cut the run short");
    for row in &result.rows {
        assert!(row.prediction().is_some());
    }
}

// ============================================================================
// Per-row failure absorption
// ============================================================================

#[test]
fn test_single_row_failure_does_not_abort_batch() {
    let j = 2;
    let runner = BatchRunner::builder()
        .config(fast_config())
        .provider(Arc::new(FailOnProvider::new(j)))
        .build()
        .unwrap();

    let result = runner.process(sample_rows(5)).unwrap();

    assert_eq!(result.len(), 5);
    assert!(!result.stopped_early);
    assert_eq!(result.error_count(), 1);
    for (i, row) in result.rows.iter().enumerate() {
        if i == j {
            assert!(row.is_error(), "Row {j} should carry the error marker");
        } else {
            assert!(row.prediction().is_some(), "Row {i} should be populated");
        }
    }
}

#[test]
fn test_error_rows_flagged_in_progress_stream() {
    let statuses: Arc<Mutex<Vec<RowStatus>>> = Arc::new(Mutex::new(Vec::new()));
    let statuses_clone = statuses.clone();

    let runner = BatchRunner::builder()
        .config(fast_config())
        .provider(Arc::new(FailOnProvider::new(1)))
        .on_progress(move |event| {
            statuses_clone.lock().unwrap().push(event.status);
        })
        .build()
        .unwrap();

    runner.process(sample_rows(3)).unwrap();

    let statuses = statuses.lock().unwrap();
    assert_eq!(
        *statuses,
        vec![RowStatus::Ok, RowStatus::Error, RowStatus::Ok]
    );
}

// ============================================================================
// End-to-end: fixture CSV -> extract -> run -> write -> read back
// ============================================================================

#[test]
fn test_end_to_end_fixture_to_enriched_csv() {
    let df = load_profiles();

    let mapping = ColumnMapping::detect(&df).expect("Fixture headers should auto-detect");
    let rows = extract_rows(&df, &mapping).unwrap();
    assert_eq!(rows.len(), df.height());
    // The fixture's blank cell is normalized, never null.
    assert_eq!(rows[2].full_name, "");
    assert_eq!(rows[2].username, "solo_handle");

    let runner = BatchRunner::builder()
        .config(fast_config())
        .provider(Arc::new(FailOnProvider::new(3)))
        .build()
        .unwrap();

    let result = runner.process(rows).unwrap();
    assert_eq!(result.len(), df.height());
    assert_eq!(result.error_count(), 1);

    let dir = std::env::temp_dir().join("persona_pipeline_e2e");
    std::fs::create_dir_all(&dir).unwrap();
    let out_path = dir.join("profiles_output.csv");

    write_enriched_csv(&df, &result, &out_path).unwrap();

    let back = CsvReadOptions::default()
        .with_has_header(true)
        .try_into_reader_with_file_path(Some(out_path.clone()))
        .unwrap()
        .finish()
        .unwrap();

    assert_eq!(back.height(), df.height());
    assert_eq!(back.width(), df.width() + 5);

    // Original columns survive untouched, predictions are appended.
    let usernames = back.column("Username").unwrap().str().unwrap();
    assert_eq!(usernames.get(0), Some("ravi_k99"));
    let confidences = back.column("confidence").unwrap().f64().unwrap();
    assert_eq!(confidences.get(0), Some(0.9));
    assert_eq!(confidences.get(3), Some(0.0)); // error row flagged, not dropped

    std::fs::remove_file(&out_path).ok();
}

#[test]
fn test_output_path_naming_convention() {
    assert_eq!(
        output_path_for(std::path::Path::new("/tmp/profiles.csv")),
        PathBuf::from("/tmp/profiles_output.csv")
    );
}

// ============================================================================
// Validation
// ============================================================================

#[test]
fn test_empty_row_set_is_rejected_before_any_work() {
    let calls = Arc::new(AtomicUsize::new(0));

    struct CountingProvider(Arc<AtomicUsize>);
    impl AIProvider for CountingProvider {
        fn infer(&self, _prompt: &str) -> Result<String> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(String::new())
        }
        fn name(&self) -> &str {
            "Counting"
        }
    }

    let runner = BatchRunner::builder()
        .config(fast_config())
        .provider(Arc::new(CountingProvider(calls.clone())))
        .build()
        .unwrap();

    let err = runner.process(Vec::new()).unwrap_err();
    assert_eq!(err.error_code(), "VALIDATION_ERROR");
    assert_eq!(calls.load(Ordering::SeqCst), 0, "No provider call may happen");
}

#[test]
fn test_invalid_mapping_surfaces_before_any_row_work() {
    let df = load_profiles();
    let mapping = ColumnMapping::new("Nonexistent", "Username");

    let err = extract_rows(&df, &mapping).unwrap_err();
    assert_eq!(err.error_code(), "COLUMN_NOT_FOUND");
}
