//! CLI entry point for the persona enrichment pipeline.

use anyhow::{Result, anyhow};
use clap::Parser;
use dotenv::dotenv;
use persona_pipeline::{
    BatchRunner, CancellationToken, ChannelProgressReporter, ColumnMapping, EnrichmentError,
    PipelineConfig, ProgressEvent, ResultSet, build_prompt, extract_rows, output_path_for,
    write_enriched_csv,
};
use polars::io::csv::read::CsvReadOptions;
use polars::prelude::*;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc;
use std::time::Instant;
use tracing::{debug, info, warn};

#[cfg(feature = "ai")]
use persona_pipeline::ai::{GeminiConfig, GeminiProvider};
#[cfg(feature = "ai")]
use std::env;

#[derive(Parser, Debug)]
#[command(
    version,
    about = "AI-powered batch enrichment for social profile tables",
    long_about = "Enriches a CSV of social profile name/handle pairs by calling an AI\n\
                  inference service once per row and appending five predicted columns\n\
                  (gender, origin, language, persona, confidence).\n\n\
                  ENVIRONMENT VARIABLES:\n  \
                  GEMINI_API_KEY    API key for the Gemini provider (required)\n\n\
                  EXAMPLES:\n  \
                  # Basic usage with header auto-detection\n  \
                  persona-enrich profiles.csv\n\n  \
                  # Explicit column mapping and a faster model\n  \
                  persona-enrich profiles.csv --full-name-column Name --username-column Handle --model gemini-2.5-flash\n\n  \
                  # Cheap trial on the first 5 rows\n  \
                  persona-enrich profiles.csv --limit 5\n\n  \
                  # Preview the prompt without any network call\n  \
                  persona-enrich profiles.csv --dry-run"
)]
struct Args {
    /// Path to the CSV file to enrich
    input: String,

    /// Column holding the full name (auto-detected if omitted)
    #[arg(long)]
    full_name_column: Option<String>,

    /// Column holding the username (auto-detected if omitted)
    #[arg(long)]
    username_column: Option<String>,

    /// Maximum outbound provider calls per minute
    #[arg(long, default_value = "20")]
    requests_per_minute: u32,

    /// Provider model identifier, passed through verbatim
    #[arg(long, default_value = "gemini-2.5-pro")]
    model: String,

    /// Output file path (default: input name with an _output suffix)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Process only the first N rows (cheap trial runs)
    #[arg(long)]
    limit: Option<usize>,

    /// Load the table, resolve the mapping, preview the first prompt, and
    /// exit without any network call
    #[arg(long)]
    dry_run: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Suppress progress output (only show warnings and the final summary)
    #[arg(short, long)]
    quiet: bool,

    /// Emit progress events and the final summary as JSON lines
    ///
    /// Disables all logs; stdout stays machine-readable.
    #[arg(long)]
    json: bool,
}

/// Initialize the tracing subscriber for logging.
///
/// When `json_output` is true, logging is completely disabled so stdout
/// only carries JSON.
fn init_logging(level: &str, quiet: bool, json_output: bool) {
    if json_output {
        return;
    }

    use tracing_subscriber::EnvFilter;

    let effective_level = if quiet { "warn" } else { level };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(effective_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args.log_level, args.quiet, args.json);

    dotenv().ok();

    if !Path::new(&args.input).exists() {
        return Err(anyhow!("Input file not found: {}", args.input));
    }

    info!("Loading table from: {}", args.input);
    let df = load_csv_with_fallbacks(&args.input)?;
    info!("Table loaded: {:?}", df.shape());

    let mapping = resolve_mapping(&args, &df)?;
    let mut rows = extract_rows(&df, &mapping)?;

    if let Some(limit) = args.limit {
        rows.truncate(limit);
        info!("Limited to the first {} rows", rows.len());
    }

    if rows.is_empty() {
        return Err(anyhow!("No rows to process in {}", args.input));
    }

    if args.dry_run {
        return run_dry_run(&args, &mapping, &rows);
    }

    let config = PipelineConfig::builder()
        .requests_per_minute(args.requests_per_minute)
        .model_identifier(&args.model)
        .build()?;

    run_enrichment(&args, &df, rows, config)
}

/// Resolve which columns hold the full name and the username.
///
/// Explicit flags win; otherwise conventional header spellings are
/// auto-detected. Failure lists the available columns so the user can pick.
fn resolve_mapping(args: &Args, df: &DataFrame) -> Result<ColumnMapping> {
    let mapping = match (&args.full_name_column, &args.username_column) {
        (Some(full_name), Some(username)) => ColumnMapping::new(full_name, username),
        (None, None) => ColumnMapping::detect(df).ok_or_else(|| {
            anyhow!(
                "Could not auto-detect the name/username columns. \
                 Pass --full-name-column and --username-column. \
                 Available columns: {:?}",
                df.get_column_names()
            )
        })?,
        _ => {
            return Err(anyhow!(
                "--full-name-column and --username-column must be given together"
            ));
        }
    };

    mapping.validate(df).map_err(|e| {
        anyhow!(
            "{e}. Available columns: {:?}",
            df.get_column_names()
        )
    })?;

    Ok(mapping)
}

/// Preview mode: show the resolved mapping and the first prompt, no network.
///
/// Uses `println!` intentionally: this output is the purpose of --dry-run
/// and should be visible regardless of log level.
fn run_dry_run(
    args: &Args,
    mapping: &ColumnMapping,
    rows: &[persona_pipeline::InputRow],
) -> Result<()> {
    println!("\n{}", "=".repeat(80));
    println!("DRY RUN - no provider calls will be made");
    println!("{}\n", "=".repeat(80));

    println!("Input:            {}", args.input);
    println!("Rows to process:  {}", rows.len());
    println!("Full name column: {}", mapping.full_name);
    println!("Username column:  {}", mapping.username);
    println!("Model:            {}", args.model);
    println!(
        "Throttle:         {} requests/minute ({:.1}s between calls)",
        args.requests_per_minute,
        60.0 / f64::from(args.requests_per_minute.max(1))
    );
    println!();

    println!("FIRST PROMPT");
    println!("{}", "-".repeat(40));
    println!("{}", build_prompt(&rows[0]));
    println!();

    println!("{}", "=".repeat(80));
    println!("To run the enrichment, repeat without --dry-run");
    println!("{}", "=".repeat(80));

    Ok(())
}

/// Build the Gemini provider from the environment credential.
#[cfg(feature = "ai")]
fn build_provider(config: &PipelineConfig) -> Result<Arc<dyn persona_pipeline::ai::AIProvider>> {
    let api_key = env::var("GEMINI_API_KEY")
        .map_err(|_| anyhow!("GEMINI_API_KEY is not set; the provider needs a credential"))?;

    let provider_config = GeminiConfig::builder()
        .model(&config.model_identifier)
        .build();

    Ok(Arc::new(GeminiProvider::with_config(
        api_key,
        provider_config,
    )?))
}

#[cfg(not(feature = "ai"))]
fn build_provider(_config: &PipelineConfig) -> Result<Arc<dyn persona_pipeline::ai::AIProvider>> {
    Err(anyhow!(
        "This binary was compiled without the \"ai\" feature; no provider is available"
    ))
}

/// Register the Ctrl-C handler that requests a graceful stop.
///
/// An interrupt flips the token; the worker observes it at its next safe
/// point, returns a partial result set, and the driver still writes every
/// fully processed row to disk.
fn install_interrupt_handler(token: &CancellationToken) -> Result<()> {
    let token = token.clone();
    ctrlc::set_handler(move || {
        warn!("Interrupt received; finishing the current row and writing partial results");
        token.cancel();
    })
    .map_err(|e| anyhow!("Could not install the interrupt handler: {e}"))
}

/// Collect the worker's result, surfacing a panic as an internal error.
fn join_worker(
    worker: std::thread::JoinHandle<persona_pipeline::Result<ResultSet>>,
) -> Result<ResultSet> {
    let joined = worker
        .join()
        .map_err(|_| EnrichmentError::Internal("Worker thread panicked".to_string()))?;
    joined.map_err(|e| anyhow!("Enrichment failed: {e}"))
}

/// Run the worker thread, drain its progress events, write the artifact.
fn run_enrichment(
    args: &Args,
    df: &DataFrame,
    rows: Vec<persona_pipeline::InputRow>,
    config: PipelineConfig,
) -> Result<()> {
    let provider = build_provider(&config)?;
    let total = rows.len();
    let token = CancellationToken::new();
    install_interrupt_handler(&token)?;

    let (tx, rx) = mpsc::channel();
    let runner = BatchRunner::builder()
        .config(config)
        .provider(provider)
        .progress_reporter(Arc::new(ChannelProgressReporter::new(tx)))
        .cancellation_token(token.clone())
        .build()?;

    info!("{}", "=".repeat(80));
    info!("Enriching {} rows...", total);
    info!("{}", "=".repeat(80));

    let started = Instant::now();

    // Worker context: the runner loop. The driver (this thread) only drains
    // events and waits for the join value.
    let worker = std::thread::spawn(move || runner.process(rows));

    for event in rx {
        render_progress(&event, args);
    }

    let result = join_worker(worker)?;

    if result.stopped_early {
        warn!(
            "Stopped early after {} of {} rows; writing partial results",
            result.len(),
            total
        );
    }

    let output_path = args
        .output
        .clone()
        .unwrap_or_else(|| output_path_for(Path::new(&args.input)));
    write_enriched_csv(df, &result, &output_path)?;

    let elapsed_ms = started.elapsed().as_millis() as u64;
    if args.json {
        print_json_summary(&result, total, &output_path, elapsed_ms)?;
    } else {
        print_summary(&result, total, &output_path, elapsed_ms);
    }

    Ok(())
}

/// Render one progress event on the driver thread.
fn render_progress(event: &ProgressEvent, args: &Args) {
    if args.json {
        if let Ok(line) = serde_json::to_string(event) {
            println!("{line}");
        }
        return;
    }
    if args.quiet {
        return;
    }

    let status = if event.is_error() { "error" } else { "ok" };
    println!(
        "[{}/{}] {} {}",
        event.index + 1,
        event.total,
        status,
        event.summary
    );
}

fn print_json_summary(
    result: &ResultSet,
    total: usize,
    output_path: &Path,
    elapsed_ms: u64,
) -> Result<()> {
    let summary = json!({
        "rows_total": total,
        "rows_processed": result.len(),
        "rows_ok": result.success_count(),
        "rows_error": result.error_count(),
        "stopped_early": result.stopped_early,
        "output_path": output_path.display().to_string(),
        "elapsed_ms": elapsed_ms,
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn print_summary(result: &ResultSet, total: usize, output_path: &Path, elapsed_ms: u64) {
    println!();
    println!("{}", "=".repeat(80));
    if result.stopped_early {
        println!("ENRICHMENT STOPPED EARLY");
    } else {
        println!("ENRICHMENT COMPLETE");
    }
    println!("{}", "=".repeat(80));
    println!();
    println!(
        "Rows: {} of {} processed ({} ok, {} errors)",
        result.len(),
        total,
        result.success_count(),
        result.error_count()
    );
    println!("Output: {}", output_path.display());
    println!("Elapsed: {:.1}s", elapsed_ms as f64 / 1000.0);
    println!();
    println!("Use --json for machine-readable output");
    println!("{}", "=".repeat(80));
}

/// Load CSV with fallback strategies for messy real-world exports.
fn load_csv_with_fallbacks(path: &str) -> Result<DataFrame> {
    // Strategy 1: standard loading with quote handling
    match CsvReadOptions::default()
        .with_infer_schema_length(Some(100))
        .with_has_header(true)
        .with_parse_options(CsvParseOptions::default().with_quote_char(Some(b'"')))
        .try_into_reader_with_file_path(Some(PathBuf::from(path)))?
        .finish()
    {
        Ok(df) => return Ok(df),
        Err(e) => {
            debug!("Standard loading failed: {}", e);
        }
    }

    // Strategy 2: without quote handling
    CsvReadOptions::default()
        .with_infer_schema_length(Some(100))
        .with_has_header(true)
        .try_into_reader_with_file_path(Some(PathBuf::from(path)))?
        .finish()
        .map_err(|e| anyhow!("Could not parse {path}: {e}"))
}
