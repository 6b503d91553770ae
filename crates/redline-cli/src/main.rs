//! Redline - feedback on the parts of your prose you mark
//!
//! The `redline` command sends marked spans of a text file to a
//! text-generation service and prints the critique and rewrite candidates.
//!
//! ## Commands
//!
//! - `revise`: request feedback (and optionally rewrites) for marked spans
//! - `split`: split a raw service reply into feedback and rewrite sections

use anyhow::{anyhow, bail, Context, Result};
use clap::builder::RangedU64ValueParser;
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::io::Read;
use std::path::{Path, PathBuf};
use tokio::sync::watch;
use tracing::{debug, info, Level};

use generation_client::{DEFAULT_ENDPOINT, DEFAULT_MODEL, DEFAULT_TIMEOUT_SECS};
use redline_core::{
    lock_workbench, split, DecodeStrategy, Document, FeedbackOrchestrator, FeedbackResult,
    GenerationConfig, GenerationService, HttpGenerationClient, MarkedSurface, RenderSurface,
    ReviseMode, Sections, SharedWorkbench, Span, Workbench, DEFAULT_REWRITE_COUNT,
    REWRITE_MARKER_PREFIX,
};

#[derive(Parser)]
#[command(name = "redline")]
#[command(author = "Redline Contributors")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Writing feedback on marked passages", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Request feedback on the marked spans of a file
    Revise {
        /// Text file; spans wrapped in <u>...</u> are sent for feedback
        file: PathBuf,

        /// Extra span to mark, as START..END byte offsets into the plain text
        #[arg(long = "mark", value_name = "START..END")]
        marks: Vec<String>,

        /// Decode the reply as streamed fragments, printing them as they arrive
        #[arg(long)]
        stream: bool,

        /// Ask for feedback only, without rewrite candidates
        #[arg(long, conflicts_with = "rewrites")]
        feedback_only: bool,

        /// Number of rewrite candidates to ask for
        #[arg(long, default_value_t = DEFAULT_REWRITE_COUNT, value_parser = at_least_one())]
        rewrites: usize,

        /// Generation endpoint URL
        #[arg(long, env = "REDLINE_ENDPOINT", default_value = DEFAULT_ENDPOINT)]
        endpoint: String,

        /// Model name sent with the request
        #[arg(long, env = "REDLINE_MODEL", default_value = DEFAULT_MODEL)]
        model: String,

        /// Request timeout in seconds
        #[arg(long, env = "REDLINE_TIMEOUT_SECS", default_value_t = DEFAULT_TIMEOUT_SECS)]
        timeout_secs: u64,

        /// Apply rewrite candidate N (1-based) and print the resulting document
        #[arg(long, value_name = "N", value_parser = at_least_one())]
        apply: Option<usize>,

        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        output: OutputFormat,
    },

    /// Split a raw service reply into feedback and rewrite sections
    Split {
        /// Reply file (reads stdin when omitted)
        file: Option<PathBuf>,

        /// Keep at most this many rewrite candidates
        #[arg(long, default_value_t = DEFAULT_REWRITE_COUNT)]
        rewrites: usize,

        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        output: OutputFormat,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    redline_core::init_tracing(cli.json, level);

    match cli.command {
        Commands::Revise {
            file,
            marks,
            stream,
            feedback_only,
            rewrites,
            endpoint,
            model,
            timeout_secs,
            apply,
            output,
        } => {
            let mode = if feedback_only {
                ReviseMode::FeedbackOnly
            } else {
                ReviseMode::with_rewrites(rewrites)
            };
            let config = GenerationConfig::new(&endpoint, &model).with_timeout_secs(timeout_secs);
            cmd_revise(&file, &marks, stream, mode, config, apply, output).await
        }
        Commands::Split {
            file,
            rewrites,
            output,
        } => cmd_split(file.as_deref(), rewrites, output),
    }
}

async fn cmd_revise(
    file: &Path,
    marks: &[String],
    stream: bool,
    mode: ReviseMode,
    config: GenerationConfig,
    apply: Option<usize>,
    output: OutputFormat,
) -> Result<()> {
    let markup = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let spans = marks
        .iter()
        .map(|m| parse_mark(m))
        .collect::<Result<Vec<_>>>()?;
    let bench = load_workbench(&markup, &spans)?.into_shared();

    let strategy = if stream {
        DecodeStrategy::Streamed
    } else {
        DecodeStrategy::Atomic
    };
    info!(
        endpoint = %config.endpoint,
        model = %config.model,
        strategy = %strategy,
        "Requesting feedback"
    );

    let model = config.model.clone();
    let client = HttpGenerationClient::new(config).context("Failed to build generation client")?;
    let orchestrator = FeedbackOrchestrator::new(client, model).with_strategy(strategy);

    // Live fragments go to stderr so stdout only carries the final report.
    let printer = (stream && output == OutputFormat::Text)
        .then(|| tokio::spawn(print_partials(orchestrator.subscribe())));

    let report = run_revise(&orchestrator, &bench, mode, apply).await;

    drop(orchestrator);
    if let Some(printer) = printer {
        if let Err(err) = printer.await {
            debug!(error = %err, "Partial printer stopped early");
        }
        eprintln!();
    }

    let report = report?;
    match output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => println!("{}", render_report_text(&report)),
    }
    Ok(())
}

fn cmd_split(file: Option<&Path>, rewrites: usize, output: OutputFormat) -> Result<()> {
    let raw = read_input(file)?;
    let sections = split(&raw, REWRITE_MARKER_PREFIX, rewrites);
    debug!(rewrites = sections.rewrites.len(), "Split reply");

    match output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&sections)?),
        OutputFormat::Text => println!("{}", render_sections_text(&sections)),
    }
    Ok(())
}

/// What `revise` prints.
#[derive(Debug, Serialize)]
struct ReviseReport {
    result: FeedbackResult,
    applied: Option<AppliedRewrite>,
}

#[derive(Debug, Serialize)]
struct AppliedRewrite {
    candidate: usize,
    revision: u64,
    document: String,
}

async fn run_revise<S: GenerationService>(
    orchestrator: &FeedbackOrchestrator<S>,
    bench: &SharedWorkbench,
    mode: ReviseMode,
    apply: Option<usize>,
) -> Result<ReviseReport> {
    if let Some(candidate) = apply {
        check_candidate(candidate, mode)?;
    }

    let result = orchestrator
        .revise(bench, mode)
        .await
        .map_err(|e| anyhow!("{}: {e}", e.user_message()))?;

    let applied = match apply {
        None => None,
        Some(candidate) => {
            let mut bench = lock_workbench(bench);
            let revision = bench
                .apply_rewrite_index(candidate - 1)
                .with_context(|| format!("Failed to apply rewrite {candidate}"))?;
            Some(AppliedRewrite {
                candidate,
                revision,
                document: bench.document().text().to_string(),
            })
        }
    };

    Ok(ReviseReport { result, applied })
}

/// Refuse `--apply N` up front when the request cannot produce candidate N.
fn check_candidate(candidate: usize, mode: ReviseMode) -> Result<()> {
    if candidate == 0 {
        bail!("Rewrite candidates are numbered from 1");
    }
    let requested = mode.expected_rewrites();
    if candidate > requested {
        bail!("Cannot apply rewrite {candidate}: only {requested} requested");
    }
    Ok(())
}

fn at_least_one() -> RangedU64ValueParser<usize> {
    RangedU64ValueParser::<usize>::new().range(1..)
}

async fn print_partials(mut partial: watch::Receiver<String>) {
    let mut printed = 0;
    while partial.changed().await.is_ok() {
        let text = partial.borrow_and_update().clone();
        if text.len() < printed || !text.is_char_boundary(printed) {
            printed = 0;
        }
        eprint!("{}", &text[printed..]);
        printed = text.len();
    }
}

/// Parse a `START..END` byte range.
fn parse_mark(raw: &str) -> Result<Span> {
    let (start, end) = raw
        .split_once("..")
        .ok_or_else(|| anyhow!("Invalid mark {raw:?}: expected START..END"))?;
    let start: usize = start
        .trim()
        .parse()
        .with_context(|| format!("Invalid mark start in {raw:?}"))?;
    let end: usize = end
        .trim()
        .parse()
        .with_context(|| format!("Invalid mark end in {raw:?}"))?;
    Ok(Span::new(start, end))
}

/// Build a workbench from `<u>` markup plus extra marks on the plain text.
fn load_workbench(markup: &str, extra_marks: &[Span]) -> Result<Workbench> {
    let surface = MarkedSurface::from_markup(markup).context("Failed to parse markup")?;
    let document = Document::new(surface.text());
    let mut bench = Workbench::with_surface(document, surface);
    for span in extra_marks {
        bench
            .mark_selection(*span)
            .with_context(|| format!("Failed to mark {span}"))?;
    }
    Ok(bench)
}

fn read_input(file: Option<&Path>) -> Result<String> {
    match file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display())),
        None => {
            let mut raw = String::new();
            std::io::stdin()
                .read_to_string(&mut raw)
                .context("Failed to read stdin")?;
            Ok(raw)
        }
    }
}

fn render_sections_text(sections: &Sections) -> String {
    let mut out = format!("Feedback:\n{}\n", sections.feedback);
    for (i, rewrite) in sections.rewrites.iter().enumerate() {
        out.push_str(&format!("\nRewrite {}:\n{}\n", i + 1, rewrite));
    }
    out
}

fn render_report_text(report: &ReviseReport) -> String {
    let mut out = render_sections_text(&Sections {
        feedback: report.result.feedback_text.clone(),
        rewrites: report.result.rewrites.clone(),
    });
    if let Some(applied) = &report.applied {
        out.push_str(&format!(
            "\nApplied rewrite {} (revision {}):\n{}\n",
            applied.candidate, applied.revision, applied.document
        ));
    }
    out
}
