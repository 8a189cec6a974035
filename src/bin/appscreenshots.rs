//! appscreenshots CLI
//!
//! Validates a screenshot config and renders every target.
//! Exit codes: 0 success, 1 config/validation error, 2 render failures.

use clap::Parser;
use serde::Serialize;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::thread;
use tracing::warn;

use appscreenshots::options::{render_options, CONFIG_OPTIONS};
use appscreenshots::{
    init_logging, LoggingConfig, Pipeline, RunOptions, RunSummary, ScreenshotConfig,
    ValidationReport, Validator, ViolationSeverity,
};

const EXIT_CONFIG: u8 = 1;
const EXIT_RENDER: u8 = 2;

/// Set by Ctrl+C; workers finish their current target and start no more.
static CANCEL: AtomicBool = AtomicBool::new(false);

#[derive(Parser)]
#[command(name = "appscreenshots")]
#[command(about = "Generate localized App Store screenshots from a YAML config")]
#[command(version)]
struct Cli {
    /// Path to the YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory generated images are written to
    #[arg(short, long, default_value = "output")]
    output: PathBuf,

    /// Render only this language
    #[arg(short, long)]
    language: Option<String>,

    /// Validate the configuration and exit
    #[arg(long)]
    validate_only: bool,

    /// Debug-level logging
    #[arg(short, long)]
    verbose: bool,

    /// List every configuration option and exit
    #[arg(long)]
    show_options: bool,

    /// Worker threads (default: number of CPUs)
    #[arg(short, long)]
    jobs: Option<usize>,

    /// Print the validation report or run summary as JSON on stdout
    #[arg(long)]
    json: bool,

    /// Emit log lines as JSON
    #[arg(long)]
    log_json: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&LoggingConfig {
        json: cli.log_json,
        ..LoggingConfig::verbose(cli.verbose)
    });

    if cli.show_options {
        if cli.json {
            print_json(&CONFIG_OPTIONS);
        } else {
            print!("{}", render_options());
        }
        return ExitCode::SUCCESS;
    }

    let Some(config_path) = cli.config.as_deref() else {
        fail(cli.json, "a configuration file is required (-c <config.yml>)");
        return ExitCode::from(EXIT_CONFIG);
    };

    let document = match ScreenshotConfig::load(config_path) {
        Ok(doc) => doc,
        Err(e) => {
            fail(cli.json, &e.to_string());
            return ExitCode::from(EXIT_CONFIG);
        }
    };

    let validator = Validator::new(&document.base_dir);
    let report = validator.validate_document(&document, cli.language.as_deref());
    print_issues(&report);

    if cli.validate_only {
        if cli.json {
            print_json(&report);
        } else if !report.has_errors() {
            println!("Configuration is valid ({} issue(s))", report.issues.len());
        }
        return if report.has_errors() { ExitCode::from(EXIT_CONFIG) } else { ExitCode::SUCCESS };
    }
    if report.has_errors() {
        fail(cli.json, "configuration has errors; nothing was rendered");
        return ExitCode::from(EXIT_CONFIG);
    }

    let options = RunOptions {
        output_dir: cli.output.clone(),
        jobs: cli.jobs.unwrap_or_else(num_cpus::get),
    };
    let pipeline = Pipeline::new(&document, options);
    watch_for_interrupt();

    let summary = match pipeline.run(cli.language.as_deref(), &CANCEL) {
        Ok(summary) => summary,
        Err(e) => {
            fail(cli.json, &e.to_string());
            return ExitCode::from(EXIT_CONFIG);
        }
    };

    if cli.json {
        print_json(&summary);
    } else {
        print_summary(&summary, &cli.output);
    }

    if summary.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(EXIT_RENDER)
    }
}

/// Install the Ctrl+C handler; returns once it is registered.
fn watch_for_interrupt() {
    let (ready_tx, ready_rx) = mpsc::channel();
    thread::spawn(move || {
        let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
            Ok(runtime) => runtime,
            Err(e) => {
                warn!(error = %e, "Ctrl+C handler unavailable");
                return;
            }
        };
        runtime.block_on(async move {
            match wait_for_interrupt(ready_tx).await {
                Ok(()) => {
                    warn!("interrupted; finishing in-flight images");
                    CANCEL.store(true, Ordering::SeqCst);
                }
                Err(e) => warn!(error = %e, "Ctrl+C handler unavailable"),
            }
        });
    });
    // A dropped sender means installation failed; rendering proceeds regardless.
    let _ = ready_rx.recv();
}

#[cfg(unix)]
async fn wait_for_interrupt(ready: mpsc::Sender<()>) -> io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut interrupt = signal(SignalKind::interrupt())?;
    let _ = ready.send(());
    interrupt.recv().await;
    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_interrupt(ready: mpsc::Sender<()>) -> io::Result<()> {
    let interrupt = tokio::signal::ctrl_c();
    let _ = ready.send(());
    interrupt.await
}

fn print_json<T: Serialize + ?Sized>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{json}"),
        Err(e) => eprintln!("error: failed to serialize output: {e}"),
    }
}

fn fail(json: bool, message: &str) {
    if json {
        print_json(&serde_json::json!({ "success": false, "error": message }));
    } else {
        eprintln!("error: {message}");
    }
}

fn print_issues(report: &ValidationReport) {
    for issue in &report.issues {
        let label = match issue.severity {
            ViolationSeverity::Error => "error",
            ViolationSeverity::Warning => "warning",
            ViolationSeverity::Info => "info",
        };
        eprintln!("{label}: {}: {}", issue.path, issue.message);
    }
}

fn print_summary(summary: &RunSummary, output_dir: &std::path::Path) {
    let elapsed = summary.finished_at - summary.started_at;
    println!(
        "Generated {} image(s) in {} ({} failed, {} skipped, {:.1}s)",
        summary.succeeded.len(),
        output_dir.display(),
        summary.failed.len(),
        summary.skipped,
        elapsed.num_milliseconds() as f64 / 1000.0
    );
    for failure in &summary.failed {
        println!("  failed {}: {}", failure.target, failure.error);
    }
}
