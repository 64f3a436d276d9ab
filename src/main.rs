//! Participation Checker - Canvas LMS course participation reports
//!
//! A CLI tool that fetches enrollments, assignments and submissions for a
//! list of Canvas courses and exports per-course sheets plus a cross-course
//! summary of assignment deliveries.
//!
//! Exit codes:
//!   0 - Success (every course reported, or some skipped with a report)
//!   1 - Runtime error (configuration, no valid course ids, write failure)

mod api;
mod cli;
mod config;
mod error;
mod models;
mod normalize;
mod pipeline;
mod report;
mod table;

use anyhow::{Context, Result};
use chrono::Utc;
use cli::{Args, OutputFormat};
use config::{Config, CONFIG_FILE_NAME};
use indicatif::{ProgressBar, ProgressStyle};
use models::ReportMetadata;
use pipeline::Aggregator;
use std::path::PathBuf;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Initialize logging
    init_logging(&args);

    info!("Participation Checker v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    match run_report(args).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Report failed: {:#}", e);
            eprintln!("\n❌ Error: {}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .participation.toml.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(CONFIG_FILE_NAME);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            CONFIG_FILE_NAME
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", CONFIG_FILE_NAME))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE_NAME);
    println!("   Edit it to set the Canvas URL, page size and report options.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) {
    let level = args.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

/// Run the complete report workflow. Returns the exit code.
async fn run_report(args: Args) -> Result<i32> {
    // Load configuration
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);

    if config.api.token.is_none() {
        warn!("No Canvas token configured (--token or CANVAS_TOKEN); requests are unauthenticated");
    }

    let client = api::CanvasClient::new(config.client_config())?;
    let course_ids = args.course_ids();
    let request = config.aggregation_request(course_ids.clone());

    // Step 1: Fetch and aggregate
    if !args.quiet {
        println!(
            "📥 Fetching {} course(s) from {}",
            course_ids.len(),
            client.base_url()
        );
        if request.include_assignments {
            println!("   Including assignment delivery columns");
        }
    }

    let progress = if args.quiet {
        None
    } else {
        let pb = ProgressBar::new(course_ids.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} cursos")
                .context("Invalid progress template")?
                .progress_chars("#>-"),
        );
        Some(pb)
    };

    let mut aggregator = Aggregator::new(&client, &request);
    if let Some(ref pb) = progress {
        aggregator = aggregator.with_progress(pb.clone());
    }
    let outcome = aggregator.run().await;
    if let Some(pb) = progress {
        pb.finish_and_clear();
    }
    let result = outcome?;

    // Step 2: Lay out and write the report
    let layout = report::assemble(
        &result.courses,
        result.summary.as_ref(),
        &config.layout_options(),
    );

    let metadata = ReportMetadata {
        base_url: config.api.base_url.clone(),
        generated_at: Utc::now(),
        requested_courses: course_ids,
        courses_reported: result.courses.len(),
        courses_skipped: result.skipped.len(),
        duration_seconds: result.elapsed.as_secs_f64(),
    };

    let output = config
        .general
        .output
        .as_ref()
        .map(PathBuf::from)
        .unwrap_or_else(|| args.default_output());

    match args.format {
        OutputFormat::Xlsx => report::write_workbook(&layout, &output)?,
        OutputFormat::Json => {
            let content = report::generate_json_report(&metadata, &result.skipped, &layout)?;
            std::fs::write(&output, content)
                .with_context(|| format!("Failed to write report to {}", output.display()))?;
        }
        OutputFormat::Markdown => {
            let content = report::generate_markdown_report(&metadata, &result.skipped, &layout);
            std::fs::write(&output, content)
                .with_context(|| format!("Failed to write report to {}", output.display()))?;
        }
    }

    // Print summary
    if !args.quiet {
        println!("\n📊 Participation Summary:");
        for course in &result.courses {
            let counts = course.participation();
            println!(
                "   {} ({}): Si participaron: {} / No participaron: {}",
                course.course_name, course.course_id, counts.participants, counts.non_participants
            );
        }
        if let Some(ref summary) = result.summary {
            println!(
                "   Resumen: {} estudiantes, {} columnas de tareas",
                summary.rows.len(),
                summary.columns.len()
            );
        }
        for skipped in &result.skipped {
            println!("   ⚠️  Omitido {}: {}", skipped.course_id, skipped.reason);
        }
        println!(
            "   Tiempo de obtención de datos: {:.2}s",
            metadata.duration_seconds
        );
        println!("\n✅ Report saved to: {}", output.display());
    }

    Ok(0)
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", CONFIG_FILE_NAME);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}
