use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, info, warn};
use simplelog::{ColorChoice, ConfigBuilder, LevelFilter, TermLogger, TerminalMode};

use dupe_quarantine::report::EXIT_INTERRUPTED;
use dupe_quarantine::utils::format_human_elapsed;
use dupe_quarantine::{Cli, DedupError, FixedRoot, PromptRoot, RootSelector, Settings, run};

fn init_logging(verbose: bool) -> Result<()> {
    let mut builder = ConfigBuilder::new();
    // Falls back to UTC when the local offset is unknown.
    let _ = builder.set_time_offset_to_local();
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    TermLogger::init(
        level,
        builder.build(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    )
    .context("Failed to initialize logger")
}

fn install_shutdown_handler() -> Result<Arc<AtomicBool>> {
    let flag = Arc::new(AtomicBool::new(false));
    let handler_flag = Arc::clone(&flag);
    ctrlc::set_handler(move || {
        if handler_flag.swap(true, Ordering::SeqCst) {
            // Second Ctrl+C: stop right away.
            std::process::exit(EXIT_INTERRUPTED);
        }
        eprintln!("Interrupted, finishing the current file...");
    })
    .context("Failed to install Ctrl+C handler")?;
    Ok(flag)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose)?;

    info!("Starting {} v{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
    debug!("Command line arguments: {:?}", cli);

    let mut settings = Settings::load(cli.config.as_deref())?;
    settings.apply_cli(&cli);
    debug!("Effective settings: {:?}", settings);

    let shutdown = install_shutdown_handler()?;

    let selector: Box<dyn RootSelector> = match &cli.path {
        Some(path) => Box::new(FixedRoot(path.clone())),
        None => Box::new(PromptRoot::stdin()),
    };

    let report = match run(selector.as_ref(), &settings, &shutdown) {
        Ok(report) => report,
        Err(DedupError::Interrupted) => {
            warn!("Interrupted while hashing, nothing was moved");
            std::process::exit(EXIT_INTERRUPTED);
        }
        Err(e) => return Err(e).context("Duplicate search failed"),
    };

    if cli.json {
        println!("{}", report.to_json()?);
    } else {
        report.print_summary();
    }

    if report.interrupted {
        warn!("Stopped early, {} duplicates left in place", report.skipped);
        std::process::exit(report.exit_code());
    }
    info!(
        "Duplicate search complete in {}",
        format_human_elapsed(report.elapsed)
    );
    Ok(())
}
