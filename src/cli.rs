use clap::Parser;
use std::path::PathBuf;

use crate::relocate::CollisionPolicy;

#[derive(Parser, Debug)]
#[command(name = "dupe-quarantine")]
#[command(about = "Find files with identical content and move the extra copies into a quarantine folder")]
#[command(version)]
pub struct Cli {
    /// Directory to scan for duplicates (asked for interactively when omitted)
    pub path: Option<PathBuf>,

    /// Number of parallel threads for hashing (default: number of CPU cores)
    #[arg(short, long)]
    pub threads: Option<usize>,

    /// Name of the quarantine folder created under the scanned directory
    #[arg(short, long, value_name = "NAME")]
    pub quarantine: Option<String>,

    /// What to do when the quarantine folder already holds a file with the same name
    #[arg(long, value_enum, value_name = "POLICY")]
    pub on_collision: Option<CollisionPolicy>,

    /// Report what would be moved without touching any file
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Print the run report as JSON on stdout
    #[arg(long)]
    pub json: bool,

    /// Hide progress bars
    #[arg(long)]
    pub no_progress: bool,

    /// Settings file (default: ./dupe-quarantine.toml when present)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}
