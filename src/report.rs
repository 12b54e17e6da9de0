use std::path::{Path, PathBuf};
use std::time::Duration;

use colored::Colorize;
use indicatif::{HumanBytes, HumanCount};
use serde::Serialize;
use serde_json::Value;

use crate::duplicates::{DuplicateGroup, HashFailure};
use crate::relocate::{Collision, Relocation, RelocationFailure};
use crate::scanner::WalkFailure;
use crate::utils::{format_human_elapsed, relative_display, serialize_path, serialize_secs};

pub const EXIT_SUCCESS: i32 = 0;
/// 128 + SIGINT
pub const EXIT_INTERRUPTED: i32 = 130;

/// Everything a run did and everything that went wrong along the way.
#[derive(Debug, Default, Serialize)]
pub struct RunReport {
    #[serde(serialize_with = "serialize_path")]
    pub root: PathBuf,
    #[serde(serialize_with = "serialize_path")]
    pub quarantine: PathBuf,
    /// RFC 3339 local start time.
    pub started_at: String,
    #[serde(rename = "elapsed_secs", serialize_with = "serialize_secs")]
    pub elapsed: Duration,
    pub dry_run: bool,
    /// Ctrl+C arrived during relocation; `skipped` files were not attempted.
    pub interrupted: bool,
    pub skipped: usize,
    pub files_scanned: usize,
    pub walk_failures: Vec<WalkFailure>,
    pub hash_failures: Vec<HashFailure>,
    pub groups: Vec<DuplicateGroup>,
    pub relocated: Vec<Relocation>,
    pub relocation_failures: Vec<RelocationFailure>,
}

/// JSON form of a report: every field plus the derived totals.
#[derive(Serialize)]
struct JsonReport<'a> {
    #[serde(flatten)]
    report: &'a RunReport,
    duplicate_files: usize,
    wasted_bytes: u64,
}

impl RunReport {
    pub fn duplicate_files(&self) -> usize {
        self.groups.iter().map(|g| g.movable().len()).sum()
    }

    pub fn wasted_bytes(&self) -> u64 {
        self.groups.iter().map(DuplicateGroup::wasted_bytes).sum()
    }

    pub fn collisions(&self) -> usize {
        self.relocated.iter().filter(|r| r.collision.is_some()).count()
    }

    /// Partial success still counts as success.
    pub fn exit_code(&self) -> i32 {
        if self.interrupted {
            EXIT_INTERRUPTED
        } else {
            EXIT_SUCCESS
        }
    }

    pub fn print_summary(&self) {
        let rel = |p: &Path| relative_display(p, &self.root);

        if self.groups.is_empty() {
            println!("{}", "No duplicate files found.".green());
        } else {
            let verb = if self.dry_run { "would be moved" } else { "moved" };
            println!(
                "{} duplicate groups, {} duplicate files ({}), {} {} to '{}'",
                HumanCount(self.groups.len() as u64).to_string().bold(),
                HumanCount(self.duplicate_files() as u64),
                HumanBytes(self.wasted_bytes()),
                HumanCount(self.relocated.len() as u64).to_string().bold(),
                verb,
                self.quarantine.display()
            );
        }
        println!(
            "Scanned {} files in {}",
            HumanCount(self.files_scanned as u64),
            format_human_elapsed(self.elapsed)
        );

        if self.collisions() > 0 {
            println!(
                "{}",
                format!("{} name collisions in quarantine:", self.collisions()).yellow()
            );
            for relocation in self.relocated.iter().filter(|r| r.collision.is_some()) {
                let note = match &relocation.collision {
                    Some(Collision::Replaced) => "replaced existing file".to_string(),
                    Some(Collision::AlreadyLinked) => {
                        format!("already held, removed {}", rel(&relocation.source))
                    }
                    Some(Collision::Renamed { requested }) => {
                        format!("stored instead of {}", rel(requested))
                    }
                    None => continue,
                };
                println!("  {} ({})", rel(&relocation.destination), note);
            }
        }

        if !self.walk_failures.is_empty() {
            println!(
                "{}",
                format!("{} directory entries could not be read:", self.walk_failures.len()).red()
            );
            for failure in &self.walk_failures {
                println!("  {}", failure.error);
            }
        }
        if !self.hash_failures.is_empty() {
            println!(
                "{}",
                format!("{} files could not be hashed:", self.hash_failures.len()).red()
            );
            for failure in &self.hash_failures {
                println!("  {}: {}", rel(&failure.path), failure.error);
            }
        }
        if !self.relocation_failures.is_empty() {
            println!(
                "{}",
                format!("{} files could not be moved:", self.relocation_failures.len()).red()
            );
            for failure in &self.relocation_failures {
                println!("  {}: {}", rel(&failure.source), failure.error);
            }
        }
        if self.interrupted {
            println!(
                "{}",
                format!("Interrupted: {} duplicates were left in place", self.skipped).red()
            );
        }
    }

    fn json_report(&self) -> JsonReport<'_> {
        JsonReport {
            report: self,
            duplicate_files: self.duplicate_files(),
            wasted_bytes: self.wasted_bytes(),
        }
    }

    pub fn to_json_value(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self.json_report())
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.json_report())
    }
}
