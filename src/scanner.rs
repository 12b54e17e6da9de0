use std::path::{Path, PathBuf};

use indicatif::{HumanCount, ProgressBar, ProgressStyle};
use log::{debug, info, warn};
use serde::Serialize;
use walkdir::WalkDir;

use crate::error::DedupError;
use crate::utils::serialize_optional_path;

/// A directory entry that could not be read during the walk.
#[derive(Debug, Serialize)]
pub struct WalkFailure {
    #[serde(serialize_with = "serialize_optional_path")]
    pub path: Option<PathBuf>,
    pub error: String,
}

/// Regular files found under the root, in discovery order.
#[derive(Debug, Default)]
pub struct WalkOutcome {
    pub files: Vec<PathBuf>,
    pub failures: Vec<WalkFailure>,
}

/// Canonicalizes `path` and checks that it is a directory.
pub fn resolve_root(path: &Path) -> Result<PathBuf, DedupError> {
    let absolute = path.canonicalize().map_err(|e| DedupError::InvalidRoot {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    if !absolute.is_dir() {
        return Err(DedupError::InvalidRoot {
            path: path.to_path_buf(),
            reason: "not a directory".to_string(),
        });
    }
    Ok(absolute)
}

/// Lists every regular file under `root`, depth-first with entries sorted by
/// name. Symlinks are neither followed nor returned, and the quarantine
/// folder `<root>/<quarantine_name>` is pruned.
pub fn walk_files(root: &Path, quarantine_name: &str, progress: bool) -> WalkOutcome {
    let mut outcome = WalkOutcome::default();
    let mut total_dirs = 0u64;

    info!("Scanning '{}'", root.display());

    let pb = if progress {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
            pb.set_style(style);
        }
        pb.set_message("Scanning files and directories...");
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        pb
    } else {
        ProgressBar::hidden()
    };

    let walker = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            !(entry.depth() == 1
                && entry.file_type().is_dir()
                && entry.file_name() == quarantine_name)
        });

    for entry in walker {
        match entry {
            Ok(entry) => {
                let file_type = entry.file_type();
                if file_type.is_dir() {
                    total_dirs += 1;
                } else if file_type.is_file() {
                    debug!("Found file: '{}'", entry.path().display());
                    outcome.files.push(entry.into_path());
                    if outcome.files.len() % 256 == 0 {
                        pb.set_message(format!(
                            "Scanning... {} files",
                            HumanCount(outcome.files.len() as u64)
                        ));
                    }
                } else if file_type.is_symlink() {
                    debug!("Skipping symlink: '{}'", entry.path().display());
                } else {
                    debug!("Skipping special file: '{}'", entry.path().display());
                }
            }
            Err(e) => {
                let path = e.path().map(Path::to_path_buf);
                warn!("Failed to read directory entry: {}", e);
                outcome.failures.push(WalkFailure {
                    path,
                    error: e.to_string(),
                });
            }
        }
    }
    pb.finish_and_clear();

    info!(
        "Found {} files in {} directories",
        HumanCount(outcome.files.len() as u64),
        HumanCount(total_dirs)
    );
    outcome
}
