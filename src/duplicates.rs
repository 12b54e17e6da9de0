use std::collections::HashMap;
use std::path::{Path, PathBuf};

use colored::Colorize;
use indicatif::{HumanBytes, HumanCount};
use log::{info, warn};
use serde::{Serialize, Serializer};

use crate::error::HashError;
use crate::hasher::{Digest, HashResult};
use crate::utils::{relative_display, serialize_display, serialize_path, serialize_paths};

/// Files sharing one digest, in discovery order. The first one is kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateGroup {
    pub digest: Digest,
    /// Size of each member in bytes.
    pub size: u64,
    pub files: Vec<PathBuf>,
}

impl DuplicateGroup {
    pub fn keeper(&self) -> &Path {
        &self.files[0]
    }

    /// Every member except the keeper.
    pub fn movable(&self) -> &[PathBuf] {
        &self.files[1..]
    }

    /// Bytes freed once all movable copies are gone.
    pub fn wasted_bytes(&self) -> u64 {
        self.size * self.movable().len() as u64
    }
}

/// Reported as `keeper` plus `duplicates` rather than a flat file list.
#[derive(Serialize)]
struct GroupEntry<'a> {
    digest: &'a Digest,
    size: u64,
    #[serde(serialize_with = "serialize_path")]
    keeper: &'a Path,
    #[serde(serialize_with = "serialize_paths")]
    duplicates: &'a [PathBuf],
}

impl Serialize for DuplicateGroup {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        GroupEntry {
            digest: &self.digest,
            size: self.size,
            keeper: self.keeper(),
            duplicates: self.movable(),
        }
        .serialize(serializer)
    }
}

#[derive(Debug, Serialize)]
pub struct HashFailure {
    #[serde(serialize_with = "serialize_path")]
    pub path: PathBuf,
    #[serde(serialize_with = "serialize_display")]
    pub error: HashError,
}

#[derive(Debug, Default)]
pub struct Grouping {
    /// Ordered by the discovery position of each group's keeper.
    pub groups: Vec<DuplicateGroup>,
    pub failures: Vec<HashFailure>,
    /// Distinct digests seen, including singletons.
    pub unique: usize,
}

/// Groups hash results by digest. Member order follows the order of
/// `results`; failed hashes are set aside for reporting.
pub fn find_duplicates(results: Vec<HashResult>) -> Grouping {
    let mut slots: HashMap<Digest, usize> = HashMap::new();
    let mut buckets: Vec<DuplicateGroup> = Vec::new();
    let mut failures = Vec::new();

    info!("Finding duplicates...");
    for result in results {
        match result.outcome {
            Ok(hash) => {
                let slot = *slots.entry(hash.digest).or_insert_with(|| {
                    buckets.push(DuplicateGroup {
                        digest: hash.digest,
                        size: hash.size,
                        files: Vec::new(),
                    });
                    buckets.len() - 1
                });
                buckets[slot].files.push(result.path);
            }
            Err(error) => failures.push(HashFailure {
                path: result.path,
                error,
            }),
        }
    }

    let unique = buckets.len();
    // Filter out groups with only one file (no duplicates)
    buckets.retain(|group| group.files.len() > 1);

    info!(
        "Duplicate analysis complete: {} unique hashes, {} duplicate groups, {} hash failures",
        HumanCount(unique as u64),
        HumanCount(buckets.len() as u64),
        HumanCount(failures.len() as u64)
    );

    Grouping {
        groups: buckets,
        failures,
        unique,
    }
}

/// Lists every group before anything is moved.
pub fn log_groups(groups: &[DuplicateGroup], base_path: &Path) {
    if groups.is_empty() {
        return;
    }
    let total_duplicates: usize = groups.iter().map(|g| g.movable().len()).sum();
    let total_wasted_space: u64 = groups.iter().map(DuplicateGroup::wasted_bytes).sum();

    warn!(
        "Found {} duplicate files wasting {} of space",
        HumanCount(total_duplicates as u64),
        HumanBytes(total_wasted_space)
    );

    for (index, group) in groups.iter().enumerate() {
        info!(
            "Group {} ({}, {} files):",
            index + 1,
            HumanBytes(group.size),
            group.files.len()
        );
        info!(
            "  {} {}",
            "keep".green(),
            relative_display(group.keeper(), base_path)
        );
        for file in group.movable() {
            info!("  {} {}", "move".yellow(), relative_display(file, base_path));
        }
    }
}
