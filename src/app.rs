use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use indicatif::HumanCount;
use log::{info, warn};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::config::Settings;
use crate::duplicates::{find_duplicates, log_groups};
use crate::error::DedupError;
use crate::hasher::{HashOptions, hash_files};
use crate::relocate::Relocator;
use crate::report::RunReport;
use crate::scanner::{resolve_root, walk_files};
use crate::selector::RootSelector;

/// Runs one scan: pick root, walk, hash, group, relocate.
///
/// Only a bad root, a cancelled selection, a bad configuration or Ctrl+C
/// during hashing end the run early. Per-file problems land in the report.
pub fn run(
    selector: &dyn RootSelector,
    settings: &Settings,
    shutdown: &AtomicBool,
) -> Result<RunReport, DedupError> {
    let start_time = Instant::now();
    let started_at = OffsetDateTime::now_local()
        .unwrap_or_else(|_| OffsetDateTime::now_utc())
        .format(&Rfc3339)
        .unwrap_or_default();

    settings.validate()?;
    let root = resolve_root(&selector.obtain_root()?)?;
    info!("Target directory: '{}'", root.display());

    let walk = walk_files(&root, &settings.quarantine_dir, settings.progress);

    let options = HashOptions {
        threads: settings.threads,
        buffer_size: settings.buffer_size,
        progress: settings.progress,
    };
    let results = hash_files(&walk.files, &options, shutdown)?;
    let grouping = find_duplicates(results);

    let quarantine = root.join(&settings.quarantine_dir);
    let mut report = RunReport {
        root,
        quarantine: quarantine.clone(),
        started_at,
        dry_run: settings.dry_run,
        files_scanned: walk.files.len(),
        walk_failures: walk.failures,
        hash_failures: grouping.failures,
        ..RunReport::default()
    };

    if grouping.groups.is_empty() {
        info!("No duplicate files found.");
    } else {
        log_groups(&grouping.groups, &report.root);

        let mut relocator = Relocator::new(quarantine, settings.on_collision, settings.dry_run);
        for group in &grouping.groups {
            if shutdown.load(Ordering::Relaxed) {
                report.interrupted = true;
                report.skipped += group.movable().len();
                continue;
            }
            let outcome = relocator.relocate_group(group, shutdown);
            report.relocated.extend(outcome.relocated);
            report.relocation_failures.extend(outcome.failures);
            if outcome.skipped > 0 {
                report.interrupted = true;
                report.skipped += outcome.skipped;
            }
        }

        info!(
            "Relocated {} files into '{}'",
            HumanCount(report.relocated.len() as u64),
            relocator.quarantine().display()
        );
        if !report.relocation_failures.is_empty() {
            warn!(
                "{} files could not be relocated",
                HumanCount(report.relocation_failures.len() as u64)
            );
        }
    }

    report.groups = grouping.groups;
    report.elapsed = start_time.elapsed();
    Ok(report)
}
