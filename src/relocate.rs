use std::collections::HashSet;
use std::ffi::{OsStr, OsString};
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::duplicates::DuplicateGroup;
use crate::error::RelocationError;
use crate::utils::{serialize_display, serialize_path};

/// How many fresh names are tried when destinations keep appearing under us.
const MOVE_ATTEMPTS: usize = 8;

/// What happens when the quarantine folder already holds a file with the
/// duplicate's name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum CollisionPolicy {
    /// Pick a free name: `report (1).txt`, `report (2).txt`, ...
    #[default]
    Rename,
    /// Replace the existing file. Later duplicates in discovery order win.
    Overwrite,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Collision {
    /// The requested name was taken and the file was stored under another.
    Renamed {
        #[serde(serialize_with = "serialize_path")]
        requested: PathBuf,
    },
    /// An existing file at the destination was replaced.
    Replaced,
    /// The destination was a hard link to the source's data, so only the
    /// source link was removed.
    AlreadyLinked,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Relocation {
    #[serde(serialize_with = "serialize_path")]
    pub source: PathBuf,
    #[serde(serialize_with = "serialize_path")]
    pub destination: PathBuf,
    pub collision: Option<Collision>,
}

#[derive(Debug, Serialize)]
pub struct RelocationFailure {
    #[serde(rename = "path", serialize_with = "serialize_path")]
    pub source: PathBuf,
    #[serde(serialize_with = "serialize_display")]
    pub error: RelocationError,
}

#[derive(Debug, Default)]
pub struct GroupRelocation {
    pub relocated: Vec<Relocation>,
    pub failures: Vec<RelocationFailure>,
    /// Movable files left untouched because shutdown was requested.
    pub skipped: usize,
}

/// Moves duplicates into one quarantine folder. Destination names are
/// tracked for the whole run, so a dry run plans the same names a real run
/// would use.
#[derive(Debug)]
pub struct Relocator {
    quarantine: PathBuf,
    policy: CollisionPolicy,
    dry_run: bool,
    ready: bool,
    claimed: HashSet<PathBuf>,
}

impl Relocator {
    pub fn new(quarantine: PathBuf, policy: CollisionPolicy, dry_run: bool) -> Self {
        Self {
            quarantine,
            policy,
            dry_run,
            ready: false,
            claimed: HashSet::new(),
        }
    }

    pub fn quarantine(&self) -> &Path {
        &self.quarantine
    }

    /// Creates the quarantine folder if needed. Safe to call repeatedly;
    /// does nothing in dry-run mode.
    pub fn ensure_quarantine(&mut self) -> Result<(), RelocationError> {
        if self.ready || self.dry_run {
            return Ok(());
        }
        fs::create_dir_all(&self.quarantine).map_err(|source| RelocationError::Quarantine {
            path: self.quarantine.clone(),
            source,
        })?;
        debug!("Quarantine directory ready: '{}'", self.quarantine.display());
        self.ready = true;
        Ok(())
    }

    fn is_taken(&self, candidate: &Path) -> bool {
        // symlink_metadata also sees dangling links
        self.claimed.contains(candidate) || fs::symlink_metadata(candidate).is_ok()
    }

    /// Where `source` would land, and whether that involved a collision.
    pub fn destination_for(
        &self,
        source: &Path,
    ) -> Result<(PathBuf, Option<Collision>), RelocationError> {
        let file_name = source
            .file_name()
            .ok_or_else(|| RelocationError::MissingFileName(source.to_path_buf()))?;
        let requested = self.quarantine.join(file_name);
        if !self.is_taken(&requested) {
            return Ok((requested, None));
        }

        match self.policy {
            CollisionPolicy::Overwrite if is_hard_link_of(source, &requested) => {
                Ok((requested, Some(Collision::AlreadyLinked)))
            }
            CollisionPolicy::Overwrite => Ok((requested, Some(Collision::Replaced))),
            CollisionPolicy::Rename => {
                let mut index = 1usize;
                loop {
                    let candidate = self.quarantine.join(numbered_name(file_name, index));
                    if !self.is_taken(&candidate) {
                        return Ok((candidate, Some(Collision::Renamed { requested })));
                    }
                    index += 1;
                }
            }
        }
    }

    /// Moves one file into quarantine. On success the file is gone from
    /// its original path.
    pub fn relocate_file(&mut self, source: &Path) -> Result<Relocation, RelocationError> {
        if let Err(e) = fs::symlink_metadata(source) {
            return Err(if e.kind() == io::ErrorKind::NotFound {
                RelocationError::SourceMissing(source.to_path_buf())
            } else {
                RelocationError::Move {
                    from: source.to_path_buf(),
                    to: self.quarantine.clone(),
                    source: e,
                }
            });
        }
        self.ensure_quarantine()?;

        let mut attempt = 1;
        let (destination, collision) = loop {
            let (destination, collision) = self.destination_for(source)?;
            if destination == source {
                return Err(RelocationError::SameFile(destination));
            }
            if self.dry_run {
                info!(
                    "Would move {} to {}",
                    source.display(),
                    destination.display()
                );
                break (destination, collision);
            }
            match place(source, &destination, collision.as_ref()) {
                Ok(()) => break (destination, collision),
                Err(RelocationError::DestinationTaken(taken)) if attempt < MOVE_ATTEMPTS => {
                    debug!("'{}' appeared while moving, retrying", taken.display());
                    self.claimed.insert(taken);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        };
        self.claimed.insert(destination.clone());

        Ok(Relocation {
            source: source.to_path_buf(),
            destination,
            collision,
        })
    }

    /// Moves every duplicate of `group` except the keeper. A failure is
    /// recorded and the next file is still tried; completed moves are not
    /// rolled back.
    pub fn relocate_group(
        &mut self,
        group: &DuplicateGroup,
        shutdown: &AtomicBool,
    ) -> GroupRelocation {
        let mut outcome = GroupRelocation::default();
        for (position, source) in group.movable().iter().enumerate() {
            if shutdown.load(Ordering::Relaxed) {
                outcome.skipped = group.movable().len() - position;
                break;
            }
            match self.relocate_file(source) {
                Ok(relocation) => outcome.relocated.push(relocation),
                Err(error) => {
                    warn!("{}", error);
                    outcome.failures.push(RelocationFailure {
                        source: source.clone(),
                        error,
                    });
                }
            }
        }
        outcome
    }
}

/// Puts `source` at `destination` according to the collision found there.
fn place(
    source: &Path,
    destination: &Path,
    collision: Option<&Collision>,
) -> Result<(), RelocationError> {
    match collision {
        Some(Collision::AlreadyLinked) => {
            fs::remove_file(source).map_err(|e| RelocationError::Move {
                from: source.to_path_buf(),
                to: destination.to_path_buf(),
                source: e,
            })?;
            info!(
                "Removed {}, its data is already at {}",
                source.display(),
                destination.display()
            );
        }
        Some(Collision::Replaced) => {
            warn!(
                "Overwriting '{}' with '{}'",
                destination.display(),
                source.display()
            );
            move_file(source, destination, true)?;
            info!("Moved {} to {}", source.display(), destination.display());
        }
        _ => {
            move_file(source, destination, false)?;
            info!("Moved {} to {}", source.display(), destination.display());
        }
    }
    // rename(2) between two links of one inode succeeds without doing anything
    if fs::symlink_metadata(source).is_ok() {
        return Err(RelocationError::SourceRemained {
            from: source.to_path_buf(),
            to: destination.to_path_buf(),
        });
    }
    Ok(())
}

/// `report.txt` -> `report (n).txt`
fn numbered_name(file_name: &OsStr, index: usize) -> OsString {
    let path = Path::new(file_name);
    let mut name = path
        .file_stem()
        .map(OsStr::to_os_string)
        .unwrap_or_default();
    name.push(format!(" ({index})"));
    if let Some(extension) = path.extension() {
        name.push(".");
        name.push(extension);
    }
    name
}

/// True when `destination` is a regular file sharing `source`'s inode.
/// A symlink at the destination never counts, even if it points at the
/// source.
fn is_hard_link_of(source: &Path, destination: &Path) -> bool {
    match fs::symlink_metadata(destination) {
        Ok(meta) if meta.is_file() => {
            same_file::is_same_file(source, destination).unwrap_or(false)
        }
        _ => false,
    }
}

/// Moves `from` to `to`. With `replace` an existing destination is
/// overwritten. Without it, an entry that shows up at `to` is never
/// clobbered and `DestinationTaken` is returned instead.
pub fn move_file(from: &Path, to: &Path, replace: bool) -> Result<(), RelocationError> {
    let move_err = |source: io::Error| RelocationError::Move {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        source,
    };

    if replace {
        return match fs::rename(from, to) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
                debug!(
                    "'{}' and '{}' are on different devices, copying",
                    from.display(),
                    to.display()
                );
                copy_then_remove(from, to, true)
            }
            Err(e) => Err(move_err(e)),
        };
    }

    // Unlike rename, link(2) fails when the destination exists.
    match fs::hard_link(from, to) {
        Ok(()) => {
            if let Err(e) = fs::remove_file(from) {
                let _ = fs::remove_file(to);
                return Err(move_err(e));
            }
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
            Err(RelocationError::DestinationTaken(to.to_path_buf()))
        }
        Err(e) => {
            debug!(
                "Cannot link '{}' to '{}' ({}), copying",
                from.display(),
                to.display(),
                e
            );
            copy_then_remove(from, to, false)
        }
    }
}

/// Copies, checks the copy length, then removes the source. On any failure
/// the source stays in place and the copy is removed, unless the copy
/// never got created because something else already sat at `to`.
pub(crate) fn copy_then_remove(
    from: &Path,
    to: &Path,
    replace: bool,
) -> Result<(), RelocationError> {
    let move_err = |source: io::Error| RelocationError::Move {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        source,
    };

    let expected = fs::metadata(from).map_err(move_err)?.len();
    match copy_contents(from, to, replace) {
        Ok(_) => {}
        Err(e) if !replace && e.kind() == io::ErrorKind::AlreadyExists => {
            return Err(RelocationError::DestinationTaken(to.to_path_buf()));
        }
        Err(e) => {
            let _ = fs::remove_file(to);
            return Err(move_err(e));
        }
    }

    // From here on the copy exists and every failure has to remove it.
    let result = match fs::metadata(to) {
        Err(e) => Err(move_err(e)),
        Ok(meta) if meta.len() != expected => Err(RelocationError::CopyVerification {
            from: from.to_path_buf(),
            to: to.to_path_buf(),
            expected,
            actual: meta.len(),
        }),
        Ok(_) => fs::remove_file(from).map_err(move_err),
    };
    if result.is_err() {
        let _ = fs::remove_file(to);
    }
    result
}

fn copy_contents(from: &Path, to: &Path, replace: bool) -> io::Result<u64> {
    if replace {
        return fs::copy(from, to);
    }
    let mut reader = File::open(from)?;
    let permissions = reader.metadata()?.permissions();
    let mut writer = OpenOptions::new().write(true).create_new(true).open(to)?;
    let copied = io::copy(&mut reader, &mut writer)?;
    writer.set_permissions(permissions)?;
    Ok(copied)
}
