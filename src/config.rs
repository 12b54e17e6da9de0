use std::fs;
use std::path::{Component, Path, PathBuf};

use log::{debug, info};
use serde::Deserialize;

use crate::cli::Cli;
use crate::error::DedupError;
use crate::relocate::CollisionPolicy;

pub const DEFAULT_QUARANTINE_DIR: &str = "duplicates";
pub const DEFAULT_BUFFER_SIZE: usize = 64 * 1024;

/// Run settings, layered as defaults < settings file < command line.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Hashing threads; `None` uses one per core.
    pub threads: Option<usize>,
    /// Quarantine folder name, created directly under the scanned root.
    pub quarantine_dir: String,
    pub on_collision: CollisionPolicy,
    /// Read buffer for streaming hashes, in bytes.
    pub buffer_size: usize,
    pub progress: bool,
    pub dry_run: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            threads: None,
            quarantine_dir: DEFAULT_QUARANTINE_DIR.to_string(),
            on_collision: CollisionPolicy::default(),
            buffer_size: DEFAULT_BUFFER_SIZE,
            progress: true,
            dry_run: false,
        }
    }
}

impl Settings {
    /// Default settings file: `dupe-quarantine.toml` in the working directory.
    pub fn default_path() -> Option<PathBuf> {
        std::env::current_dir()
            .ok()
            .map(|dir| dir.join(format!("{}.toml", env!("CARGO_PKG_NAME"))))
    }

    /// Loads settings from `explicit` (which must exist) or from the default
    /// file when present. Falls back to defaults otherwise.
    pub fn load(explicit: Option<&Path>) -> Result<Self, DedupError> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => match Self::default_path() {
                Some(path) if path.is_file() => path,
                _ => {
                    debug!("No settings file found, using defaults");
                    return Ok(Self::default());
                }
            },
        };

        let text = fs::read_to_string(&path).map_err(|e| {
            DedupError::Config(format!("cannot read '{}': {}", path.display(), e))
        })?;
        let settings = Self::from_toml(&text)
            .map_err(|e| DedupError::Config(format!("'{}': {}", path.display(), e)))?;
        info!("Loaded settings from '{}'", path.display());
        Ok(settings)
    }

    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Command-line flags win over anything loaded from file.
    pub fn apply_cli(&mut self, cli: &Cli) {
        if let Some(threads) = cli.threads {
            self.threads = Some(threads);
        }
        if let Some(name) = &cli.quarantine {
            self.quarantine_dir = name.clone();
        }
        if let Some(policy) = cli.on_collision {
            self.on_collision = policy;
        }
        if cli.dry_run {
            self.dry_run = true;
        }
        if cli.no_progress || cli.json {
            self.progress = false;
        }
    }

    pub fn validate(&self) -> Result<(), DedupError> {
        if self.buffer_size == 0 {
            return Err(DedupError::Config("buffer_size must be greater than 0".into()));
        }
        let mut components = Path::new(&self.quarantine_dir).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => Ok(()),
            _ => Err(DedupError::Config(format!(
                "quarantine_dir must be a plain folder name, got '{}'",
                self.quarantine_dir
            ))),
        }
    }
}
