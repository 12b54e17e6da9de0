use std::io;
use std::path::PathBuf;

/// Errors that stop a run before anything on disk is touched.
#[derive(thiserror::Error, Debug)]
pub enum DedupError {
    /// The root is missing or is not a directory.
    #[error("Invalid root '{}': {reason}", .path.display())]
    InvalidRoot { path: PathBuf, reason: String },

    /// No directory was chosen.
    #[error("No directory selected")]
    SelectionCancelled,

    /// Ctrl+C arrived while files were still being hashed.
    #[error("Interrupted before any file was moved")]
    Interrupted,

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Failed to build hashing thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Per-file hashing failure. The file is left out of grouping.
#[derive(thiserror::Error, Debug)]
pub enum HashError {
    /// The file vanished between discovery and hashing.
    #[error("File not found: '{}'", .path.display())]
    NotFound { path: PathBuf },

    #[error("Failed to read '{}': {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl HashError {
    pub fn from_io(path: PathBuf, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::NotFound {
            HashError::NotFound { path }
        } else {
            HashError::Read { path, source }
        }
    }
}

/// Per-file relocation failure. The file stays at its original path.
#[derive(thiserror::Error, Debug)]
pub enum RelocationError {
    #[error("Failed to create quarantine directory '{}': {source}", .path.display())]
    Quarantine {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("No file name in '{}'", .0.display())]
    MissingFileName(PathBuf),

    #[error("Source file disappeared: '{}'", .0.display())]
    SourceMissing(PathBuf),

    #[error("Destination is the source itself: '{}'", .0.display())]
    SameFile(PathBuf),

    /// Another entry appeared at the destination while moving.
    #[error("Destination already exists: '{}'", .0.display())]
    DestinationTaken(PathBuf),

    /// The move reported success but the file is still at its old path.
    #[error("'{}' is still in place after moving it to '{}'", .from.display(), .to.display())]
    SourceRemained { from: PathBuf, to: PathBuf },

    #[error("Failed to move '{}' to '{}': {source}", .from.display(), .to.display())]
    Move {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Cross-volume copy produced a destination of the wrong length.
    #[error(
        "Copy of '{}' to '{}' is incomplete ({actual} of {expected} bytes)",
        .from.display(),
        .to.display()
    )]
    CopyVerification {
        from: PathBuf,
        to: PathBuf,
        expected: u64,
        actual: u64,
    },
}
