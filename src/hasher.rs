use std::fmt;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use indicatif::{HumanCount, ProgressBar, ProgressStyle};
use log::{debug, error, info};
use rayon::prelude::*;

use crate::error::{DedupError, HashError};

/// BLAKE3 content fingerprint. Equal digests mean identical bytes.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Digest(blake3::Hash);

impl Digest {
    pub fn of_bytes(bytes: &[u8]) -> Self {
        Digest(blake3::hash(bytes))
    }

    pub fn to_hex(&self) -> String {
        self.0.to_hex().to_string()
    }
}

impl From<blake3::Hash> for Digest {
    fn from(hash: blake3::Hash) -> Self {
        Digest(hash)
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.to_hex().as_str())
    }
}

impl serde::Serialize for Digest {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileHash {
    pub digest: Digest,
    /// Bytes streamed through the hasher.
    pub size: u64,
}

/// Outcome of hashing one discovered file.
#[derive(Debug)]
pub struct HashResult {
    pub path: PathBuf,
    pub outcome: Result<FileHash, HashError>,
}

#[derive(Debug, Clone)]
pub struct HashOptions {
    /// `None` or `Some(0)` means one thread per core.
    pub threads: Option<usize>,
    pub buffer_size: usize,
    pub progress: bool,
}

/// Streams `file_path` through BLAKE3 with a fixed `buffer_size` buffer, so
/// memory use does not depend on the file size.
pub fn hash_file(file_path: &Path, buffer_size: usize) -> Result<FileHash, HashError> {
    let io_err = |e: std::io::Error| HashError::from_io(file_path.to_path_buf(), e);

    let mut file = fs::File::open(file_path).map_err(io_err)?;
    let mut hasher = blake3::Hasher::new();
    let mut buffer = vec![0u8; buffer_size.max(1)];
    let mut total_bytes = 0u64;

    loop {
        let bytes_read = match file.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(io_err(e)),
        };
        hasher.update(&buffer[..bytes_read]);
        total_bytes += bytes_read as u64;
    }

    let digest = Digest(hasher.finalize());
    debug!(
        "Hash calculated for '{}': {} ({} bytes)",
        file_path.display(),
        digest,
        total_bytes
    );
    Ok(FileHash {
        digest,
        size: total_bytes,
    })
}

/// Hashes every path on a dedicated pool. The result vector lines up with
/// `paths` index for index, whatever order the workers finish in.
pub fn hash_files(
    paths: &[PathBuf],
    options: &HashOptions,
    shutdown: &AtomicBool,
) -> Result<Vec<HashResult>, DedupError> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(options.threads.unwrap_or(0))
        .thread_name(|i| format!("hasher-{i}"))
        .build()?;

    let progress_bar = if options.progress {
        let pb = ProgressBar::new(paths.len() as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg} ETA: {eta}")
        {
            pb.set_style(style.progress_chars("#>-"));
        }
        pb
    } else {
        ProgressBar::hidden()
    };

    info!(
        "Hashing {} files on {} threads",
        HumanCount(paths.len() as u64),
        pool.current_num_threads()
    );

    let results: Option<Vec<HashResult>> = pool.install(|| {
        paths
            .par_iter()
            .map(|path| {
                if shutdown.load(Ordering::Relaxed) {
                    return None;
                }
                let outcome = hash_file(path, options.buffer_size);
                if let Err(e) = &outcome {
                    error!("Failed to calculate hash: {}", e);
                }
                progress_bar.inc(1);
                Some(HashResult {
                    path: path.clone(),
                    outcome,
                })
            })
            .collect()
    });
    progress_bar.finish_and_clear();

    results.ok_or(DedupError::Interrupted)
}
