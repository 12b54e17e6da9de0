use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Mutex;

use log::info;

use crate::error::DedupError;

/// Supplies the directory to scan.
pub trait RootSelector {
    /// Returns the chosen directory, or `DedupError::SelectionCancelled`.
    fn obtain_root(&self) -> Result<PathBuf, DedupError>;
}

/// A directory already known, e.g. from the command line.
#[derive(Debug, Clone)]
pub struct FixedRoot(pub PathBuf);

impl RootSelector for FixedRoot {
    fn obtain_root(&self) -> Result<PathBuf, DedupError> {
        Ok(self.0.clone())
    }
}

/// Asks for a directory on stderr and reads one line from `input`.
/// An empty answer or end of input cancels the selection.
pub struct PromptRoot<R> {
    input: Mutex<R>,
}

impl<R: BufRead> PromptRoot<R> {
    pub fn new(input: R) -> Self {
        Self {
            input: Mutex::new(input),
        }
    }
}

impl PromptRoot<std::io::StdinLock<'static>> {
    pub fn stdin() -> Self {
        Self::new(std::io::stdin().lock())
    }
}

impl<R: BufRead> RootSelector for PromptRoot<R> {
    fn obtain_root(&self) -> Result<PathBuf, DedupError> {
        eprint!("Directory to scan for duplicates: ");
        let _ = std::io::stderr().flush();

        let mut line = String::new();
        let read = match self.input.lock() {
            Ok(mut input) => input.read_line(&mut line),
            Err(_) => return Err(DedupError::SelectionCancelled),
        };
        let answer = line.trim();
        match read {
            Ok(n) if n > 0 && !answer.is_empty() => {
                info!("Selected folder: '{}'", answer);
                Ok(PathBuf::from(answer))
            }
            _ => Err(DedupError::SelectionCancelled),
        }
    }
}
