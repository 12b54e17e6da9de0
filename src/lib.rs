pub mod app;
pub mod cli;
pub mod config;
pub mod duplicates;
pub mod error;
pub mod hasher;
pub mod relocate;
pub mod report;
pub mod scanner;
pub mod selector;
pub mod utils;

pub use app::run;
pub use cli::Cli;
pub use config::Settings;
pub use duplicates::{DuplicateGroup, Grouping, find_duplicates};
pub use error::{DedupError, HashError, RelocationError};
pub use hasher::{Digest, HashResult, hash_file, hash_files};
pub use relocate::{CollisionPolicy, Relocator};
pub use report::RunReport;
pub use scanner::{resolve_root, walk_files};
pub use selector::{FixedRoot, PromptRoot, RootSelector};
