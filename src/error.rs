use std::path::PathBuf;

use crate::io::FromFileError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(
        "No tsconfig.json found between {start_path:?} and the filesystem root; \
         pass an explicit project path to select a configuration"
    )]
    ConfigNotFound { start_path: PathBuf },

    #[error("Error parsing {filename:?}; fix the file or pass an explicit project path")]
    ConfigParse {
        #[source]
        source: FromFileError,
        filename: PathBuf,
    },

    #[error("Error reading {filename:?}")]
    ConfigRead {
        #[source]
        source: FromFileError,
        filename: PathBuf,
    },

    #[error("Unresolvable extends reference {reference:?} in {filename:?}")]
    ExtendsNotFound {
        filename: PathBuf,
        reference: String,
    },

    #[error("Cycle in tsconfig extends chain at {filename:?}")]
    ExtendsCycle { filename: PathBuf },

    #[error("Invalid include pattern in {filename:?}")]
    IncludePattern {
        #[source]
        source: globwalk::GlobError,
        filename: PathBuf,
    },

    #[error("Error enumerating files under {directory:?}")]
    DirectoryWalk {
        #[source]
        source: globwalk::WalkError,
        directory: PathBuf,
    },

    #[error("Error reading {path:?} during dependency discovery")]
    DiscoveryRead {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    #[error("Error writing synthesized config to {path:?}")]
    CacheWrite {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    #[error("Cancelled before completion")]
    Cancelled,
}
