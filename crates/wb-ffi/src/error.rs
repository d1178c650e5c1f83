//! Error types for loading the native controller library

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while loading or binding the controller library
#[derive(Debug, Error)]
pub enum FfiError {
    /// The library file does not exist
    #[error("controller library not found at {0}")]
    LibraryNotFound(PathBuf),

    /// The dynamic loader rejected the library
    #[error("failed to load controller library {path}: {source}")]
    Load {
        path: PathBuf,
        #[source]
        source: libloading::Error,
    },

    /// A required function is not exported by the library
    #[error("controller library does not export {0}")]
    MissingSymbol(&'static str),

    /// No library path was given and `WEBOTS_HOME` is not set
    #[error("WEBOTS_HOME is not set and no controller library path was given")]
    WebotsHomeUnset,
}
