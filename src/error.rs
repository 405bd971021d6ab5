//! Crate-level error type.
//!
//! Only failures that abort a whole call live here. A single image that
//! cannot be fetched, decoded or resized is not an error; it is recorded as
//! a [`SkipReason`](crate::report::SkipReason) in the conversion report.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot express {} as a file URL", .0.display())]
    FolderUrl(PathBuf),

    #[error("invalid base URI '{uri}': {source}")]
    InvalidBaseUri {
        uri: String,
        #[source]
        source: url::ParseError,
    },
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
