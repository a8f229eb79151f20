use crate::query::QueryParseError;
use crate::DocId;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// The backing directory or one of its files could not be read or written.
    /// Nothing at this layer retries; the caller decides whether to go on.
    #[error("storage failure while {context}: {source}")]
    Storage {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("index write failed: {0}")]
    IndexWrite(String),

    #[error("index writer busy: lock held at {0}")]
    WriterBusy(PathBuf),

    #[error("identifier map not found at {0}")]
    MapNotFound(PathBuf),

    #[error("identifier map of generation {map} does not match the read view of generation {view}")]
    StaleIdMap { map: u64, view: u64 },

    #[error("corrupt index: {0}")]
    CorruptIndex(String),

    #[error("corrupt document {doc}: {reason}")]
    CorruptDocument { doc: DocId, reason: String },

    #[error(transparent)]
    QueryParse(#[from] QueryParseError),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl Error {
    pub(crate) fn storage(context: impl Into<String>) -> impl FnOnce(std::io::Error) -> Error {
        let context = context.into();
        move |source| Error::Storage { context, source }
    }
}

impl From<bincode::Error> for Error {
    fn from(e: bincode::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
