use std::fmt;
use std::path::PathBuf;

use smeta_engine::EngineError;

/// The document could not be read as an estimate tree.
#[derive(Debug)]
pub enum ReadError {
    Io { path: PathBuf, source: std::io::Error },
    /// Ill-formed XML; `offset` is the byte position where the reader stopped.
    Xml { offset: u64, message: String },
    /// Declared encoding is unknown or the bytes do not decode.
    Encoding(String),
}

impl fmt::Display for ReadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "cannot read {}: {source}", path.display()),
            Self::Xml { offset, message } => write!(f, "malformed XML at byte {offset}: {message}"),
            Self::Encoding(msg) => write!(f, "encoding error: {msg}"),
        }
    }
}

impl std::error::Error for ReadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub enum StoreError {
    Io(std::io::Error),
    Sql(rusqlite::Error),
    /// The owning estimate record does not exist.
    UnknownRecord(i64),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "io: {err}"),
            Self::Sql(err) => write!(f, "sqlite: {err}"),
            Self::UnknownRecord(id) => write!(f, "estimate record {id} does not exist"),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<std::io::Error> for StoreError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sql(value)
    }
}

/// The single failure reported for one ingestion.
#[derive(Debug)]
pub enum IngestError {
    Read(ReadError),
    Engine(EngineError),
    Store(StoreError),
}

impl fmt::Display for IngestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read(err) => write!(f, "{err}"),
            Self::Engine(err) => write!(f, "{err}"),
            Self::Store(err) => write!(f, "persistence failed, nothing was written: {err}"),
        }
    }
}

impl std::error::Error for IngestError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Read(err) => Some(err),
            Self::Engine(err) => Some(err),
            Self::Store(err) => Some(err),
        }
    }
}

impl From<ReadError> for IngestError {
    fn from(value: ReadError) -> Self {
        Self::Read(value)
    }
}

impl From<EngineError> for IngestError {
    fn from(value: EngineError) -> Self {
        Self::Engine(value)
    }
}

impl From<StoreError> for IngestError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}
