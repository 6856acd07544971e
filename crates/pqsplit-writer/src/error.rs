//! Error types for the partition writer crate

use std::path::PathBuf;

use thiserror::Error;

/// Error codes for programmatic handling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// E001: Filesystem operation failed
    E001Io,
    /// E002: Parquet encoding failed
    E002Encoding,
    /// E003: Batch does not match the partition schema
    E003SchemaMismatch,
    /// E004: Partition file already committed
    E004AlreadyExists,
    /// E005: Write skipped because the run was cancelled
    E005Cancelled,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::E001Io => "E001",
            Self::E002Encoding => "E002",
            Self::E003SchemaMismatch => "E003",
            Self::E004AlreadyExists => "E004",
            Self::E005Cancelled => "E005",
        }
    }
}

/// Errors that can occur while persisting a partition
#[derive(Debug, Error)]
pub enum WriterError {
    /// Filesystem operation failed
    #[error("[{}] I/O error on '{}': {source}", ErrorCode::E001Io.as_str(), .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Parquet encoding failed
    #[error("[{}] Parquet encoding failed for partition {index}: {source}", ErrorCode::E002Encoding.as_str())]
    Parquet {
        index: u64,
        #[source]
        source: parquet::errors::ParquetError,
    },

    /// A batch in the partition does not match the partition schema
    #[error("[{}] Partition {index} contains a batch with a different schema", ErrorCode::E003SchemaMismatch.as_str())]
    SchemaMismatch { index: u64 },

    /// The target file was committed by an earlier write
    #[error("[{}] Partition file '{}' already exists; refusing to overwrite", ErrorCode::E004AlreadyExists.as_str(), .path.display())]
    AlreadyExists { path: PathBuf },

    /// The write was skipped because the run was cancelled
    #[error("[{}] Write of partition {index} cancelled", ErrorCode::E005Cancelled.as_str())]
    Cancelled { index: u64 },
}

impl WriterError {
    /// Create an I/O error for the given path
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Io { .. } => ErrorCode::E001Io,
            Self::Parquet { .. } => ErrorCode::E002Encoding,
            Self::SchemaMismatch { .. } => ErrorCode::E003SchemaMismatch,
            Self::AlreadyExists { .. } => ErrorCode::E004AlreadyExists,
            Self::Cancelled { .. } => ErrorCode::E005Cancelled,
        }
    }
}

/// Result type alias for WriterError
pub type Result<T> = std::result::Result<T, WriterError>;
