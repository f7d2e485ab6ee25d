//! Error types for `PerunDB`.
//!
//! This module provides a single structured error type for all `PerunDB`
//! operations. Every error carries a stable code, the operation that raised
//! it, optional file location (path + offset), a key/value context map, an
//! optional wrapped cause, and a severity.
//!
//! Error codes follow the pattern `PERUN-XXX` for easy debugging.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type alias for `PerunDB` operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Stable error codes for `PerunDB` operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorCode {
    /// Caller passed an invalid argument (PERUN-001).
    InvalidArgument,
    /// Operation is not supported (PERUN-002).
    NotSupported,
    /// Operation was cancelled by the caller (PERUN-003).
    Cancelled,
    /// Operation timed out (PERUN-004).
    Timeout,
    /// File magic bytes did not match (PERUN-010).
    InvalidMagic,
    /// File format version is not readable by this build (PERUN-011).
    VersionMismatch,
    /// On-disk data failed checksum or structural validation (PERUN-012).
    CorruptedFile,
    /// Batch schema does not match the writer schema (PERUN-013).
    SchemaMismatch,
    /// Header or footer metadata exceeds its reservation (PERUN-014).
    MetadataError,
    /// Encoder failed to produce a payload (PERUN-020).
    EncodeFailed,
    /// Decoder failed to reconstruct an array (PERUN-021).
    DecodeFailed,
    /// Encoder does not support the array's data type (PERUN-022).
    UnsupportedType,
    /// General-purpose compression failed (PERUN-023).
    CompressionFailed,
    /// Encoder does not support null values (PERUN-024).
    NullNotSupported,
    /// Generic I/O failure (PERUN-030).
    Io,
    /// File not found (PERUN-031).
    FileNotFound,
    /// Permission denied (PERUN-032).
    PermissionDenied,
    /// Disk is full (PERUN-033).
    DiskFull,
    /// Unexpected end of file (PERUN-034).
    UnexpectedEof,
    /// Column index out of range (PERUN-040).
    ColumnNotFound,
    /// Page not found in the footer index (PERUN-041).
    PageNotFound,
    /// Array data type does not match the declared schema type (PERUN-042).
    TypeMismatch,
    /// Supplied buffer is too small (PERUN-043).
    BufferTooSmall,
    /// Vector dimension does not match the index dimension (PERUN-050).
    DimensionMismatch,
    /// Search on an index with no vectors (PERUN-051).
    EmptyIndex,
}

impl ErrorCode {
    /// Returns the stable code string (e.g. `PERUN-001`).
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidArgument => "PERUN-001",
            Self::NotSupported => "PERUN-002",
            Self::Cancelled => "PERUN-003",
            Self::Timeout => "PERUN-004",
            Self::InvalidMagic => "PERUN-010",
            Self::VersionMismatch => "PERUN-011",
            Self::CorruptedFile => "PERUN-012",
            Self::SchemaMismatch => "PERUN-013",
            Self::MetadataError => "PERUN-014",
            Self::EncodeFailed => "PERUN-020",
            Self::DecodeFailed => "PERUN-021",
            Self::UnsupportedType => "PERUN-022",
            Self::CompressionFailed => "PERUN-023",
            Self::NullNotSupported => "PERUN-024",
            Self::Io => "PERUN-030",
            Self::FileNotFound => "PERUN-031",
            Self::PermissionDenied => "PERUN-032",
            Self::DiskFull => "PERUN-033",
            Self::UnexpectedEof => "PERUN-034",
            Self::ColumnNotFound => "PERUN-040",
            Self::PageNotFound => "PERUN-041",
            Self::TypeMismatch => "PERUN-042",
            Self::BufferTooSmall => "PERUN-043",
            Self::DimensionMismatch => "PERUN-050",
            Self::EmptyIndex => "PERUN-051",
        }
    }

    /// Default severity for this code.
    #[must_use]
    pub const fn default_severity(&self) -> Severity {
        match self {
            Self::CorruptedFile | Self::InvalidMagic => Severity::Fatal,
            Self::Cancelled | Self::Timeout => Severity::Warning,
            _ => Severity::Error,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Severity of an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Recoverable; the operation may be retried.
    Warning,
    /// The operation failed; the engine remains usable.
    Error,
    /// The data source is unusable (corruption, bad magic).
    Fatal,
}

/// Error raised by a `PerunDB` operation.
///
/// Built through the constructor helpers plus the fluent `op`/`path`/
/// `offset`/`ctx`/`caused_by` methods so call sites stay one-liners:
///
/// ```rust,ignore
/// return Err(Error::corrupted("page checksum mismatch")
///     .op("format::read_page")
///     .path(path)
///     .offset(page_offset)
///     .ctx("column", col.to_string()));
/// ```
#[derive(Error, Debug)]
#[error("[{code}] {op}: {message}")]
pub struct Error {
    /// Stable error code.
    code: ErrorCode,
    /// Human-readable description.
    message: String,
    /// Operation that raised the error (e.g. `hnsw::insert`).
    op: String,
    /// File involved, if any.
    path: Option<PathBuf>,
    /// Byte offset within `path`, if known.
    offset: Option<u64>,
    /// Structured key/value context.
    context: BTreeMap<String, String>,
    /// Wrapped cause.
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
    /// Severity.
    severity: Severity,
}

impl Error {
    /// Creates a new error with the given code and message.
    #[must_use]
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            op: String::from("unknown"),
            path: None,
            offset: None,
            context: BTreeMap::new(),
            source: None,
            severity: code.default_severity(),
        }
    }

    /// Caller passed an invalid argument.
    #[must_use]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidArgument, message)
    }

    /// Operation is not supported.
    #[must_use]
    pub fn not_supported(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotSupported, message)
    }

    /// On-disk data failed validation. Fatal by default.
    #[must_use]
    pub fn corrupted(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::CorruptedFile, message)
    }

    /// Encoder rejected a null-carrying array.
    ///
    /// The page writer catches this code and falls back to the general
    /// compressor; it must never surface to callers.
    #[must_use]
    pub fn null_not_supported(encoding: &str) -> Self {
        Self::new(
            ErrorCode::NullNotSupported,
            format!("{encoding} encoding does not support null values"),
        )
    }

    /// Encoder rejected the array's data type. Caught by the page writer.
    #[must_use]
    pub fn unsupported_type(encoding: &str, data_type: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::UnsupportedType,
            format!("{encoding} encoding does not support type {data_type}"),
        )
    }

    /// Decoder failed to reconstruct an array.
    #[must_use]
    pub fn decode_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::DecodeFailed, message)
    }

    /// Encoder failed to produce a payload.
    #[must_use]
    pub fn encode_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::EncodeFailed, message)
    }

    /// Vector dimension does not match the index dimension.
    #[must_use]
    pub fn dimension_mismatch(expected: usize, actual: usize) -> Self {
        Self::new(
            ErrorCode::DimensionMismatch,
            format!("vector dimension mismatch: expected {expected}, got {actual}"),
        )
    }

    /// Search attempted on an empty index.
    #[must_use]
    pub fn empty_index() -> Self {
        Self::new(ErrorCode::EmptyIndex, "index contains no vectors")
    }

    /// Array type does not match the declared schema type.
    #[must_use]
    pub fn type_mismatch(expected: impl fmt::Display, actual: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::TypeMismatch,
            format!("type mismatch: expected {expected}, got {actual}"),
        )
    }

    /// Batch schema does not match the writer schema.
    #[must_use]
    pub fn schema_mismatch(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::SchemaMismatch, message)
    }

    /// Header or footer metadata exceeds its reservation.
    #[must_use]
    pub fn metadata(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::MetadataError, message)
    }

    /// Sets the operation that raised the error.
    #[must_use]
    pub fn op(mut self, op: impl Into<String>) -> Self {
        self.op = op.into();
        self
    }

    /// Attaches the file path involved.
    #[must_use]
    pub fn path(mut self, path: impl AsRef<Path>) -> Self {
        self.path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Attaches a byte offset within the file.
    #[must_use]
    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Adds a key/value pair to the context map.
    #[must_use]
    pub fn ctx(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Wraps a cause.
    #[must_use]
    pub fn caused_by(
        mut self,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Overrides the severity.
    #[must_use]
    pub fn severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    /// Returns the error code.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        self.code
    }

    /// Returns the operation that raised the error.
    #[must_use]
    pub fn operation(&self) -> &str {
        &self.op
    }

    /// Returns the file path involved, if any.
    #[must_use]
    pub fn file_path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Returns the byte offset within the file, if known.
    #[must_use]
    pub const fn file_offset(&self) -> Option<u64> {
        self.offset
    }

    /// Returns the structured context map.
    #[must_use]
    pub const fn context(&self) -> &BTreeMap<String, String> {
        &self.context
    }

    /// Returns the severity.
    #[must_use]
    pub const fn error_severity(&self) -> Severity {
        self.severity
    }

    /// Returns true for errors that make the data source unusable.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        self.severity == Severity::Fatal
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        use std::io::ErrorKind;

        let code = match err.kind() {
            ErrorKind::NotFound => ErrorCode::FileNotFound,
            ErrorKind::PermissionDenied => ErrorCode::PermissionDenied,
            ErrorKind::UnexpectedEof => ErrorCode::UnexpectedEof,
            ErrorKind::TimedOut => ErrorCode::Timeout,
            // ENOSPC has no stable ErrorKind yet
            _ if err.raw_os_error() == Some(28) => ErrorCode::DiskFull,
            _ => ErrorCode::Io,
        };
        Self::new(code, err.to_string()).caused_by(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_strings_are_stable() {
        assert_eq!(ErrorCode::InvalidArgument.as_str(), "PERUN-001");
        assert_eq!(ErrorCode::CorruptedFile.as_str(), "PERUN-012");
        assert_eq!(ErrorCode::EmptyIndex.as_str(), "PERUN-051");
    }

    #[test]
    fn test_builder_accumulates_context() {
        let err = Error::corrupted("page checksum mismatch")
            .op("format::read_page")
            .path("/tmp/data.lance")
            .offset(8192)
            .ctx("column", "3");

        assert_eq!(err.code(), ErrorCode::CorruptedFile);
        assert_eq!(err.operation(), "format::read_page");
        assert_eq!(err.file_offset(), Some(8192));
        assert_eq!(err.context().get("column").map(String::as_str), Some("3"));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_display_includes_code_and_op() {
        let err = Error::dimension_mismatch(128, 64).op("hnsw::insert");
        let text = err.to_string();
        assert!(text.contains("PERUN-050"));
        assert!(text.contains("hnsw::insert"));
        assert!(text.contains("expected 128"));
    }

    #[test]
    fn test_io_error_mapping() {
        let not_found = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        assert_eq!(Error::from(not_found).code(), ErrorCode::FileNotFound);

        let eof = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "eof");
        assert_eq!(Error::from(eof).code(), ErrorCode::UnexpectedEof);
    }

    #[test]
    fn test_wrapped_cause_is_chained() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "device gone");
        let err = Error::new(ErrorCode::Io, "read failed").caused_by(io);
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_timeout_is_warning_severity() {
        let err = Error::new(ErrorCode::Timeout, "page read timed out");
        assert_eq!(err.error_severity(), Severity::Warning);
        assert!(!err.is_fatal());
    }
}
