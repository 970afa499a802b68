//! Error types for reading form definitions and submitted instances.

use std::path::PathBuf;

use odk_model::ModelError;
use thiserror::Error;

/// Errors raised while reading one source or listing a root.
#[derive(Debug, Error)]
pub enum IngestError {
    // === File System Errors ===
    /// Root directory not found.
    #[error("directory not found: {path}")]
    DirectoryNotFound { path: PathBuf },

    /// Failed to read directory entries.
    #[error("failed to read directory {path}: {source}")]
    DirectoryRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to read file.
    #[error("failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // === Sheet Errors ===
    /// Failed to parse a CSV sheet.
    #[error("failed to parse CSV {path}: {source}")]
    CsvParse {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    /// Failed to open or read an XLSForm workbook.
    #[error("failed to read workbook {path}: {source}")]
    Workbook {
        path: PathBuf,
        #[source]
        source: calamine::XlsxError,
    },

    /// A required sheet is absent from a form definition.
    #[error("form {path} has no {sheet} sheet")]
    MissingSheet { sheet: String, path: PathBuf },

    /// Required column not found in a sheet.
    #[error("required column '{column}' not found in {path}")]
    MissingColumn { column: String, path: PathBuf },

    /// The settings sheet has no data row.
    #[error("settings sheet {path} has no rows")]
    EmptySettings { path: PathBuf },

    // === Instance Errors ===
    /// Malformed XML document.
    #[error("failed to parse XML {path}: {message}")]
    XmlParse { path: PathBuf, message: String },

    /// The parsed content violates a model constraint.
    #[error("invalid content in {path}: {source}")]
    Model {
        path: PathBuf,
        #[source]
        source: ModelError,
    },
}

impl IngestError {
    /// Path of the source the error is about.
    pub fn path(&self) -> &std::path::Path {
        match self {
            Self::DirectoryNotFound { path }
            | Self::DirectoryRead { path, .. }
            | Self::FileRead { path, .. }
            | Self::CsvParse { path, .. }
            | Self::Workbook { path, .. }
            | Self::MissingSheet { path, .. }
            | Self::MissingColumn { path, .. }
            | Self::EmptySettings { path }
            | Self::XmlParse { path, .. }
            | Self::Model { path, .. } => path,
        }
    }
}

/// Result type for ingestion operations.
pub type Result<T> = std::result::Result<T, IngestError>;
