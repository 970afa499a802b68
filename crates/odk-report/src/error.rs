use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while rendering or writing output documents.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("failed to render Stata XML for form_id {form_id}: {source}")]
    Render {
        form_id: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to create output directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(
        "form_ids {first} and {second} would both be written to {file_name}; nothing was written"
    )]
    FileNameClash {
        file_name: String,
        first: String,
        second: String,
    },

    #[error("failed to write {path}: {source}")]
    FileWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, ReportError>;
