use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ModelError {
    #[error("settings have an empty form_id")]
    EmptyFormId,
    #[error("schema item has an empty name")]
    EmptyFieldName,
    #[error("instance {path} has no form id attribute")]
    MissingInstanceFormId { path: PathBuf },
}

pub type Result<T> = std::result::Result<T, ModelError>;
