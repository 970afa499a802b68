//! Input path checks run before any data is read.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Characters trimmed from both ends of a user supplied path.
pub const WRAP_CHARS: &[char] = &['"', ' ', '\r', '\n', '\t'];

pub const FORMS_PATH_NAME: &str = "XLSForm definitions path";
pub const INSTANCES_PATH_NAME: &str = "XForm data path";
pub const OUTPUT_PATH_NAME: &str = "Output path";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PathValidationError {
    #[error(
        "Input Error.\n\n{name} is empty. Please either:\n- Enter the path, or\n- Select the path using the 'Browse...' button."
    )]
    Empty { name: String },

    #[error(
        "Input Error.\n\n{name} does not correspond to an existing directory.\nPlease check the path and try again."
    )]
    NotADirectory { name: String, path: PathBuf },
}

/// Strips surrounding quotes and whitespace, as left by copy and paste.
pub fn clean_path(raw: &str) -> &str {
    raw.trim_matches(WRAP_CHARS)
}

/// Cleans `raw` and checks it names an existing directory.
pub fn validate_path(name: &str, raw: &str) -> Result<PathBuf, PathValidationError> {
    let cleaned = clean_path(raw);
    if cleaned.is_empty() {
        return Err(PathValidationError::Empty {
            name: name.to_string(),
        });
    }
    let path = Path::new(cleaned);
    if !path.is_dir() {
        return Err(PathValidationError::NotADirectory {
            name: name.to_string(),
            path: path.to_path_buf(),
        });
    }
    Ok(path.to_path_buf())
}
