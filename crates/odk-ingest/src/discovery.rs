//! Source file discovery below a root directory.

use std::path::{Path, PathBuf};

use walkdir::{DirEntry, WalkDir};

use crate::error::{IngestError, Result};

/// Sheet file names of an XLSForm exported as CSV.
pub const SURVEY_SHEET: &str = "survey.csv";
pub const CHOICES_SHEET: &str = "choices.csv";
pub const SETTINGS_SHEET: &str = "settings.csv";

/// Lists every `*.xml` file below `root`, recursively.
///
/// Returns paths in path order so repeated runs read in the same order.
pub fn list_xml_files(root: &Path) -> Result<Vec<PathBuf>> {
    walk(root, |entry| {
        entry.file_type().is_file() && has_extension(entry.path(), "xml")
    })
}

/// Lists every `*.xlsx` workbook below `root`, recursively, skipping the
/// `~$` lock files spreadsheet editors leave next to open workbooks.
pub fn list_workbooks(root: &Path) -> Result<Vec<PathBuf>> {
    walk(root, |entry| {
        entry.file_type().is_file()
            && has_extension(entry.path(), "xlsx")
            && !entry.file_name().to_string_lossy().starts_with("~$")
    })
}

/// Lists every directory below `root` (including `root`) that holds at least
/// one XLSForm sheet.
///
/// A directory with only some of the sheets is still listed; reading it
/// reports which required sheet is missing.
pub fn list_form_dirs(root: &Path) -> Result<Vec<PathBuf>> {
    walk(root, |entry| {
        entry.file_type().is_dir() && is_form_dir(entry.path())
    })
}

/// Locates a sheet file in a form directory, matching the name case-insensitively.
pub fn find_sheet(dir: &Path, sheet: &str) -> Option<PathBuf> {
    let exact = dir.join(sheet);
    if exact.is_file() {
        return Some(exact);
    }
    let entries = std::fs::read_dir(dir).ok()?;
    entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file())
        .find(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.eq_ignore_ascii_case(sheet))
        })
}

fn is_form_dir(dir: &Path) -> bool {
    [SURVEY_SHEET, SETTINGS_SHEET]
        .iter()
        .any(|sheet| find_sheet(dir, sheet).is_some())
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(extension))
}

/// Paths of the entries at or below `root` accepted by `keep`, depth first
/// with siblings in file name order.
fn walk(root: &Path, keep: impl Fn(&DirEntry) -> bool) -> Result<Vec<PathBuf>> {
    if !root.is_dir() {
        return Err(IngestError::DirectoryNotFound {
            path: root.to_path_buf(),
        });
    }

    let mut paths = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|err| IngestError::DirectoryRead {
            path: err.path().unwrap_or(root).to_path_buf(),
            source: err.into(),
        })?;
        if keep(&entry) {
            paths.push(entry.into_path());
        }
    }
    Ok(paths)
}
