//! XLSForm definitions read from CSV sheet exports.
//!
//! A form definition is a directory holding `survey.csv`, `settings.csv` and
//! optionally `choices.csv`, one file per workbook sheet. The row handling
//! here is shared with the workbook reader in [`crate::workbook`].

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use csv::ReaderBuilder;
use odk_model::{ChoiceOption, Diagnostics, FieldKind, Labels, SchemaField, SchemaVersion, Settings};
use serde::Serialize;

use crate::discovery::{CHOICES_SHEET, SETTINGS_SHEET, SURVEY_SHEET, find_sheet, list_form_dirs};
use crate::error::{IngestError, Result};
use crate::source::{SchemaIter, SchemaSource, collect_schemas};
use crate::workbook::XlsxFormSource;

/// One sheet row keyed by trimmed column header.
pub(crate) type Row = BTreeMap<String, String>;

/// Rows of one sheet and the file they came from.
pub(crate) struct Sheet<'a> {
    pub path: &'a Path,
    pub rows: &'a [Row],
}

/// Reads every form directory below a root.
#[derive(Debug, Clone)]
pub struct CsvFormSource {
    root: PathBuf,
}

impl CsvFormSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl SchemaSource for CsvFormSource {
    fn schemas(&self) -> Result<SchemaIter<'_>> {
        let dirs = list_form_dirs(&self.root)?;
        tracing::debug!(root = %self.root.display(), count = dirs.len(), "form directories found");
        Ok(Box::new(dirs.into_iter().map(|dir| read_form_dir(&dir))))
    }
}

/// Every XLSForm below a root, kept either as a workbook or as CSV sheets.
///
/// Workbooks are read first, then sheet directories.
#[derive(Debug, Clone)]
pub struct FormSource {
    workbooks: XlsxFormSource,
    sheets: CsvFormSource,
}

impl FormSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            workbooks: XlsxFormSource::new(&root),
            sheets: CsvFormSource::new(root),
        }
    }
}

impl SchemaSource for FormSource {
    fn schemas(&self) -> Result<SchemaIter<'_>> {
        let workbooks = self.workbooks.schemas()?;
        let sheets = self.sheets.schemas()?;
        Ok(Box::new(workbooks.chain(sheets)))
    }
}

/// Reads one form definition directory.
pub fn read_form_dir(dir: &Path) -> Result<SchemaVersion> {
    let survey_path = require_sheet(dir, SURVEY_SHEET)?;
    let settings_path = require_sheet(dir, SETTINGS_SHEET)?;

    let settings_rows = read_csv_rows(&settings_path)?;
    let choices_path = find_sheet(dir, CHOICES_SHEET);
    let choice_rows = match &choices_path {
        Some(path) => read_csv_rows(path)?,
        None => Vec::new(),
    };
    let survey_rows = read_csv_rows(&survey_path)?;

    schema_from_sheets(
        dir,
        &Sheet {
            path: &survey_path,
            rows: &survey_rows,
        },
        &choice_rows,
        &Sheet {
            path: &settings_path,
            rows: &settings_rows,
        },
    )
}

/// Builds a schema version from the rows of its three sheets.
pub(crate) fn schema_from_sheets(
    source: &Path,
    survey: &Sheet<'_>,
    choice_rows: &[Row],
    settings: &Sheet<'_>,
) -> Result<SchemaVersion> {
    let settings = settings_from_rows(settings.rows, settings.path)?;
    let choices = choices_from_rows(choice_rows);

    let mut schema = SchemaVersion::new(settings);
    schema.source = Some(source.to_path_buf());

    if let Some(first) = survey.rows.first()
        && !first.contains_key("name")
    {
        return Err(IngestError::MissingColumn {
            column: "name".to_string(),
            path: survey.path.to_path_buf(),
        });
    }
    for row in survey.rows {
        if let Some(field) = survey_field(row, &choices, survey.path)? {
            schema.push_field(field);
        }
    }

    tracing::debug!(
        form_id = %schema.form_id(),
        version = %schema.version(),
        fields = schema.fields.len(),
        path = %source.display(),
        "read form definition"
    );
    Ok(schema)
}

fn require_sheet(dir: &Path, sheet: &str) -> Result<PathBuf> {
    find_sheet(dir, sheet).ok_or_else(|| IngestError::MissingSheet {
        sheet: sheet.trim_end_matches(".csv").to_string(),
        path: dir.to_path_buf(),
    })
}

#[cfg(test)]
fn read_settings(path: &Path) -> Result<Settings> {
    settings_from_rows(&read_csv_rows(path)?, path)
}

/// Settings from the first settings row; later rows are ignored.
fn settings_from_rows(rows: &[Row], path: &Path) -> Result<Settings> {
    let row = rows.first().ok_or_else(|| IngestError::EmptySettings {
        path: path.to_path_buf(),
    })?;
    let form_id = row
        .get("form_id")
        .ok_or_else(|| IngestError::MissingColumn {
            column: "form_id".to_string(),
            path: path.to_path_buf(),
        })?;
    let version = row.get("version").map(String::as_str).unwrap_or_default();
    let mut settings = Settings::new(form_id.as_str(), version)
        .map_err(|source| IngestError::Model {
            path: path.to_path_buf(),
            source,
        })?
        .with_default_language(row.get("default_language").map(String::as_str));
    for (column, value) in row {
        if matches!(column.as_str(), "form_id" | "version" | "default_language")
            || value.is_empty()
        {
            continue;
        }
        settings.extra.insert(column.clone(), value.clone());
    }
    Ok(settings)
}

/// Choice options grouped by list name, in sheet order.
fn choices_from_rows(rows: &[Row]) -> BTreeMap<String, Vec<ChoiceOption>> {
    let mut lists: BTreeMap<String, Vec<ChoiceOption>> = BTreeMap::new();
    for row in rows {
        let Some(list_name) = row.get("list_name").filter(|v| !v.is_empty()) else {
            continue;
        };
        let value = row.get("name").cloned().unwrap_or_default();
        let mut option = ChoiceOption::new(list_name.as_str(), value);
        for (column, text) in row {
            option.labels.insert_column(column, text);
        }
        lists.entry(list_name.clone()).or_default().push(option);
    }
    lists
}

fn survey_field(
    row: &Row,
    choices: &BTreeMap<String, Vec<ChoiceOption>>,
    path: &Path,
) -> Result<Option<SchemaField>> {
    let name = row.get("name").map(String::as_str).unwrap_or_default();
    if name.is_empty() {
        // `end group` rows and blank lines carry no name.
        return Ok(None);
    }
    let kind = row.get("type").and_then(|tag| FieldKind::parse(tag));
    let mut field = SchemaField::new(name, kind).map_err(|source| IngestError::Model {
        path: path.to_path_buf(),
        source,
    })?;
    field.read_only = ["read_only", "readonly"]
        .iter()
        .filter_map(|column| row.get(*column))
        .any(|value| is_truthy(value));
    field.description = row
        .get("name_description")
        .filter(|value| !value.is_empty())
        .cloned();
    let mut labels = Labels::new();
    for (column, text) in row {
        labels.insert_column(column, text);
    }
    field.labels = labels;
    if let Some(list_name) = field.kind.as_ref().and_then(FieldKind::choice_list) {
        field.choices = Some(choices.get(list_name).cloned().unwrap_or_default());
    }
    Ok(Some(field))
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "yes" | "true" | "true()" | "1"
    )
}

/// Reads a sheet into rows keyed by header, trimming cells and any byte-order mark.
fn read_csv_rows(path: &Path) -> Result<Vec<Row>> {
    let csv_error = |source| IngestError::CsvParse {
        path: path.to_path_buf(),
        source,
    };
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .map_err(csv_error)?;
    let headers = reader.headers().map_err(csv_error)?.clone();
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(csv_error)?;
        let mut row = Row::new();
        for (idx, value) in record.iter().enumerate() {
            let key = clean_header(headers.get(idx).unwrap_or(""));
            if key.is_empty() {
                continue;
            }
            row.insert(key, value.trim().to_string());
        }
        if !is_blank(&row) {
            rows.push(row);
        }
    }
    Ok(rows)
}

/// A column header with any byte-order mark and surrounding space removed.
pub(crate) fn clean_header(header: &str) -> String {
    header.trim_matches('\u{feff}').trim().to_string()
}

pub(crate) fn is_blank(row: &Row) -> bool {
    row.values().all(String::is_empty)
}

/// One readable schema version, as listed by [`list_forms`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormSummary {
    pub form_id: String,
    pub version: String,
    pub default_language: Option<String>,
    pub field_count: usize,
    pub source: Option<PathBuf>,
}

/// Lists every readable schema version of a source; unreadable ones become diagnostics.
pub fn list_forms(source: &dyn SchemaSource, diagnostics: &mut Diagnostics) -> Result<Vec<FormSummary>> {
    let schemas = collect_schemas(source, diagnostics)?;
    Ok(schemas
        .into_iter()
        .map(|schema| FormSummary {
            field_count: schema.fields.len(),
            form_id: schema.settings.form_id,
            version: schema.settings.version,
            default_language: schema.settings.default_language,
            source: schema.source,
        })
        .collect())
}
