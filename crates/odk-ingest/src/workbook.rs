//! XLSForm definitions read from `.xlsx` workbooks.
//!
//! Each workbook below the root is one schema version. The `survey` and
//! `settings` sheets are required, `choices` is optional; sheet names match
//! case-insensitively.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use calamine::{Data, Range, Reader, Xlsx, open_workbook};
use odk_model::SchemaVersion;

use crate::discovery::list_workbooks;
use crate::error::{IngestError, Result};
use crate::forms::{Row, Sheet, clean_header, is_blank, schema_from_sheets};
use crate::source::{SchemaIter, SchemaSource};

const SURVEY: &str = "survey";
const CHOICES: &str = "choices";
const SETTINGS: &str = "settings";

/// Reads every XLSForm workbook below a root.
#[derive(Debug, Clone)]
pub struct XlsxFormSource {
    root: PathBuf,
}

impl XlsxFormSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl SchemaSource for XlsxFormSource {
    fn schemas(&self) -> Result<SchemaIter<'_>> {
        let files = list_workbooks(&self.root)?;
        tracing::debug!(root = %self.root.display(), count = files.len(), "workbooks found");
        Ok(Box::new(files.into_iter().map(|path| read_workbook(&path))))
    }
}

/// Reads one XLSForm workbook.
pub fn read_workbook(path: &Path) -> Result<SchemaVersion> {
    let mut workbook: Xlsx<BufReader<File>> =
        open_workbook(path).map_err(|source| IngestError::Workbook {
            path: path.to_path_buf(),
            source,
        })?;

    let survey = read_sheet(&mut workbook, SURVEY, path)?.ok_or_else(|| missing(SURVEY, path))?;
    let settings =
        read_sheet(&mut workbook, SETTINGS, path)?.ok_or_else(|| missing(SETTINGS, path))?;
    let choices = read_sheet(&mut workbook, CHOICES, path)?;
    schema_from_ranges(path, &survey, choices.as_ref(), &settings)
}

/// Builds a schema version from the cell ranges of its sheets.
fn schema_from_ranges(
    path: &Path,
    survey: &Range<Data>,
    choices: Option<&Range<Data>>,
    settings: &Range<Data>,
) -> Result<SchemaVersion> {
    let survey_rows = sheet_rows(survey);
    let settings_rows = sheet_rows(settings);
    let choice_rows = choices.map(sheet_rows).unwrap_or_default();
    schema_from_sheets(
        path,
        &Sheet {
            path,
            rows: &survey_rows,
        },
        &choice_rows,
        &Sheet {
            path,
            rows: &settings_rows,
        },
    )
}

fn read_sheet(
    workbook: &mut Xlsx<BufReader<File>>,
    sheet: &str,
    path: &Path,
) -> Result<Option<Range<Data>>> {
    let Some(name) = workbook
        .sheet_names()
        .into_iter()
        .find(|name| name.trim().eq_ignore_ascii_case(sheet))
    else {
        return Ok(None);
    };
    workbook
        .worksheet_range(&name)
        .map(Some)
        .map_err(|source| IngestError::Workbook {
            path: path.to_path_buf(),
            source,
        })
}

fn missing(sheet: &str, path: &Path) -> IngestError {
    IngestError::MissingSheet {
        sheet: sheet.to_string(),
        path: path.to_path_buf(),
    }
}

/// Rows of a sheet keyed by the header row, skipping blank rows.
///
/// Numeric cells render without a trailing `.0`, so a choice code typed as
/// `1` reads back as `"1"`.
fn sheet_rows(range: &Range<Data>) -> Vec<Row> {
    let mut cells = range.rows();
    let Some(header_cells) = cells.next() else {
        return Vec::new();
    };
    let headers: Vec<String> = header_cells
        .iter()
        .map(|cell| clean_header(&cell.to_string()))
        .collect();
    cells
        .map(|row| {
            headers
                .iter()
                .zip(row)
                .filter(|(header, _)| !header.is_empty())
                .map(|(header, cell)| (header.clone(), cell.to_string().trim().to_string()))
                .collect::<Row>()
        })
        .filter(|row| !is_blank(row))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use odk_model::FieldKind;

    fn text(value: &str) -> Data {
        if value.is_empty() {
            Data::Empty
        } else {
            Data::String(value.to_string())
        }
    }

    fn range(rows: &[Vec<Data>]) -> Range<Data> {
        let width = rows.iter().map(Vec::len).max().unwrap_or(1);
        let mut range = Range::new(
            (0, 0),
            (rows.len() as u32 - 1, width as u32 - 1),
        );
        for (r, row) in rows.iter().enumerate() {
            for (c, cell) in row.iter().enumerate() {
                range.set_value((r as u32, c as u32), cell.clone());
            }
        }
        range
    }

    fn strings(rows: &[&[&str]]) -> Range<Data> {
        let rows: Vec<Vec<Data>> = rows
            .iter()
            .map(|row| row.iter().map(|cell| text(cell)).collect())
            .collect();
        range(&rows)
    }

    #[test]
    fn sheet_rows_skip_blank_rows_and_headers() {
        let sheet = strings(&[
            &["\u{feff}type", "name", ""],
            &["integer", "age", "ignored"],
            &["", "", ""],
            &["text", " nick ", ""],
        ]);
        let rows = sheet_rows(&sheet);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("type").map(String::as_str), Some("integer"));
        assert_eq!(rows[1].get("name").map(String::as_str), Some("nick"));
        assert!(rows[0].keys().all(|key| !key.is_empty()));
    }

    #[test]
    fn numeric_cells_read_as_plain_numbers() {
        let choices = range(&[
            vec![text("list_name"), text("name"), text("label")],
            vec![text("yesno"), Data::Float(1.0), text("Yes")],
            vec![text("yesno"), Data::Int(0), text("No")],
        ]);
        let rows = sheet_rows(&choices);
        let values: Vec<&str> = rows
            .iter()
            .filter_map(|row| row.get("name").map(String::as_str))
            .collect();
        assert_eq!(values, vec!["1", "0"]);
    }

    #[test]
    fn sheets_build_a_schema_version() {
        let survey = strings(&[
            &["type", "name", "label"],
            &["select_one yesno", "consent", "Consent"],
            &["begin group", "grp", ""],
            &["date", "visit", "Visit"],
            &["end group", "", ""],
        ]);
        let choices = range(&[
            vec![text("list_name"), text("name"), text("label")],
            vec![text("yesno"), Data::Float(1.0), text("Yes")],
            vec![text("yesno"), Data::Float(0.0), text("No")],
        ]);
        let settings = range(&[
            vec![text("form_id"), text("version")],
            vec![text("Q1"), Data::Float(2024010101.0)],
        ]);

        let schema = schema_from_ranges(Path::new("q1.xlsx"), &survey, Some(&choices), &settings)
            .expect("schema");
        assert_eq!(schema.form_id(), "Q1");
        assert_eq!(schema.version(), "2024010101");
        let names: Vec<&str> = schema.fields.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["consent", "grp", "visit"]);
        let consent = schema.fields.get("consent").expect("consent");
        assert_eq!(consent.choices.as_ref().map(Vec::len), Some(2));
        assert_eq!(
            schema.fields.get("visit").and_then(|f| f.kind.clone()),
            Some(FieldKind::Date)
        );
        assert_eq!(schema.source.as_deref(), Some(Path::new("q1.xlsx")));
    }

    #[test]
    fn settings_sheet_needs_a_form_id() {
        let survey = strings(&[&["type", "name"], &["text", "a"]]);
        let settings = strings(&[&["version"], &["1"]]);
        assert!(matches!(
            schema_from_ranges(Path::new("q1.xlsx"), &survey, None, &settings),
            Err(IngestError::MissingColumn { column, .. }) if column == "form_id"
        ));
    }

    #[test]
    fn unreadable_workbook_is_an_error() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("broken.xlsx");
        std::fs::write(&path, "not a zip archive").expect("write");
        let error = read_workbook(&path).expect_err("broken workbook");
        assert!(matches!(error, IngestError::Workbook { .. }));
        assert_eq!(error.path(), path.as_path());
    }
}
