//! Diagnostics reported while aggregating.
//!
//! Non-fatal conditions (a skipped source file, a downgraded choice list,
//! dropped duplicates) are collected into a [`Diagnostics`] value that is
//! threaded through the pipeline and returned to the caller. Each push is
//! also emitted as a `tracing` event.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

/// Diagnostic severity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
}

impl Severity {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Warning => "WARN",
        }
    }
}

/// What happened. Each variant carries only its own data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// A schema or instance source could not be read and was skipped.
    SourceRead { path: PathBuf, cause: String },
    /// No schema definitions were found under the forms root.
    NoSchemas,
    /// A choice list has a non-integer value; its select fields are exported as text.
    ChoiceListNotInteger {
        form_id: String,
        list_name: String,
        value: String,
    },
    /// A select field references a list with no options.
    EmptyChoiceList { form_id: String, list_name: String },
    /// Instances with identical content; only the first path is kept.
    DuplicateInstances { count: usize, paths: Vec<PathBuf> },
    /// Variables found in data but in no schema version were added as text.
    UnknownVariables { form_id: String, names: Vec<String> },
    /// Read-only text fields were removed as labelling-only items.
    LabellingFieldsRemoved { form_id: String, names: Vec<String> },
    /// A field type has no Stata mapping and is exported as text.
    UnmappedType {
        form_id: String,
        field: String,
        type_tag: String,
    },
    /// A date value could not be parsed and was exported as missing.
    InvalidDate {
        form_id: String,
        field: String,
        path: PathBuf,
    },
    /// Instances whose form id matches no schema were left out.
    UnmatchedInstances { form_id: String, count: usize },
    /// A schema field name reduces to a variable name already taken, or to
    /// nothing; the field was dropped.
    FieldNameConflict {
        form_id: String,
        field: String,
        variable: String,
    },
}

impl DiagnosticKind {
    pub fn severity(&self) -> Severity {
        match self {
            Self::UnknownVariables { .. } | Self::LabellingFieldsRemoved { .. } => Severity::Info,
            _ => Severity::Warning,
        }
    }

    /// Short stable code for tables and filtering.
    pub fn code(&self) -> &'static str {
        match self {
            Self::SourceRead { .. } => "source_read",
            Self::NoSchemas => "no_schemas",
            Self::ChoiceListNotInteger { .. } => "choice_list_not_integer",
            Self::EmptyChoiceList { .. } => "empty_choice_list",
            Self::DuplicateInstances { .. } => "duplicate_instances",
            Self::UnknownVariables { .. } => "unknown_variables",
            Self::LabellingFieldsRemoved { .. } => "labelling_fields_removed",
            Self::UnmappedType { .. } => "unmapped_type",
            Self::InvalidDate { .. } => "invalid_date",
            Self::UnmatchedInstances { .. } => "unmatched_instances",
            Self::FieldNameConflict { .. } => "field_name_conflict",
        }
    }
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SourceRead { path, cause } => {
                write!(f, "skipped unreadable source {}: {cause}", path.display())
            }
            Self::NoSchemas => write!(
                f,
                "no XLSForms were read from the specified path, please check it and try again"
            ),
            Self::ChoiceListNotInteger {
                form_id,
                list_name,
                value,
            } => write!(
                f,
                "found non-integer value in choice list {list_name} (form_id {form_id}), \
                 value: {value}; all values in this choice list will be output as text"
            ),
            Self::EmptyChoiceList { form_id, list_name } => write!(
                f,
                "choice list {list_name} (form_id {form_id}) has no options"
            ),
            Self::DuplicateInstances { count, paths } => {
                write!(
                    f,
                    "found {count} duplicate XML files, only data from the first file listed \
                     will be included in the output:"
                )?;
                for path in paths {
                    write!(f, "\n{}", path.display())?;
                }
                Ok(())
            }
            Self::UnknownVariables { form_id, names } => write!(
                f,
                "added unknown variables to form_id {form_id}: {}",
                names.join(", ")
            ),
            Self::LabellingFieldsRemoved { form_id, names } => write!(
                f,
                "removed variables assumed to be labelling only (type=text, read_only) \
                 from form_id {form_id}: {}",
                names.join(", ")
            ),
            Self::UnmappedType {
                form_id,
                field,
                type_tag,
            } => write!(
                f,
                "type '{type_tag}' of {field} (form_id {form_id}) has no Stata mapping, \
                 exported as text"
            ),
            Self::InvalidDate {
                form_id,
                field,
                path,
            } => write!(
                f,
                "invalid date in {field} (form_id {form_id}) from {}, exported as missing",
                path.display()
            ),
            Self::UnmatchedInstances { form_id, count } => write!(
                f,
                "{count} instance(s) with form_id {form_id} have no matching XLSForm and were skipped"
            ),
            Self::FieldNameConflict {
                form_id,
                field,
                variable,
            } if variable.is_empty() => write!(
                f,
                "field {field} (form_id {form_id}) has no valid variable name characters and was dropped"
            ),
            Self::FieldNameConflict {
                form_id,
                field,
                variable,
            } => write!(
                f,
                "field {field} (form_id {form_id}) maps to variable {variable}, which is already \
                 defined; the field was dropped"
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    #[serde(flatten)]
    pub kind: DiagnosticKind,
    pub message: String,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind) -> Self {
        Self {
            severity: kind.severity(),
            message: kind.to_string(),
            kind,
        }
    }
}

/// Collector threaded through the pipeline stages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a diagnostic and emit it as a tracing event.
    pub fn push(&mut self, kind: DiagnosticKind) {
        let diagnostic = Diagnostic::new(kind);
        match diagnostic.severity {
            Severity::Warning => {
                tracing::warn!(code = diagnostic.kind.code(), "{}", diagnostic.message);
            }
            Severity::Info => {
                tracing::info!(code = diagnostic.kind.code(), "{}", diagnostic.message);
            }
        }
        self.entries.push(diagnostic);
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.entries.extend(other.entries);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Diagnostic> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn warning_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|d| d.severity == Severity::Warning)
            .count()
    }

    /// Diagnostics with the given code.
    pub fn with_code<'a>(&'a self, code: &'a str) -> impl Iterator<Item = &'a Diagnostic> + 'a {
        self.entries.iter().filter(move |d| d.kind.code() == code)
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a Diagnostic;
    type IntoIter = std::slice::Iter<'a, Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
