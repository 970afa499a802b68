//! XLSForm schema entities.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use indexmap::IndexMap;
use serde::Serialize;

use crate::error::{ModelError, Result};

/// Kind of a survey item, parsed from its XLSForm `type` column.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    Integer,
    Date,
    /// Multiple-choice item referencing a named choice list.
    Select(String),
    StartTimestamp,
    EndTimestamp,
    DeviceId,
    BeginGroup,
    EndGroup,
    /// Any type without a dedicated variant, kept verbatim.
    Unknown(String),
}

impl FieldKind {
    /// Parse a type tag. Returns `None` for a blank tag.
    ///
    /// Any tag whose first word starts with `select` and that names a list
    /// (`select_one yesno`, `select_multiple opts`) is a select.
    pub fn parse(tag: &str) -> Option<Self> {
        let words: Vec<&str> = tag.split_whitespace().collect();
        let first = *words.first()?;
        if first.starts_with("select")
            && let Some(list_name) = words.get(1)
        {
            return Some(FieldKind::Select((*list_name).to_string()));
        }
        let normalized = words.join(" ");
        Some(match normalized.as_str() {
            "text" => FieldKind::Text,
            "integer" => FieldKind::Integer,
            "date" => FieldKind::Date,
            "start" => FieldKind::StartTimestamp,
            "end" => FieldKind::EndTimestamp,
            "deviceid" => FieldKind::DeviceId,
            "begin group" | "begin_group" => FieldKind::BeginGroup,
            "end group" | "end_group" => FieldKind::EndGroup,
            _ => FieldKind::Unknown(normalized),
        })
    }

    pub fn is_group_marker(&self) -> bool {
        matches!(self, FieldKind::BeginGroup | FieldKind::EndGroup)
    }

    pub fn choice_list(&self) -> Option<&str> {
        match self {
            FieldKind::Select(list_name) => Some(list_name.as_str()),
            _ => None,
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldKind::Text => write!(f, "text"),
            FieldKind::Integer => write!(f, "integer"),
            FieldKind::Date => write!(f, "date"),
            FieldKind::Select(list_name) => write!(f, "select {list_name}"),
            FieldKind::StartTimestamp => write!(f, "start"),
            FieldKind::EndTimestamp => write!(f, "end"),
            FieldKind::DeviceId => write!(f, "deviceid"),
            FieldKind::BeginGroup => write!(f, "begin group"),
            FieldKind::EndGroup => write!(f, "end group"),
            FieldKind::Unknown(raw) => write!(f, "{raw}"),
        }
    }
}

/// Label text per language.
///
/// XLSForm stores labels in a plain `label` column and in
/// `label::<language>` columns; the plain column is the default.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Labels {
    default: Option<String>,
    by_language: BTreeMap<String, String>,
}

impl Labels {
    pub fn new() -> Self {
        Self::default()
    }

    /// Column name holding labels for a language.
    pub fn column_name(language: Option<&str>) -> String {
        match language {
            Some(language) => format!("label::{language}"),
            None => "label".to_string(),
        }
    }

    /// Store a label from a sheet column. Returns false when the column is not a label column.
    pub fn insert_column(&mut self, column: &str, text: &str) -> bool {
        if column == "label" {
            self.insert(None, text);
            true
        } else if let Some(language) = column.strip_prefix("label::") {
            self.insert(Some(language), text);
            true
        } else {
            false
        }
    }

    /// Store a label. Blank text is ignored.
    pub fn insert(&mut self, language: Option<&str>, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        match language {
            Some(language) => {
                self.by_language
                    .insert(language.to_string(), text.to_string());
            }
            None => self.default = Some(text.to_string()),
        }
    }

    /// Label in exactly the requested column.
    pub fn get(&self, language: Option<&str>) -> Option<&str> {
        match language {
            Some(language) => self.by_language.get(language).map(String::as_str),
            None => self.default.as_deref(),
        }
    }

    /// Label in the requested column, falling back to the plain `label` column.
    pub fn resolve(&self, language: Option<&str>) -> Option<&str> {
        self.get(language).or(self.default.as_deref())
    }

    pub fn is_empty(&self) -> bool {
        self.default.is_none() && self.by_language.is_empty()
    }
}

/// One option of a named choice list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChoiceOption {
    pub list_name: String,
    pub value: String,
    pub labels: Labels,
}

impl ChoiceOption {
    pub fn new(list_name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            list_name: list_name.into(),
            value: value.into(),
            labels: Labels::new(),
        }
    }

    #[must_use]
    pub fn with_label(mut self, language: Option<&str>, text: &str) -> Self {
        self.labels.insert(language, text);
        self
    }

    /// The option value as an integer code.
    ///
    /// Accepts integer text, optionally followed by a fraction of zeros
    /// (`"2.0"`), which is how spreadsheet exports render numeric codes.
    /// Exponent forms such as `"1e3"` are not codes.
    pub fn integer_value(&self) -> Option<i64> {
        let trimmed = self.value.trim();
        let digits = match trimmed.split_once('.') {
            Some((whole, fraction))
                if !fraction.is_empty() && fraction.bytes().all(|b| b == b'0') =>
            {
                whole
            }
            Some(_) => return None,
            None => trimmed,
        };
        digits.parse::<i64>().ok()
    }
}

/// One survey item of a schema version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaField {
    pub name: String,
    /// `None` when the item has no type.
    pub kind: Option<FieldKind>,
    /// Options of the referenced list; `None` for non-select items.
    pub choices: Option<Vec<ChoiceOption>>,
    pub labels: Labels,
    pub read_only: bool,
    /// Free-text description (`name_description` column).
    pub description: Option<String>,
}

impl SchemaField {
    pub fn new(name: impl Into<String>, kind: Option<FieldKind>) -> Result<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ModelError::EmptyFieldName);
        }
        Ok(Self {
            name,
            kind,
            choices: None,
            labels: Labels::new(),
            read_only: false,
            description: None,
        })
    }

    /// A text field synthesized by the pipeline rather than read from a form.
    pub fn synthesized_text(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: Some(FieldKind::Text),
            choices: None,
            labels: Labels::new(),
            read_only: false,
            description: Some(description.into()),
        }
    }

    #[must_use]
    pub fn with_label(mut self, language: Option<&str>, text: &str) -> Self {
        self.labels.insert(language, text);
        self
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn with_choices(mut self, choices: Vec<ChoiceOption>) -> Self {
        self.choices = Some(choices);
        self
    }

    #[must_use]
    pub fn with_read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    /// Fields that only carry label text for the form UI: read-only text items.
    pub fn is_labelling_only(&self) -> bool {
        self.read_only && self.kind == Some(FieldKind::Text)
    }
}

/// The settings sheet of a form definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Settings {
    pub form_id: String,
    pub version: String,
    pub default_language: Option<String>,
    /// Every other settings column (form title, instance name, ...).
    pub extra: BTreeMap<String, String>,
}

impl Settings {
    pub fn new(form_id: impl Into<String>, version: impl Into<String>) -> Result<Self> {
        let form_id = form_id.into().trim().to_string();
        if form_id.is_empty() {
            return Err(ModelError::EmptyFormId);
        }
        Ok(Self {
            form_id,
            version: version.into().trim().to_string(),
            default_language: None,
            extra: BTreeMap::new(),
        })
    }

    #[must_use]
    pub fn with_default_language(mut self, language: Option<&str>) -> Self {
        self.default_language = language
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string);
        self
    }
}

/// Schema items keyed by name, in sheet order.
pub type FieldMap = IndexMap<String, SchemaField>;

/// One form definition: a settings block plus its items in sheet order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchemaVersion {
    pub settings: Settings,
    pub fields: FieldMap,
    /// Where the definition was read from, if it came from disk.
    pub source: Option<PathBuf>,
}

impl SchemaVersion {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            fields: FieldMap::new(),
            source: None,
        }
    }

    /// Add an item; a repeated name replaces the earlier item in place.
    pub fn push_field(&mut self, field: SchemaField) {
        self.fields.insert(field.name.clone(), field);
    }

    #[must_use]
    pub fn with_field(mut self, field: SchemaField) -> Self {
        self.push_field(field);
        self
    }

    pub fn form_id(&self) -> &str {
        &self.settings.form_id
    }

    pub fn version(&self) -> &str {
        &self.settings.version
    }
}

/// The reconciled schema of one form identifier.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MasterSchema {
    /// Settings of the newest version.
    pub settings: Settings,
    pub fields: FieldMap,
    /// Versions merged into this schema, newest first.
    pub merged_versions: Vec<String>,
}

impl MasterSchema {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            fields: FieldMap::new(),
            merged_versions: Vec::new(),
        }
    }

    pub fn form_id(&self) -> &str {
        &self.settings.form_id
    }

    pub fn default_language(&self) -> Option<&str> {
        self.settings.default_language.as_deref()
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_type_tags() {
        assert_eq!(FieldKind::parse("text"), Some(FieldKind::Text));
        assert_eq!(FieldKind::parse(" date "), Some(FieldKind::Date));
        assert_eq!(
            FieldKind::parse("select_one yesno"),
            Some(FieldKind::Select("yesno".to_string()))
        );
        assert_eq!(
            FieldKind::parse("select_multiple  colours"),
            Some(FieldKind::Select("colours".to_string()))
        );
        assert_eq!(FieldKind::parse("begin  group"), Some(FieldKind::BeginGroup));
        assert_eq!(FieldKind::parse("end_group"), Some(FieldKind::EndGroup));
        assert_eq!(
            FieldKind::parse("calculate"),
            Some(FieldKind::Unknown("calculate".to_string()))
        );
        assert_eq!(FieldKind::parse("   "), None);
    }

    #[test]
    fn select_without_list_is_unknown() {
        assert_eq!(
            FieldKind::parse("select_one"),
            Some(FieldKind::Unknown("select_one".to_string()))
        );
    }

    #[test]
    fn labels_resolve_with_fallback() {
        let mut labels = Labels::new();
        assert!(labels.insert_column("label", "Age"));
        assert!(labels.insert_column("label::French", "Âge"));
        assert!(!labels.insert_column("hint", "years"));
        assert_eq!(labels.get(Some("French")), Some("Âge"));
        assert_eq!(labels.get(Some("German")), None);
        assert_eq!(labels.resolve(Some("German")), Some("Age"));
        assert_eq!(Labels::column_name(Some("French")), "label::French");
        assert_eq!(Labels::column_name(None), "label");
    }

    #[test]
    fn choice_integer_coercion() {
        assert_eq!(ChoiceOption::new("l", "3").integer_value(), Some(3));
        assert_eq!(ChoiceOption::new("l", " -2 ").integer_value(), Some(-2));
        assert_eq!(ChoiceOption::new("l", "4.0").integer_value(), Some(4));
        assert_eq!(ChoiceOption::new("l", "4.5").integer_value(), None);
        assert_eq!(ChoiceOption::new("l", "-7.00").integer_value(), Some(-7));
        assert_eq!(ChoiceOption::new("l", "1e3").integer_value(), None);
        assert_eq!(ChoiceOption::new("l", "2.").integer_value(), None);
        assert_eq!(ChoiceOption::new("l", ".0").integer_value(), None);
        assert_eq!(ChoiceOption::new("l", "yes").integer_value(), None);
    }

    #[test]
    fn labelling_only_needs_read_only_text() {
        let note = SchemaField::new("nl_intro", Some(FieldKind::Text))
            .unwrap()
            .with_read_only(true);
        let number = SchemaField::new("age", Some(FieldKind::Integer))
            .unwrap()
            .with_read_only(true);
        assert!(note.is_labelling_only());
        assert!(!number.is_labelling_only());
    }

    #[test]
    fn settings_reject_blank_form_id() {
        assert_eq!(Settings::new("  ", "1"), Err(ModelError::EmptyFormId));
        let settings = Settings::new("Q1", " 2 ")
            .unwrap()
            .with_default_language(Some(""));
        assert_eq!(settings.version, "2");
        assert_eq!(settings.default_language, None);
    }
}
