//! Stata variable metadata derived from a master schema.

use std::collections::HashSet;

use odk_model::{ChoiceOption, DiagnosticKind, Diagnostics, FieldKind, MasterSchema, SchemaField};
use serde::Serialize;
use tracing::info;

/// Storage type and display format of one XLSForm type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TypeMapping {
    pub xlsform_type: &'static str,
    pub stata_type: &'static str,
    pub stata_format: &'static str,
}

const fn mapping(
    xlsform_type: &'static str,
    stata_type: &'static str,
    stata_format: &'static str,
) -> TypeMapping {
    TypeMapping {
        xlsform_type,
        stata_type,
        stata_format,
    }
}

pub const TYPE_MAPPINGS: [TypeMapping; 6] = [
    mapping("start", "str26", "%26s"),
    mapping("end", "str26", "%26s"),
    mapping("deviceid", "str17", "%17s"),
    mapping("date", "int", "%tdnn/dd/CCYY"),
    mapping("text", "str2045", "%30s"),
    mapping("integer", "int", "%10.0g"),
];

const TEXT_MAPPING: TypeMapping = TYPE_MAPPINGS[4];
const INTEGER_MAPPING: TypeMapping = TYPE_MAPPINGS[5];

/// Looks up the mapping of a field kind. Selects resolve elsewhere.
pub fn type_mapping(kind: &FieldKind) -> Option<TypeMapping> {
    let tag = match kind {
        FieldKind::StartTimestamp => "start",
        FieldKind::EndTimestamp => "end",
        FieldKind::DeviceId => "deviceid",
        FieldKind::Date => "date",
        FieldKind::Text => "text",
        FieldKind::Integer => "integer",
        FieldKind::Select(_)
        | FieldKind::BeginGroup
        | FieldKind::EndGroup
        | FieldKind::Unknown(_) => return None,
    };
    TYPE_MAPPINGS.iter().copied().find(|m| m.xlsform_type == tag)
}

/// Descriptor of one output variable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VariableDescriptor {
    pub name: String,
    pub stata_type: &'static str,
    pub format: &'static str,
    pub label: String,
    /// Value-label collection assigned to the variable.
    pub value_label: Option<String>,
}

/// A named value-label collection: integer codes and their text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValueLabelSet {
    pub name: String,
    pub labels: Vec<(i64, String)>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FormMetadata {
    pub form_id: String,
    /// In schema field order.
    pub variables: Vec<VariableDescriptor>,
    /// In first-emission order.
    pub value_labels: Vec<ValueLabelSet>,
}

impl FormMetadata {
    pub fn variable_names(&self) -> impl Iterator<Item = &str> {
        self.variables.iter().map(|v| v.name.as_str())
    }
}

/// Builds type, format, label and value-label metadata for every schema field.
///
/// Select fields whose list values are all integer-coercible are exported as
/// integers carrying the list as value labels, emitted once per list. Any
/// other select field is exported as text.
pub fn build_metadata(schema: &MasterSchema, diagnostics: &mut Diagnostics) -> FormMetadata {
    let form_id = schema.form_id();
    let language = schema.default_language();
    info!(
        form_id = %form_id,
        language = language.unwrap_or("default"),
        "building metadata"
    );

    let mut metadata = FormMetadata {
        form_id: form_id.to_string(),
        ..FormMetadata::default()
    };
    let mut emitted: HashSet<String> = HashSet::new();
    let mut downgraded: HashSet<String> = HashSet::new();

    for field in schema.fields.values() {
        let Some(kind) = field.kind.as_ref() else {
            continue;
        };
        let mut value_label = None;
        let mapping = match kind {
            FieldKind::Select(list_name) => {
                let choices = field.choices.as_deref().unwrap_or_default();
                match integer_codes(choices) {
                    Ok(labels) if !choices.is_empty() => {
                        if emitted.insert(list_name.clone()) {
                            metadata.value_labels.push(ValueLabelSet {
                                name: list_name.clone(),
                                labels: labels
                                    .into_iter()
                                    .map(|(code, option)| (code, option_label(option, language)))
                                    .collect(),
                            });
                        }
                        value_label = Some(list_name.clone());
                        INTEGER_MAPPING
                    }
                    Ok(_) => {
                        if downgraded.insert(list_name.clone()) {
                            diagnostics.push(DiagnosticKind::EmptyChoiceList {
                                form_id: form_id.to_string(),
                                list_name: list_name.clone(),
                            });
                        }
                        TEXT_MAPPING
                    }
                    Err(value) => {
                        if downgraded.insert(list_name.clone()) {
                            diagnostics.push(DiagnosticKind::ChoiceListNotInteger {
                                form_id: form_id.to_string(),
                                list_name: list_name.clone(),
                                value: value.to_string(),
                            });
                        }
                        TEXT_MAPPING
                    }
                }
            }
            other => type_mapping(other).unwrap_or_else(|| {
                diagnostics.push(DiagnosticKind::UnmappedType {
                    form_id: form_id.to_string(),
                    field: field.name.clone(),
                    type_tag: other.to_string(),
                });
                TEXT_MAPPING
            }),
        };

        metadata.variables.push(VariableDescriptor {
            name: field.name.clone(),
            stata_type: mapping.stata_type,
            format: mapping.stata_format,
            label: field_label(field, language),
            value_label,
        });
    }

    metadata
}

/// Integer codes of every option, or the first value that is not one.
fn integer_codes(choices: &[ChoiceOption]) -> Result<Vec<(i64, &ChoiceOption)>, &str> {
    choices
        .iter()
        .map(|option| {
            option
                .integer_value()
                .map(|code| (code, option))
                .ok_or(option.value.as_str())
        })
        .collect()
}

fn option_label(option: &ChoiceOption, language: Option<&str>) -> String {
    option.labels.resolve(language).unwrap_or_default().to_string()
}

fn field_label(field: &SchemaField, language: Option<&str>) -> String {
    field
        .labels
        .resolve(language)
        .or(field.description.as_deref())
        .unwrap_or_default()
        .to_string()
}
