//! Data reconciliation: shaping submitted instances against a master schema.
//!
//! Field names are first normalized to Stata variable names. Two passes then
//! run per form identifier. [`prepare_data`] makes every instance carry every
//! schema field, converts dates and collects names found in data but not in
//! the schema. [`tidy_form_def`] then folds those names into the schema and
//! drops labelling-only fields. Running both again on their own output
//! changes nothing: an instance's dates are converted only once.

use std::collections::{BTreeMap, HashSet};

use odk_model::{
    DiagnosticKind, Diagnostics, FieldKind, FieldMap, Instance, InstanceValues, MasterSchema,
    Observation, SOURCE_FILE_KEY, SchemaField,
};
use tracing::{debug, info, info_span};

/// Description given to variables found only in submitted data.
pub const UNKNOWN_VARIABLE_DESCRIPTION: &str = "(Unknown variable)";

/// Description of the provenance variable.
pub const SOURCE_FILE_DESCRIPTION: &str = "Path to file that the data was read from.";

/// A master schema and the observations exported against it.
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciled {
    pub schema: MasterSchema,
    pub observations: Vec<Observation>,
}

/// Removes every character outside `[A-Za-z0-9_]`.
pub fn strip_identifier(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect()
}

/// Splits instances by form identifier, keeping only identifiers with a schema.
///
/// Instances of other identifiers are counted and reported once per identifier.
pub fn match_instances(
    instances: Vec<Instance>,
    schemas: &BTreeMap<String, MasterSchema>,
    diagnostics: &mut Diagnostics,
) -> BTreeMap<String, Vec<Instance>> {
    let mut matched: BTreeMap<String, Vec<Instance>> = schemas
        .keys()
        .map(|form_id| (form_id.clone(), Vec::new()))
        .collect();
    let mut unmatched: BTreeMap<String, usize> = BTreeMap::new();
    for instance in instances {
        match matched.get_mut(&instance.form_id) {
            Some(group) => group.push(instance),
            None => *unmatched.entry(instance.form_id).or_default() += 1,
        }
    }
    for (form_id, count) in unmatched {
        diagnostics.push(DiagnosticKind::UnmatchedInstances { form_id, count });
    }
    matched
}

/// Rekeys the schema's fields by their variable names, the field names
/// stripped to `[A-Za-z0-9_]`.
///
/// A field whose variable name is empty or already taken by an earlier field
/// is dropped with a warning.
pub fn normalize_field_names(schema: &mut MasterSchema, diagnostics: &mut Diagnostics) {
    let form_id = schema.form_id().to_string();
    let fields = std::mem::take(&mut schema.fields);
    let mut normalized = FieldMap::with_capacity(fields.len());
    for (name, mut field) in fields {
        let variable = strip_identifier(&name);
        if variable.is_empty() || normalized.contains_key(&variable) {
            diagnostics.push(DiagnosticKind::FieldNameConflict {
                form_id: form_id.clone(),
                field: name,
                variable,
            });
            continue;
        }
        if variable != name {
            debug!(form_id = %form_id, field = %name, variable = %variable, "renamed field");
        }
        field.name.clone_from(&variable);
        normalized.insert(variable, field);
    }
    schema.fields = normalized;
}

/// Shape pass over the instances of one form.
///
/// Every instance key is first stripped to `[A-Za-z0-9_]`; on a collision the
/// first position keeps the last value. Missing schema fields are then added
/// as null. Date fields are rewritten as Stata day offsets, once per
/// instance; a value that is not a date becomes null with a warning.
/// Returns the distinct names of non-null values the schema does not define,
/// in encounter order. The schema is expected to carry normalized names
/// (see [`normalize_field_names`]).
pub fn prepare_data(
    instances: &mut [Instance],
    schema: &MasterSchema,
    diagnostics: &mut Diagnostics,
) -> Vec<String> {
    let form_id = schema.form_id();
    let mut unknown = Vec::new();
    let mut unknown_seen = HashSet::new();

    for instance in instances.iter_mut() {
        let values = std::mem::take(&mut instance.values);
        instance.values = values
            .into_iter()
            .map(|(key, value)| (strip_identifier(&key), value))
            .filter(|(key, _)| !key.is_empty())
            .collect::<InstanceValues>();

        for (key, value) in instance.values.iter() {
            if value.is_some() && !schema.fields.contains_key(key) && unknown_seen.insert(key.clone())
            {
                unknown.push(key.clone());
            }
        }

        for (name, field) in schema.fields.iter() {
            if !instance.values.contains_key(name) {
                instance.values.insert(name.clone(), None);
                continue;
            }
            if !instance.shaped
                && field.kind == Some(FieldKind::Date)
                && let Some(value) = instance.values.get_mut(name)
                && let Some(raw) = value.as_deref()
            {
                let converted = crate::dates::convert_date_value(raw);
                if converted.is_none() {
                    diagnostics.push(DiagnosticKind::InvalidDate {
                        form_id: form_id.to_string(),
                        field: name.to_string(),
                        path: instance.source_path.clone(),
                    });
                }
                *value = converted;
            }
        }
        instance.shaped = true;
    }

    debug!(form_id = %form_id, unknown = ?unknown, "instances shaped");
    unknown
}

/// Tidy pass over the master schema of one form.
///
/// Adds the `_source_file` provenance field, then a text field for every
/// unknown name not already defined, then removes labelling-only fields.
pub fn tidy_form_def(
    schema: &mut MasterSchema,
    unknown: &[String],
    diagnostics: &mut Diagnostics,
) {
    let form_id = schema.form_id().to_string();

    if !schema.fields.contains_key(SOURCE_FILE_KEY) {
        schema.fields.insert(
            SOURCE_FILE_KEY.to_string(),
            SchemaField::synthesized_text(SOURCE_FILE_KEY, SOURCE_FILE_DESCRIPTION),
        );
        info!(form_id = %form_id, "added '{SOURCE_FILE_KEY}' field to metadata");
    }

    let added: Vec<String> = unknown
        .iter()
        .filter(|name| {
            if schema.fields.contains_key(name.as_str()) {
                return false;
            }
            schema.fields.insert(
                (*name).clone(),
                SchemaField::synthesized_text(name.as_str(), UNKNOWN_VARIABLE_DESCRIPTION),
            );
            true
        })
        .cloned()
        .collect();
    if !added.is_empty() {
        diagnostics.push(DiagnosticKind::UnknownVariables {
            form_id: form_id.clone(),
            names: added,
        });
    }

    let removed: Vec<String> = schema
        .fields
        .iter()
        .filter(|(_, field)| field.is_labelling_only())
        .map(|(name, _)| name.to_string())
        .collect();
    if !removed.is_empty() {
        schema.fields.retain(|_, field| !field.is_labelling_only());
        diagnostics.push(DiagnosticKind::LabellingFieldsRemoved {
            form_id,
            names: removed,
        });
    }
}

/// One observation per instance, listing the schema's fields in schema order.
pub fn prepare_observations(instances: &[Instance], schema: &MasterSchema) -> Vec<Observation> {
    instances
        .iter()
        .map(|instance| Observation {
            values: schema
                .field_names()
                .map(|name| {
                    let value = instance.values.get(name).cloned().flatten();
                    (name.to_string(), value)
                })
                .collect(),
        })
        .collect()
}

/// Runs both passes for one form and exports its observations.
pub fn reconcile(
    mut instances: Vec<Instance>,
    mut schema: MasterSchema,
    diagnostics: &mut Diagnostics,
) -> Reconciled {
    let _span = info_span!(
        "reconcile",
        form_id = %schema.form_id(),
        instances = instances.len()
    )
    .entered();

    normalize_field_names(&mut schema, diagnostics);
    let unknown = prepare_data(&mut instances, &schema, diagnostics);
    tidy_form_def(&mut schema, &unknown, diagnostics);
    let observations = prepare_observations(&instances, &schema);
    info!(
        variables = schema.fields.len(),
        observations = observations.len(),
        "collected data"
    );
    Reconciled {
        schema,
        observations,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use odk_model::{FieldKind, Settings};

    fn schema(fields: Vec<SchemaField>) -> MasterSchema {
        let mut master = MasterSchema::new(Settings::new("Q1", "1").expect("settings"));
        for field in fields {
            master.fields.insert(field.name.clone(), field);
        }
        master
    }

    fn field(name: &str, kind: FieldKind) -> SchemaField {
        SchemaField::new(name, Some(kind)).expect("field")
    }

    fn instance(path: &str, pairs: &[(&str, Option<&str>)]) -> Instance {
        let mut values = InstanceValues::new();
        values.insert("@id".to_string(), Some("Q1".to_string()));
        for (k, v) in pairs {
            values.insert((*k).to_string(), v.map(str::to_string));
        }
        Instance::from_values(path, path, values).expect("instance")
    }

    #[test]
    fn strips_identifier_characters() {
        assert_eq!(strip_identifier("@version"), "version");
        assert_eq!(strip_identifier("orx:instance-ID"), "orxinstanceID");
        assert_eq!(strip_identifier("var_1"), "var_1");
    }

    #[test]
    fn missing_fields_become_null_and_dates_convert() {
        let master = schema(vec![
            field("visit", FieldKind::Date),
            field("age", FieldKind::Integer),
        ]);
        let mut instances = vec![instance("a.xml", &[("visit", Some("1960-01-11"))])];
        let mut diagnostics = Diagnostics::new();
        prepare_data(&mut instances, &master, &mut diagnostics);

        assert_eq!(instances[0].value("visit"), Some("10"));
        assert_eq!(instances[0].values.get("age"), Some(&None));
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn dates_convert_once_per_instance() {
        let master = schema(vec![field("visit", FieldKind::Date)]);
        let mut instances = vec![instance("a.xml", &[("visit", Some("2010-08-20"))])];
        let mut diagnostics = Diagnostics::new();
        prepare_data(&mut instances, &master, &mut diagnostics);
        prepare_data(&mut instances, &master, &mut diagnostics);

        assert_eq!(instances[0].value("visit"), Some("18494"));
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn punctuated_field_names_keep_their_data() {
        let master = schema(vec![
            field("first-name", FieldKind::Text),
            field("visit.date", FieldKind::Date),
        ]);
        let instances = vec![instance(
            "a.xml",
            &[("first-name", Some("Ann")), ("visit.date", Some("1960-01-02"))],
        )];
        let mut diagnostics = Diagnostics::new();
        let reconciled = reconcile(instances, master, &mut diagnostics);

        let observation = &reconciled.observations[0];
        assert_eq!(observation.value("firstname"), Some("Ann"));
        assert_eq!(observation.value("visitdate"), Some("1"));
        let field = reconciled.schema.fields.get("firstname").expect("firstname");
        assert_eq!(field.name, "firstname");
        assert!(!reconciled.schema.fields.contains_key("first-name"));
        assert_eq!(diagnostics.with_code("unknown_variables").count(), 1);
        assert_eq!(diagnostics.with_code("invalid_date").count(), 0);
    }

    #[test]
    fn conflicting_field_names_keep_the_first_field() {
        let mut master = schema(vec![
            field("a_b", FieldKind::Integer),
            field("a-_b", FieldKind::Text),
            field("--", FieldKind::Text),
        ]);
        let mut diagnostics = Diagnostics::new();
        normalize_field_names(&mut master, &mut diagnostics);

        assert_eq!(master.field_names().collect::<Vec<_>>(), vec!["a_b"]);
        assert_eq!(
            master.fields.get("a_b").and_then(|f| f.kind.clone()),
            Some(FieldKind::Integer)
        );
        let conflicts: Vec<&DiagnosticKind> = diagnostics
            .with_code("field_name_conflict")
            .map(|d| &d.kind)
            .collect();
        assert_eq!(conflicts.len(), 2);
        assert_eq!(
            conflicts[1],
            &DiagnosticKind::FieldNameConflict {
                form_id: "Q1".to_string(),
                field: "--".to_string(),
                variable: String::new(),
            }
        );
    }

    #[test]
    fn invalid_date_becomes_null_with_warning() {
        let master = schema(vec![field("visit", FieldKind::Date)]);
        let mut instances = vec![instance("a.xml", &[("visit", Some("yesterday"))])];
        let mut diagnostics = Diagnostics::new();
        prepare_data(&mut instances, &master, &mut diagnostics);

        assert_eq!(instances[0].values.get("visit"), Some(&None));
        assert_eq!(diagnostics.with_code("invalid_date").count(), 1);
    }

    #[test]
    fn unknown_names_are_stripped_distinct_and_non_null() {
        let master = schema(vec![field("var_a", FieldKind::Text)]);
        let mut instances = vec![
            instance("a.xml", &[("var_a", Some("1")), ("var-extra", Some("2")), ("blank", None)]),
            instance("b.xml", &[("var_extra", Some("3"))]),
        ];
        let mut diagnostics = Diagnostics::new();
        let unknown = prepare_data(&mut instances, &master, &mut diagnostics);

        assert_eq!(unknown, vec!["id", "var_extra"]);
        assert_eq!(instances[0].value("var_extra"), Some("2"));
        assert!(!instances[0].values.contains_key("var-extra"));
    }

    #[test]
    fn colliding_keys_keep_first_position_last_value() {
        let master = schema(vec![]);
        let mut instances = vec![instance(
            "a.xml",
            &[("a.b", Some("1")), ("c", Some("2")), ("ab", Some("3"))],
        )];
        let mut diagnostics = Diagnostics::new();
        prepare_data(&mut instances, &master, &mut diagnostics);

        let keys: Vec<&str> = instances[0].values.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["id", "ab", "c"]);
        assert_eq!(instances[0].value("ab"), Some("3"));
    }

    #[test]
    fn tidy_adds_provenance_and_unknowns_and_drops_labels() {
        let mut master = schema(vec![
            field("var_a", FieldKind::Text),
            field("nl_intro", FieldKind::Text).with_read_only(true),
        ]);
        let mut diagnostics = Diagnostics::new();
        let unknown = vec![
            "var_a".to_string(),
            "_source_file".to_string(),
            "var_extra".to_string(),
        ];
        tidy_form_def(&mut master, &unknown, &mut diagnostics);

        assert_eq!(
            master.field_names().collect::<Vec<_>>(),
            vec!["var_a", "_source_file", "var_extra"]
        );
        let extra = master.fields.get("var_extra").expect("var_extra");
        assert_eq!(extra.description.as_deref(), Some(UNKNOWN_VARIABLE_DESCRIPTION));

        let codes: Vec<&str> = diagnostics.iter().map(|d| d.kind.code()).collect();
        assert_eq!(codes, vec!["unknown_variables", "labelling_fields_removed"]);
    }

    #[test]
    fn unmatched_instances_are_reported_per_form() {
        let masters: BTreeMap<String, MasterSchema> =
            [("Q1".to_string(), schema(vec![]))].into_iter().collect();
        let mut other = instance("z.xml", &[]);
        other.form_id = "Q9".to_string();
        let mut diagnostics = Diagnostics::new();
        let grouped = match_instances(
            vec![instance("a.xml", &[]), other.clone(), other],
            &masters,
            &mut diagnostics,
        );

        assert_eq!(grouped.get("Q1").map(Vec::len), Some(1));
        assert_eq!(
            diagnostics.iter().next().map(|d| d.kind.clone()),
            Some(DiagnosticKind::UnmatchedInstances {
                form_id: "Q9".to_string(),
                count: 2
            })
        );
    }

    #[test]
    fn observations_follow_schema_order() {
        let master = schema(vec![
            field("b", FieldKind::Text),
            field("a", FieldKind::Text),
        ]);
        let instances = vec![instance("x.xml", &[("a", Some("1")), ("b", Some("2"))])];
        let observations = prepare_observations(&instances, &master);
        let names: Vec<&str> = observations[0].names().collect();
        assert_eq!(names, vec!["b", "a"]);
    }
}
