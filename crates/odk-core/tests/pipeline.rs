//! End-to-end scenarios for the in-memory pipeline.

use odk_core::process_forms;
use odk_model::{
    ChoiceOption, Diagnostics, FieldKind, Instance, InstanceValues, SchemaField, SchemaVersion,
    Settings,
};

fn version(version: &str, fields: &[&str]) -> SchemaVersion {
    let mut schema = SchemaVersion::new(Settings::new("Q1", version).expect("settings"));
    for name in fields {
        schema.push_field(
            SchemaField::new(*name, Some(FieldKind::Text))
                .expect("field")
                .with_description(format!("{name} v{version}")),
        );
    }
    schema
}

fn instance(path: &str, pairs: &[(&str, &str)]) -> Instance {
    let mut values = InstanceValues::new();
    values.insert("@id".to_string(), Some("Q1".to_string()));
    for (key, value) in pairs {
        values.insert((*key).to_string(), Some((*value).to_string()));
    }
    values.insert("_source_file".to_string(), Some(path.to_string()));
    let raw = format!("{path}:{pairs:?}");
    Instance::from_values(path, raw, values).expect("instance")
}

#[test]
fn two_versions_merge_into_one_document() {
    let schemas = vec![version("1", &["A", "B"]), version("2", &["B", "C"])];
    let instances = vec![instance("a.xml", &[("A", "x"), ("B", "1"), ("C", "2")])];

    let mut diagnostics = Diagnostics::new();
    let outputs = process_forms(schemas, instances, &mut diagnostics);

    assert_eq!(outputs.len(), 1);
    let output = &outputs[0];
    assert_eq!(output.form_id, "Q1");

    let names: Vec<&str> = output.metadata.variable_names().collect();
    assert_eq!(names, vec!["B", "C", "A", "_source_file", "id"]);
    let labels: Vec<&str> = output
        .metadata
        .variables
        .iter()
        .map(|v| v.label.as_str())
        .collect();
    assert_eq!(
        labels,
        vec![
            "B v2",
            "C v2",
            "A v1",
            "Path to file that the data was read from.",
            "(Unknown variable)"
        ]
    );

    let observation = &output.observations[0];
    assert_eq!(observation.names().collect::<Vec<_>>(), names);
    assert_eq!(observation.value("A"), Some("x"));
    assert_eq!(observation.value("C"), Some("2"));
    assert_eq!(observation.value("_source_file"), Some("a.xml"));
}

#[test]
fn unknown_variable_is_folded_into_the_schema() {
    let schemas = vec![version("1", &["var_a"])];
    let instances = vec![instance("a.xml", &[("var_a", "1"), ("var_extra", "2")])];

    let mut diagnostics = Diagnostics::new();
    let outputs = process_forms(schemas, instances, &mut diagnostics);
    let output = &outputs[0];

    let extra = output
        .metadata
        .variables
        .iter()
        .find(|v| v.name == "var_extra")
        .expect("var_extra added");
    assert_eq!(extra.stata_type, "str2045");
    assert_eq!(extra.label, "(Unknown variable)");
    assert_eq!(output.observations[0].value("var_a"), Some("1"));
    assert_eq!(output.observations[0].value("var_extra"), Some("2"));

    let added = diagnostics
        .with_code("unknown_variables")
        .map(|d| d.message.clone())
        .collect::<Vec<_>>();
    assert_eq!(added, vec!["added unknown variables to form_id Q1: id, var_extra"]);
}

#[test]
fn punctuated_field_names_become_variable_names() {
    let schemas = vec![version("1", &["first-name", "a.b"])];
    let instances = vec![instance("a.xml", &[("first-name", "Ann"), ("a.b", "7")])];

    let mut diagnostics = Diagnostics::new();
    let outputs = process_forms(schemas, instances, &mut diagnostics);
    let output = &outputs[0];

    let names: Vec<&str> = output.metadata.variable_names().collect();
    assert_eq!(names, vec!["firstname", "ab", "_source_file", "id"]);
    assert_eq!(output.metadata.variables[0].label, "first-name v1");
    assert_eq!(output.observations[0].value("firstname"), Some("Ann"));
    assert_eq!(output.observations[0].value("ab"), Some("7"));
    assert_eq!(diagnostics.with_code("field_name_conflict").count(), 0);
}

#[test]
fn duplicates_and_unmatched_instances_are_reported() {
    let schemas = vec![version("1", &["a"])];
    let mut stray = instance("z.xml", &[("a", "9")]);
    stray.form_id = "Q2".to_string();
    let first = instance("a.xml", &[("a", "1")]);
    let mut copy = first.clone();
    copy.source_path = "b.xml".into();

    let mut diagnostics = Diagnostics::new();
    let outputs = process_forms(schemas, vec![first, copy, stray], &mut diagnostics);

    assert_eq!(outputs[0].observations.len(), 1);
    let codes: Vec<&str> = diagnostics.iter().map(|d| d.kind.code()).collect();
    assert_eq!(
        codes,
        vec!["duplicate_instances", "unmatched_instances", "unknown_variables"]
    );
}

#[test]
fn select_fields_get_value_labels() {
    let mut schema = version("1", &[]);
    schema.settings = schema.settings.clone().with_default_language(Some("English"));
    schema.push_field(
        SchemaField::new("consent", FieldKind::parse("select_one yesno"))
            .expect("field")
            .with_label(Some("English"), "Consent given?")
            .with_choices(vec![
                ChoiceOption::new("yesno", "1").with_label(Some("English"), "Yes"),
                ChoiceOption::new("yesno", "0").with_label(None, "No"),
            ]),
    );
    let instances = vec![instance("a.xml", &[("consent", "1")])];

    let mut diagnostics = Diagnostics::new();
    let outputs = process_forms(vec![schema], instances, &mut diagnostics);
    let metadata = &outputs[0].metadata;

    assert_eq!(metadata.variables[0].stata_type, "int");
    assert_eq!(metadata.variables[0].label, "Consent given?");
    assert_eq!(metadata.value_labels[0].name, "yesno");
    assert_eq!(
        metadata.value_labels[0].labels,
        vec![(1, "Yes".to_string()), (0, "No".to_string())]
    );
}

#[test]
fn no_schemas_yields_no_documents() {
    let mut diagnostics = Diagnostics::new();
    let outputs = process_forms(Vec::new(), vec![instance("a.xml", &[])], &mut diagnostics);
    assert!(outputs.is_empty());
    let codes: Vec<&str> = diagnostics.iter().map(|d| d.kind.code()).collect();
    assert_eq!(codes, vec!["no_schemas", "unmatched_instances"]);
}
