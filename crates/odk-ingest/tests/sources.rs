//! Tests for the on-disk form and instance sources.

use std::fs;
use std::path::Path;

use odk_ingest::{
    CsvFormSource, FormSource, IngestError, SchemaSource, XmlInstanceSource, collect_instances,
    collect_schemas, list_forms,
};
use odk_model::{Diagnostics, FieldKind, SOURCE_FILE_KEY};

fn write(path: &Path, contents: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create dir");
    }
    fs::write(path, contents).expect("write file");
}

fn write_form(dir: &Path, form_id: &str, version: &str) {
    write(
        &dir.join("survey.csv"),
        "type,name,label,label::French,read_only,name_description\n\
         start,start,,,,\n\
         begin group,grp,Group,,,\n\
         integer,age,Age,Âge,,\n\
         select_one yesno,consent,Consent,Accord,,\n\
         text,nl_intro,Welcome,,yes,\n\
         end group,,,,,\n\
         date,visit,Visit date,,,When the visit happened\n",
    );
    write(
        &dir.join("choices.csv"),
        "list_name,name,label,label::French\n\
         yesno,1,Yes,Oui\n\
         yesno,0,No,Non\n\
         other,a,A,\n",
    );
    write(
        &dir.join("settings.csv"),
        &format!("form_id,version,default_language,form_title\n{form_id},{version},French,Demo\n"),
    );
}

#[test]
fn reads_form_directories_recursively() {
    let root = tempfile::tempdir().expect("temp dir");
    write_form(&root.path().join("b/q1_v2"), "Q1", "2");
    write_form(&root.path().join("a"), "Q1", "1");

    let source = CsvFormSource::new(root.path());
    let mut diagnostics = Diagnostics::new();
    let schemas = collect_schemas(&source, &mut diagnostics).expect("collect");

    assert!(diagnostics.is_empty());
    assert_eq!(schemas.len(), 2);
    assert_eq!(schemas[0].version(), "1");
    assert_eq!(schemas[1].version(), "2");

    let schema = &schemas[0];
    assert_eq!(schema.settings.default_language.as_deref(), Some("French"));
    assert_eq!(schema.settings.extra.get("form_title").map(String::as_str), Some("Demo"));
    let names: Vec<&str> = schema.fields.keys().map(String::as_str).collect();
    assert_eq!(names, vec!["start", "grp", "age", "consent", "nl_intro", "visit"]);

    let consent = schema.fields.get("consent").expect("consent");
    assert_eq!(consent.kind, Some(FieldKind::Select("yesno".to_string())));
    let choices = consent.choices.as_ref().expect("choices");
    assert_eq!(choices.len(), 2);
    assert_eq!(choices[0].labels.get(Some("French")), Some("Oui"));

    let intro = schema.fields.get("nl_intro").expect("intro");
    assert!(intro.is_labelling_only());
    let visit = schema.fields.get("visit").expect("visit");
    assert_eq!(visit.description.as_deref(), Some("When the visit happened"));
}

#[test]
fn incomplete_form_is_skipped_with_a_diagnostic() {
    let root = tempfile::tempdir().expect("temp dir");
    write_form(&root.path().join("good"), "Q1", "1");
    write(&root.path().join("broken/survey.csv"), "type,name\ntext,a\n");

    let source = CsvFormSource::new(root.path());
    let mut diagnostics = Diagnostics::new();
    let forms = list_forms(&source, &mut diagnostics).expect("list");

    assert_eq!(forms.len(), 1);
    assert_eq!(forms[0].form_id, "Q1");
    assert_eq!(forms[0].field_count, 6);
    assert_eq!(diagnostics.with_code("source_read").count(), 1);
}

#[test]
fn each_call_restarts_the_traversal() {
    let root = tempfile::tempdir().expect("temp dir");
    write_form(root.path(), "Q1", "1");
    let source = CsvFormSource::new(root.path());
    assert_eq!(source.schemas().expect("first").count(), 1);
    assert_eq!(source.schemas().expect("second").count(), 1);
}

#[test]
fn form_source_reads_workbooks_and_sheet_directories() {
    let root = tempfile::tempdir().expect("temp dir");
    write_form(&root.path().join("csv"), "Q1", "1");
    write(&root.path().join("xlsx/q1_v2.xlsx"), "not a workbook");
    write(&root.path().join("xlsx/~$q1_v2.xlsx"), "lock file");

    let source = FormSource::new(root.path());
    let mut diagnostics = Diagnostics::new();
    let schemas = collect_schemas(&source, &mut diagnostics).expect("collect");

    assert_eq!(schemas.len(), 1);
    assert_eq!(schemas[0].version(), "1");
    let skipped: Vec<_> = diagnostics.with_code("source_read").collect();
    assert_eq!(skipped.len(), 1);
    assert!(skipped[0].message.contains("q1_v2.xlsx"));
    assert!(skipped[0].message.contains("failed to read workbook"));
}

#[test]
fn form_source_needs_an_existing_root() {
    let root = tempfile::tempdir().expect("temp dir");
    let source = FormSource::new(root.path().join("absent"));
    assert!(matches!(
        source.schemas().map(|schemas| schemas.count()),
        Err(IngestError::DirectoryNotFound { .. })
    ));
}

#[test]
fn missing_root_fails_the_listing() {
    let root = tempfile::tempdir().expect("temp dir");
    let source = XmlInstanceSource::new(root.path().join("absent"));
    let mut diagnostics = Diagnostics::new();
    assert!(collect_instances(&source, &mut diagnostics).is_err());
}

#[test]
fn reads_instances_with_provenance() {
    let root = tempfile::tempdir().expect("temp dir");
    write(
        &root.path().join("2/b.xml"),
        r#"<?xml version="1.0"?><data id="Q1" version="2"><age>30</age></data>"#,
    );
    write(
        &root.path().join("1/a.xml"),
        r#"<data id="Q1"><grp><age>41</age></grp></data>"#,
    );
    write(&root.path().join("1/bad.xml"), "<data><age>");
    write(&root.path().join("1/no_id.xml"), "<data><age>1</age></data>");

    let source = XmlInstanceSource::new(root.path());
    let mut diagnostics = Diagnostics::new();
    let instances = collect_instances(&source, &mut diagnostics).expect("collect");

    assert_eq!(instances.len(), 2);
    assert_eq!(diagnostics.with_code("source_read").count(), 2);
    let first = &instances[0];
    assert_eq!(first.form_id, "Q1");
    assert_eq!(first.value("age"), Some("41"));
    assert_eq!(
        first.value(SOURCE_FILE_KEY),
        Some(root.path().join("1/a.xml").to_string_lossy().as_ref())
    );
    assert_eq!(instances[1].version.as_deref(), Some("2"));
    assert!(instances[1].raw.starts_with("<?xml"));
}
