//! Stata XML (`dta` 113) rendering and writing.

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use quick_xml::Writer;
use quick_xml::escape::partial_escape;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use tracing::{info, info_span};

use crate::document::StataDocument;
use crate::error::{ReportError, Result};

type XmlResult = std::io::Result<()>;

/// Renders a document to bytes.
///
/// Elements without content are written as an open/close pair, never
/// self-closed.
pub fn render_stata_xml(document: &StataDocument) -> Result<Vec<u8>> {
    let mut xml = Writer::new(Vec::new());
    write_document(&mut xml, document).map_err(|source| ReportError::Render {
        form_id: document.form_id.clone(),
        source,
    })?;
    Ok(xml.into_inner())
}

fn write_document<W: Write>(xml: &mut Writer<W>, document: &StataDocument) -> XmlResult {
    xml.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;
    xml.get_mut().write_all(b"\n")?;
    start(xml, "dta")?;

    let header = &document.header;
    start(xml, "header")?;
    text_element(xml, "ds_format", &[], header.ds_format)?;
    text_element(xml, "byteorder", &[], header.byte_order)?;
    text_element(xml, "filetype", &[], header.file_type)?;
    text_element(xml, "nvar", &[], &header.nvar.to_string())?;
    text_element(xml, "nobs", &[], &header.nobs.to_string())?;
    text_element(xml, "data_label", &[], &header.data_label)?;
    text_element(xml, "time_stamp", &[], &header.time_stamp)?;
    end(xml, "header")?;

    start(xml, "descriptors")?;
    start(xml, "typelist")?;
    for variable in &document.variables {
        text_element(xml, "type", &[("varname", variable.name.as_str())], variable.stata_type)?;
    }
    end(xml, "typelist")?;
    start(xml, "varlist")?;
    for variable in &document.variables {
        text_element(xml, "variable", &[("varname", variable.name.as_str())], "")?;
    }
    end(xml, "varlist")?;
    text_element(xml, "srtlist", &[], "")?;
    start(xml, "fmtlist")?;
    for variable in &document.variables {
        text_element(xml, "fmt", &[("varname", variable.name.as_str())], variable.format)?;
    }
    end(xml, "fmtlist")?;
    start(xml, "lbllist")?;
    for (name, list) in document.value_label_assignments() {
        text_element(xml, "lblname", &[("varname", name)], list)?;
    }
    end(xml, "lbllist")?;
    end(xml, "descriptors")?;

    start(xml, "variable_labels")?;
    for variable in &document.variables {
        text_element(xml, "vlabel", &[("varname", variable.name.as_str())], &variable.label)?;
    }
    end(xml, "variable_labels")?;

    text_element(xml, "expansion", &[], "")?;

    start(xml, "data")?;
    for observation in &document.observations {
        start(xml, "o")?;
        for (name, value) in &observation.values {
            text_element(xml, "v", &[("varname", name.as_str())], value.as_deref().unwrap_or_default())?;
        }
        end(xml, "o")?;
    }
    end(xml, "data")?;

    start(xml, "value_labels")?;
    for set in &document.value_labels {
        let mut vallab = BytesStart::new("vallab");
        vallab.push_attribute(("name", set.name.as_str()));
        xml.write_event(Event::Start(vallab))?;
        for (code, label) in &set.labels {
            text_element(xml, "label", &[("value", code.to_string().as_str())], label)?;
        }
        end(xml, "vallab")?;
    }
    end(xml, "value_labels")?;

    end(xml, "dta")
}

fn start<W: Write>(xml: &mut Writer<W>, name: &str) -> XmlResult {
    xml.write_event(Event::Start(BytesStart::new(name)))
}

fn end<W: Write>(xml: &mut Writer<W>, name: &str) -> XmlResult {
    xml.write_event(Event::End(BytesEnd::new(name)))
}

/// Writes `<name attrs>text</name>`; empty text leaves the pair empty.
fn text_element<W: Write>(
    xml: &mut Writer<W>,
    name: &str,
    attributes: &[(&str, &str)],
    text: &str,
) -> XmlResult {
    let mut element = BytesStart::new(name);
    for attribute in attributes {
        element.push_attribute(*attribute);
    }
    xml.write_event(Event::Start(element))?;
    if !text.is_empty() {
        xml.write_event(Event::Text(BytesText::from_escaped(partial_escape(text))))?;
    }
    end(xml, name)
}

/// File name of a form's document: `<form_id>.xml`, path separators replaced.
pub fn document_file_name(form_id: &str) -> String {
    let safe: String = form_id
        .chars()
        .map(|c| if matches!(c, '/' | '\\') { '_' } else { c })
        .collect();
    format!("{safe}.xml")
}

/// Writes each document into `output_dir`, returning the written paths.
///
/// A document is rendered fully, written to a hidden temporary file next to
/// its target and then renamed over it. Nothing is written when two form ids
/// map to the same file name.
pub fn write_stata_documents(output_dir: &Path, documents: &[StataDocument]) -> Result<Vec<PathBuf>> {
    let _span = info_span!("write", output = %output_dir.display(), documents = documents.len())
        .entered();

    let mut owners: HashMap<String, &str> = HashMap::with_capacity(documents.len());
    for document in documents {
        let file_name = document_file_name(&document.form_id);
        if let Some(first) = owners.insert(file_name.clone(), &document.form_id) {
            return Err(ReportError::FileNameClash {
                file_name,
                first: first.to_string(),
                second: document.form_id.clone(),
            });
        }
    }

    fs::create_dir_all(output_dir).map_err(|source| ReportError::CreateDir {
        path: output_dir.to_path_buf(),
        source,
    })?;

    let mut written = Vec::with_capacity(documents.len());
    for document in documents {
        let bytes = render_stata_xml(document)?;
        let file_name = document_file_name(&document.form_id);
        let path = output_dir.join(&file_name);
        let temp_path = output_dir.join(format!(".{file_name}.tmp"));

        let result = fs::write(&temp_path, &bytes).and_then(|()| fs::rename(&temp_path, &path));
        if let Err(source) = result {
            let _ = fs::remove_file(&temp_path);
            return Err(ReportError::FileWrite { path, source });
        }
        info!(
            form_id = %document.form_id,
            path = %path.display(),
            "wrote form data"
        );
        written.push(path);
    }
    Ok(written)
}
