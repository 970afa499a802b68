//! Submitted XForm instances read from XML files.

use std::path::{Component, Path, PathBuf};

use odk_model::{FORM_ID_KEY, FORM_VERSION_KEY, Instance, InstanceValues, SOURCE_FILE_KEY};
use quick_xml::Reader;
use quick_xml::escape::resolve_predefined_entity;
use quick_xml::events::{BytesStart, Event};

use crate::discovery::list_xml_files;
use crate::error::{IngestError, Result};
use crate::source::{InstanceIter, InstanceSource};

/// Reads every `*.xml` file below a root as one instance.
#[derive(Debug, Clone)]
pub struct XmlInstanceSource {
    root: PathBuf,
}

impl XmlInstanceSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl InstanceSource for XmlInstanceSource {
    fn instances(&self) -> Result<InstanceIter<'_>> {
        let files = list_xml_files(&self.root)?;
        tracing::debug!(root = %self.root.display(), count = files.len(), "instance files found");
        Ok(Box::new(files.into_iter().map(|path| read_instance(&path))))
    }
}

/// Reads and flattens one instance file.
pub fn read_instance(path: &Path) -> Result<Instance> {
    let raw = std::fs::read_to_string(path).map_err(|source| IngestError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;
    let source_path = normalize_path(path);
    let mut values = flatten_xml(&raw, path)?;
    values.insert(
        SOURCE_FILE_KEY.to_string(),
        Some(source_path.to_string_lossy().into_owned()),
    );
    Instance::from_values(source_path, raw, values).map_err(|source| IngestError::Model {
        path: path.to_path_buf(),
        source,
    })
}

/// Lexically normalizes a path: drops `.` and folds `name/..` pairs.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if matches!(out.components().next_back(), Some(Component::Normal(_))) {
                    out.pop();
                } else {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    if out.as_os_str().is_empty() {
        out.push(".");
    }
    out
}

struct Frame {
    name: String,
    text: String,
    has_children: bool,
}

/// Flattens an XML document to one level of `name -> value`.
///
/// Leaf elements become entries (blank text is `None`); nesting is dropped.
/// A name seen again keeps its first position and takes the new value. Only
/// the root element's `id` and `version` attributes are kept, as `@id` and
/// `@version`.
pub fn flatten_xml(raw: &str, path: &Path) -> Result<InstanceValues> {
    let xml_error = |message: String| IngestError::XmlParse {
        path: path.to_path_buf(),
        message,
    };

    let mut reader = Reader::from_str(raw);
    let mut values = InstanceValues::new();
    let mut stack: Vec<Frame> = Vec::new();
    let mut seen_root = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                open_element(&e, &mut stack, &mut values, &mut seen_root, path)?;
                stack.push(Frame {
                    name: element_name(&e),
                    text: String::new(),
                    has_children: false,
                });
            }
            Ok(Event::Empty(e)) => {
                let is_root = stack.is_empty();
                open_element(&e, &mut stack, &mut values, &mut seen_root, path)?;
                if !is_root {
                    values.insert(element_name(&e), None);
                }
            }
            Ok(Event::End(_)) => {
                let Some(frame) = stack.pop() else {
                    return Err(xml_error("unexpected closing tag".to_string()));
                };
                if !stack.is_empty() && !frame.has_children {
                    let text = frame.text.trim();
                    let value = (!text.is_empty()).then(|| text.to_string());
                    values.insert(frame.name, value);
                }
            }
            Ok(Event::Text(e)) => {
                let text = e.decode().map_err(|err| xml_error(err.to_string()))?;
                push_text(&mut stack, &text);
            }
            Ok(Event::CData(e)) => {
                let text = e.decode().map_err(|err| xml_error(err.to_string()))?;
                push_text(&mut stack, &text);
            }
            Ok(Event::GeneralRef(e)) => {
                let resolved = match e.resolve_char_ref() {
                    Ok(Some(ch)) => ch.to_string(),
                    Ok(None) => {
                        let name = e.decode().map_err(|err| xml_error(err.to_string()))?;
                        resolve_predefined_entity(&name)
                            .ok_or_else(|| xml_error(format!("unknown entity &{name};")))?
                            .to_string()
                    }
                    Err(err) => return Err(xml_error(err.to_string())),
                };
                push_text(&mut stack, &resolved);
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(err) => {
                return Err(xml_error(format!(
                    "error at position {}: {err}",
                    reader.error_position()
                )));
            }
        }
    }

    if !seen_root {
        return Err(xml_error("document has no root element".to_string()));
    }
    if let Some(frame) = stack.last() {
        return Err(xml_error(format!("unclosed element <{}>", frame.name)));
    }
    Ok(values)
}

fn element_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.name().as_ref()).into_owned()
}

/// Marks the parent as a group and, for the root element, records its form attributes.
fn open_element(
    e: &BytesStart<'_>,
    stack: &mut [Frame],
    values: &mut InstanceValues,
    seen_root: &mut bool,
    path: &Path,
) -> Result<()> {
    if let Some(parent) = stack.last_mut() {
        parent.has_children = true;
        return Ok(());
    }
    if *seen_root {
        return Err(IngestError::XmlParse {
            path: path.to_path_buf(),
            message: "document has more than one root element".to_string(),
        });
    }
    *seen_root = true;
    for attr in e.attributes() {
        let attr = attr.map_err(|err| IngestError::XmlParse {
            path: path.to_path_buf(),
            message: err.to_string(),
        })?;
        let key = match attr.key.as_ref() {
            b"id" => FORM_ID_KEY,
            b"version" => FORM_VERSION_KEY,
            _ => continue,
        };
        let value = attr.unescape_value().map_err(|err| IngestError::XmlParse {
            path: path.to_path_buf(),
            message: err.to_string(),
        })?;
        values.insert(key.to_string(), Some(value.into_owned()));
    }
    Ok(())
}

fn push_text(stack: &mut [Frame], text: &str) {
    if let Some(frame) = stack.last_mut() {
        frame.text.push_str(text);
    }
}
