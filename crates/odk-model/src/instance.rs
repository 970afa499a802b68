//! Submitted form instances and exported observations.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::Serialize;

use crate::error::{ModelError, Result};

/// Flattened key of the root element's form id attribute.
pub const FORM_ID_KEY: &str = "@id";

/// Flattened key of the root element's form version attribute.
pub const FORM_VERSION_KEY: &str = "@version";

/// Provenance key holding the path an instance was read from.
pub const SOURCE_FILE_KEY: &str = "_source_file";

/// Flattened `name -> value` entries of an instance, in document order.
pub type InstanceValues = IndexMap<String, Option<String>>;

/// One submitted record, flattened to a single level of `name -> value`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Instance {
    pub form_id: String,
    pub version: Option<String>,
    pub source_path: PathBuf,
    /// The document exactly as read; duplicates are detected on this.
    #[serde(skip)]
    pub raw: String,
    /// `None` marks a missing value.
    pub values: InstanceValues,
    /// Set once the values have been shaped against a schema; date values
    /// then hold day offsets and are not converted again.
    #[serde(skip)]
    pub shaped: bool,
}

impl Instance {
    /// Build an instance from flattened values, taking the form id and version
    /// from the `@id` / `@version` entries.
    pub fn from_values(
        source_path: impl Into<PathBuf>,
        raw: impl Into<String>,
        values: InstanceValues,
    ) -> Result<Self> {
        let source_path = source_path.into();
        let form_id = values
            .get(FORM_ID_KEY)
            .and_then(Option::as_deref)
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
            .ok_or_else(|| ModelError::MissingInstanceFormId {
                path: source_path.clone(),
            })?;
        let version = values
            .get(FORM_VERSION_KEY)
            .and_then(Option::as_deref)
            .map(str::to_string);
        Ok(Self {
            form_id,
            version,
            source_path,
            raw: raw.into(),
            values,
            shaped: false,
        })
    }

    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    pub fn value(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(Option::as_deref)
    }
}

/// One exported row: `(variable, value)` pairs in schema field order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Observation {
    pub values: Vec<(String, Option<String>)>,
}

impl Observation {
    pub fn value(&self, name: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|(key, _)| key == name)
            .and_then(|(_, value)| value.as_deref())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.iter().map(|(key, _)| key.as_str())
    }
}
