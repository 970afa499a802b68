//! Source capabilities consumed by the pipeline.
//!
//! Both traits hand out a lazy iterator of per-item results: a malformed item
//! is an `Err` in the stream, not a failure of the whole read. Every call
//! starts a fresh traversal.

use odk_model::{DiagnosticKind, Diagnostics, Instance, SchemaVersion};

use crate::error::{IngestError, Result};

pub type SchemaIter<'a> = Box<dyn Iterator<Item = Result<SchemaVersion>> + 'a>;
pub type InstanceIter<'a> = Box<dyn Iterator<Item = Result<Instance>> + 'a>;

/// Supplies raw schema definitions.
pub trait SchemaSource {
    fn schemas(&self) -> Result<SchemaIter<'_>>;
}

/// Supplies submitted instances with provenance attached.
pub trait InstanceSource {
    fn instances(&self) -> Result<InstanceIter<'_>>;
}

/// Drains a schema source, turning per-item failures into diagnostics.
pub fn collect_schemas(
    source: &dyn SchemaSource,
    diagnostics: &mut Diagnostics,
) -> Result<Vec<SchemaVersion>> {
    let mut schemas = Vec::new();
    for item in source.schemas()? {
        match item {
            Ok(schema) => schemas.push(schema),
            Err(error) => report_skipped(&error, diagnostics),
        }
    }
    tracing::debug!(count = schemas.len(), "schema versions read");
    Ok(schemas)
}

/// Drains an instance source, turning per-item failures into diagnostics.
pub fn collect_instances(
    source: &dyn InstanceSource,
    diagnostics: &mut Diagnostics,
) -> Result<Vec<Instance>> {
    let mut instances = Vec::new();
    for item in source.instances()? {
        match item {
            Ok(instance) => instances.push(instance),
            Err(error) => report_skipped(&error, diagnostics),
        }
    }
    tracing::debug!(count = instances.len(), "instances read");
    Ok(instances)
}

fn report_skipped(error: &IngestError, diagnostics: &mut Diagnostics) {
    diagnostics.push(DiagnosticKind::SourceRead {
        path: error.path().to_path_buf(),
        cause: error.to_string(),
    });
}

// In-memory sources.
impl SchemaSource for Vec<SchemaVersion> {
    fn schemas(&self) -> Result<SchemaIter<'_>> {
        Ok(Box::new(self.iter().cloned().map(Ok)))
    }
}

impl InstanceSource for Vec<Instance> {
    fn instances(&self) -> Result<InstanceIter<'_>> {
        Ok(Box::new(self.iter().cloned().map(Ok)))
    }
}
