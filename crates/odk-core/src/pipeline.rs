//! The full in-memory pipeline from schema versions and instances to
//! per-form metadata and observations.

use odk_model::{Diagnostics, Instance, Observation, SchemaVersion};
use tracing::info_span;

use crate::dedupe::remove_duplicate_instances;
use crate::metadata::{FormMetadata, build_metadata};
use crate::prepare::{match_instances, reconcile};
use crate::reconcile::collate_schemas;

/// Metadata and observations of one form identifier, ready for composition.
#[derive(Debug, Clone, PartialEq)]
pub struct FormOutput {
    pub form_id: String,
    pub metadata: FormMetadata,
    pub observations: Vec<Observation>,
}

/// Runs reconciliation for every form identifier, in sorted identifier order.
pub fn process_forms(
    schemas: Vec<SchemaVersion>,
    instances: Vec<Instance>,
    diagnostics: &mut Diagnostics,
) -> Vec<FormOutput> {
    let _span = info_span!("process_forms").entered();

    let masters = collate_schemas(schemas, diagnostics);
    let instances = remove_duplicate_instances(instances, diagnostics);
    let mut grouped = match_instances(instances, &masters, diagnostics);

    masters
        .into_iter()
        .map(|(form_id, master)| {
            let form_instances = grouped.remove(&form_id).unwrap_or_default();
            let reconciled = reconcile(form_instances, master, diagnostics);
            let metadata = build_metadata(&reconciled.schema, diagnostics);
            FormOutput {
                form_id,
                metadata,
                observations: reconciled.observations,
            }
        })
        .collect()
}
