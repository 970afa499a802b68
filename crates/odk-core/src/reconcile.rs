//! Schema reconciliation: many versions of a form into one master schema.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use odk_model::{DiagnosticKind, Diagnostics, MasterSchema, SchemaVersion};
use tracing::{debug, info, info_span};

/// Merges schema versions into one master schema per form identifier.
///
/// Versions of a form are walked newest first. The newest version's settings
/// become the master settings and every field is taken from the newest
/// version that defines it. Group markers and untyped items are dropped.
pub fn collate_schemas(
    versions: Vec<SchemaVersion>,
    diagnostics: &mut Diagnostics,
) -> BTreeMap<String, MasterSchema> {
    let _span = info_span!("collate", versions = versions.len()).entered();

    let mut groups: BTreeMap<String, Vec<SchemaVersion>> = BTreeMap::new();
    for version in versions {
        groups
            .entry(version.form_id().to_string())
            .or_default()
            .push(version);
    }

    if groups.is_empty() {
        diagnostics.push(DiagnosticKind::NoSchemas);
        return BTreeMap::new();
    }
    info!(form_ids = ?groups.keys().collect::<Vec<_>>(), "form definitions read");

    groups
        .into_iter()
        .filter_map(|(form_id, mut group)| {
            sort_newest_first(&mut group);
            let master = merge_versions(group)?;
            debug!(
                form_id = %form_id,
                fields = master.fields.len(),
                versions = ?master.merged_versions,
                "merged schema versions"
            );
            Some((form_id, master))
        })
        .collect()
}

/// Sorts versions highest first; ties keep their read order.
pub fn sort_newest_first(group: &mut [SchemaVersion]) {
    let numeric = group.iter().all(|v| parse_version(v.version()).is_some());
    if numeric {
        group.sort_by(|a, b| {
            let a = parse_version(a.version()).unwrap_or_default();
            let b = parse_version(b.version()).unwrap_or_default();
            b.partial_cmp(&a).unwrap_or(Ordering::Equal)
        });
    } else {
        group.sort_by(|a, b| b.version().cmp(a.version()));
    }
}

fn parse_version(version: &str) -> Option<f64> {
    version.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Merges versions already sorted newest first. Returns `None` for an empty group.
fn merge_versions(group: Vec<SchemaVersion>) -> Option<MasterSchema> {
    let mut versions = group.into_iter();
    let newest = versions.next()?;

    let mut master = MasterSchema::new(newest.settings.clone());
    for version in std::iter::once(newest).chain(versions) {
        master.merged_versions.push(version.settings.version.clone());
        for (name, field) in version.fields {
            match &field.kind {
                None => continue,
                Some(kind) if kind.is_group_marker() => continue,
                Some(_) => {
                    master.fields.entry(name).or_insert(field);
                }
            }
        }
    }
    Some(master)
}
