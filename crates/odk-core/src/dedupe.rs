//! Duplicate submission filtering.

use std::collections::HashSet;
use std::path::PathBuf;

use indexmap::IndexMap;
use odk_model::{DiagnosticKind, Diagnostics, Instance};
use sha2::Digest;
use tracing::info_span;

/// Key identifying an instance's raw content: the SHA-256 digest, hex encoded.
pub fn content_key(instance: &Instance) -> String {
    hex::encode(sha2::Sha256::digest(instance.raw.as_bytes()))
}

/// Keeps the first instance of every distinct raw content, in input order.
///
/// One warning is reported per duplicated content, listing every path that
/// carried it; the first path listed is the one kept.
pub fn remove_duplicate_instances(
    instances: Vec<Instance>,
    diagnostics: &mut Diagnostics,
) -> Vec<Instance> {
    let _span = info_span!("dedupe", instances = instances.len()).entered();

    let keys: Vec<String> = instances.iter().map(content_key).collect();
    let mut paths_by_key: IndexMap<&str, Vec<PathBuf>> = IndexMap::new();
    for (key, instance) in keys.iter().zip(&instances) {
        paths_by_key
            .entry(key.as_str())
            .or_default()
            .push(instance.source_path.clone());
    }

    for paths in paths_by_key.values().filter(|paths| paths.len() > 1) {
        diagnostics.push(DiagnosticKind::DuplicateInstances {
            count: paths.len(),
            paths: paths.clone(),
        });
    }

    let mut seen = HashSet::new();
    let unique: Vec<Instance> = keys
        .into_iter()
        .zip(instances)
        .filter_map(|(key, instance)| seen.insert(key).then_some(instance))
        .collect();
    tracing::debug!(unique = unique.len(), "duplicates removed");
    unique
}
