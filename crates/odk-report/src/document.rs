//! Stata XML document model.

use chrono::NaiveDateTime;
use odk_core::{FormMetadata, ValueLabelSet, VariableDescriptor};
use odk_model::Observation;
use serde::Serialize;

/// `.dta` format release written in the header.
pub const DS_FORMAT: &str = "113";
/// Byte order tag: little-endian.
pub const BYTE_ORDER: &str = "LOHI";
pub const FILE_TYPE: &str = "1";
/// Header time stamp layout, e.g. `05 Mar 2024 14:07`.
pub const TIME_STAMP_FORMAT: &str = "%d %b %Y %H:%M";
pub const DEFAULT_DATA_LABEL: &str = "ODK data";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Header {
    pub ds_format: &'static str,
    pub byte_order: &'static str,
    pub file_type: &'static str,
    pub nvar: usize,
    pub nobs: usize,
    pub data_label: String,
    pub time_stamp: String,
}

/// One complete output document for a form identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StataDocument {
    pub form_id: String,
    pub header: Header,
    pub variables: Vec<VariableDescriptor>,
    pub value_labels: Vec<ValueLabelSet>,
    pub observations: Vec<Observation>,
}

impl StataDocument {
    /// `(variable, value label)` assignments, in variable order.
    pub fn value_label_assignments(&self) -> impl Iterator<Item = (&str, &str)> {
        self.variables.iter().filter_map(|variable| {
            variable
                .value_label
                .as_deref()
                .map(|list| (variable.name.as_str(), list))
        })
    }
}

/// Assembles a document from metadata and observations.
///
/// Observation variable names lose any leading `@`.
pub fn compose(
    metadata: &FormMetadata,
    observations: &[Observation],
    data_label: &str,
    generated_at: NaiveDateTime,
) -> StataDocument {
    let observations: Vec<Observation> = observations
        .iter()
        .map(|observation| Observation {
            values: observation
                .values
                .iter()
                .map(|(name, value)| (name.trim_start_matches('@').to_string(), value.clone()))
                .collect(),
        })
        .collect();

    StataDocument {
        form_id: metadata.form_id.clone(),
        header: Header {
            ds_format: DS_FORMAT,
            byte_order: BYTE_ORDER,
            file_type: FILE_TYPE,
            nvar: metadata.variables.len(),
            nobs: observations.len(),
            data_label: data_label.to_string(),
            time_stamp: generated_at.format(TIME_STAMP_FORMAT).to_string(),
        },
        variables: metadata.variables.clone(),
        value_labels: metadata.value_labels.clone(),
        observations,
    }
}
