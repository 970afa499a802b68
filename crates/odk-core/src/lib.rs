//! Core of ODK to Stata aggregation.
//!
//! Stages, in pipeline order:
//!
//! 1. [`reconcile::collate_schemas`] merges schema versions per form identifier
//! 2. [`dedupe::remove_duplicate_instances`] drops repeated submissions
//! 3. [`prepare::reconcile`] shapes instances against the master schema
//! 4. [`metadata::build_metadata`] derives Stata types, formats and labels
//!
//! [`pipeline::process_forms`] runs them all.

pub mod dates;
pub mod dedupe;
pub mod metadata;
pub mod pipeline;
pub mod prepare;
pub mod reconcile;

pub use dedupe::remove_duplicate_instances;
pub use metadata::{FormMetadata, TYPE_MAPPINGS, TypeMapping, ValueLabelSet, VariableDescriptor, build_metadata};
pub use pipeline::{FormOutput, process_forms};
pub use prepare::{
    Reconciled, match_instances, prepare_data, prepare_observations, reconcile, strip_identifier,
    tidy_form_def,
};
pub use reconcile::collate_schemas;
