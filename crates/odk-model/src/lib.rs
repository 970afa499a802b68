//! Data model for aggregating ODK form data into a Stata dataset.
//!
//! The crate holds the typed entities every stage of the pipeline shares:
//!
//! - **Schema**: [`SchemaVersion`] read from one XLSForm definition and the
//!   [`MasterSchema`] reconciled from all versions of a form identifier
//! - **Data**: submitted [`Instance`] records and the [`Observation`] rows
//!   exported from them
//! - **Diagnostics**: the [`Diagnostics`] collector that replaces captured log
//!   output as the way warnings reach the caller

pub mod diagnostic;
pub mod error;
pub mod instance;
pub mod schema;

pub use diagnostic::{Diagnostic, DiagnosticKind, Diagnostics, Severity};
pub use error::{ModelError, Result};
pub use instance::{
    FORM_ID_KEY, FORM_VERSION_KEY, Instance, InstanceValues, Observation, SOURCE_FILE_KEY,
};
pub use schema::{
    ChoiceOption, FieldKind, FieldMap, Labels, MasterSchema, SchemaField, SchemaVersion, Settings,
};
