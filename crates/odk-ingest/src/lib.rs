//! Form definition and instance sources.
//!
//! - [`XlsxFormSource`] reads XLSForm workbooks as authored
//! - [`CsvFormSource`] reads XLSForm definitions exported as CSV sheets
//! - [`FormSource`] reads both kinds below one root
//! - [`XmlInstanceSource`] reads submitted XForm instances and flattens them
//! - [`collect_schemas`] / [`collect_instances`] drain a source, reporting
//!   unreadable items as diagnostics instead of failing the batch

pub mod discovery;
pub mod error;
pub mod forms;
pub mod instances;
pub mod source;
pub mod workbook;

pub use discovery::{list_form_dirs, list_workbooks, list_xml_files};
pub use error::{IngestError, Result};
pub use forms::{CsvFormSource, FormSource, FormSummary, list_forms, read_form_dir};
pub use instances::{XmlInstanceSource, flatten_xml, normalize_path, read_instance};
pub use source::{
    InstanceIter, InstanceSource, SchemaIter, SchemaSource, collect_instances, collect_schemas,
};
pub use workbook::{XlsxFormSource, read_workbook};
