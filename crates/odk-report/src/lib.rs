//! Output documents for ODK aggregation.
//!
//! [`compose`] assembles a [`StataDocument`] per form identifier,
//! [`render_stata_xml`] serializes it in the Stata XML format and
//! [`write_stata_documents`] persists a batch as `<form_id>.xml` files.

pub mod document;
pub mod error;
pub mod stata_xml;

pub use document::{DEFAULT_DATA_LABEL, Header, StataDocument, compose};
pub use error::{ReportError, Result};
pub use stata_xml::{document_file_name, render_stata_xml, write_stata_documents};
