//! End-to-end aggregation: validate inputs, read sources, reconcile, compose
//! and write one Stata XML document per form identifier.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{Local, NaiveDateTime};
use odk_core::{FormOutput, process_forms};
use odk_ingest::{FormSource, XmlInstanceSource, collect_instances, collect_schemas};
use odk_model::Diagnostics;
use odk_report::{DEFAULT_DATA_LABEL, StataDocument, compose, write_stata_documents};
use serde::Serialize;
use tracing::{info, info_span, trace};

use crate::logging::redact_value;
use crate::validate::{FORMS_PATH_NAME, INSTANCES_PATH_NAME, OUTPUT_PATH_NAME, validate_path};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateOptions {
    /// Free text written to each document header.
    pub data_label: String,
    /// Compose every document without writing any.
    pub dry_run: bool,
}

impl Default for AggregateOptions {
    fn default() -> Self {
        Self {
            data_label: DEFAULT_DATA_LABEL.to_string(),
            dry_run: false,
        }
    }
}

/// Raw, uncleaned input paths as the user entered them.
#[derive(Debug, Clone, Default)]
pub struct AggregateInputs {
    pub forms: String,
    pub instances: String,
    pub output: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentSummary {
    pub form_id: String,
    pub nvar: usize,
    pub nobs: usize,
    /// Unset on a dry run.
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AggregateResult {
    pub output_dir: PathBuf,
    pub documents: Vec<DocumentSummary>,
    pub diagnostics: Diagnostics,
}

impl AggregateResult {
    pub fn warning_count(&self) -> usize {
        self.diagnostics.warning_count()
    }
}

/// Runs the aggregation, stamping documents with the local time.
///
/// # Errors
///
/// Fails on an invalid input path, an unreadable source root or a document
/// that cannot be written. Unreadable individual files are diagnostics.
pub fn aggregate(inputs: &AggregateInputs, options: &AggregateOptions) -> Result<AggregateResult> {
    aggregate_at(inputs, options, Local::now().naive_local())
}

/// [`aggregate`] with an explicit header time stamp.
pub fn aggregate_at(
    inputs: &AggregateInputs,
    options: &AggregateOptions,
    generated_at: NaiveDateTime,
) -> Result<AggregateResult> {
    let forms_dir = validate_path(FORMS_PATH_NAME, &inputs.forms)?;
    let instances_dir = validate_path(INSTANCES_PATH_NAME, &inputs.instances)?;
    let output_dir = validate_path(OUTPUT_PATH_NAME, &inputs.output)?;

    let _span = info_span!("aggregate", output = %output_dir.display()).entered();
    let mut diagnostics = Diagnostics::new();

    let schemas = collect_schemas(&FormSource::new(&forms_dir), &mut diagnostics)
        .with_context(|| format!("read form definitions from {}", forms_dir.display()))?;
    let instances = collect_instances(&XmlInstanceSource::new(&instances_dir), &mut diagnostics)
        .with_context(|| format!("read instances from {}", instances_dir.display()))?;
    info!(
        schemas = schemas.len(),
        instances = instances.len(),
        "sources read"
    );

    let outputs = process_forms(schemas, instances, &mut diagnostics);
    let documents = compose_documents(&outputs, &options.data_label, generated_at);

    let paths = if options.dry_run {
        info!(documents = documents.len(), "dry run, nothing written");
        vec![None; documents.len()]
    } else {
        write_stata_documents(&output_dir, &documents)
            .context("write Stata XML documents")?
            .into_iter()
            .map(Some)
            .collect()
    };

    let documents = documents
        .iter()
        .zip(paths)
        .map(|(document, path)| DocumentSummary {
            form_id: document.form_id.clone(),
            nvar: document.header.nvar,
            nobs: document.header.nobs,
            path,
        })
        .collect();

    Ok(AggregateResult {
        output_dir,
        documents,
        diagnostics,
    })
}

fn compose_documents(
    outputs: &[FormOutput],
    data_label: &str,
    generated_at: NaiveDateTime,
) -> Vec<StataDocument> {
    let _span = info_span!("compose", forms = outputs.len()).entered();
    outputs
        .iter()
        .map(|output| {
            for observation in &output.observations {
                for (name, value) in &observation.values {
                    trace!(
                        form_id = %output.form_id,
                        variable = %name,
                        value = redact_value(value.as_deref().unwrap_or_default()),
                        "observation value"
                    );
                }
            }
            compose(
                &output.metadata,
                &output.observations,
                data_label,
                generated_at,
            )
        })
        .collect()
}
