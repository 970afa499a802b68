use std::fs;

use anyhow::{Context, Result};
use tracing::info;

use odk_cli::pipeline::{AggregateInputs, AggregateOptions, AggregateResult, aggregate};
use odk_cli::validate::{FORMS_PATH_NAME, validate_path};
use odk_ingest::{FormSource, FormSummary, list_forms};
use odk_model::Diagnostics;

use crate::cli::{FormsArgs, StataArgs};

pub fn run_stata(args: &StataArgs) -> Result<AggregateResult> {
    let inputs = AggregateInputs {
        forms: args.forms.clone(),
        instances: args.instances.clone(),
        output: args.output.clone(),
    };
    let options = AggregateOptions {
        data_label: args.data_label.clone(),
        dry_run: args.dry_run,
    };
    let result = aggregate(&inputs, &options)?;

    if let Some(path) = &args.report_json {
        let json = serde_json::to_string_pretty(&result.diagnostics)
            .context("serialize diagnostics")?;
        fs::write(path, json)
            .with_context(|| format!("write diagnostics report {}", path.display()))?;
        info!(path = %path.display(), "wrote diagnostics report");
    }
    Ok(result)
}

pub fn run_forms(args: &FormsArgs) -> Result<(Vec<FormSummary>, Diagnostics)> {
    let root = validate_path(FORMS_PATH_NAME, &args.forms)?;
    let mut diagnostics = Diagnostics::new();
    let forms = list_forms(&FormSource::new(&root), &mut diagnostics)
        .with_context(|| format!("list form definitions in {}", root.display()))?;
    Ok((forms, diagnostics))
}
