use comfy_table::modifiers::{UTF8_ROUND_CORNERS, UTF8_SOLID_INNER_BORDERS};
use comfy_table::presets::{UTF8_FULL, UTF8_FULL_CONDENSED};
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};

use odk_cli::pipeline::{AggregateResult, DocumentSummary};
use odk_ingest::FormSummary;
use odk_model::{Diagnostic, Diagnostics, Severity};

pub const RUN_HEADER: &str = "Aggregation to Stata XML task was run. Output below.";
pub const NOT_RUN_HEADER: &str = "Aggregation to Stata XML task not run. Error(s) below.";

pub fn print_summary(result: &AggregateResult, dry_run: bool) {
    println!("{RUN_HEADER}");
    println!();
    if dry_run {
        println!("Output: {} (dry run, nothing written)", result.output_dir.display());
    } else {
        println!("Output: {}", result.output_dir.display());
    }

    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Form ID"),
        header_cell("Variables"),
        header_cell("Observations"),
        header_cell("Document"),
    ]);
    apply_summary_table_style(&mut table);
    align_column(&mut table, 1, CellAlignment::Right);
    align_column(&mut table, 2, CellAlignment::Right);

    let mut total_observations = 0usize;
    for summary in &result.documents {
        total_observations += summary.nobs;
        table.add_row(vec![
            Cell::new(&summary.form_id)
                .fg(Color::Blue)
                .add_attribute(Attribute::Bold),
            Cell::new(summary.nvar),
            Cell::new(summary.nobs),
            document_cell(summary),
        ]);
    }
    table.add_row(vec![
        Cell::new("TOTAL")
            .fg(Color::Cyan)
            .add_attribute(Attribute::Bold),
        dim_cell("-"),
        Cell::new(total_observations).add_attribute(Attribute::Bold),
        dim_cell(format!("{} document(s)", result.documents.len())),
    ]);
    println!("{table}");
    print_diagnostics(&result.diagnostics);
}

/// Prints the failure header followed by the error chain.
pub fn print_failure(error: &anyhow::Error) {
    eprintln!("{NOT_RUN_HEADER}");
    eprintln!();
    eprintln!("{error}");
    for cause in error.chain().skip(1) {
        eprintln!("caused by: {cause}");
    }
}

fn print_diagnostics(diagnostics: &Diagnostics) {
    if diagnostics.is_empty() {
        return;
    }
    let mut ordered: Vec<&Diagnostic> = diagnostics.iter().collect();
    // Warnings first; read order within a severity.
    ordered.sort_by(|a, b| b.severity.cmp(&a.severity));

    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Severity"),
        header_cell("Code"),
        header_cell("Message"),
    ]);
    apply_table_style(&mut table);
    align_column(&mut table, 0, CellAlignment::Center);
    for diagnostic in ordered {
        table.add_row(vec![
            severity_cell(diagnostic.severity),
            Cell::new(diagnostic.kind.code()),
            Cell::new(&diagnostic.message),
        ]);
    }
    println!();
    println!(
        "Diagnostics ({} warning(s)):",
        diagnostics.warning_count()
    );
    println!("{table}");
}

pub fn print_forms(forms: &[FormSummary], diagnostics: &Diagnostics) {
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Form ID"),
        header_cell("Version"),
        header_cell("Language"),
        header_cell("Fields"),
        header_cell("Source"),
    ]);
    apply_table_style(&mut table);
    align_column(&mut table, 3, CellAlignment::Right);
    for form in forms {
        table.add_row(vec![
            Cell::new(&form.form_id)
                .fg(Color::Blue)
                .add_attribute(Attribute::Bold),
            Cell::new(&form.version),
            optional_cell(form.default_language.as_deref()),
            Cell::new(form.field_count),
            match &form.source {
                Some(path) => Cell::new(path.display()),
                None => dim_cell("-"),
            },
        ]);
    }
    println!("{table}");
    print_diagnostics(diagnostics);
}

fn document_cell(summary: &DocumentSummary) -> Cell {
    match &summary.path {
        Some(path) => Cell::new(path.display()).fg(Color::Green),
        None => dim_cell("not written"),
    }
}

fn optional_cell(value: Option<&str>) -> Cell {
    match value {
        Some(value) => Cell::new(value),
        None => dim_cell("-"),
    }
}

fn apply_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_width(120);
}

fn apply_summary_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .apply_modifier(UTF8_SOLID_INNER_BORDERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_width(120);
}

fn align_column(table: &mut Table, index: usize, alignment: CellAlignment) {
    if let Some(column) = table.column_mut(index) {
        column.set_cell_alignment(alignment);
    }
}

fn severity_cell(severity: Severity) -> Cell {
    match severity {
        Severity::Warning => Cell::new(severity.label()).fg(Color::Yellow),
        Severity::Info => Cell::new(severity.label()).fg(Color::DarkGrey),
    }
}

fn header_cell(label: &str) -> Cell {
    Cell::new(label)
        .fg(Color::Cyan)
        .add_attribute(Attribute::Bold)
}

fn dim_cell<T: ToString>(value: T) -> Cell {
    Cell::new(value.to_string()).fg(Color::DarkGrey)
}
