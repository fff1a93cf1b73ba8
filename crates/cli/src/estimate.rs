//! `smeta ingest`, `smeta check`, `smeta register`: estimate commands.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use serde::Serialize;

use smeta_config::Settings;
use smeta_engine::{validate, CostTree, ParseWarning, RawStats, ValidationReport};
use smeta_io::{
    analyze, ingest, EstimateStore, IngestError, IngestRequest, PersistSummary, StoreError,
};

use crate::exit_codes::{ingest_exit_code, store_exit_code, EXIT_ERROR};
use crate::CliError;

/// Shape of `--json` output for `ingest` and `check`.
#[derive(Serialize)]
struct EstimateJson<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    record_id: Option<i64>,
    total_cost: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    persisted: Option<&'a PersistSummary>,
    tree: &'a CostTree,
    stats: &'a RawStats,
    warnings: &'a [ParseWarning],
    validation: Option<&'a ValidationReport>,
}

fn print_json(value: &EstimateJson<'_>) -> Result<(), CliError> {
    let json = serde_json::to_string_pretty(value).map_err(|e| CliError {
        code: EXIT_ERROR,
        message: format!("JSON serialization error: {e}"),
        hint: None,
    })?;
    println!("{json}");
    Ok(())
}

fn resolve_db(db: Option<PathBuf>, settings: &Settings) -> PathBuf {
    db.unwrap_or_else(|| settings.database_path())
}

pub fn cmd_ingest(
    file: PathBuf,
    record: i64,
    db: Option<PathBuf>,
    json: bool,
    no_validate: bool,
    settings: &Settings,
) -> Result<(), CliError> {
    let request = IngestRequest {
        document: file,
        database: resolve_db(db, settings),
        record_id: record,
        vocabulary: settings.vocabulary.clone(),
    };

    let outcome = ingest(&request).map_err(|e| {
        let err = CliError { code: ingest_exit_code(&e), message: e.to_string(), hint: None };
        if matches!(e, IngestError::Store(StoreError::UnknownRecord(_))) {
            err.with_hint("create the record first: smeta register <NAME>")
        } else {
            err
        }
    })?;

    let report = (!no_validate).then(|| validate(&outcome.tree, &outcome.stats));

    if json {
        return print_json(&EstimateJson {
            record_id: Some(record),
            total_cost: outcome.total_cost,
            persisted: Some(&outcome.persisted),
            tree: &outcome.tree,
            stats: &outcome.stats,
            warnings: &outcome.warnings,
            validation: report.as_ref(),
        });
    }

    print!("{}", render_tree(&outcome.tree));
    print!("{}", render_warnings(&outcome.warnings));
    if let Some(report) = &report {
        print!("{}", render_report(report));
    }
    eprintln!(
        "wrote record {} to {}: {} section(s), {} work(s), {} material(s)",
        record,
        request.database.display(),
        outcome.persisted.sections,
        outcome.persisted.works,
        outcome.persisted.materials
    );
    Ok(())
}

pub fn cmd_check(file: PathBuf, json: bool, settings: &Settings) -> Result<(), CliError> {
    let aggregation = analyze(&file, &settings.vocabulary).map_err(|e| CliError {
        code: ingest_exit_code(&e),
        message: e.to_string(),
        hint: None,
    })?;
    let report = validate(&aggregation.tree, &aggregation.stats);

    if json {
        return print_json(&EstimateJson {
            record_id: None,
            total_cost: aggregation.tree.total_cost,
            persisted: None,
            tree: &aggregation.tree,
            stats: &aggregation.stats,
            warnings: &aggregation.warnings,
            validation: Some(&report),
        });
    }

    print!("{}", render_tree(&aggregation.tree));
    print!("{}", render_warnings(&aggregation.warnings));
    print!("{}", render_report(&report));
    Ok(())
}

pub fn cmd_register(name: String, db: Option<PathBuf>, settings: &Settings) -> Result<(), CliError> {
    let path = resolve_db(db, settings);
    let id = register(&name, &path).map_err(|e| CliError {
        code: store_exit_code(&e),
        message: format!("{}: {e}", path.display()),
        hint: None,
    })?;
    println!("{id}");
    Ok(())
}

fn register(name: &str, path: &Path) -> Result<i64, StoreError> {
    let store = EstimateStore::open(path)?;
    let id = store.register_estimate(name)?;
    log::info!("registered estimate record {id} ('{name}')");
    Ok(id)
}

// ---------------------------------------------------------------------------
// Human output
// ---------------------------------------------------------------------------

pub fn render_tree(tree: &CostTree) -> String {
    let mut out = String::new();
    for (i, section) in tree.sections.iter().enumerate() {
        let _ = writeln!(
            out,
            "{}. {}  [works {:.2}, materials {:.2}, total {:.2}]",
            i + 1,
            section.name,
            section.works_cost,
            section.materials_cost,
            section.section_cost
        );
        for work in &section.works {
            let _ = writeln!(
                out,
                "   {} {}  {} x {:.2} {} = {:.2}",
                work.code, work.name, work.quantity, work.unit_price, work.units, work.total_cost
            );
            for material in &work.materials {
                let _ = writeln!(
                    out,
                    "      {} {}  {} x {:.2} {} = {:.2}",
                    material.code,
                    material.name,
                    material.quantity,
                    material.unit_price,
                    material.units,
                    material.total_cost
                );
            }
        }
    }
    let _ = writeln!(
        out,
        "total: {:.2} (works {:.2}, materials {:.2})",
        tree.total_cost, tree.works_cost, tree.materials_cost
    );
    out
}

pub fn render_warnings(warnings: &[ParseWarning]) -> String {
    let mut out = String::new();
    for warning in warnings {
        let _ = writeln!(out, "warning: {warning}");
    }
    out
}

pub fn render_report(report: &ValidationReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "validation:");
    for check in &report.checks {
        let status = if check.passed { "ok  " } else { "FAIL" };
        let _ = writeln!(
            out,
            "  {status} {:<16} expected {}, got {}",
            check.check.to_string(),
            check.expected,
            check.actual
        );
    }
    let _ = writeln!(out, "  units: {}", report.unique_units.join(", "));
    let _ = writeln!(out, "  price sum: {:.2}", report.walk_price_sum);
    out
}
