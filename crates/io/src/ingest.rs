//! One-call ingestion: read, aggregate, persist.
//!
//! The database connection lives only for the duration of [`ingest`] and is
//! closed on every exit path when the store drops.

use std::path::{Path, PathBuf};

use serde::Serialize;

use smeta_engine::{aggregate, Aggregation, CostTree, ParseWarning, RawStats, Vocabulary};

use crate::error::IngestError;
use crate::store::{EstimateStore, PersistSummary};
use crate::xml::read_document;

/// Everything one ingestion needs.
#[derive(Debug, Clone)]
pub struct IngestRequest {
    pub document: PathBuf,
    pub database: PathBuf,
    pub record_id: i64,
    pub vocabulary: Vocabulary,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestOutcome {
    pub total_cost: f64,
    pub tree: CostTree,
    pub stats: RawStats,
    pub warnings: Vec<ParseWarning>,
    pub persisted: PersistSummary,
}

/// Read and aggregate a document without touching a database.
pub fn analyze(document: &Path, vocabulary: &Vocabulary) -> Result<Aggregation, IngestError> {
    let nodes = read_document(document)?;
    let aggregation = aggregate(&nodes, vocabulary)?;
    for warning in &aggregation.warnings {
        log::debug!("{}: {warning}", document.display());
    }
    Ok(aggregation)
}

/// Ingest into an already open store.
pub fn ingest_into(
    store: &mut EstimateStore,
    document: &Path,
    record_id: i64,
    vocabulary: &Vocabulary,
) -> Result<IngestOutcome, IngestError> {
    let Aggregation { tree, stats, warnings } = analyze(document, vocabulary)?;
    let persisted = store.persist(&tree, record_id)?;
    Ok(IngestOutcome {
        total_cost: tree.total_cost,
        tree,
        stats,
        warnings,
        persisted,
    })
}

/// Ingest a document into the database at `request.database`.
///
/// The document is parsed before the database is opened, so a malformed file
/// never creates or touches the database.
pub fn ingest(request: &IngestRequest) -> Result<IngestOutcome, IngestError> {
    log::info!(
        "ingesting {} into record {}",
        request.document.display(),
        request.record_id
    );
    let Aggregation { tree, stats, warnings } = analyze(&request.document, &request.vocabulary)?;

    let mut store = EstimateStore::open(&request.database)?;
    let persisted = store.persist(&tree, request.record_id)?;

    log::info!(
        "{}: total {:.2}, {} warning(s)",
        request.document.display(),
        tree.total_cost,
        warnings.len()
    );
    Ok(IngestOutcome {
        total_cost: tree.total_cost,
        tree,
        stats,
        warnings,
        persisted,
    })
}
