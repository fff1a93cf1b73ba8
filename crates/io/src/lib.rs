// Estimate document I/O: XML reader, SQLite store, ingestion

pub mod error;
pub mod ingest;
pub mod store;
pub mod xml;

pub use error::{IngestError, ReadError, StoreError};
pub use ingest::{analyze, ingest, ingest_into, IngestOutcome, IngestRequest};
pub use store::{EstimateStore, PersistSummary};
pub use xml::{parse_document, read_document};
