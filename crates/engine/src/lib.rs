//! `smeta-engine`: estimate document cost engine.
//!
//! Pure engine crate: receives the document as an ordered node stream,
//! returns the aggregated cost tree, walk statistics and a validation report.
//! No file or database IO.

pub mod aggregate;
pub mod classify;
pub mod error;
pub mod model;
pub mod price;
pub mod validate;

pub use aggregate::{aggregate, Aggregation, SectionAggregator};
pub use classify::{classify, Classifier, Vocabulary};
pub use error::EngineError;
pub use model::{
    CodeKind, CostTree, DocumentNode, MaterialItem, ParseWarning, PositionNode, PriceBlock,
    RawStats, Section, WorkItem,
};
pub use validate::{validate, CheckKind, CheckResult, ValidationReport};
