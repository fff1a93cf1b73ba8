//! Section aggregation: the document walk that turns classified positions
//! into a cost tree.
//!
//! Per section the aggregator buffers works and materials. A work arriving
//! while materials are buffered flushes the buffers first; a flush attaches a
//! copy of the whole material batch to every buffered work. A run of works
//! followed by one batch of materials therefore leaves each of those works
//! owning the same materials.

use serde::Serialize;

use crate::classify::{Classifier, Vocabulary};
use crate::error::EngineError;
use crate::model::{
    CodeKind, CostTree, DocumentNode, MaterialItem, ParseWarning, PositionNode, RawStats,
    Section, WorkItem,
};
use crate::price::{resolve_material_price, resolve_quantity, resolve_work_price};

/// Output of one document walk.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Aggregation {
    pub tree: CostTree,
    pub stats: RawStats,
    pub warnings: Vec<ParseWarning>,
}

pub struct SectionAggregator {
    classifier: Classifier,
    sections: Vec<Section>,
    current: Option<Section>,
    pending_works: Vec<WorkItem>,
    pending_materials: Vec<MaterialItem>,
    stats: RawStats,
    warnings: Vec<ParseWarning>,
}

impl SectionAggregator {
    pub fn new(vocabulary: &Vocabulary) -> Self {
        Self {
            classifier: Classifier::new(vocabulary),
            sections: Vec::new(),
            current: None,
            pending_works: Vec::new(),
            pending_materials: Vec::new(),
            stats: RawStats::default(),
            warnings: Vec::new(),
        }
    }

    /// Feed the next node in document order.
    pub fn push(&mut self, node: &DocumentNode) {
        match node {
            DocumentNode::Chapter { caption } => self.open_section(caption),
            DocumentNode::Position(position) => self.push_position(position),
        }
    }

    /// Close the last section and return the tree.
    pub fn finish(mut self) -> Result<Aggregation, EngineError> {
        self.close_section();
        if self.stats.chapters == 0 {
            return Err(EngineError::NoSections);
        }

        let mut tree = CostTree {
            sections: self.sections,
            works_cost: 0.0,
            materials_cost: 0.0,
            total_cost: 0.0,
        };
        for section in &tree.sections {
            tree.works_cost += section.works_cost;
            tree.materials_cost += section.materials_cost;
            tree.total_cost += section.works_cost + section.materials_cost;
        }

        log::debug!(
            "aggregated {} section(s), {} work(s), total {:.2}",
            tree.sections.len(),
            tree.work_count(),
            tree.total_cost
        );

        Ok(Aggregation {
            tree,
            stats: self.stats,
            warnings: self.warnings,
        })
    }

    fn open_section(&mut self, caption: &str) {
        self.close_section();
        self.stats.chapters += 1;
        self.current = Some(Section::new(caption));
    }

    fn close_section(&mut self) {
        self.flush();
        if let Some(section) = self.current.take() {
            log::debug!(
                "section '{}': {} work(s), cost {:.2}",
                section.name,
                section.works.len(),
                section.section_cost
            );
            self.sections.push(section);
        }
    }

    fn push_position(&mut self, position: &PositionNode) {
        let kind = self.classifier.classify(&position.code);
        self.stats.record(kind);

        let units = position.units.trim();
        if !units.is_empty() {
            self.stats.units.insert(units.to_lowercase());
        }

        if !(kind.is_work() || kind.is_material()) {
            if kind == CodeKind::Unclassified {
                log::debug!("unclassified position '{}' ignored", position.code);
            }
            return;
        }

        let code = position.code.as_str();
        let quantity = resolve_quantity(code, position.quantity.as_deref(), &mut self.warnings);
        let unit_price = if kind.is_work() {
            resolve_work_price(code, position.price.as_ref(), &mut self.warnings)
        } else {
            resolve_material_price(code, position.price.as_ref(), &mut self.warnings)
        };
        self.stats.price_sum += unit_price;

        if self.current.is_none() {
            let warning = ParseWarning::OutsideSection {
                code: position.code.clone(),
            };
            log::warn!("{warning}");
            self.warnings.push(warning);
            return;
        }

        if kind.is_work() {
            if !self.pending_materials.is_empty() {
                self.flush();
            }
            self.pending_works.push(WorkItem {
                name: position.caption.clone(),
                code: position.code.clone(),
                kind,
                units: position.units.clone(),
                unit_price,
                quantity,
                total_cost: unit_price * quantity,
                materials: Vec::new(),
            });
        } else {
            self.pending_materials.push(MaterialItem {
                name: position.caption.clone(),
                code: position.code.clone(),
                kind,
                units: position.units.clone(),
                unit_price,
                quantity,
                total_cost: unit_price * quantity,
            });
        }
    }

    /// Attach the buffered material batch to every buffered work, move the
    /// works into the current section and clear both buffers.
    fn flush(&mut self) {
        let Some(section) = self.current.as_mut() else {
            return;
        };

        if self.pending_works.is_empty() && !self.pending_materials.is_empty() {
            let warning = ParseWarning::DroppedMaterials {
                section: section.name.clone(),
                count: self.pending_materials.len(),
            };
            log::warn!("{warning}");
            self.warnings.push(warning);
        }

        for mut work in self.pending_works.drain(..) {
            work.materials = self.pending_materials.clone();
            let materials_cost = work.materials_cost();
            section.works_cost += work.total_cost;
            section.materials_cost += materials_cost;
            section.section_cost += work.total_cost + materials_cost;
            section.works.push(work);
        }
        self.pending_materials.clear();
    }
}

/// Aggregate a complete node sequence in one call.
pub fn aggregate<'a, I>(nodes: I, vocabulary: &Vocabulary) -> Result<Aggregation, EngineError>
where
    I: IntoIterator<Item = &'a DocumentNode>,
{
    let mut aggregator = SectionAggregator::new(vocabulary);
    for node in nodes {
        aggregator.push(node);
    }
    aggregator.finish()
}
