use std::collections::BTreeSet;

use serde::Serialize;

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// Raw price-component block of a position. Values are kept as written in the
/// document; numeric resolution happens in [`crate::price`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PriceBlock {
    pub pz: Option<String>,
    pub oz: Option<String>,
    pub em: Option<String>,
    pub zm: Option<String>,
    pub mt: Option<String>,
}

impl PriceBlock {
    /// Field names in summation order, paired with their raw values.
    pub fn fields(&self) -> [(&'static str, Option<&str>); 5] {
        [
            ("PZ", self.pz.as_deref()),
            ("OZ", self.oz.as_deref()),
            ("EM", self.em.as_deref()),
            ("ZM", self.zm.as_deref()),
            ("MT", self.mt.as_deref()),
        ]
    }

    /// Set a field by its attribute name. Unknown names are ignored.
    pub fn set(&mut self, name: &str, value: String) {
        match name {
            "PZ" => self.pz = Some(value),
            "OZ" => self.oz = Some(value),
            "EM" => self.em = Some(value),
            "ZM" => self.zm = Some(value),
            "MT" => self.mt = Some(value),
            _ => {}
        }
    }
}

/// A `Position` element as read from the document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PositionNode {
    pub caption: String,
    pub code: String,
    pub units: String,
    pub price: Option<PriceBlock>,
    /// Raw `Result` attribute of the quantity block, if any.
    pub quantity: Option<String>,
}

/// One node of the document walk, in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentNode {
    /// Section boundary (`Chapter` with a caption).
    Chapter { caption: String },
    Position(PositionNode),
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CodeKind {
    /// Federal unit rate (`ФЕР`).
    WorkA,
    /// Territorial unit rate (`ТЕР`).
    WorkB,
    /// Federal material price book (`ФССЦ`, `ФССЦпг`).
    MaterialA,
    /// Territorial material price book (`ТССЦ`).
    MaterialB,
    /// Machinery rate (`ФСЭМ`): counted, never priced.
    Excluded,
    Unclassified,
}

impl CodeKind {
    pub fn is_work(self) -> bool {
        matches!(self, Self::WorkA | Self::WorkB)
    }

    pub fn is_material(self) -> bool {
        matches!(self, Self::MaterialA | Self::MaterialB)
    }
}

impl std::fmt::Display for CodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::WorkA => write!(f, "work_a"),
            Self::WorkB => write!(f, "work_b"),
            Self::MaterialA => write!(f, "material_a"),
            Self::MaterialB => write!(f, "material_b"),
            Self::Excluded => write!(f, "excluded"),
            Self::Unclassified => write!(f, "unclassified"),
        }
    }
}

// ---------------------------------------------------------------------------
// Cost tree
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MaterialItem {
    pub name: String,
    pub code: String,
    pub kind: CodeKind,
    pub units: String,
    pub unit_price: f64,
    pub quantity: f64,
    pub total_cost: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkItem {
    pub name: String,
    pub code: String,
    pub kind: CodeKind,
    pub units: String,
    pub unit_price: f64,
    pub quantity: f64,
    pub total_cost: f64,
    pub materials: Vec<MaterialItem>,
}

impl WorkItem {
    /// Sum of the attached materials' total cost.
    pub fn materials_cost(&self) -> f64 {
        self.materials.iter().map(|m| m.total_cost).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Section {
    pub name: String,
    pub works: Vec<WorkItem>,
    pub works_cost: f64,
    pub materials_cost: f64,
    pub section_cost: f64,
}

impl Section {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            works: Vec::new(),
            works_cost: 0.0,
            materials_cost: 0.0,
            section_cost: 0.0,
        }
    }
}

/// Fully materialized cost structure of one document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CostTree {
    pub sections: Vec<Section>,
    pub works_cost: f64,
    pub materials_cost: f64,
    pub total_cost: f64,
}

impl CostTree {
    pub fn work_count(&self) -> usize {
        self.sections.iter().map(|s| s.works.len()).sum()
    }

    pub fn material_count(&self) -> usize {
        self.sections
            .iter()
            .flat_map(|s| &s.works)
            .map(|w| w.materials.len())
            .sum()
    }
}

// ---------------------------------------------------------------------------
// Walk statistics + warnings
// ---------------------------------------------------------------------------

/// Figures gathered during the walk, independent of the tree built from it.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RawStats {
    pub work_a: usize,
    pub work_b: usize,
    pub material_a: usize,
    pub material_b: usize,
    pub excluded: usize,
    pub unclassified: usize,
    /// Positions classified as work or material.
    pub classified_positions: usize,
    pub chapters: usize,
    /// Sum of unit prices of every work/material node seen.
    pub price_sum: f64,
    /// Distinct unit strings, trimmed and lowercased.
    pub units: BTreeSet<String>,
}

impl RawStats {
    pub fn record(&mut self, kind: CodeKind) {
        match kind {
            CodeKind::WorkA => self.work_a += 1,
            CodeKind::WorkB => self.work_b += 1,
            CodeKind::MaterialA => self.material_a += 1,
            CodeKind::MaterialB => self.material_b += 1,
            CodeKind::Excluded => self.excluded += 1,
            CodeKind::Unclassified => self.unclassified += 1,
        }
        if kind.is_work() || kind.is_material() {
            self.classified_positions += 1;
        }
    }

    pub fn works(&self) -> usize {
        self.work_a + self.work_b
    }

    pub fn materials(&self) -> usize {
        self.material_a + self.material_b
    }
}

/// A degradable problem found while reading a position. Never fatal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ParseWarning {
    /// A price field held text that is not a number; it counted as zero.
    BadPriceField { code: String, field: String, value: String },
    /// The quantity was not a number; it counted as one.
    BadQuantity { code: String, value: String },
    /// A position appeared before any section and was not attached.
    OutsideSection { code: String },
    /// Materials were buffered with no work to own them and were dropped.
    DroppedMaterials { section: String, count: usize },
}

impl std::fmt::Display for ParseWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BadPriceField { code, field, value } => {
                write!(f, "position '{code}': {field}='{value}' is not a number, using 0")
            }
            Self::BadQuantity { code, value } => {
                write!(f, "position '{code}': quantity '{value}' is not a number, using 1")
            }
            Self::OutsideSection { code } => {
                write!(f, "position '{code}' appears before any chapter, skipped")
            }
            Self::DroppedMaterials { section, count } => {
                write!(f, "section '{section}': {count} material(s) with no preceding work dropped")
            }
        }
    }
}
