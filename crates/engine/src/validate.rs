//! Self-check of a finished cost tree against the statistics gathered while
//! walking the document.
//!
//! Every check runs regardless of the outcome of the others. The report is a
//! diagnostic; nothing here fails an ingestion.

use serde::Serialize;

use crate::model::{CostTree, RawStats};

/// Allowed drift between the stored and recomputed totals.
pub const TOTAL_TOLERANCE: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckKind {
    /// Classified positions == work kinds + material kinds.
    PositionCount,
    /// Chapters seen == sections in the tree.
    SectionCount,
    /// Work nodes seen == works in the tree.
    WorkCount,
    /// Material nodes seen == materials in the tree.
    MaterialCount,
    /// Recomputed total == stored total.
    TotalCost,
    /// No work or material with a blank unit.
    NoEmptyUnits,
}

impl std::fmt::Display for CheckKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PositionCount => write!(f, "position_count"),
            Self::SectionCount => write!(f, "section_count"),
            Self::WorkCount => write!(f, "work_count"),
            Self::MaterialCount => write!(f, "material_count"),
            Self::TotalCost => write!(f, "total_cost"),
            Self::NoEmptyUnits => write!(f, "no_empty_units"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckResult {
    pub check: CheckKind,
    pub passed: bool,
    pub expected: String,
    pub actual: String,
}

impl CheckResult {
    fn count(check: CheckKind, expected: usize, actual: usize) -> Self {
        Self {
            check,
            passed: expected == actual,
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationReport {
    pub checks: Vec<CheckResult>,
    /// Distinct units seen during the walk (informational).
    pub unique_units: Vec<String>,
    /// Sum of unit prices gathered during the walk (informational).
    pub walk_price_sum: f64,
    pub recomputed_total: f64,
}

impl ValidationReport {
    pub fn all_passed(&self) -> bool {
        self.checks.iter().all(|c| c.passed)
    }

    pub fn get(&self, check: CheckKind) -> Option<&CheckResult> {
        self.checks.iter().find(|c| c.check == check)
    }

    pub fn failed(&self) -> impl Iterator<Item = &CheckResult> {
        self.checks.iter().filter(|c| !c.passed)
    }
}

/// Recompute counts and totals from `tree` and compare them with `stats`.
pub fn validate(tree: &CostTree, stats: &RawStats) -> ValidationReport {
    let mut checks = Vec::with_capacity(6);

    checks.push(CheckResult::count(
        CheckKind::PositionCount,
        stats.works() + stats.materials(),
        stats.classified_positions,
    ));
    checks.push(CheckResult::count(
        CheckKind::SectionCount,
        stats.chapters,
        tree.sections.len(),
    ));
    checks.push(CheckResult::count(CheckKind::WorkCount, stats.works(), tree.work_count()));
    checks.push(CheckResult::count(
        CheckKind::MaterialCount,
        stats.materials(),
        tree.material_count(),
    ));

    let recomputed_total = recompute_total(tree);
    checks.push(CheckResult {
        check: CheckKind::TotalCost,
        passed: (recomputed_total - tree.total_cost).abs() < TOTAL_TOLERANCE,
        expected: format!("{:.2}", tree.total_cost),
        actual: format!("{recomputed_total:.2}"),
    });

    let blank_units = count_blank_units(tree);
    checks.push(CheckResult {
        check: CheckKind::NoEmptyUnits,
        passed: blank_units == 0,
        expected: "0".into(),
        actual: blank_units.to_string(),
    });

    ValidationReport {
        checks,
        unique_units: stats.units.iter().cloned().collect(),
        walk_price_sum: stats.price_sum,
        recomputed_total,
    }
}

fn recompute_total(tree: &CostTree) -> f64 {
    tree.sections
        .iter()
        .flat_map(|s| &s.works)
        .map(|w| {
            let materials: f64 = w.materials.iter().map(|m| m.unit_price * m.quantity).sum();
            w.unit_price * w.quantity + materials
        })
        .sum()
}

fn count_blank_units(tree: &CostTree) -> usize {
    let works = tree.sections.iter().flat_map(|s| &s.works);
    works
        .map(|w| {
            let own = usize::from(w.units.trim().is_empty());
            own + w.materials.iter().filter(|m| m.units.trim().is_empty()).count()
        })
        .sum()
}
