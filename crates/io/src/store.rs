// Estimate persistence using SQLite

use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension, Transaction};
use serde::Serialize;

use smeta_engine::CostTree;

use crate::error::StoreError;

const SCHEMA: &str = r#"
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS local_estimates (
    id INTEGER PRIMARY KEY,
    name_local_estimate TEXT NOT NULL,
    local_estimates_price REAL          -- NULL until an estimate file is ingested
);

CREATE TABLE IF NOT EXISTS sections (
    id INTEGER PRIMARY KEY,
    estimate_id INTEGER NOT NULL REFERENCES local_estimates(id) ON DELETE CASCADE,
    name TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS work (
    id INTEGER PRIMARY KEY,
    local_section_id INTEGER NOT NULL REFERENCES sections(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    price REAL NOT NULL,                -- unit price
    units TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS materials (
    id INTEGER PRIMARY KEY,
    work_id INTEGER NOT NULL REFERENCES work(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    price REAL NOT NULL,                -- unit price
    units TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_sections_estimate ON sections(estimate_id);
CREATE INDEX IF NOT EXISTS idx_work_section ON work(local_section_id);
CREATE INDEX IF NOT EXISTS idx_materials_work ON materials(work_id);
"#;

/// Row counts written by one [`EstimateStore::persist`] call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PersistSummary {
    pub record_id: i64,
    pub sections: usize,
    pub works: usize,
    pub materials: usize,
    pub total_cost: f64,
}

#[derive(Debug)]
pub struct EstimateStore {
    conn: Connection,
}

impl EstimateStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// Create an owning estimate record with no price yet.
    pub fn register_estimate(&self, name: &str) -> Result<i64, StoreError> {
        self.conn.execute(
            "INSERT INTO local_estimates (name_local_estimate) VALUES (?1)",
            params![name],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Stored total price of a record (`None` while not yet ingested).
    pub fn estimate_price(&self, record_id: i64) -> Result<Option<f64>, StoreError> {
        self.conn
            .query_row(
                "SELECT local_estimates_price FROM local_estimates WHERE id = ?1",
                params![record_id],
                |row| row.get::<_, Option<f64>>(0),
            )
            .optional()?
            .ok_or(StoreError::UnknownRecord(record_id))
    }

    /// Write the tree under `record_id` and set the record's total price.
    ///
    /// All-or-nothing: rows from an earlier ingestion of the same record are
    /// replaced inside the same transaction, and any failure rolls back every
    /// statement.
    pub fn persist(&mut self, tree: &CostTree, record_id: i64) -> Result<PersistSummary, StoreError> {
        let tx = self.conn.transaction()?;
        let summary = write_tree(&tx, tree, record_id)?;
        tx.commit()?;
        log::info!(
            "persisted record {record_id}: {} section(s), {} work(s), {} material(s), total {:.2}",
            summary.sections,
            summary.works,
            summary.materials,
            summary.total_cost
        );
        Ok(summary)
    }

    /// (sections, works, materials) rows stored for a record.
    pub fn row_counts(&self, record_id: i64) -> Result<(usize, usize, usize), StoreError> {
        let sections: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sections WHERE estimate_id = ?1",
            params![record_id],
            |row| row.get(0),
        )?;
        let works: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM work w JOIN sections s ON w.local_section_id = s.id
             WHERE s.estimate_id = ?1",
            params![record_id],
            |row| row.get(0),
        )?;
        let materials: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM materials m
             JOIN work w ON m.work_id = w.id
             JOIN sections s ON w.local_section_id = s.id
             WHERE s.estimate_id = ?1",
            params![record_id],
            |row| row.get(0),
        )?;
        Ok((sections as usize, works as usize, materials as usize))
    }

    #[cfg(test)]
    pub(crate) fn connection(&self) -> &Connection {
        &self.conn
    }
}

fn write_tree(tx: &Transaction<'_>, tree: &CostTree, record_id: i64) -> Result<PersistSummary, StoreError> {
    let exists = tx
        .query_row(
            "SELECT 1 FROM local_estimates WHERE id = ?1",
            params![record_id],
            |_| Ok(()),
        )
        .optional()?;
    if exists.is_none() {
        return Err(StoreError::UnknownRecord(record_id));
    }

    tx.execute("DELETE FROM sections WHERE estimate_id = ?1", params![record_id])?;

    let mut summary = PersistSummary {
        record_id,
        sections: 0,
        works: 0,
        materials: 0,
        total_cost: tree.total_cost,
    };

    {
        let mut insert_section =
            tx.prepare("INSERT INTO sections (estimate_id, name) VALUES (?1, ?2)")?;
        let mut insert_work = tx.prepare(
            "INSERT INTO work (local_section_id, name, price, units) VALUES (?1, ?2, ?3, ?4)",
        )?;
        let mut insert_material = tx.prepare(
            "INSERT INTO materials (work_id, name, price, units) VALUES (?1, ?2, ?3, ?4)",
        )?;

        for section in &tree.sections {
            let section_id = insert_section.insert(params![record_id, section.name])?;
            summary.sections += 1;

            for work in &section.works {
                let work_id =
                    insert_work.insert(params![section_id, work.name, work.unit_price, work.units])?;
                summary.works += 1;

                for material in &work.materials {
                    insert_material.execute(params![
                        work_id,
                        material.name,
                        material.unit_price,
                        material.units
                    ])?;
                    summary.materials += 1;
                }
            }
        }
    }

    let updated = tx.execute(
        "UPDATE local_estimates SET local_estimates_price = ?1 WHERE id = ?2",
        params![tree.total_cost, record_id],
    )?;
    if updated != 1 {
        return Err(StoreError::UnknownRecord(record_id));
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use smeta_engine::{CodeKind, MaterialItem, Section, WorkItem};

    fn material(name: &str, price: f64) -> MaterialItem {
        MaterialItem {
            name: name.into(),
            code: "ФССЦ-1".into(),
            kind: CodeKind::MaterialA,
            units: "т".into(),
            unit_price: price,
            quantity: 1.0,
            total_cost: price,
        }
    }

    fn tree() -> CostTree {
        let work = |name: &str, price: f64, materials: Vec<MaterialItem>| WorkItem {
            name: name.into(),
            code: "ФЕР01".into(),
            kind: CodeKind::WorkA,
            units: "м3".into(),
            unit_price: price,
            quantity: 1.0,
            total_cost: price,
            materials,
        };
        let mut a = Section::new("A");
        a.works.push(work("w1", 10.0, vec![material("m1", 2.0), material("m2", 3.0)]));
        a.works.push(work("w2", 4.0, vec![]));
        let b = Section::new("B");
        CostTree {
            sections: vec![a, b],
            works_cost: 14.0,
            materials_cost: 5.0,
            total_cost: 19.0,
        }
    }

    #[test]
    fn persist_writes_rows_and_total() {
        let mut store = EstimateStore::open_in_memory().unwrap();
        let id = store.register_estimate("02-01-01 КР").unwrap();
        assert_eq!(store.estimate_price(id).unwrap(), None);

        let summary = store.persist(&tree(), id).unwrap();
        assert_eq!((summary.sections, summary.works, summary.materials), (2, 2, 2));
        assert_eq!(store.row_counts(id).unwrap(), (2, 2, 2));
        assert_eq!(store.estimate_price(id).unwrap(), Some(19.0));

        let (name, price, units): (String, f64, String) = store
            .connection()
            .query_row(
                "SELECT name, price, units FROM materials ORDER BY id LIMIT 1",
                [],
                |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
            )
            .unwrap();
        assert_eq!((name.as_str(), price, units.as_str()), ("m1", 2.0, "т"));
    }

    #[test]
    fn unknown_record_leaves_no_rows() {
        let mut store = EstimateStore::open_in_memory().unwrap();
        let err = store.persist(&tree(), 42).unwrap_err();
        assert!(matches!(err, StoreError::UnknownRecord(42)));
        let sections: i64 = store
            .connection()
            .query_row("SELECT COUNT(*) FROM sections", [], |r| r.get(0))
            .unwrap();
        assert_eq!(sections, 0);
    }

    #[test]
    fn reingest_replaces_previous_rows() {
        let mut store = EstimateStore::open_in_memory().unwrap();
        let id = store.register_estimate("x").unwrap();
        store.persist(&tree(), id).unwrap();
        store.persist(&tree(), id).unwrap();
        assert_eq!(store.row_counts(id).unwrap(), (2, 2, 2));
    }

    #[test]
    fn failed_insert_rolls_back_everything() {
        let mut store = EstimateStore::open_in_memory().unwrap();
        let id = store.register_estimate("x").unwrap();
        store.persist(&tree(), id).unwrap();

        // Make material inserts fail mid-transaction.
        store
            .connection()
            .execute_batch(
                "CREATE TRIGGER reject_materials BEFORE INSERT ON materials
                 BEGIN SELECT RAISE(ABORT, 'rejected'); END;",
            )
            .unwrap();

        let mut changed = tree();
        changed.total_cost = 99.0;
        let err = store.persist(&changed, id).unwrap_err();
        assert!(matches!(err, StoreError::Sql(_)));

        // The earlier ingestion is intact: nothing deleted, price unchanged.
        assert_eq!(store.row_counts(id).unwrap(), (2, 2, 2));
        assert_eq!(store.estimate_price(id).unwrap(), Some(19.0));
    }
}
