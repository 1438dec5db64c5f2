use lotociclo_db::rusqlite::{Connection, Transaction, TransactionBehavior, params};
use serde::{Deserialize, Serialize};

use crate::cycle::{Cycle, CycleStatus};
use crate::error::CycleError;

/// The whole persisted collection, as read at one revision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleSnapshot {
    pub revision: i64,
    pub cycles: Vec<Cycle>,
}

impl CycleSnapshot {
    pub fn active_cycles(&self) -> Vec<&Cycle> {
        self.cycles.iter().filter(|c| c.is_active()).collect()
    }
}

pub trait CycleStore {
    /// Tous les cycles, dans l'ordre de création. Vide si rien n'a été enregistré.
    fn load_all(&self) -> Result<CycleSnapshot, CycleError>;

    /// Upsert par id. Échoue avec `StoreConflict` si la révision en base
    /// n'est plus `expected_revision`. Retourne la nouvelle révision.
    fn save_all(&self, cycles: &[Cycle], expected_revision: i64) -> Result<i64, CycleError>;
}

/// Cycles in the `cycles` table, one JSON document per row.
#[derive(Debug)]
pub struct SqliteCycleStore<'c> {
    conn: &'c Connection,
}

impl<'c> SqliteCycleStore<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    /// Collection complète en JSON lisible.
    pub fn export_json(&self) -> Result<String, CycleError> {
        let snapshot = self.load_all()?;
        Ok(serde_json::to_string_pretty(&snapshot)?)
    }
}

fn read_revision(conn: &Connection) -> Result<i64, CycleError> {
    let revision = conn.query_row("SELECT revision FROM cycle_revision WHERE id = 1", [], |row| row.get(0))?;
    Ok(revision)
}

impl CycleStore for SqliteCycleStore<'_> {
    fn load_all(&self) -> Result<CycleSnapshot, CycleError> {
        // Lecture cohérente : révision et lignes dans la même transaction.
        let tx = self.conn.unchecked_transaction()?;
        let revision = read_revision(&tx)?;
        let bodies = {
            let mut stmt = tx.prepare("SELECT body FROM cycles ORDER BY seq ASC")?;
            let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
            rows.collect::<Result<Vec<_>, _>>()?
        };
        tx.commit()?;

        let cycles = bodies
            .iter()
            .map(|body| serde_json::from_str::<Cycle>(body))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(CycleSnapshot { revision, cycles })
    }

    fn save_all(&self, cycles: &[Cycle], expected_revision: i64) -> Result<i64, CycleError> {
        // IMMEDIATE : le verrou d'écriture est pris avant la lecture de la révision.
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;

        let found = read_revision(&tx)?;
        if found != expected_revision {
            return Err(CycleError::StoreConflict {
                expected: expected_revision,
                found,
            });
        }

        for cycle in cycles {
            let body = serde_json::to_string_pretty(cycle)?;
            tx.execute(
                "INSERT INTO cycles (id, status, body) VALUES (?1, ?2, ?3)
                 ON CONFLICT(id) DO UPDATE SET status = excluded.status, body = excluded.body",
                params![cycle.id(), cycle.status().as_str(), body],
            )?;
        }

        let active_ids = {
            let mut stmt = tx.prepare("SELECT id FROM cycles WHERE status = ?1 ORDER BY seq ASC")?;
            let rows = stmt.query_map([CycleStatus::Active.as_str()], |row| row.get::<_, String>(0))?;
            rows.collect::<Result<Vec<_>, _>>()?
        };
        if active_ids.len() > 1 {
            // Le drop de `tx` annule l'écriture.
            return Err(CycleError::MultipleActiveCycles { ids: active_ids });
        }

        let revision = found + 1;
        tx.execute("UPDATE cycle_revision SET revision = ?1 WHERE id = 1", [revision])?;
        tx.commit()?;

        log::debug!("Saved {} cycle(s), revision {}", cycles.len(), revision);
        Ok(revision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::test_support::draw_with;
    use chrono::Utc;
    use lotociclo_db::db::{migrate, open_db};

    fn memory_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        conn
    }

    fn closed_cycle() -> Cycle {
        let mut cycle = Cycle::open((1..=10).collect(), 100, Utc::now());
        cycle.absorb(&draw_with(101, &(1..=10).collect::<Vec<_>>(), &[]), Utc::now()).unwrap();
        assert!(!cycle.is_active());
        cycle
    }

    #[test]
    fn test_empty_store() {
        let conn = memory_db();
        let store = SqliteCycleStore::new(&conn);
        let snapshot = store.load_all().unwrap();
        assert_eq!(snapshot.revision, 0);
        assert!(snapshot.cycles.is_empty());
    }

    #[test]
    fn test_save_appends_then_replaces_in_place() {
        let conn = memory_db();
        let store = SqliteCycleStore::new(&conn);

        let first = closed_cycle();
        let mut second = Cycle::open((11..=20).collect(), 101, Utc::now());
        let rev = store.save_all(&[first.clone(), second.clone()], 0).unwrap();
        assert_eq!(rev, 1);

        second.absorb(&draw_with(102, &[11, 12], &[13, 14, 15, 16, 17, 18, 19, 20]), Utc::now()).unwrap();
        let rev = store.save_all(&[second.clone()], rev).unwrap();
        assert_eq!(rev, 2);

        let snapshot = store.load_all().unwrap();
        assert_eq!(snapshot.revision, 2);
        assert_eq!(snapshot.cycles, vec![first, second]);
    }

    #[test]
    fn test_save_load_roundtrip_is_noop() {
        let conn = memory_db();
        let store = SqliteCycleStore::new(&conn);
        store.save_all(&[closed_cycle(), Cycle::open((5..=14).collect(), 101, Utc::now())], 0).unwrap();

        let before = store.load_all().unwrap();
        store.save_all(&before.cycles, before.revision).unwrap();
        let after = store.load_all().unwrap();
        assert_eq!(after.cycles, before.cycles);
        assert_eq!(after.revision, before.revision + 1);
    }

    #[test]
    fn test_stale_revision_is_conflict() {
        let conn = memory_db();
        let store = SqliteCycleStore::new(&conn);
        store.save_all(&[closed_cycle()], 0).unwrap();

        let err = store.save_all(&[Cycle::open((1..=10).collect(), 101, Utc::now())], 0).unwrap_err();
        assert!(matches!(err, CycleError::StoreConflict { expected: 0, found: 1 }));
        assert_eq!(store.load_all().unwrap().cycles.len(), 1);
    }

    #[test]
    fn test_second_active_cycle_is_rejected() {
        let conn = memory_db();
        let store = SqliteCycleStore::new(&conn);
        let rev = store.save_all(&[Cycle::open((1..=10).collect(), 100, Utc::now())], 0).unwrap();

        let err = store.save_all(&[Cycle::open((11..=20).collect(), 100, Utc::now())], rev).unwrap_err();
        assert!(matches!(err, CycleError::MultipleActiveCycles { ref ids } if ids.len() == 2));

        // Rien n'a été écrit.
        let snapshot = store.load_all().unwrap();
        assert_eq!(snapshot.revision, rev);
        assert_eq!(snapshot.cycles.len(), 1);
    }

    #[test]
    fn test_conflict_across_connections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lotociclo.db");
        let conn_a = open_db(&path).unwrap();
        migrate(&conn_a).unwrap();
        let conn_b = open_db(&path).unwrap();

        let store_a = SqliteCycleStore::new(&conn_a);
        let store_b = SqliteCycleStore::new(&conn_b);

        let seen_a = store_a.load_all().unwrap();
        let seen_b = store_b.load_all().unwrap();

        store_a.save_all(&[Cycle::open((1..=10).collect(), 100, Utc::now())], seen_a.revision).unwrap();
        let err = store_b
            .save_all(&[Cycle::open((11..=20).collect(), 100, Utc::now())], seen_b.revision)
            .unwrap_err();
        assert_eq!(err.label(), "StoreConflict");
        assert_eq!(store_b.load_all().unwrap().cycles.len(), 1);
    }

    #[test]
    fn test_export_json_is_readable() {
        let conn = memory_db();
        let store = SqliteCycleStore::new(&conn);
        store.save_all(&[closed_cycle()], 0).unwrap();
        let json = store.export_json().unwrap();
        let parsed: CycleSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.revision, 1);
        assert!(json.contains("\"target_numbers\""));
        assert!(json.contains("\"closed\""));
    }
}
