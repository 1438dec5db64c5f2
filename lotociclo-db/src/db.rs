use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension};
use std::path::Path;
use std::time::Duration;

use crate::models::{DrawRecord, parse_numbers};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS draws (
    draw_number   INTEGER PRIMARY KEY,
    date          TEXT NOT NULL,
    numbers       TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS cycles (
    seq           INTEGER PRIMARY KEY AUTOINCREMENT,
    id            TEXT NOT NULL UNIQUE,
    status        TEXT NOT NULL,
    body          TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS cycle_revision (
    id            INTEGER PRIMARY KEY CHECK (id = 1),
    revision      INTEGER NOT NULL
);

INSERT OR IGNORE INTO cycle_revision (id, revision) VALUES (1, 0);
";

/// Attente maximale sur un verrou SQLite tenu par un autre processus.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub fn db_path() -> std::path::PathBuf {
    let mut path = std::env::current_dir().unwrap_or_default();
    path.push("data");
    path.push("lotociclo.db");
    path
}

pub fn open_db(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Impossible de créer le répertoire {:?}", parent))?;
    }
    let conn = Connection::open(path)
        .with_context(|| format!("Impossible d'ouvrir la base {:?}", path))?;
    conn.busy_timeout(BUSY_TIMEOUT)
        .context("Impossible de configurer le délai de verrouillage")?;
    Ok(conn)
}

pub fn migrate(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)
        .context("Échec de la migration")?;
    Ok(())
}

pub fn insert_draw(conn: &Connection, draw: &DrawRecord) -> Result<bool> {
    let changed = conn.execute(
        "INSERT OR IGNORE INTO draws (draw_number, date, numbers) VALUES (?1, ?2, ?3)",
        rusqlite::params![draw.draw_number, draw.date, draw.numbers_csv()],
    ).context("Échec de l'insertion")?;
    Ok(changed > 0)
}

pub fn fetch_draw(conn: &Connection, draw_number: u32) -> Result<Option<DrawRecord>> {
    let row = conn
        .query_row(
            "SELECT draw_number, date, numbers FROM draws WHERE draw_number = ?1",
            [draw_number],
            |row| Ok((row.get::<_, u32>(0)?, row.get::<_, String>(1)?, row.get::<_, String>(2)?)),
        )
        .optional()?;
    row.map(into_record).transpose()
}

/// Historique complet, du plus ancien au plus récent.
pub fn fetch_all_draws(conn: &Connection) -> Result<Vec<DrawRecord>> {
    let mut stmt = conn.prepare(
        "SELECT draw_number, date, numbers FROM draws ORDER BY draw_number ASC"
    )?;
    let rows = stmt.query_map([], |row| {
        Ok((row.get::<_, u32>(0)?, row.get::<_, String>(1)?, row.get::<_, String>(2)?))
    })?.collect::<Result<Vec<_>, _>>()?;
    rows.into_iter().map(into_record).collect()
}

/// Derniers tirages, du plus récent au plus ancien.
pub fn fetch_last_draws(conn: &Connection, limit: u32) -> Result<Vec<DrawRecord>> {
    let mut stmt = conn.prepare(
        "SELECT draw_number, date, numbers FROM draws ORDER BY draw_number DESC LIMIT ?1"
    )?;
    let rows = stmt.query_map([limit], |row| {
        Ok((row.get::<_, u32>(0)?, row.get::<_, String>(1)?, row.get::<_, String>(2)?))
    })?.collect::<Result<Vec<_>, _>>()?;
    rows.into_iter().map(into_record).collect()
}

pub fn count_draws(conn: &Connection) -> Result<u32> {
    let count: u32 = conn.query_row("SELECT COUNT(*) FROM draws", [], |row| row.get(0))?;
    Ok(count)
}

fn into_record((draw_number, date, numbers): (u32, String, String)) -> Result<DrawRecord> {
    let numbers = parse_numbers(&numbers)
        .with_context(|| format!("Concours {} illisible en base", draw_number))?;
    DrawRecord::new(draw_number, date, &numbers)
        .with_context(|| format!("Concours {} invalide en base", draw_number))
}
