use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use clap::ValueEnum;
use lotociclo_db::rusqlite::Connection;
use serde::Deserialize;
use std::path::Path;

use lotociclo_db::db::{fetch_draw, insert_draw};
use lotociclo_db::models::{DrawRecord, parse_numbers};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ImportFormat {
    /// concurso,data,dezenas,...
    Csv,
    /// Réponse de l'API : [{concurso, data, dezenas: ["01", ...]}]
    Json,
}

impl ImportFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        match path.extension().and_then(|e| e.to_str()).map(|e| e.to_ascii_lowercase()) {
            Some(ext) if ext == "csv" => Ok(ImportFormat::Csv),
            Some(ext) if ext == "json" => Ok(ImportFormat::Json),
            _ => bail!("Format inconnu pour {:?} (utilisez --format)", path),
        }
    }
}

/// JJ/MM/AAAA (ou déjà AAAA-MM-JJ) vers AAAA-MM-JJ.
pub fn parse_date(raw: &str) -> Result<String> {
    let raw = raw.trim();
    let date = NaiveDate::parse_from_str(raw, "%d/%m/%Y")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%Y-%m-%d"))
        .with_context(|| format!("Format de date invalide: '{}'", raw))?;
    Ok(date.format("%Y-%m-%d").to_string())
}

fn parse_draw_number(raw: &str) -> Result<u32> {
    raw.trim()
        .parse::<u32>()
        .with_context(|| format!("Numéro de concours illisible: '{}'", raw))
}

struct CsvColumns {
    draw_number: usize,
    date: usize,
    numbers: usize,
}

impl CsvColumns {
    fn from_headers(headers: &csv::StringRecord) -> Result<Self> {
        let find = |name: &str| -> Result<usize> {
            headers
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(name))
                .with_context(|| format!("Colonne '{}' absente de l'en-tête", name))
        };
        Ok(Self {
            draw_number: find("concurso")?,
            date: find("data")?,
            numbers: find("dezenas")?,
        })
    }
}

fn parse_record(record: &csv::StringRecord, columns: &CsvColumns) -> Result<DrawRecord> {
    let get = |idx: usize| -> Result<&str> {
        record
            .get(idx)
            .map(str::trim)
            .with_context(|| format!("Champ manquant à l'index {}", idx))
    };

    let draw_number = parse_draw_number(get(columns.draw_number)?)?;
    let date = parse_date(get(columns.date)?)?;
    let numbers = parse_numbers(get(columns.numbers)?)?;
    DrawRecord::new(draw_number, date, &numbers)
}

#[derive(Debug, Deserialize)]
struct ApiDraw {
    concurso: u32,
    data: String,
    dezenas: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ApiPayload {
    Many(Vec<ApiDraw>),
    One(ApiDraw),
}

impl ApiDraw {
    fn into_record(self) -> Result<DrawRecord> {
        let numbers = self
            .dezenas
            .iter()
            .map(|d| {
                d.trim()
                    .parse::<u8>()
                    .with_context(|| format!("Dezena illisible : '{}'", d))
            })
            .collect::<Result<Vec<_>>>()?;
        DrawRecord::new(self.concurso, parse_date(&self.data)?, &numbers)
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct ImportResult {
    pub total_records: u32,
    pub inserted: u32,
    pub skipped: u32,
    pub errors: u32,
}

impl ImportResult {
    fn record(&mut self, conn: &Connection, parsed: Result<DrawRecord>) {
        self.total_records += 1;
        let draw = match parsed {
            Ok(draw) => draw,
            Err(e) => {
                log::warn!("Ligne {} ignorée : {:#}", self.total_records, e);
                self.errors += 1;
                return;
            }
        };
        match store_draw(conn, &draw) {
            Ok(true) => self.inserted += 1,
            Ok(false) => self.skipped += 1,
            Err(e) => {
                log::warn!("Concours {} rejeté : {:#}", draw.draw_number, e);
                self.errors += 1;
            }
        }
    }
}

/// Doublon identique : ignoré. Même concours avec d'autres dezenas : erreur.
fn store_draw(conn: &Connection, draw: &DrawRecord) -> Result<bool> {
    if let Some(existing) = fetch_draw(conn, draw.draw_number)? {
        if existing.numbers != draw.numbers {
            bail!(
                "déjà en base avec {} (fichier : {})",
                existing.numbers_csv(),
                draw.numbers_csv()
            );
        }
        return Ok(false);
    }
    insert_draw(conn, draw)
}

pub fn import_file(conn: &Connection, path: &Path, format: Option<ImportFormat>) -> Result<ImportResult> {
    let format = match format {
        Some(f) => f,
        None => ImportFormat::from_path(path)?,
    };
    match format {
        ImportFormat::Csv => import_csv(conn, path),
        ImportFormat::Json => import_json(conn, path),
    }
}

pub fn import_csv(conn: &Connection, path: &Path) -> Result<ImportResult> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b',')
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("Impossible d'ouvrir {:?}", path))?;
    let columns = CsvColumns::from_headers(reader.headers()?)?;

    let tx = conn.unchecked_transaction()
        .context("Impossible de démarrer la transaction")?;

    let mut result = ImportResult::default();
    for record_result in reader.records() {
        let parsed = record_result
            .context("Erreur de lecture")
            .and_then(|record| parse_record(&record, &columns));
        result.record(&tx, parsed);
    }

    tx.commit().context("Échec du commit")?;
    log::info!("Import CSV {:?} : {:?}", path, result);
    Ok(result)
}

pub fn import_json(conn: &Connection, path: &Path) -> Result<ImportResult> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Impossible de lire {:?}", path))?;
    let payload: ApiPayload = serde_json::from_str(&content)
        .with_context(|| format!("JSON invalide dans {:?}", path))?;
    let mut draws = match payload {
        ApiPayload::Many(draws) => draws,
        ApiPayload::One(draw) => vec![draw],
    };
    draws.sort_by_key(|d| d.concurso);

    let tx = conn.unchecked_transaction()
        .context("Impossible de démarrer la transaction")?;

    let mut result = ImportResult::default();
    for draw in draws {
        result.record(&tx, draw.into_record());
    }

    tx.commit().context("Échec du commit")?;
    log::info!("Import JSON {:?} : {:?}", path, result);
    Ok(result)
}
