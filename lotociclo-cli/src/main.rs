mod display;
mod import;

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use clap::{Args, Parser, Subcommand};
use serde_json::json;

use crate::display::{
    display_analysis, display_board, display_candidates, display_cycles, display_draws,
    display_import_summary, display_stats, display_update,
};
use crate::import::ImportFormat;
use lotociclo_db::db::{count_draws, db_path, fetch_all_draws, fetch_last_draws, insert_draw, migrate, open_db};
use lotociclo_db::models::{DrawRecord, parse_numbers, validate_numbers};
use lotociclo_db::rusqlite::Connection;
use lotociclo_engine::CycleError;
use lotociclo_engine::absence::{compute_stats, select_absent_numbers};
use lotociclo_engine::config::{EngineConfig, load_config, save_config};
use lotociclo_engine::history::DrawHistory;
use lotociclo_engine::report::cycle_board;
use lotociclo_engine::service::CycleService;
use lotociclo_engine::store::{CycleStore, SqliteCycleStore};

#[derive(Parser)]
#[command(name = "lotociclo", about = "Ciclo de dezenas fora (Lotofácil)")]
struct Cli {
    /// Fichier de configuration JSON
    #[arg(long, global = true, default_value = "lotociclo.json")]
    config: PathBuf,

    /// Base SQLite (par défaut data/lotociclo.db)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

/// Surcharges ponctuelles de la configuration.
#[derive(Args, Debug, Clone, Default)]
struct EngineArgs {
    /// Nombre de dezenas suivies par cycle (K)
    #[arg(long)]
    cycle_size: Option<usize>,

    /// Fenêtre d'analyse (nombre de concours)
    #[arg(long)]
    window: Option<usize>,
}

impl EngineArgs {
    fn apply(&self, mut config: EngineConfig) -> EngineConfig {
        if let Some(k) = self.cycle_size {
            config.cycle_size = k;
        }
        if let Some(w) = self.window {
            config.analysis_window = w;
        }
        config
    }
}

#[derive(Subcommand)]
enum Command {
    /// Importer des concours (CSV ou JSON de l'API)
    Import {
        /// Fichier à importer
        #[arg(short, long)]
        file: PathBuf,

        /// Format, déduit de l'extension par défaut
        #[arg(long)]
        format: Option<ImportFormat>,
    },

    /// Afficher le chemin de la base de données
    DbPath,

    /// Lister les derniers concours
    List {
        /// Nombre de concours à afficher
        #[arg(short, long, default_value = "10")]
        last: u32,
    },

    /// Ajouter un concours manuellement
    Add,

    /// Fréquences et retards sur la fenêtre d'analyse
    Stats {
        #[command(flatten)]
        engine: EngineArgs,
    },

    /// Ouvrir un cycle (refusé si un cycle est actif)
    Start {
        #[command(flatten)]
        engine: EngineArgs,
    },

    /// Appliquer les nouveaux concours au cycle actif
    Update {
        #[command(flatten)]
        engine: EngineArgs,
    },

    /// État du cycle actif
    Status {
        #[command(flatten)]
        engine: EngineArgs,

        /// Sortie JSON
        #[arg(long)]
        json: bool,
    },

    /// Générer des jogos à partir du cycle actif
    Generate {
        #[command(flatten)]
        engine: EngineArgs,

        /// Nombre de jogos
        #[arg(short, long, default_value = "5")]
        count: usize,

        /// Seed pour la reproductibilité
        #[arg(long)]
        seed: Option<u64>,

        /// Sortie JSON
        #[arg(long)]
        json: bool,
    },

    /// Mise à jour, analyse et génération en une passe
    Pipeline {
        #[command(flatten)]
        engine: EngineArgs,

        /// Nombre de jogos
        #[arg(short, long, default_value = "5")]
        count: usize,

        /// Seed pour la reproductibilité
        #[arg(long)]
        seed: Option<u64>,

        /// Sortie JSON
        #[arg(long)]
        json: bool,
    },

    /// Historique des cycles
    Cycles {
        /// Sortie JSON
        #[arg(long)]
        json: bool,
    },

    /// Exporter tous les cycles en JSON
    Export {
        /// Fichier de sortie (stdout par défaut)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Écrire la configuration par défaut
    InitConfig {
        /// Écraser un fichier existant
        #[arg(long)]
        force: bool,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    if let Command::InitConfig { force } = cli.command {
        return cmd_init_config(&cli.config, force);
    }

    let path = cli.db.clone().unwrap_or_else(db_path);
    let conn = open_db(&path)?;
    migrate(&conn)?;
    let config = load_config(&cli.config)?;

    match cli.command {
        Command::Import { file, format } => cmd_import(&conn, &file, format),
        Command::DbPath => {
            println!("{}", path.display());
            Ok(())
        }
        Command::List { last } => cmd_list(&conn, last),
        Command::Add => cmd_add(&conn),
        Command::Stats { engine } => cmd_stats(&conn, engine.apply(config)),
        Command::Start { engine } => cmd_start(&conn, engine.apply(config)),
        Command::Update { engine } => cmd_update(&conn, engine.apply(config)),
        Command::Status { engine, json } => cmd_status(&conn, engine.apply(config), json),
        Command::Generate { engine, count, seed, json } => {
            cmd_generate(&conn, engine.apply(config), count, seed, json)
        }
        Command::Pipeline { engine, count, seed, json } => {
            cmd_pipeline(&conn, engine.apply(config), count, seed, json)
        }
        Command::Cycles { json } => cmd_cycles(&conn, json),
        Command::Export { output } => cmd_export(&conn, output.as_deref()),
        Command::InitConfig { .. } => Ok(()),
    }
}

/// Erreur moteur préfixée par son libellé, ex. `[StoreConflict] ...`.
fn engine_err(err: CycleError) -> anyhow::Error {
    anyhow!("[{}] {}", err.label(), err)
}

fn load_history(conn: &Connection) -> Result<DrawHistory> {
    let draws = fetch_all_draws(conn)?;
    DrawHistory::new(draws).map_err(engine_err)
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn cmd_init_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!("{:?} existe déjà (utilisez --force)", path);
    }
    save_config(&EngineConfig::default(), path)?;
    println!("Configuration écrite dans {}", path.display());
    Ok(())
}

fn cmd_import(conn: &Connection, file: &Path, format: Option<ImportFormat>) -> Result<()> {
    let result = import::import_file(conn, file, format)?;
    display_import_summary(&result);
    Ok(())
}

fn cmd_list(conn: &Connection, last: u32) -> Result<()> {
    let n = count_draws(conn)?;
    if n == 0 {
        println!("Base vide. Lancez d'abord : lotociclo import");
        return Ok(());
    }
    let draws = fetch_last_draws(conn, last)?;
    display_draws(&draws);
    Ok(())
}

fn cmd_stats(conn: &Connection, config: EngineConfig) -> Result<()> {
    config.validate().map_err(engine_err)?;
    let history = load_history(conn)?;
    if history.is_empty() {
        println!("Base vide. Lancez d'abord : lotociclo import");
        return Ok(());
    }
    let window = config.analysis_window.min(history.len());
    let stats = compute_stats(history.draws(), config.analysis_window);
    let selected = select_absent_numbers(history.draws(), config.analysis_window, config.cycle_size)
        .map_err(engine_err)?;
    display_stats(&stats, &selected, window);
    Ok(())
}

fn cmd_start(conn: &Connection, config: EngineConfig) -> Result<()> {
    let history = load_history(conn)?;
    let store = SqliteCycleStore::new(conn);
    let mut service = CycleService::open(&store, config, None).map_err(engine_err)?;
    let cycle = service.start(&history).map_err(engine_err)?;
    println!("Cycle {} ouvert après le concours {}", cycle.id(), cycle.start_draw_number());
    display_board(&cycle_board(&cycle));
    Ok(())
}

fn cmd_update(conn: &Connection, config: EngineConfig) -> Result<()> {
    let history = load_history(conn)?;
    let store = SqliteCycleStore::new(conn);
    let mut service = CycleService::open(&store, config, None).map_err(engine_err)?;
    let summary = service.update(&history).map_err(engine_err)?;
    display_update(&summary);
    display_board(&cycle_board(&summary.active));
    Ok(())
}

fn cmd_status(conn: &Connection, config: EngineConfig, json: bool) -> Result<()> {
    let history = load_history(conn)?;
    let store = SqliteCycleStore::new(conn);
    let mut service = CycleService::open(&store, config, None).map_err(engine_err)?;
    let analysis = service.active_cycle_analysis(&history).map_err(engine_err)?;
    let board = service
        .tracker()
        .active()
        .map(cycle_board)
        .context("Aucun cycle actif après analyse")?;

    if json {
        return print_json(&json!({ "analysis": analysis, "board": board }));
    }
    display_analysis(&analysis);
    display_board(&board);
    Ok(())
}

fn cmd_generate(conn: &Connection, config: EngineConfig, count: usize, seed: Option<u64>, json: bool) -> Result<()> {
    let history = load_history(conn)?;
    let store = SqliteCycleStore::new(conn);
    let mut service = CycleService::open(&store, config, seed).map_err(engine_err)?;
    let candidates = service.generate_candidates(&history, count).map_err(engine_err)?;

    if json {
        return print_json(&candidates);
    }
    display_candidates(&candidates);
    Ok(())
}

fn cmd_pipeline(conn: &Connection, config: EngineConfig, count: usize, seed: Option<u64>, json: bool) -> Result<()> {
    let history = load_history(conn)?;
    let store = SqliteCycleStore::new(conn);
    let mut service = CycleService::open(&store, config, seed).map_err(engine_err)?;
    let result = service.run_pipeline(&history, count).map_err(engine_err)?;

    if json {
        return print_json(&result);
    }
    for closed in &result.closed {
        println!("Cycle {} fermé au concours {:?}", closed.id(), closed.closed_draw_number());
    }
    display_analysis(&result.analysis);
    display_board(&cycle_board(&result.cycle));
    display_candidates(&result.candidates);
    Ok(())
}

fn cmd_cycles(conn: &Connection, json: bool) -> Result<()> {
    let store = SqliteCycleStore::new(conn);
    let snapshot = store.load_all().map_err(engine_err)?;
    if json {
        return print_json(&snapshot.cycles);
    }
    display_cycles(&snapshot.cycles);
    Ok(())
}

fn cmd_export(conn: &Connection, output: Option<&Path>) -> Result<()> {
    let store = SqliteCycleStore::new(conn);
    let content = store.export_json().map_err(engine_err)?;
    match output {
        Some(path) => {
            std::fs::write(path, content)
                .with_context(|| format!("Impossible d'écrire {:?}", path))?;
            println!("Cycles exportés dans {}", path.display());
        }
        None => println!("{}", content),
    }
    Ok(())
}

fn cmd_add(conn: &Connection) -> Result<()> {
    println!("Ajout d'un concours manuellement\n");

    let draw_number: u32 = prompt("Numéro du concours (ex: 3100) : ")?
        .parse()
        .context("Numéro de concours invalide")?;
    let date = import::parse_date(&prompt("Date (JJ/MM/AAAA) : ")?)?;
    let numbers = prompt_numbers()?;

    let draw = DrawRecord::new(draw_number, date, &numbers)?;

    println!("\nConcours à insérer :");
    display_draws(std::slice::from_ref(&draw));

    let confirm = prompt("\nConfirmer l'insertion ? (o/n) : ")?;
    if confirm.trim().to_lowercase() == "o" {
        let inserted = insert_draw(conn, &draw)?;
        if inserted {
            println!("Concours inséré avec succès.");
        } else {
            println!("Ce concours existe déjà (doublon ignoré).");
        }
    } else {
        println!("Insertion annulée.");
    }

    Ok(())
}

fn prompt(msg: &str) -> Result<String> {
    print!("{}", msg);
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin()
        .read_line(&mut input)
        .context("Erreur de lecture")?;
    Ok(input.trim().to_string())
}

fn prompt_numbers() -> Result<Vec<u8>> {
    loop {
        let input = prompt("15 dezenas (séparées par des espaces ou virgules, 1-25) : ")?;
        match parse_numbers(&input) {
            Ok(v) => match validate_numbers(&v) {
                Ok(()) => return Ok(v),
                Err(e) => println!("{}. Réessayez.", e),
            },
            Err(e) => println!("{}. Réessayez.", e),
        }
    }
}
