use comfy_table::{Table, ContentArrangement, presets::UTF8_FULL, Cell, Color};

use crate::import::ImportResult;
use lotociclo_db::models::{DrawRecord, NumberStats};
use lotociclo_engine::cycle::Cycle;
use lotociclo_engine::generator::Candidate;
use lotociclo_engine::report::{CycleAnalysis, CycleBoard, NumberState, analyze_cycle};
use lotociclo_engine::tracker::UpdateSummary;

fn join_numbers(numbers: &[u8]) -> String {
    if numbers.is_empty() {
        return "—".to_string();
    }
    numbers
        .iter()
        .map(|n| format!("{:02}", n))
        .collect::<Vec<_>>()
        .join(" ")
}

fn new_table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);
    table
}

pub fn display_draws(draws: &[DrawRecord]) {
    if draws.is_empty() {
        println!("Aucun concours à afficher.");
        return;
    }

    let mut table = new_table(vec!["Concours", "Date", "Dezenas", "Pares", "Soma"]);
    for draw in draws {
        let even = draw.numbers.iter().filter(|n| *n % 2 == 0).count();
        let sum: u32 = draw.numbers.iter().map(|&n| n as u32).sum();
        table.add_row(vec![
            &draw.draw_number.to_string(),
            &draw.date,
            &join_numbers(&draw.numbers),
            &even.to_string(),
            &sum.to_string(),
        ]);
    }

    println!("{table}");
}

pub fn display_import_summary(result: &ImportResult) {
    println!("Import terminé :");
    println!("  Total lignes lues : {}", result.total_records);
    println!("  Insérés           : {}", result.inserted);
    println!("  Doublons ignorés  : {}", result.skipped);
    if result.errors > 0 {
        println!("  Erreurs           : {} (détails avec RUST_LOG=warn)", result.errors);
    }
}

/// Fréquences et retards ; `selected` est marqué en rouge.
pub fn display_stats(stats: &[NumberStats], selected: &[u8], window: usize) {
    println!("\n📊 Statistiques sur les {} derniers concours\n", window);

    let mut table = new_table(vec!["Dezena", "Fréquence", "Retard", "Ciclo"]);
    let mut sorted = stats.to_vec();
    sorted.sort_by(|a, b| a.frequency.cmp(&b.frequency).then(a.number.cmp(&b.number)));

    for stat in &sorted {
        let in_cycle = selected.contains(&stat.number);
        let marker = if in_cycle {
            Cell::new("fora").fg(Color::Red)
        } else {
            Cell::new("")
        };
        table.add_row(vec![
            Cell::new(format!("{:02}", stat.number)),
            Cell::new(stat.frequency.to_string()),
            Cell::new(stat.gap.to_string()),
            marker,
        ]);
    }
    println!("{table}");
}

pub fn display_analysis(analysis: &CycleAnalysis) {
    println!("\n🔄 Ciclo {} ({})\n", analysis.cycle_id, analysis.status);

    let rows = [
        ("Début", analysis.start_date.format("%Y-%m-%d %H:%M").to_string()),
        ("Concours de départ", analysis.start_draw_number.to_string()),
        ("Dezenas du cycle", join_numbers(&analysis.target_numbers)),
        ("Sorties", join_numbers(&analysis.drawn_numbers)),
        ("Pendantes", join_numbers(&analysis.pending_numbers)),
        ("Progression", format!("{:.1} %", analysis.progress_percent)),
        ("Concours traités", analysis.draws_processed_count.to_string()),
        ("Moyenne concours / dezena", format!("{:.2}", analysis.average_draws_per_number)),
        ("Estimation restante", format!("{:.1} concours", analysis.estimated_draws_remaining)),
    ];

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    for (label, value) in rows {
        table.add_row(vec![Cell::new(label), Cell::new(value)]);
    }
    println!("{table}");
}

/// Grille 5x5 : gris hors cycle, rouge pendante, vert sortie.
pub fn display_board(board: &CycleBoard) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);

    for row in board.cells.chunks(5) {
        let cells: Vec<Cell> = row
            .iter()
            .map(|cell| {
                let color = match cell.state {
                    NumberState::OutsideCycle => Color::Grey,
                    NumberState::Pending => Color::Red,
                    NumberState::Drawn => Color::Green,
                };
                Cell::new(format!("{:02}", cell.number)).fg(color)
            })
            .collect();
        table.add_row(cells);
    }

    println!("{table}");
    println!("Début au concours {}", board.start_draw_number);
    println!("Sorties   : {}", join_numbers(&board.numbers_in(NumberState::Drawn)));
    println!("Pendantes : {}", join_numbers(&board.numbers_in(NumberState::Pending)));
}

pub fn display_candidates(candidates: &[Candidate]) {
    println!("\n🎲 Jogos suggérés\n");

    let mut table = new_table(vec!["#", "Dezenas", "Pendantes", "Reprises"]);
    for (i, candidate) in candidates.iter().enumerate() {
        table.add_row(vec![
            &format!("{}", i + 1),
            &join_numbers(&candidate.numbers),
            &candidate.pending.to_string(),
            &candidate.repeated.to_string(),
        ]);
    }
    println!("{table}");
}

pub fn display_update(summary: &UpdateSummary) {
    if summary.applied.is_empty() {
        println!("Aucun nouveau concours.");
    } else {
        let applied: Vec<String> = summary.applied.iter().map(|n| n.to_string()).collect();
        println!("Concours appliqués : {}", applied.join(", "));
    }
    for cycle in &summary.closed {
        println!(
            "Cycle {} fermé au concours {}",
            cycle.id(),
            cycle.closed_draw_number().map_or("?".to_string(), |n| n.to_string())
        );
    }
}

pub fn display_cycles(cycles: &[Cycle]) {
    if cycles.is_empty() {
        println!("Aucun cycle enregistré.");
        return;
    }

    let mut table = new_table(vec!["Id", "Statut", "Départ", "Fermeture", "Dezenas", "Progression"]);
    for cycle in cycles {
        let analysis = analyze_cycle(cycle);
        let status_color = if cycle.is_active() { Color::Green } else { Color::Grey };
        table.add_row(vec![
            Cell::new(cycle.id()),
            Cell::new(cycle.status().to_string()).fg(status_color),
            Cell::new(cycle.start_draw_number().to_string()),
            Cell::new(cycle.closed_draw_number().map_or("—".to_string(), |n| n.to_string())),
            Cell::new(join_numbers(cycle.target_numbers())),
            Cell::new(format!("{:.0} %", analysis.progress_percent)),
        ]);
    }
    println!("{table}");
}
