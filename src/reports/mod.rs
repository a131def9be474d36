use bankforge::checkpoint::CheckpointState;
use bankforge::placement::PlacementReport;
use bankforge::proposal::SourceSignature;
use bankforge::template::TemplateRecord;
use comfy_table::presets::ASCII_FULL;
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};

fn new_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(ASCII_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

fn align_right(table: &mut Table, from: usize) {
    for i in from..table.column_count() {
        if let Some(col) = table.column_mut(i) {
            col.set_cell_alignment(CellAlignment::Right);
        }
    }
}

pub fn print_placement_report(report: &PlacementReport) {
    let c = &report.counters;
    let mut table = new_table();

    table.add_row(vec![
        Cell::new("Outcome").add_attribute(Attribute::Bold),
        Cell::new("Proposals"),
        Cell::new("Accepted").fg(Color::Green),
        Cell::new("Rejected"),
        Cell::new("Failed").fg(Color::Red),
        Cell::new("Seeds"),
        Cell::new("Bank"),
        Cell::new("Run Len"),
        Cell::new("Chk Fail"),
        Cell::new("Time (s)"),
    ]);
    table.add_row(vec![
        Cell::new(report.outcome.to_string()).add_attribute(Attribute::Bold),
        Cell::new(c.proposals),
        Cell::new(c.accepted).fg(Color::Green),
        Cell::new(c.rejected),
        Cell::new(c.failed).fg(Color::Red),
        Cell::new(c.seeds),
        Cell::new(report.bank_size),
        Cell::new(format!("{:.2}", report.smoothed_run_length)),
        Cell::new(report.checkpoint_failures),
        Cell::new(format!("{:.2}", report.elapsed.as_secs_f64())),
    ]);
    align_right(&mut table, 1);

    println!("\n{}", table);
}

pub fn print_checkpoint_summary(state: &CheckpointState) {
    let snap = &state.snapshot;
    let c = &snap.counters;
    let seeds = snap.templates.iter().filter(|t| t.is_seed).count();
    let window: Vec<String> = snap.convergence.window.iter().map(|w| w.to_string()).collect();

    let mut table = new_table();
    table.add_row(vec![
        Cell::new("Field").add_attribute(Attribute::Bold),
        Cell::new("Value").add_attribute(Attribute::Bold),
    ]);

    let rows: Vec<(&str, String)> = vec![
        ("Version", snap.version.to_string()),
        ("Sort key", snap.sort_key.to_string()),
        ("f_low (Hz)", format!("{}", snap.f_low)),
        ("Source", describe_source(snap.source.as_ref())),
        ("Templates", snap.templates.len().to_string()),
        ("  of which seeds", seeds.to_string()),
        ("Proposals", c.proposals.to_string()),
        ("Accepted", c.accepted.to_string()),
        ("Rejected", c.rejected.to_string()),
        ("Failed", c.failed.to_string()),
        ("Current run (k)", snap.convergence.k.to_string()),
        ("Run-length window", window.join(" ")),
        ("RNG state", format!("{:#018x}", state.rng_state)),
    ];
    for (name, value) in rows {
        table.add_row(vec![Cell::new(name), Cell::new(value).fg(Color::Cyan)]);
    }

    println!("\n{}", table);
}

fn describe_source(source: Option<&SourceSignature>) -> String {
    match source {
        Some(SourceSignature::Uniform(b)) => format!(
            "uniform m1=[{}, {}] m2=[{}, {}] spin=[{}, {}]",
            b.mass1_min, b.mass1_max, b.mass2_min, b.mass2_max, b.spin_min, b.spin_max
        ),
        Some(SourceSignature::Replay { len }) => format!("replay of {} points", len),
        None => "unrecorded".to_string(),
    }
}

pub fn print_templates(templates: &[TemplateRecord], limit: usize) {
    let mut table = new_table();
    table.add_row(vec![
        Cell::new("#").add_attribute(Attribute::Bold),
        Cell::new("mass1"),
        Cell::new("mass2"),
        Cell::new("spin1z"),
        Cell::new("spin2z"),
        Cell::new("Seed"),
        Cell::new("Match"),
    ]);

    for t in templates.iter().take(limit) {
        let seed_cell = if t.is_seed {
            Cell::new("yes").fg(Color::Yellow)
        } else {
            Cell::new("")
        };
        table.add_row(vec![
            Cell::new(t.sequence),
            Cell::new(format!("{:.4}", t.mass1)),
            Cell::new(format!("{:.4}", t.mass2)),
            Cell::new(format!("{:.3}", t.spin1z)),
            Cell::new(format!("{:.3}", t.spin2z)),
            seed_cell,
            Cell::new(format!("{:.4}", t.accept_match)),
        ]);
    }
    align_right(&mut table, 0);

    println!("\n{}", table);
    if templates.len() > limit {
        println!("... {} more", templates.len() - limit);
    }
}
