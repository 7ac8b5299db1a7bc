use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color, ContentArrangement, Table};
use volcert_core::{RunReport, Scenario, ScenarioReport};

/// Create a styled table for output
pub fn create_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

/// Table of planned scenarios
pub fn plan_table(scenarios: &[Scenario]) -> Table {
    let mut table = create_table();
    table.set_header(vec!["#", "Volume", "Access", "Options"]);

    for scenario in scenarios {
        table.add_row(vec![
            Cell::new(scenario.index + 1),
            Cell::new(&scenario.volume_id),
            Cell::new(scenario.access),
            Cell::new(format_option_keys(&scenario.option_keys)),
        ]);
    }

    table
}

/// Table of scenario outcomes
pub fn run_table(report: &RunReport) -> Table {
    let mut table = create_table();
    table.set_header(vec!["Volume", "Access", "Result", "Reached", "Failure", "Time"]);

    for scenario in &report.scenarios {
        table.add_row(vec![
            Cell::new(&scenario.volume_id),
            Cell::new(scenario.access),
            result_cell(scenario),
            Cell::new(scenario.reached),
            Cell::new(format_failure(scenario)),
            Cell::new(format!("{:.2?}", scenario.elapsed)),
        ]);
    }

    for volume in &report.skipped {
        table.add_row(vec![
            Cell::new(volume),
            Cell::new("-"),
            Cell::new("SKIP").fg(Color::Yellow),
            Cell::new("-"),
            Cell::new("not run (fail-fast)"),
            Cell::new("-"),
        ]);
    }

    table
}

/// One-line run summary
pub fn summary(report: &RunReport) -> String {
    let mut line = format!(
        "{} passed, {} failed",
        report.passed_count(),
        report.failed_count()
    );
    if !report.skipped.is_empty() {
        line.push_str(&format!(", {} skipped", report.skipped.len()));
    }
    line.push_str(&format!(" (seed {})", report.seed));
    line
}

fn result_cell(scenario: &ScenarioReport) -> Cell {
    if scenario.passed() {
        Cell::new("PASS").fg(Color::Green)
    } else {
        Cell::new("FAIL").fg(Color::Red)
    }
}

fn format_failure(scenario: &ScenarioReport) -> String {
    let Some(failure) = &scenario.failure else {
        return String::new();
    };

    let mut text = format!("[{}] {}: {}", failure.kind, failure.stage, failure.message);
    // The primary failure may itself be the first teardown failure
    for extra in scenario
        .teardown_failures
        .iter()
        .filter(|f| *f != failure)
    {
        text.push_str(&format!("\n+ {}: {}", extra.stage, extra.message));
    }
    text
}

fn format_option_keys(keys: &[String]) -> String {
    if keys.is_empty() {
        "(none)".to_string()
    } else {
        keys.join(", ")
    }
}
