//! Human-readable rendering of selection and provisioning results

use colored::Colorize;
use tabled::{Table, Tabled};

use pgpilot_core::domain::{ProbeOutcome, ProvisionReport, SelectionReport};

#[derive(Tabled)]
struct ProbeRow {
    host: String,
    load: String,
    status: String,
}

fn probe_rows(selection: &SelectionReport) -> Vec<ProbeRow> {
    selection
        .outcomes
        .iter()
        .enumerate()
        .map(|(index, (address, outcome))| match outcome {
            ProbeOutcome::Sampled { load } => ProbeRow {
                host: address.clone(),
                load: format!("{:.2}", load),
                status: if index == selection.winner.index {
                    "selected".to_string()
                } else {
                    "ok".to_string()
                },
            },
            ProbeOutcome::Failed { reason } => ProbeRow {
                host: address.clone(),
                load: "-".to_string(),
                status: format!("excluded: {}", reason),
            },
        })
        .collect()
}

pub fn print_selection(selection: &SelectionReport) {
    println!("{}", "Probe results".cyan().bold());
    println!();
    println!("{}", Table::new(probe_rows(selection)));
    println!();
    println!(
        "  {} {} (load {:.2})",
        "Least loaded:".bold(),
        selection.winner.address.green(),
        selection.winner.load
    );
}

pub fn print_report(report: &ProvisionReport) {
    print_selection(&report.selection);
    println!();
    println!(
        "{}",
        format!("✓ PostgreSQL provisioned on {}", report.address)
            .green()
            .bold()
    );
    println!("  {} {}", "OS:".bold(), report.os_family);
    for phase in &report.phases {
        println!(
            "  {} {} command(s) in {} ms",
            format!("{}:", phase.phase).bold(),
            phase.commands.len(),
            phase.duration_ms()
        );
    }
    if !report.warnings.is_empty() {
        println!();
        println!(
            "{}",
            format!("{} command(s) wrote to stderr", report.warnings.len()).yellow()
        );
        for warning in &report.warnings {
            println!("  {} [{}] {}", "•".yellow(), warning.phase, warning.command);
            println!("    {}", warning.stderr.trim());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pgpilot_core::domain::LoadSample;

    #[test]
    fn test_probe_rows_mark_winner_and_failures() {
        let selection = SelectionReport {
            outcomes: vec![
                ("a".to_string(), ProbeOutcome::Sampled { load: 1.2 }),
                (
                    "b".to_string(),
                    ProbeOutcome::Failed {
                        reason: "timeout".to_string(),
                    },
                ),
                ("c".to_string(), ProbeOutcome::Sampled { load: 0.5 }),
            ],
            winner: LoadSample::new("c", 2, 0.5).unwrap(),
        };

        let rows = probe_rows(&selection);
        assert_eq!(rows[0].status, "ok");
        assert_eq!(rows[1].status, "excluded: timeout");
        assert_eq!(rows[1].load, "-");
        assert_eq!(rows[2].status, "selected");
        assert_eq!(rows[2].load, "0.50");
    }
}
