//! Human-readable run summaries

use appcat_package::{ImportReport, ImportState, SaveReport};
use colored::Colorize;

pub fn print_import_report(report: &ImportReport) {
    for outcome in &report.outcomes {
        let kind = if outcome.is_dependency { " (dependency)" } else { "" };
        match &outcome.state {
            ImportState::Created(package) => println!(
                "{} {}{} [{}]",
                "created".green().bold(),
                outcome.name,
                kind,
                package.id
            ),
            ImportState::Skipped => println!("{} {}{}", "skipped".yellow(), outcome.name, kind),
            ImportState::ResolutionFailed(reason) | ImportState::Failed(reason) => eprintln!(
                "{} {}{}: {}",
                "failed".red().bold(),
                outcome.name,
                kind,
                reason
            ),
            ImportState::Aborted => eprintln!("{} at {}", "aborted".red().bold(), outcome.name),
        }
    }

    println!(
        "{} created, {} skipped, {} failed",
        report.created.len(),
        report.skipped.len(),
        report.failed.len()
    );
}

pub fn print_save_report(report: &SaveReport) {
    for path in &report.saved {
        println!("{} {}", "saved".green().bold(), path.display());
    }
    for (name, reason) in &report.failed {
        eprintln!("{} {}: {}", "failed".red().bold(), name, reason);
    }
}
