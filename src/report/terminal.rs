use std::collections::HashMap;
use std::path::Path;

use anyhow::Result;
use colored::*;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};

use crate::license::graph::Category;
use crate::models::{DependencyVerdict, Report, Status};

/// Render a colored terminal report.
pub fn render(report: &Report, path: &Path, verbose: bool, quiet: bool) -> Result<()> {
    if quiet {
        println!("{}", summary_line(report));
        return Ok(());
    }

    println!(
        "\n {} v{}",
        "license-compat".bold(),
        env!("CARGO_PKG_VERSION")
    );
    println!(" Checking: {}", path.display());
    println!(" Project license: {}\n", report.project_license.bold());

    let failing = report.failures().count();
    let passing = report.total() - failing;

    println!(" ┌────────────────────────────────────────────────────┐");
    println!(" │  {:<48} │", "SUMMARY".bold());
    println!(
        " │  {:<48} │",
        format!("Total dependencies : {}", report.total() + report.unchecked)
    );
    println!(
        " │  {:<48} │",
        format!(
            "{}  Pass            : {:>4}  {}",
            "✓".green(),
            passing,
            summarize_licenses(report, |s| !s.is_failure())
        )
    );
    println!(
        " │  {:<48} │",
        format!(
            "{}  Fail            : {:>4}  {}",
            "✗".red(),
            failing,
            summarize_licenses(report, Status::is_failure)
        )
    );
    if report.compatibility_skipped {
        println!(
            " │  {:<48} │",
            format!("{}  Not checked     : {:>4}", "⚠".yellow(), report.unchecked)
        );
    }
    println!(" └────────────────────────────────────────────────────┘\n");

    if report.compatibility_skipped {
        println!(
            " {} Denied licenses found; compatibility was not checked.\n",
            "[SKIPPED]".yellow().bold()
        );
    }

    for status in Status::ALL {
        let shown = status.is_failure() || verbose;
        if !shown || report.count(status) == 0 {
            continue;
        }
        let (label, heading) = group_heading(status);
        println!(" {} {}:\n", label, heading);
        render_table(report, status);
        println!();
    }

    Ok(())
}

/// One-line summary used by `--quiet`.
pub fn summary_line(report: &Report) -> String {
    let failing = report.failures().count();
    let mut line = format!(
        "Total: {}  Pass: {}  Fail: {}",
        report.total() + report.unchecked,
        (report.total() - failing).to_string().green(),
        failing.to_string().red(),
    );
    if report.compatibility_skipped {
        line.push_str(&format!("  Not checked: {}", report.unchecked.to_string().yellow()));
    }
    line
}

fn group_heading(status: Status) -> (ColoredString, &'static str) {
    match status {
        Status::Denied => ("[DENIED]".red().bold(), "Dependencies using denied licenses"),
        Status::Incompatible => (
            "[INCOMPATIBLE]".red().bold(),
            "Dependencies incompatible with the project license",
        ),
        Status::Unresolved => (
            "[UNRESOLVED]".red().bold(),
            "Dependencies with unrecognized licenses",
        ),
        Status::NoLicense => ("[NO LICENSE]".yellow().bold(), "Dependencies without a license"),
        Status::Exempt => ("[EXEMPT]".cyan().bold(), "Exempt dependencies"),
        Status::Allowed => ("[ALLOWED]".green().bold(), "Allow-listed dependencies"),
        Status::Overridden => ("[OVERRIDDEN]".green().bold(), "Dependencies with license overrides"),
        Status::Ok => ("[OK]".green().bold(), "Compatible dependencies"),
    }
}

fn render_table(report: &Report, status: Status) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Unit").add_attribute(Attribute::Bold),
            Cell::new("Name").add_attribute(Attribute::Bold),
            Cell::new("License").add_attribute(Attribute::Bold),
            Cell::new("Category").add_attribute(Attribute::Bold),
            Cell::new("Reason").add_attribute(Attribute::Bold),
            Cell::new("Status").add_attribute(Attribute::Bold),
        ]);

    for (unit, verdict) in report.verdicts().filter(|(_, v)| v.status == status) {
        let (category, category_color) = category_cell(verdict);
        let status_color = if status.is_failure() {
            Color::Red
        } else if status == Status::NoLicense {
            Color::Yellow
        } else {
            Color::Green
        };

        table.add_row(vec![
            Cell::new(unit),
            Cell::new(&verdict.name),
            Cell::new(verdict.license.as_deref().unwrap_or("-")),
            Cell::new(category).fg(category_color),
            Cell::new(&verdict.reason),
            Cell::new(status.to_string())
                .fg(status_color)
                .set_alignment(CellAlignment::Center),
        ]);
    }

    println!("{}", table);
}

fn category_cell(verdict: &DependencyVerdict) -> (&'static str, Color) {
    match verdict.category {
        Some(Category::Permissive) => ("permissive", Color::Green),
        Some(Category::WeakCopyleft) => ("weak-copyleft", Color::Yellow),
        Some(Category::StrongCopyleft) => ("strong-copyleft", Color::Red),
        Some(Category::NetworkCopyleft) => ("network-copyleft", Color::Red),
        Some(Category::SourceAvailable) => ("source-available", Color::Magenta),
        Some(Category::Proprietary) => ("proprietary", Color::Magenta),
        None => ("unknown", Color::DarkGrey),
    }
}

/// The three most frequent licenses among verdicts matching `filter`.
fn summarize_licenses<F>(report: &Report, filter: F) -> String
where
    F: Fn(&Status) -> bool,
{
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for (_, verdict) in report.verdicts().filter(|(_, v)| filter(&v.status)) {
        let license = verdict.license.as_deref().unwrap_or("none");
        *counts.entry(license).or_insert(0) += 1;
    }

    let mut pairs: Vec<(&str, usize)> = counts.into_iter().collect();
    pairs.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));

    let summary: Vec<String> = pairs
        .iter()
        .take(3)
        .map(|(license, count)| format!("{} ({})", license, count))
        .collect();

    if summary.is_empty() {
        String::new()
    } else {
        format!("[{}]", summary.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verdict(name: &str, license: &str, status: Status) -> DependencyVerdict {
        DependencyVerdict {
            name: name.to_string(),
            license: Some(license.to_string()),
            status,
            reason: String::new(),
            offending: Vec::new(),
            category: None,
        }
    }

    fn sample() -> Report {
        let mut report = Report {
            project_license: "MIT".to_string(),
            ..Report::default()
        };
        report.push("app", verdict("a", "MIT", Status::Ok));
        report.push("app", verdict("b", "MIT", Status::Ok));
        report.push("app", verdict("c", "ISC", Status::Allowed));
        report.push("cli", verdict("d", "GPL-3.0-only", Status::Incompatible));
        report
    }

    #[test]
    fn test_summarize_licenses_orders_by_count() {
        let report = sample();
        assert_eq!(
            summarize_licenses(&report, |s| !s.is_failure()),
            "[MIT (2), ISC (1)]"
        );
        assert_eq!(
            summarize_licenses(&report, Status::is_failure),
            "[GPL-3.0-only (1)]"
        );
        assert_eq!(summarize_licenses(&report, |s| *s == Status::Denied), "");
    }

    #[test]
    fn test_summary_line_counts() {
        colored::control::set_override(false);
        let line = summary_line(&sample());
        assert_eq!(line, "Total: 4  Pass: 3  Fail: 1");

        let skipped = Report {
            compatibility_skipped: true,
            unchecked: 2,
            ..sample()
        };
        assert!(summary_line(&skipped).ends_with("Not checked: 2"));
    }
}
