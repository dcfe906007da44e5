use crate::cli::SourceArgs;
use crate::support::{load_config_or_exit, load_project_or_exit, print_json};
use epicgrid_core::{HierarchyCheckReport, check_hierarchy};

fn print_report(report: &HierarchyCheckReport) {
    println!(
        "[hierarchy] {} (issues={}, grid={}, errors={}, warnings={})",
        if report.accepted() { "OK" } else { "FAIL" },
        report.summary.issue_count,
        report.summary.grid_issue_count,
        report.summary.error_count,
        report.summary.warning_count
    );
    for finding in &report.errors {
        println!("  - {} {} ({})", finding.issue_id, finding.class, finding.message);
    }
    for finding in &report.warnings {
        println!(
            "  - WARN {} {} ({})",
            finding.issue_id, finding.class, finding.message
        );
    }
}

pub fn run(source: SourceArgs, json_output: bool) {
    let config = load_config_or_exit(&source);
    let project = load_project_or_exit(&source);
    let report = check_hierarchy(&project.issues, &config.trackers);

    if json_output {
        print_json(&report);
    } else {
        print_report(&report);
    }
    if !report.accepted() {
        std::process::exit(1);
    }
}
