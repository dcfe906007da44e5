use crate::cli::{SourceArgs, StatsScope};
use crate::support::{load_config_or_exit, load_project_or_exit, parse_date_or_exit, print_json};
use chrono::Utc;
use epicgrid_index::Statistics;
use serde_json::Value;
use std::process;

fn require_id(scope: StatsScope, id: Option<u64>) -> u64 {
    id.unwrap_or_else(|| {
        eprintln!("error: --id is required for --scope {scope:?}");
        process::exit(1);
    })
}

fn render<T: serde::Serialize>(report: Option<T>, scope: StatsScope, id: u64) -> Value {
    let Some(report) = report else {
        eprintln!("error: no {scope:?} with id {id}");
        process::exit(1);
    };
    serde_json::to_value(report).unwrap_or_else(|e| {
        eprintln!("error: failed to render statistics: {e}");
        process::exit(2);
    })
}

pub fn run(
    source: SourceArgs,
    scope: StatsScope,
    id: Option<u64>,
    today: Option<String>,
    json_output: bool,
) {
    let config = load_config_or_exit(&source);
    let project = load_project_or_exit(&source);
    let today = match today {
        Some(value) => parse_date_or_exit("--today", &value),
        None => Utc::now().date_naive(),
    };
    let stats = Statistics::new(&project, &config.trackers, today);

    let report = match scope {
        StatsScope::Project => render(Some(stats.project()), scope, 0),
        StatsScope::Epic => {
            let id = require_id(scope, id);
            render(stats.epic(id), scope, id)
        }
        StatsScope::Feature => {
            let id = require_id(scope, id);
            render(stats.feature(id), scope, id)
        }
        StatsScope::UserStory => {
            let id = require_id(scope, id);
            render(stats.user_story(id), scope, id)
        }
        StatsScope::Version => {
            let id = require_id(scope, id);
            render(stats.version(id), scope, id)
        }
    };

    if json_output {
        print_json(&report);
        return;
    }

    println!("epicgrid stats --scope {scope:?}");
    println!("  As of: {today}");
    if let Value::Object(fields) = &report {
        for (name, value) in fields {
            match value {
                Value::Array(items) => println!("  {name}: {} item(s)", items.len()),
                Value::Object(inner) => println!("  {name}: {} field(s)", inner.len()),
                scalar => println!("  {name}: {scalar}"),
            }
        }
    }
}
