use crate::cli::{GridArgs, SourceArgs};
use chrono::NaiveDate;
use epicgrid_core::{EpicgridConfig, ProjectData};
use epicgrid_http::GridQuery;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

pub const LOG_ENV: &str = "EPICGRID_LOG";

/// Install the stderr subscriber. Level comes from `EPICGRID_LOG`, default `warn`.
pub fn init_tracing(log_json: bool) {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    if log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

pub fn load_config_or_exit(source: &SourceArgs) -> EpicgridConfig {
    let explicit = source.config.as_deref().map(Path::new);
    EpicgridConfig::resolve(explicit, Path::new(&source.data)).unwrap_or_else(|e| {
        eprintln!("error: {e}");
        process::exit(1);
    })
}

pub fn load_project_or_exit(source: &SourceArgs) -> ProjectData {
    let dir = PathBuf::from(&source.data);
    ProjectData::load_dir(&dir).unwrap_or_else(|e| {
        eprintln!("error: failed to load project from {}: {e}", dir.display());
        process::exit(1);
    })
}

/// Translate CLI flags into the same parameters the HTTP route accepts.
pub fn grid_params(args: &GridArgs) -> Result<Vec<(String, String)>, String> {
    let mut params = Vec::new();
    for filter in &args.filters {
        let (key, value) = filter
            .split_once('=')
            .ok_or_else(|| format!("invalid --filter `{filter}`; expected key=value"))?;
        params.push((format!("filters[{}][]", key.trim()), value.trim().to_string()));
    }
    if args.exclude_closed {
        params.push(("include_closed".to_string(), "false".to_string()));
    }
    if args.with_closed_versions {
        params.push(("exclude_closed_versions".to_string(), "false".to_string()));
    }
    let sort_flags = [
        ("sort_options[epic][sort_by]", &args.epic_sort),
        ("sort_options[epic][sort_direction]", &args.epic_direction),
        ("sort_options[version][sort_by]", &args.version_sort),
        ("sort_options[version][sort_direction]", &args.version_direction),
    ];
    for (name, value) in sort_flags {
        if let Some(value) = value {
            params.push((name.to_string(), value.clone()));
        }
    }
    Ok(params)
}

pub fn grid_query_or_exit(args: &GridArgs, config: &EpicgridConfig) -> GridQuery {
    let query = grid_params(args).and_then(|params| {
        GridQuery::from_params(&params, config).map_err(|e| e.to_string())
    });
    query.unwrap_or_else(|e| {
        eprintln!("error: {e}");
        process::exit(1);
    })
}

pub fn parse_date_or_exit(flag: &str, value: &str) -> NaiveDate {
    value.parse().unwrap_or_else(|e| {
        eprintln!("error: invalid {flag} `{value}`: {e}");
        process::exit(1);
    })
}

pub fn print_json(value: &impl Serialize) {
    let rendered = serde_json::to_string_pretty(value).unwrap_or_else(|e| {
        eprintln!("error: failed to render json: {e}");
        process::exit(2);
    });
    println!("{rendered}");
}
