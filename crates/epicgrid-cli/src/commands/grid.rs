use crate::cli::{GridArgs, SourceArgs};
use crate::support::{grid_query_or_exit, load_config_or_exit, load_project_or_exit, print_json};
use epicgrid_index::{GridPayload, ResponseStamp, present_grid};
use std::collections::BTreeMap;

pub fn build_payload(source: &SourceArgs, grid: &GridArgs) -> GridPayload {
    let config = load_config_or_exit(source);
    let project = load_project_or_exit(source);
    let query = grid_query_or_exit(grid, &config);
    present_grid(
        &project,
        &query.request(&config),
        query.include_closed,
        &ResponseStamp::now(),
    )
}

fn subject<'a, T>(
    map: &'a BTreeMap<String, T>,
    id: &str,
    get: impl Fn(&'a T) -> &'a str,
) -> &'a str {
    map.get(id).map(get).unwrap_or("?")
}

pub fn run(source: SourceArgs, grid: GridArgs, json_output: bool) {
    let payload = build_payload(&source, &grid);
    if json_output {
        print_json(&payload);
        return;
    }

    let entities = &payload.entities;
    let index = &payload.grid;
    println!("epicgrid grid");
    println!("  Source: {}", source.data);
    println!("  Project: {}", payload.metadata.project.name);
    println!("  Versions: {}", index.version_order.join(", "));
    println!("  Epics: {}", index.epic_order.len());
    for epic_id in &index.epic_order {
        println!(
            "  Epic {epic_id} {}",
            subject(&entities.epics, epic_id, |e| e.fields.subject.as_str())
        );
        let features = index
            .feature_order_by_epic
            .get(epic_id)
            .map(Vec::as_slice)
            .unwrap_or(&[]);
        for feature_id in features {
            println!(
                "    Feature {feature_id} {}",
                subject(&entities.features, feature_id, |f| f.fields.subject.as_str())
            );
            for version_id in &index.version_order {
                let key = format!("{epic_id}:{feature_id}:{version_id}");
                if let Some(stories) = index.index.get(&key) {
                    println!("      [{version_id}] {}", stories.join(", "));
                }
            }
        }
    }
}
