use crate::cli::{GridArgs, SourceArgs};
use crate::commands::grid::build_payload;
use crate::support::print_json;
use epicgrid_board::{Board, BoardAction};
use serde_json::json;
use std::fs;
use std::process;

fn load_actions_or_exit(path: &str) -> Vec<BoardAction> {
    let text = fs::read_to_string(path).unwrap_or_else(|e| {
        eprintln!("error: failed to read {path}: {e}");
        process::exit(1);
    });
    serde_json::from_str(&text).unwrap_or_else(|e| {
        eprintln!("error: invalid board actions in {path}: {e}");
        process::exit(1);
    })
}

pub fn run(source: SourceArgs, grid: GridArgs, actions: String, json_output: bool) {
    let actions = load_actions_or_exit(&actions);
    tracing::debug!(count = actions.len(), "loaded board actions");
    let payload = build_payload(&source, &grid);
    let mut board = Board::from_payload(&payload);

    let outcomes: Vec<String> = actions
        .iter()
        .map(|action| format!("{} {}", action.name(), board.apply(action)))
        .collect();

    if json_output {
        print_json(&json!({
            "outcomes": outcomes,
            "epic_order": board.epic_order,
            "version_order": board.version_order,
            "feature_cells": board.feature_cells(),
            "index": board.grid_index(),
        }));
        return;
    }

    println!("epicgrid board");
    println!("  Actions: {}", actions.len());
    for outcome in &outcomes {
        println!("    {outcome}");
    }
    println!("  Epic order: {}", board.epic_order.join(", "));
    println!("  Version order: {}", board.version_order.join(", "));
    for (cell, features) in board.feature_cells() {
        if !features.is_empty() {
            println!("  [{cell}] {}", features.join(", "));
        }
    }
}
