//! Epicgrid CLI: the `epicgrid` command.

mod cli;
mod commands;
mod support;

use clap::Parser;
use cli::{Cli, Commands};

fn main() {
    let cli = Cli::parse();
    support::init_tracing(cli.log_json);

    match cli.command {
        Commands::Grid { source, grid, json } => commands::grid::run(source, grid, json),

        Commands::Stats {
            source,
            scope,
            id,
            today,
            json,
        } => commands::stats::run(source, scope, id, today, json),

        Commands::Check { source, json } => commands::check::run(source, json),

        Commands::Board {
            source,
            grid,
            actions,
            json,
        } => commands::board::run(source, grid, actions, json),

        Commands::Serve { source, bind } => commands::serve::run(source, bind),
    }
}
