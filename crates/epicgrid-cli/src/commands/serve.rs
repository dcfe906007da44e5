use crate::cli::SourceArgs;
use crate::support::load_config_or_exit;
use epicgrid_http::http::{HttpServerConfig, serve_grid_api};
use epicgrid_http::{FileProjectSource, GridService, ProjectMembership};
use std::net::SocketAddr;
use std::process;

pub fn run(source: SourceArgs, bind: Option<String>) {
    let config = load_config_or_exit(&source);
    let bind = bind.unwrap_or_else(|| config.server.bind.clone());
    let bind_addr: SocketAddr = bind.parse().unwrap_or_else(|e| {
        eprintln!("error: invalid bind address `{bind}`: {e}");
        process::exit(1);
    });

    println!("epicgrid serve");
    println!("  bind: {bind_addr}");
    println!("  data: {}", source.data);
    println!("  routes:");
    println!("    GET /healthz");
    println!("    GET /grid?filters[<key>][]=<value>");
    println!("    GET /statistics[/epic|/feature|/user_story|/version?id=<id>]");

    let service = GridService::new(
        FileProjectSource::new(&source.data),
        ProjectMembership,
        config,
    );
    if let Err(e) = serve_grid_api(HttpServerConfig { bind: bind_addr }, &service) {
        eprintln!("error: grid API failed: {e}");
        process::exit(1);
    }
}
