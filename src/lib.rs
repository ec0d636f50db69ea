// src/lib.rs

pub mod cli;
pub mod config;
pub mod coordinator;
pub mod errors;
pub mod event;
pub mod exec;
pub mod logging;
pub mod notify;
pub mod pipeline;
pub mod registry;
pub mod server;
pub mod sync;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::config::{ConfigFile, load_and_validate};
use crate::coordinator::{Coordinator, EngineContext};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading
/// - engine context (registry, runner, notifier, sync command)
/// - coordinator
/// - HTTP server
/// - Ctrl-C handling (graceful shutdown, then kill every tracked process)
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);
    let cfg = load_and_validate(&config_path)
        .with_context(|| format!("loading config from {:?}", config_path))?;

    if args.dry_run {
        print_dry_run(&cfg);
        return Ok(());
    }

    let bind = cfg.server.bind.clone();
    let notifier = notify::from_config(&cfg.notify);
    let ctx = Arc::new(EngineContext::new(cfg, notifier)?);
    let registry = Arc::clone(&ctx.registry);
    let coordinator = Arc::new(Coordinator::new(ctx));

    let listener = TcpListener::bind(&bind)
        .await
        .with_context(|| format!("binding {bind}"))?;

    info!(%bind, "hookdeploy started");
    server::serve(coordinator, listener, shutdown_signal()).await?;

    info!("server stopped; terminating tracked processes");
    let cleared = registry.clear_all().await;
    if let Some(err) = &cleared.last_error {
        warn!(error = %err, "not every tracked process could be killed");
    }
    info!(killed = cleared.killed, "tracked processes terminated");

    info!("hookdeploy exiting");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        eprintln!("failed to listen for Ctrl+C: {e}");
        // Without a signal handler, never trigger shutdown.
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}

/// Simple dry-run output: print server settings, projects and their scripts.
fn print_dry_run(cfg: &ConfigFile) {
    println!("hookdeploy dry-run");
    println!("  server.bind = {}", cfg.server.bind);
    println!("  server.hooks_path = {}", cfg.server.hooks_path);
    println!(
        "  notify.url = {}",
        cfg.notify.url.as_deref().unwrap_or("(none, log only)")
    );
    println!("  deploy.root = {}", cfg.deploy.root_dir().display());
    println!("  deploy.sync_command = {}", cfg.deploy.sync_command);
    println!();

    println!("projects ({}):", cfg.projects.len());
    for project in cfg.projects.iter() {
        println!("  - {}", project.path);
        println!("      workdir: {}", cfg.workdir_for(project).display());
        for script in project.scripts.iter() {
            let mode = if script.wait { "wait" } else { "no-wait" };
            println!("      [{mode}] {}", script.cmd);
        }
    }

    debug!("dry-run complete (no execution)");
}
