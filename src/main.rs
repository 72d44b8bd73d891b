use std::path::Path;

use anyhow::Context;
use clap::Parser;

mod app;
mod classify;
mod cli;
mod config;
mod history;
mod identity;
mod lock;
mod patterns;
mod query;
mod records;
mod semantic;
mod stats;
mod storage;
mod tags;
#[cfg(test)]
mod tests;
mod web;

use app::{AppFactory, AppPaths};
use cli::Command;

fn init_logging() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}

fn run_daemon(paths: &AppPaths, listen: Option<String>) -> anyhow::Result<()> {
    let _lock = lock::FileLock::try_acquire(Path::new(&paths.base_path))
        .context("Another histag daemon or command is using this data directory")?;

    let config = AppFactory::create_config(&paths.base_path)?;
    let listen = match listen {
        Some(listen) => listen,
        None => config
            .read()
            .map_err(|err| anyhow::anyhow!("config lock poisoned: {err}"))?
            .listen
            .clone(),
    };

    let app = AppFactory::create_local_app_with(paths, config)?;
    web::start_daemon(app, &listen)
}

fn run_command(paths: &AppPaths, command: Command) -> anyhow::Result<()> {
    let _lock = lock::LockGuard::acquire_if_local(Path::new(&paths.base_path))?;
    let app = AppFactory::create_backend(paths)?;

    match command {
        Command::Daemon { .. } => anyhow::bail!("the daemon does not run as a client command"),
        Command::Visit { title, url, time } => cli::handle_visit(title, url, time, app),
        Command::Classify { title, url } => cli::handle_classify(title, url, app),
        Command::Search { query, min_score } => cli::handle_search(query, min_score, app),
        Command::Recommend { query, limit } => cli::handle_recommend(query, limit, app),
        Command::History {
            id,
            tags,
            limit,
            count,
        } => cli::handle_history(id, tags, limit, count, app),
        Command::Tags {} => cli::handle_tags(app),
        Command::Stats {} => cli::handle_stats(app),
        Command::Labels { set } => cli::handle_labels(set, app),
        Command::Import { file } => cli::handle_import(file, app),
    }
}

fn main() -> anyhow::Result<()> {
    init_logging();

    let args = cli::Args::parse();
    let paths = AppFactory::get_paths()?;

    match args.command {
        Command::Daemon { listen } => run_daemon(&paths, listen),
        command => run_command(&paths, command),
    }
}
