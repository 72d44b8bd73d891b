use crate::{
    app::{AppBackend, HistoryQuery, Visit},
    cli::errors::CliResult,
};
use anyhow::Result;
use serde::Serialize;

use super::validation::*;

fn print_json<T: Serialize>(value: &T) -> CliResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn now_ms() -> f64 {
    chrono::Utc::now().timestamp_millis() as f64
}

pub fn handle_visit(
    title: String,
    url: String,
    time: Option<f64>,
    app: Box<dyn AppBackend>,
) -> Result<()> {
    let run = || -> CliResult<()> {
        validate_title(&title)?;
        let last_visit_time = time.unwrap_or_else(now_ms);
        validate_visit_time(last_visit_time)?;

        let outcome = app.visit(Visit {
            title,
            url,
            last_visit_time,
        })?;

        if outcome.entry.is_none() {
            eprintln!("classifier unavailable, only the visit time was recorded");
        }
        print_json(&outcome)
    };

    run().map_err(|e| anyhow::anyhow!(e))
}

pub fn handle_classify(title: String, url: String, app: Box<dyn AppBackend>) -> Result<()> {
    let run = || -> CliResult<()> {
        validate_title(&title)?;
        print_json(&app.classify(&title, &url)?)
    };

    run().map_err(|e| anyhow::anyhow!(e))
}

pub fn handle_search(query: String, min_score: Option<f32>, app: Box<dyn AppBackend>) -> Result<()> {
    let run = || -> CliResult<()> {
        validate_min_score(min_score)?;
        print_json(&app.simi_search(&query, min_score)?)
    };

    run().map_err(|e| anyhow::anyhow!(e))
}

pub fn handle_recommend(
    query: Option<String>,
    limit: Option<usize>,
    app: Box<dyn AppBackend>,
) -> Result<()> {
    let entries = app.recommend(query, limit)?;
    print_json(&entries).map_err(|e| anyhow::anyhow!(e))
}

pub fn handle_history(
    id: Option<u32>,
    tags: Option<String>,
    limit: Option<usize>,
    count: bool,
    app: Box<dyn AppBackend>,
) -> Result<()> {
    let run = || -> CliResult<()> {
        if let Some(id) = id {
            return print_json(&app.entry(id)?);
        }

        let entries = app.history(HistoryQuery {
            tags: tags.as_deref().map(parse_list).unwrap_or_default(),
            limit,
        })?;

        if count {
            println!("{} pages found", entries.len());
            return Ok(());
        }

        print_json(&entries)
    };

    run().map_err(|e| anyhow::anyhow!(e))
}

pub fn handle_tags(app: Box<dyn AppBackend>) -> Result<()> {
    let counts = app.tag_counts()?;
    print_json(&counts).map_err(|e| anyhow::anyhow!(e))
}

pub fn handle_stats(app: Box<dyn AppBackend>) -> Result<()> {
    let stats = app.stats()?;
    print_json(&stats).map_err(|e| anyhow::anyhow!(e))
}

pub fn handle_labels(set: Option<String>, app: Box<dyn AppBackend>) -> Result<()> {
    let labels = match set {
        Some(set) => app.set_labels(parse_list(&set))?,
        None => app.labels()?,
    };

    print_json(&labels).map_err(|e| anyhow::anyhow!(e))
}

pub fn handle_import(file: String, app: Box<dyn AppBackend>) -> Result<()> {
    let run = || -> CliResult<()> {
        let content = std::fs::read_to_string(&file)?;
        let visits = parse_visits(&content)?;
        log::info!("read {} visits from {file}", visits.len());

        print_json(&app.import(visits)?)
    };

    run().map_err(|e| anyhow::anyhow!(e))
}
