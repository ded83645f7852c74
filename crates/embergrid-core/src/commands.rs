use std::io::{self, Read};

use anyhow::{Context, anyhow};
use chrono::NaiveDate;
use serde_json::Value;
use tracing::{debug, info, instrument};

use crate::cli::Invocation;
use crate::config::Config;
use crate::datastore::ActivityStore;
use crate::datetime::parse_date_expr;
use crate::grid;
use crate::record::ActivityRecord;
use crate::render::Renderer;

pub fn known_command_names() -> Vec<&'static str> {
    vec![
        "show", "add", "log", "import", "export", "summary", "config", "help", "version",
    ]
}

pub fn expand_command_abbrev<'a>(token: &'a str, known: &[&'a str]) -> Option<&'a str> {
    if known.contains(&token) {
        return Some(token);
    }

    let mut matches = known.iter().copied().filter(|name| name.starts_with(token));
    let first = matches.next()?;
    if matches.next().is_some() {
        None
    } else {
        Some(first)
    }
}

#[instrument(skip(store, cfg, renderer, inv))]
pub fn dispatch(
    store: &mut ActivityStore,
    cfg: &Config,
    renderer: &mut Renderer,
    inv: Invocation,
    today: NaiveDate,
) -> anyhow::Result<()> {
    debug!(
        command = %inv.command,
        args = ?inv.command_args,
        %today,
        "dispatching command"
    );

    match inv.command.as_str() {
        "show" => cmd_show(store, cfg, renderer, today),
        "add" => cmd_add(store, &inv.command_args, today),
        "log" => cmd_log(store, &inv.command_args, today),
        "import" => cmd_import(store),
        "export" => cmd_export(store, cfg, today),
        "summary" => cmd_summary(store, cfg, renderer, today),
        "config" => cmd_config(cfg),
        "help" => cmd_help(),
        "version" => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        other => Err(anyhow!("unknown command: {other}")),
    }
}

#[instrument(skip(store, cfg, renderer))]
fn cmd_show(
    store: &mut ActivityStore,
    cfg: &Config,
    renderer: &mut Renderer,
    today: NaiveDate,
) -> anyhow::Result<()> {
    info!("command show");

    let records = store.load_records()?;
    let grid = grid::build(&records, today, &cfg.grid()?)?;

    // The builder never short-circuits; the empty state is this caller's
    // decision, keyed on the all-time total rather than the window.
    if grid.total_count == 0 {
        return renderer.print_empty_state();
    }
    renderer.print_grid(&grid)
}

#[instrument(skip(store, args))]
fn cmd_add(store: &mut ActivityStore, args: &[String], today: NaiveDate) -> anyhow::Result<()> {
    info!("command add");

    let (date_expr, count_raw) = match args {
        [date_expr, count_raw] => (date_expr.as_str(), count_raw.as_str()),
        _ => return Err(anyhow!("usage: add <date> <count>")),
    };

    let date = parse_date_expr(date_expr, today)?;
    let count: u64 = count_raw
        .parse()
        .with_context(|| format!("invalid count: {count_raw}"))?;

    store.append_records(vec![ActivityRecord::new(date, count)])?;
    println!("Recorded {count} events on {date}.");
    Ok(())
}

#[instrument(skip(store, args))]
fn cmd_log(store: &mut ActivityStore, args: &[String], today: NaiveDate) -> anyhow::Result<()> {
    info!("command log");

    let count_raw = match args {
        [count_raw] => count_raw.as_str(),
        _ => return Err(anyhow!("usage: log <count>")),
    };

    let count: u64 = count_raw
        .parse()
        .with_context(|| format!("invalid count: {count_raw}"))?;

    store.append_records(vec![ActivityRecord::new(today, count)])?;
    println!("Recorded {count} events on {today}.");
    Ok(())
}

/// Reads records from stdin: either a JSON array or one JSON object per
/// line, matching what the upstream activity-records provider emits.
#[instrument(skip(store))]
fn cmd_import(store: &mut ActivityStore) -> anyhow::Result<()> {
    info!("command import");

    let mut stdin = String::new();
    io::stdin()
        .read_to_string(&mut stdin)
        .context("failed reading stdin")?;

    let trimmed = stdin.trim();
    if trimmed.is_empty() {
        return Err(anyhow!("import: empty input"));
    }

    let incoming = parse_import_payload(trimmed)?;
    let count = incoming.len();
    let all = store.append_records(incoming)?;

    println!("Imported {count} records ({} total).", all.len());
    Ok(())
}

fn parse_import_payload(trimmed: &str) -> anyhow::Result<Vec<ActivityRecord>> {
    if trimmed.starts_with('[') {
        let value: Value = serde_json::from_str(trimmed).context("import: invalid JSON array")?;
        return serde_json::from_value(value).context("import: array entries are not records");
    }

    let mut out = Vec::new();
    for (idx, line) in trimmed.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let record: ActivityRecord = serde_json::from_str(line)
            .with_context(|| format!("import: invalid record on line {}", idx + 1))?;
        out.push(record);
    }
    Ok(out)
}

/// Machine surface for the out-of-process rendering layer: the complete
/// built grid as pretty JSON.
#[instrument(skip(store, cfg))]
fn cmd_export(store: &mut ActivityStore, cfg: &Config, today: NaiveDate) -> anyhow::Result<()> {
    info!("command export");

    let records = store.load_records()?;
    let built = grid::build(&records, today, &cfg.grid()?)?;
    let json = serde_json::to_string_pretty(&built).context("failed serializing grid")?;
    println!("{json}");
    Ok(())
}

#[instrument(skip(store, cfg, renderer))]
fn cmd_summary(
    store: &mut ActivityStore,
    cfg: &Config,
    renderer: &mut Renderer,
    today: NaiveDate,
) -> anyhow::Result<()> {
    info!("command summary");

    let records = store.load_records()?;
    let built = grid::build(&records, today, &cfg.grid()?)?;
    renderer.print_summary(&built)
}

#[instrument(skip(cfg))]
fn cmd_config(cfg: &Config) -> anyhow::Result<()> {
    let mut entries: Vec<(String, String)> = cfg
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    entries.sort();

    for (key, value) in entries {
        println!("{key}={value}");
    }
    Ok(())
}

fn cmd_help() -> anyhow::Result<()> {
    println!(
        "Implemented commands: show, add, log, import, export, summary, config, help, version"
    );
    Ok(())
}
