use std::io;
use std::path::Path;

use anyhow::{Context, anyhow};
use tracing::{debug, info, instrument};

use crate::cli::Invocation;
use crate::config::Config;
use crate::document::{load_competition, write_json_atomic};
use crate::filter::Filter;
use crate::render::Renderer;
use crate::timetable::{DayBucket, Timetable};

pub fn known_command_names() -> Vec<&'static str> {
    vec![
        "schedule", "days", "day", "rooms", "export", "_show", "help", "version",
    ]
}

pub fn needs_document(command: &str) -> bool {
    !matches!(command, "help" | "version" | "_show")
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

#[instrument(skip(cfg, renderer, inv))]
pub fn dispatch(cfg: &Config, renderer: &mut Renderer, inv: Invocation) -> anyhow::Result<()> {
    let command = inv.command.as_str();
    debug!(
        command,
        document = ?inv.document,
        filter = ?inv.filter_terms,
        args = ?inv.command_args,
        "dispatching command"
    );

    match command {
        "help" => return cmd_help(),
        "version" => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        "_show" => return cmd_show(cfg),
        _ => {}
    }

    let document = inv
        .document
        .as_deref()
        .ok_or_else(|| anyhow!("missing competition document path"))?;
    let timetable = build_timetable(cfg, document, &inv.filter_terms)?;

    match command {
        "schedule" => renderer.print_timetable(&timetable),
        "days" => renderer.print_day_labels(&timetable),
        "day" => {
            let day = select_day(&timetable, &inv.command_args)?;
            renderer.print_day(&timetable, day)
        }
        "rooms" => renderer.print_rooms(&timetable),
        "export" => cmd_export(&timetable, &inv.command_args),
        other => Err(anyhow!("unknown command: {other}")),
    }
}

#[instrument(skip(cfg, filter_terms))]
fn build_timetable(
    cfg: &Config,
    document: &Path,
    filter_terms: &[String],
) -> anyhow::Result<Timetable> {
    let competition = load_competition(document)?;
    let options = cfg.timetable_options()?;
    let filter = Filter::parse(filter_terms).context("invalid filter expression")?;

    let mut timetable = Timetable::materialize(&competition, &options);
    if !filter.is_empty() {
        timetable.retain(|activity| filter.matches(activity));
    }
    Ok(timetable)
}

/// Picks a day by 1-based position, exact label, or unique case-insensitive
/// fragment of a label.
pub fn select_day<'a>(timetable: &'a Timetable, args: &[String]) -> anyhow::Result<&'a DayBucket> {
    let query = args.join(" ");
    let query = query.trim();
    if query.is_empty() {
        return Err(anyhow!("day requires a day number or label"));
    }

    let days = timetable.days();
    if let Ok(position) = query.parse::<usize>() {
        return position
            .checked_sub(1)
            .and_then(|idx| days.get(idx))
            .ok_or_else(|| anyhow!("no day number {position}; schedule has {} days", days.len()));
    }

    if let Some(day) = timetable.day(query) {
        return Ok(day);
    }

    let needle = query.to_lowercase();
    let mut candidates = days
        .iter()
        .filter(|day| day.label.to_lowercase().contains(&needle));
    match (candidates.next(), candidates.next()) {
        (Some(day), None) => Ok(day),
        (None, _) => Err(anyhow!("no scheduled day matches: {query}")),
        (Some(_), Some(_)) => Err(anyhow!("day query is ambiguous: {query}")),
    }
}

#[instrument(skip(timetable))]
fn cmd_export(timetable: &Timetable, args: &[String]) -> anyhow::Result<()> {
    match args.first() {
        Some(path) => {
            let path = Path::new(path);
            write_json_atomic(path, timetable)
                .with_context(|| format!("failed to export timetable to {}", path.display()))?;
            info!(path = %path.display(), days = timetable.days().len(), "exported timetable");
            Ok(())
        }
        None => {
            let stdout = io::stdout().lock();
            serde_json::to_writer_pretty(stdout, timetable)?;
            println!();
            Ok(())
        }
    }
}

fn cmd_show(cfg: &Config) -> anyhow::Result<()> {
    let mut entries: Vec<_> = cfg.iter().collect();
    entries.sort();
    for (key, value) in entries {
        println!("{key}={value}");
    }
    for file in &cfg.loaded_files {
        println!("# loaded {}", file.display());
    }
    Ok(())
}

fn cmd_help() -> anyhow::Result<()> {
    println!(
        "usage: compsched [-v|-q] [--rc key=value] [--rcfile path] [rc.key=value] <document|-> [filter...] [command] [args...]\n\n\
         commands:\n  \
           schedule           every day with its activities (default)\n  \
           days               day labels in order\n  \
           day <n|label>      one day, by 1-based number or label fragment\n  \
           rooms              activities grouped by room\n  \
           export [path]      timetable as JSON to stdout or path\n  \
           _show              effective configuration\n  \
           help | version\n\n\
         filters:\n  \
           event:333 round:1 group:2 room:<text> venue:<text> day:<text> <text>\n  \
           terms combine with implicit and, 'and', 'or' and parentheses"
    );
    Ok(())
}
