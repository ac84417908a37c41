use std::fmt::Write as _;
use std::path::Path;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use serde_json::Value;
use slim_export::{DEFAULT_TITLE, ExportFormat, export_items, snapshot};
use slim_host::{MemoryTree, Transcript, preview};
use slim_scheduler::{ManualClock, Session};
use slim_types::{KeepLast, Settings};
use slim_window::{Item, SettingsStore};
use tracing::info;

use crate::cli::{Cli, Command, ConfigAction};
use crate::simulate;

const PREVIEW_CHARS: usize = 60;

pub(crate) type CliSession = Session<MemoryTree, ManualClock>;

/// Run one parsed command and return what it prints.
pub async fn run(cli: Cli) -> Result<String> {
    let store = settings_store(cli.conf.as_deref());
    match cli.command {
        Command::Apply {
            transcript,
            keep_last,
            force,
            json,
        } => apply(&store, &transcript, keep_last, force, json),
        Command::Export {
            transcript,
            format,
            select,
            keep_last,
            out,
        } => export(&store, &transcript, format.into(), &select, keep_last, &out),
        Command::Snapshot { transcript, out } => write_snapshot(&store, &transcript, &out),
        Command::Simulate {
            transcript,
            interval_ms,
            tick_ms,
            keep_last,
            realtime,
        } => {
            let (transcript, settings) = load_inputs(&store, &transcript, keep_last)?;
            let options = simulate::SimulateOptions {
                interval_ms,
                tick_ms: tick_ms.max(1),
            };
            if realtime {
                simulate::realtime(transcript, settings, options).await
            } else {
                Ok(simulate::manual(&transcript, settings, options))
            }
        }
        Command::Config { action } => config(&store, action),
    }
}

fn settings_store(conf: Option<&Path>) -> SettingsStore {
    conf.map_or_else(SettingsStore::at_default_path, |dir| {
        SettingsStore::new(dir.join("settings.json"))
    })
}

pub(crate) fn load_inputs(
    store: &SettingsStore,
    path: &Path,
    keep_last: Option<i64>,
) -> Result<(Transcript, Settings)> {
    let transcript = Transcript::load(path)
        .with_context(|| format!("failed to load transcript {}", path.display()))?;
    let mut settings = store.load();
    if let Some(keep_last) = keep_last {
        settings.retention.keep_last = KeepLast::new(keep_last);
    }
    Ok((transcript, settings))
}

fn title_of(transcript: &Transcript) -> &str {
    let title = transcript.title.trim();
    if title.is_empty() { DEFAULT_TITLE } else { title }
}

fn open_session(transcript: &Transcript, settings: Settings) -> CliSession {
    let tree = MemoryTree::from_transcript(transcript);
    let mut session = Session::new(tree, ManualClock::default()).with_settings(settings);
    session.start();
    session
}

fn apply(
    store: &SettingsStore,
    path: &Path,
    keep_last: Option<i64>,
    force: bool,
    json: bool,
) -> Result<String> {
    let (transcript, settings) = load_inputs(store, path, keep_last)?;
    let mut session = open_session(&transcript, settings);
    if force {
        session.soft_hide();
    }
    let report = session.on_idle();
    session.refresh_overlays();
    let stats = session.stats();

    if json {
        let value = serde_json::json!({ "report": report, "stats": stats });
        return serde_json::to_string_pretty(&value).context("failed to encode apply report");
    }

    let mut out = String::new();
    let _ = writeln!(out, "# {}", title_of(&transcript));
    for item in session.items() {
        let _ = writeln!(out, "{}", layout_line(&session, &item));
    }
    if report.is_none() {
        let _ = writeln!(out, "(auto-apply is off; nothing collapsed)");
    }
    let _ = write!(out, "{stats}");
    Ok(out)
}

fn layout_line(session: &CliSession, item: &Item) -> String {
    let placeholder = item
        .token()
        .and_then(|token| session.window().registry().get(token));
    match placeholder {
        Some(token) => format!("{:>3}  ~ {}", item.index + 1, token.view.label()),
        None => format!(
            "{:>3}  {}: {}",
            item.index + 1,
            item.role.label(),
            preview(session.tree(), item.node, PREVIEW_CHARS)
        ),
    }
}

fn export(
    store: &SettingsStore,
    path: &Path,
    format: ExportFormat,
    select: &[usize],
    keep_last: Option<i64>,
    out: &Path,
) -> Result<String> {
    let (transcript, settings) = load_inputs(store, path, keep_last)?;
    let mut session = open_session(&transcript, settings);
    let items = session.items();
    for &number in select {
        let Some(item) = number.checked_sub(1).and_then(|index| items.get(index)) else {
            bail!("turn {number} is out of range (1..={})", items.len());
        };
        session.set_selected(item.id, true);
    }
    session.on_idle();

    let chosen = session.selected_items();
    let export = export_items(session.tree(), &chosen, title_of(&transcript), format, Utc::now())?;
    let written = export.write_to(out)?;
    info!(path = %written.display(), turns = chosen.len(), "export written");
    Ok(format!("wrote {} ({} turns)", written.display(), chosen.len()))
}

fn write_snapshot(store: &SettingsStore, path: &Path, out: &Path) -> Result<String> {
    let (transcript, settings) = load_inputs(store, path, None)?;
    let mut session = open_session(&transcript, settings);
    session.on_idle();
    session.expand_all();
    let items = session.items();
    let export = snapshot(session.tree(), &items, title_of(&transcript), Utc::now());
    let written = export.write_to(out)?;
    info!(path = %written.display(), turns = items.len(), "snapshot written");
    Ok(format!("wrote {} ({} turns)", written.display(), items.len()))
}

fn config(store: &SettingsStore, action: ConfigAction) -> Result<String> {
    match action {
        ConfigAction::Show => show_settings(store.path(), &store.load()),
        ConfigAction::Set { key, value } => {
            let settings = set_key(store.load(), &key, &value)?;
            store.save(&settings)?;
            show_settings(store.path(), &settings)
        }
    }
}

fn show_settings(path: &Path, settings: &Settings) -> Result<String> {
    let json = serde_json::to_string_pretty(settings).context("failed to encode settings")?;
    Ok(format!("{}\n{json}", path.display()))
}

/// Replace one camelCase key. Values parse as JSON first, then as a bare string.
fn set_key(settings: Settings, key: &str, raw: &str) -> Result<Settings> {
    let mut document = serde_json::to_value(&settings).context("failed to encode settings")?;
    let Some(fields) = document.as_object_mut() else {
        bail!("settings did not encode as an object");
    };
    if !fields.contains_key(key) {
        let known: Vec<&str> = fields.keys().map(String::as_str).collect();
        bail!("unknown setting `{key}` (expected one of: {})", known.join(", "));
    }
    let value = serde_json::from_str::<Value>(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
    fields.insert(key.to_string(), value);
    serde_json::from_value(document).with_context(|| format!("invalid value for `{key}`: {raw}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_key_updates_known_fields() {
        let settings = set_key(Settings::default(), "keepLast", "3").unwrap();
        assert_eq!(settings.retention.keep(), 3);
        let settings = set_key(settings, "autoApply", "false").unwrap();
        assert!(!settings.retention.auto_apply);
        let settings = set_key(settings, "keepLast", "12px").unwrap();
        assert_eq!(settings.retention.keep(), 12);
    }

    #[test]
    fn test_set_key_rejects_unknown_and_invalid() {
        let err = set_key(Settings::default(), "colour", "red").unwrap_err();
        assert!(err.to_string().contains("unknown setting"));
        assert!(set_key(Settings::default(), "reduceMotion", "maybe").is_err());
    }
}
