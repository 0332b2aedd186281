//! `scenario-check` — Runs the consistency checker on a charm, a state and an event.
//!
//! The state is read from JSON, TOML or YAML (by file extension); the event
//! is named the way Juju names hooks (`config-changed`, `db-relation-joined`,
//! `secret-remove`) and its linkage comes from flags.
//!
//! **Usage:**
//! ```
//! scenario-check --charm-dir <dir> [--state <file>] --event <name> [--relation-id N] ...
//! scenario-check --charm-dir <dir> [--state <file>] --action <name> [--param key=value]...
//! ```
//!
//! Exits non-zero if any check fails.

#![deny(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    missing_docs,
    clippy::missing_errors_doc
)]

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use scenario_consistency::{run_all, Scenario, Severity};
use scenario_state::{ActionEvent, ActionId, CharmSpec, Event, JujuVersion, State, Storage};
use serde_json::Value;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Check a scenario for consistency without running the charm.
#[derive(Parser)]
#[command(
    name = "scenario-check",
    about = "Check that a charm, state and event describe something Juju could do"
)]
struct Args {
    /// Charm directory holding metadata.yaml or charmcraft.yaml.
    #[arg(long, default_value = ".")]
    charm_dir: PathBuf,

    /// State document (.json, .toml, .yaml); an empty state when omitted.
    #[arg(long)]
    state: Option<PathBuf>,

    /// Event name, e.g. `start` or `db-relation-changed`.
    #[arg(long, conflicts_with = "action", required_unless_present = "action")]
    event: Option<String>,

    /// Relation the event is about.
    #[arg(long)]
    relation_id: Option<u32>,

    /// Remote unit id for relation events.
    #[arg(long)]
    remote_unit: Option<u32>,

    /// Departing unit id for relation-departed.
    #[arg(long)]
    departing_unit: Option<u32>,

    /// Container for workload events.
    #[arg(long)]
    container: Option<String>,

    /// Pebble check for check events.
    #[arg(long)]
    check: Option<String>,

    /// Notice id for custom-notice events.
    #[arg(long)]
    notice_id: Option<u32>,

    /// Storage for storage events, as NAME/INDEX.
    #[arg(long)]
    storage: Option<String>,

    /// Secret id for secret events.
    #[arg(long)]
    secret: Option<String>,

    /// Secret revision for secret-expired and secret-remove.
    #[arg(long)]
    revision: Option<u32>,

    /// Action to check instead of an event.
    #[arg(long)]
    action: Option<String>,

    /// Action parameter as key=value; the value is read as JSON when it parses.
    #[arg(long = "param", value_parser = parse_param)]
    params: Vec<(String, Value)>,

    /// Juju version to simulate.
    #[arg(long, default_value_t = JujuVersion::default())]
    juju_version: JujuVersion,

    /// This unit's id.
    #[arg(long, default_value_t = 0)]
    unit_id: u32,

    /// Log at debug level.
    #[arg(short, long)]
    verbose: bool,
}

fn parse_param(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got {raw}"))?;
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::from(value));
    Ok((key.to_string(), value))
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_state(path: &Path) -> Result<State> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read state: {}", path.display()))?;
    let state = match path.extension().and_then(|e| e.to_str()) {
        Some("toml") => toml::from_str(&text)
            .with_context(|| format!("Failed to parse TOML state: {}", path.display()))?,
        Some("yaml" | "yml") => serde_yaml::from_str(&text)
            .with_context(|| format!("Failed to parse YAML state: {}", path.display()))?,
        _ => serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse JSON state: {}", path.display()))?,
    };
    Ok(state)
}

/// Builds the event from its hook name and the linkage flags, the same way
/// a deferred event is rebuilt from its snapshot.
fn build_event(args: &Args, state: &State) -> Result<Event> {
    if let Some(action) = &args.action {
        return Ok(Event::Action(ActionEvent {
            name: action.clone(),
            id: ActionId(1),
            params: args.params.iter().cloned().collect(),
        }));
    }
    let name = args
        .event
        .as_deref()
        .ok_or_else(|| anyhow!("either --event or --action is required"))?
        .replace('-', "_");

    let mut snapshot = BTreeMap::new();
    if let Some(id) = args.relation_id {
        let relation = state
            .get_relation(scenario_state::RelationId(id))
            .with_context(|| format!("--relation-id {id} is not in the state"))?;
        snapshot.insert("relation_name".to_string(), Value::from(relation.endpoint()));
        snapshot.insert("relation_id".to_string(), Value::from(id));
    }
    for (key, value) in [
        ("unit_id", args.remote_unit),
        ("departing_unit_id", args.departing_unit),
        ("revision", args.revision),
    ] {
        if let Some(value) = value {
            snapshot.insert(key.to_string(), Value::from(value));
        }
    }
    if let Some(container) = &args.container {
        snapshot.insert("container_name".to_string(), Value::from(container.as_str()));
        if let Some(id) = args.notice_id {
            let notice = state
                .get_container(container)?
                .get_notice(scenario_state::NoticeId(id))?;
            snapshot.insert("notice_id".to_string(), Value::from(id));
            snapshot.insert("notice_key".to_string(), Value::from(notice.key.as_str()));
        }
    }
    if let Some(check) = &args.check {
        snapshot.insert("check_name".to_string(), Value::from(check.as_str()));
    }
    if let Some(storage) = &args.storage {
        let (name, index) = Storage::parse_id(storage)
            .ok_or_else(|| anyhow!("--storage expects NAME/INDEX, got {storage}"))?;
        snapshot.insert("storage_name".to_string(), Value::from(name));
        snapshot.insert("storage_index".to_string(), Value::from(index));
    }
    if let Some(secret) = &args.secret {
        snapshot.insert("id".to_string(), Value::from(secret.as_str()));
    }

    let event = Event::restore(&name, &snapshot)?;
    if event.is_custom() {
        warn!(event = %name, "not a Juju event name; checking it as a custom event");
    }
    Ok(event)
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let spec = CharmSpec::autoload(&args.charm_dir)
        .with_context(|| format!("Failed to load charm metadata from {}", args.charm_dir.display()))?;
    let state = match &args.state {
        Some(path) => load_state(path)?,
        None => State::default(),
    };
    let event = build_event(&args, &state)?;
    debug!(event = %event, charm = %spec.meta.name, "checking scenario");

    let scenario =
        Scenario::new(&spec, &state, &event, &args.juju_version).with_unit_id(args.unit_id);
    let report = run_all(&scenario);

    println!("Scenario Consistency Report: {} / {}", spec.meta.name, event.name());
    println!("==============================");
    println!();

    let mut passed = 0usize;
    let mut failed = 0usize;
    let mut warned = 0usize;

    for finding in &report.findings {
        let status = match finding.severity {
            Severity::Pass => {
                passed += 1;
                "PASS"
            }
            Severity::Warning => {
                warned += 1;
                "WARN"
            }
            Severity::Failure => {
                failed += 1;
                "FAIL"
            }
        };
        println!("[{}] {}: {}", status, finding.validator, finding.message);
        for detail in &finding.details {
            println!("       {}", detail);
        }
    }

    println!();
    println!("Summary: {} passed, {} warnings, {} failed", passed, warned, failed);
    info!(passed, warned, failed, "consistency check finished");

    if failed > 0 {
        eprintln!("Scenario is INCONSISTENT: {} check(s) did not pass.", failed);
        process::exit(1);
    }

    println!("Scenario is consistent.");
    Ok(())
}
