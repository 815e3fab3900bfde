//! `ficha-kernel` diagnostic CLI
//!
//! Validate, migrate and recover ficha payloads, run the session simulator,
//! and export event logs.

use anyhow::{bail, Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use ficha_kernel::guard::FallbackScreen;
use ficha_kernel::recovery::Recovery;
use ficha_kernel::simulator::{run_simulator, SimulatorConfig};
use ficha_kernel::{FichaContext, FichaSession, KernelConfig};
use ficha_model::{FichaId, FichaState, Snapshot, SnapshotTrigger};
use ficha_validate::{check_all_invariants, validate_structure};
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn init_tracing(json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .try_init()?;
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init()?;
    }
    Ok(())
}

fn file_arg(name: &'static str, help: &'static str) -> Arg {
    Arg::new(name)
        .required(true)
        .value_parser(value_parser!(PathBuf))
        .help(help)
}

fn cli() -> Command {
    Command::new("ficha-kernel")
        .version(ficha_kernel::VERSION)
        .about("Ficha lifecycle and recovery kernel")
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("Kernel configuration file (TOML)"),
        )
        .arg(
            Arg::new("json-logs")
                .long("json-logs")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON"),
        )
        .subcommand(
            Command::new("validate")
                .about("Migrate and validate a ficha payload")
                .arg(file_arg("file", "Ficha JSON file"))
                .arg(
                    Arg::new("strict")
                        .long("strict")
                        .action(ArgAction::SetTrue)
                        .help("Enable strict validation"),
                ),
        )
        .subcommand(
            Command::new("migrate")
                .about("Migrate a ficha payload to the current schema")
                .arg(file_arg("file", "Ficha JSON file"))
                .arg(
                    Arg::new("output")
                        .long("output")
                        .short('o')
                        .value_parser(value_parser!(PathBuf))
                        .help("Write the migrated payload here instead of stdout"),
                ),
        )
        .subcommand(
            Command::new("recover")
                .about("Run the recovery pipeline for a ficha")
                .arg(
                    Arg::new("ficha-id")
                        .required(true)
                        .help("Ficha identifier"),
                )
                .arg(
                    Arg::new("state")
                        .long("state")
                        .value_parser(value_parser!(PathBuf))
                        .help("Current state to guard; recovery runs when it is invalid"),
                )
                .arg(
                    Arg::new("last-valid")
                        .long("last-valid")
                        .value_parser(value_parser!(PathBuf))
                        .help("Last known valid state"),
                )
                .arg(
                    Arg::new("snapshot")
                        .long("snapshot")
                        .action(ArgAction::Append)
                        .value_parser(value_parser!(PathBuf))
                        .help("Snapshot state, oldest first; repeatable"),
                ),
        )
        .subcommand(
            Command::new("simulate")
                .about("Run the seeded session simulator")
                .arg(
                    Arg::new("fichas")
                        .long("fichas")
                        .default_value("10")
                        .value_parser(value_parser!(u64))
                        .help("Number of fichas to simulate"),
                )
                .arg(
                    Arg::new("operations")
                        .long("operations")
                        .default_value("200")
                        .value_parser(value_parser!(u64))
                        .help("Operations per ficha"),
                )
                .arg(
                    Arg::new("seed")
                        .long("seed")
                        .default_value("42")
                        .value_parser(value_parser!(u64))
                        .help("Random seed for reproducibility"),
                )
                .arg(
                    Arg::new("stop-on-violation")
                        .long("stop-on-violation")
                        .action(ArgAction::SetTrue)
                        .help("Stop simulation on first violation"),
                ),
        )
        .subcommand(
            Command::new("export-log")
                .about("Guard a ficha payload and export its event log")
                .arg(file_arg("file", "Ficha JSON file"))
                .arg(
                    Arg::new("ndjson")
                        .long("ndjson")
                        .action(ArgAction::SetTrue)
                        .help("Export newline-delimited JSON"),
                ),
        )
}

fn read_json(path: &Path) -> Result<serde_json::Value> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

fn load_config(matches: &ArgMatches) -> Result<KernelConfig> {
    let config = match matches.get_one::<PathBuf>("config") {
        Some(path) => KernelConfig::load(path)?,
        None => KernelConfig::default(),
    };
    config.validate()?;
    Ok(config)
}

/// Migrate, then deserialize a payload into a state
fn load_state(context: &FichaContext, path: &Path) -> Result<FichaState> {
    let migrated = context.schema().migrate(read_json(path)?)?;
    let report = validate_structure(&migrated.value);
    if !report.valid {
        let issues: Vec<String> = report
            .critical()
            .map(|issue| format!("{}: {}", issue.field, issue.message))
            .collect();
        bail!("{} is not a ficha: {}", path.display(), issues.join("; "));
    }
    Ok(FichaState::from_value(migrated.value)?)
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn cmd_validate(config: KernelConfig, args: &ArgMatches) -> Result<bool> {
    let path = args.get_one::<PathBuf>("file").context("missing file")?;
    let mut config = config;
    if args.get_flag("strict") {
        config.validation = config.validation.with_strict_mode(true);
    }
    let context = FichaContext::new(config)?;

    let migrated = context.schema().migrate(read_json(path)?)?;
    let structural = validate_structure(&migrated.value);
    let mut output = serde_json::json!({
        "migration": migrated.record,
        "structural": structural,
    });
    if !structural.valid {
        print_json(&output)?;
        return Ok(false);
    }

    let state = FichaState::from_value(migrated.value)?;
    let business = context.validator().validate(&state);
    let invariants = check_all_invariants(&state);
    output["business"] = serde_json::to_value(&business)?;
    output["invariants"] = serde_json::to_value(&invariants)?;
    output["summary"] = serde_json::to_value(context.validator().summary(&state))?;
    output["canFinalize"] = serde_json::to_value(context.validator().can_finalize(&state))?;
    print_json(&output)?;
    Ok(business.valid && invariants.valid)
}

fn cmd_migrate(config: KernelConfig, args: &ArgMatches) -> Result<bool> {
    let path = args.get_one::<PathBuf>("file").context("missing file")?;
    let context = FichaContext::new(config)?;
    let migrated = context.schema().migrate(read_json(path)?)?;
    let text = serde_json::to_string_pretty(&migrated.value)?;
    match args.get_one::<PathBuf>("output") {
        Some(output) => std::fs::write(output, text)
            .with_context(|| format!("writing {}", output.display()))?,
        None => println!("{text}"),
    }
    match &migrated.record {
        Some(record) => eprintln!(
            "migrated v{} -> v{}: {}",
            record.from_version,
            record.to_version,
            record.changes.join(", ")
        ),
        None => eprintln!("already at the current schema version"),
    }
    Ok(true)
}

async fn cmd_recover(config: KernelConfig, args: &ArgMatches) -> Result<bool> {
    let ficha_id = FichaId::new(
        args.get_one::<String>("ficha-id")
            .context("missing ficha id")?
            .clone(),
    );
    let context = FichaContext::new(config)?;

    if let Some(path) = args.get_one::<PathBuf>("last-valid") {
        let state = load_state(&context, path)?;
        context.persist().set_last_valid(&ficha_id, &state);
    }
    for path in args.get_many::<PathBuf>("snapshot").into_iter().flatten() {
        let state = load_state(&context, path)?;
        context
            .snapshots()
            .save_snapshot(Snapshot::capture(&state, SnapshotTrigger::Manual));
    }

    match args.get_one::<PathBuf>("state") {
        Some(path) => {
            let state = load_state(&context, path)?;
            let outcome = context.guard().guard_state(&ficha_id, state).await;
            print_json(&outcome)?;
            if let Some(screen) = FallbackScreen::from_outcome(&ficha_id, &outcome) {
                eprintln!("{screen}");
            }
            Ok(outcome.is_valid())
        }
        None => {
            let result = context.recovery().recover(&ficha_id).await;
            print_json(&result)?;
            Ok(result.success)
        }
    }
}

async fn cmd_simulate(config: KernelConfig, args: &ArgMatches) -> Result<bool> {
    let sim = SimulatorConfig {
        seed: *args.get_one::<u64>("seed").context("missing --seed")?,
        fichas: *args.get_one::<u64>("fichas").context("missing --fichas")?,
        operations: *args
            .get_one::<u64>("operations")
            .context("missing --operations")?,
        stop_on_first_violation: args.get_flag("stop-on-violation"),
    };

    println!("Running ficha simulator...");
    println!("Fichas: {}", sim.fichas);
    println!("Operations: {}", sim.operations);
    println!("Seed: {}", sim.seed);
    println!();

    let context = FichaContext::new(config)?;
    let report = run_simulator(sim, &context).await;
    println!("{}", report.generate_text());
    Ok(report.passed())
}

async fn cmd_export_log(config: KernelConfig, args: &ArgMatches) -> Result<bool> {
    let path = args.get_one::<PathBuf>("file").context("missing file")?;
    let context = FichaContext::new(config)?;
    let state = load_state(&context, path)?;
    let ficha_id = state.id.clone();

    let session = FichaSession::open(&context, state);
    let report = context.validator().validate(session.state());
    session.events().log_validate(report.valid, &report.errors);
    let outcome = context
        .guard()
        .guard_state(&ficha_id, session.state().clone())
        .await;

    let events = session.events();
    let text = if args.get_flag("ndjson") {
        events.export_ndjson()?
    } else {
        events.export_json()?
    };
    println!("{text}");
    Ok(outcome.is_valid())
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli().get_matches();
    init_tracing(matches.get_flag("json-logs"))?;
    let config = load_config(&matches)?;

    let ok = match matches.subcommand() {
        Some(("validate", args)) => cmd_validate(config, args)?,
        Some(("migrate", args)) => cmd_migrate(config, args)?,
        Some(("recover", args)) => cmd_recover(config, args).await?,
        Some(("simulate", args)) => cmd_simulate(config, args).await?,
        Some(("export-log", args)) => cmd_export_log(config, args).await?,
        _ => {
            cli().print_help()?;
            true
        }
    };

    std::process::exit(if ok { 0 } else { 1 });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_consistent() {
        cli().debug_assert();
    }

    #[test]
    fn test_simulate_defaults() {
        let matches = cli().get_matches_from(["ficha-kernel", "simulate"]);
        let (_, args) = matches.subcommand().unwrap();
        assert_eq!(*args.get_one::<u64>("seed").unwrap(), 42);
        assert_eq!(*args.get_one::<u64>("fichas").unwrap(), 10);
        assert!(!args.get_flag("stop-on-violation"));
    }

    #[test]
    fn test_load_state_migrates_legacy_payload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("legacy.json");
        let mut payload = ficha_test_utils::valid_ficha_json("legacy");
        let obj = payload.as_object_mut().unwrap();
        obj.remove("history");
        obj.remove("errors");
        obj.remove("schemaVersion");
        std::fs::write(&path, payload.to_string()).unwrap();

        let context = FichaContext::default();
        let state = load_state(&context, &path).unwrap();
        assert_eq!(state.id.as_str(), "legacy");
        assert_eq!(state.schema_version, 4);
        assert_eq!(context.schema().info().migration_count, 1);
    }
}
