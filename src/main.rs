//! ProxySQL admin reconciliation CLI.
//!
//! # Architecture Overview
//!
//! ```text
//!   host automation / operator
//!        │  reconcile | variable | manage | show
//!        ▼
//!   ┌──────────┐   ┌──────────┐   ┌──────────┐   ┌──────────┐
//!   │ resolver │──▶│ planner  │──▶│ applier  │──▶│propagate │
//!   └────┬─────┘   └──────────┘   └────┬─────┘   └────┬─────┘
//!        │                             │              │
//!        ▼                             ▼              ▼
//!   ┌─────────────────────────────────────────────────────────┐
//!   │  admin store   CONFIG ─▶ MEMORY ◀─▶ DISK                │
//!   │                            │                            │
//!   │                            ▼                            │
//!   │                         RUNTIME                         │
//!   └─────────────────────────────────────────────────────────┘
//! ```
//!
//! The result document goes to stdout; logs go to stderr.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde_json::Value;

use proxysql_admin::config::{self, AdminConfig};
use proxysql_admin::observability::{logging, metrics};
use proxysql_admin::propagation::{Action, ConfigSettings, Direction, Layer, PropagationRequest};
use proxysql_admin::reconcile::report;
use proxysql_admin::schema::{ObjectClass, Registry};
use proxysql_admin::{Engine, Error, ReconcileRequest, SqliteAdmin, State, VariableRequest};

#[derive(Parser)]
#[command(name = "proxysql-admin")]
#[command(about = "Declarative configuration management for the ProxySQL admin interface", long_about = None)]
struct Cli {
    /// Engine configuration file (TOML).
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Drive one object (or a filtered set) of a class to the desired state
    Reconcile {
        /// Object class, e.g. backend_servers, query_rules, scheduler
        class: String,

        /// Attribute as key=value; repeatable
        #[arg(long = "set", value_name = "KEY=VALUE")]
        set: Vec<String>,

        /// Attributes and control keys as one JSON object
        #[arg(long)]
        params: Option<String>,

        #[arg(long)]
        state: Option<State>,

        /// Allow deleting every match (query rules and schedules only)
        #[arg(long)]
        force_multi_delete: bool,

        #[arg(long, value_name = "BOOL")]
        save_to_disk: Option<bool>,

        #[arg(long, value_name = "BOOL")]
        load_to_runtime: Option<bool>,

        /// Plan and report without writing
        #[arg(long)]
        dry_run: bool,
    },
    /// Read a global variable, or set it when a value is given
    Variable {
        name: String,
        value: Option<String>,

        #[arg(long, value_name = "BOOL")]
        save_to_disk: Option<bool>,

        #[arg(long, value_name = "BOOL")]
        load_to_runtime: Option<bool>,

        #[arg(long)]
        dry_run: bool,
    },
    /// Move a settings group between layers
    Manage {
        #[arg(long)]
        action: Action,

        /// e.g. "MYSQL SERVERS"
        #[arg(long)]
        settings: ConfigSettings,

        #[arg(long)]
        direction: Direction,

        #[arg(long)]
        layer: Layer,
    },
    /// List records of a class in one layer
    Show {
        class: String,

        #[arg(long, default_value = "MEMORY")]
        layer: Layer,

        /// Exact-match filter as key=value; repeatable
        #[arg(long = "where", value_name = "KEY=VALUE")]
        filters: Vec<String>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => match config::load_config(path) {
            Ok(config) => config,
            Err(e) => return emit_failure(&e.to_string()),
        },
        None => AdminConfig::default(),
    };
    logging::init(&config.observability.log_level);
    metrics::set_enabled(config.observability.metrics_enabled);

    tracing::debug!(
        memory_path = ?config.store.memory_path,
        disk_path = ?config.store.disk_path,
        config_path = ?config.store.config_path,
        "Configuration loaded"
    );

    match run(cli.command, &config) {
        Ok(doc) => {
            println!("{}", render(&doc));
            ExitCode::SUCCESS
        }
        Err(e) => {
            println!("{}", render(&report::failure(&e)));
            ExitCode::FAILURE
        }
    }
}

fn run(command: Commands, config: &AdminConfig) -> Result<Value, Error> {
    let admin = SqliteAdmin::from_store_config(&config.store)?;
    let mut engine = Engine::new(admin).with_propagation_defaults(config.propagation);
    let registry = Registry::builtin();

    match command {
        Commands::Reconcile {
            class,
            set,
            params,
            state,
            force_multi_delete,
            save_to_disk,
            load_to_runtime,
            dry_run,
        } => {
            let class: ObjectClass = class.parse()?;
            let params = match params {
                Some(raw) => serde_json::from_str(&raw)
                    .map_err(|e| Error::schema(format!("--params is not valid JSON: {e}")))?,
                None => Value::Object(Default::default()),
            };

            let mut request = ReconcileRequest::from_params(class, params)?;
            for pair in &set {
                let (name, value) = split_pair(pair)?;
                request = request.param(name, value);
            }
            if let Some(state) = state {
                request = request.state(state);
            }
            request.force_multi_delete |= force_multi_delete;
            request.dry_run |= dry_run;
            if save_to_disk.is_some() {
                request.save_to_disk = save_to_disk;
            }
            if load_to_runtime.is_some() {
                request.load_to_runtime = load_to_runtime;
            }

            let outcome = engine.reconcile(&request)?;
            Ok(report::reconcile_document(registry.get(class), &outcome))
        }
        Commands::Variable {
            name,
            value,
            save_to_disk,
            load_to_runtime,
            dry_run,
        } => {
            let mut request = VariableRequest::new(name).dry_run(dry_run);
            request.value = value.map(Value::String);
            request.save_to_disk = save_to_disk;
            request.load_to_runtime = load_to_runtime;

            let outcome = engine.variable(&request)?;
            Ok(report::reconcile_document(registry.get(ObjectClass::GlobalVariables), &outcome))
        }
        Commands::Manage {
            action,
            settings,
            direction,
            layer,
        } => {
            let request = PropagationRequest::new(action, settings, direction, layer);
            let outcome = engine.propagate(&request)?;
            Ok(report::propagation_document(&outcome))
        }
        Commands::Show { class, layer, filters } => {
            let schema = registry.schema_for(&class)?;
            let pairs = filters
                .iter()
                .map(|pair| split_pair(pair))
                .collect::<Result<Vec<_>, Error>>()?;
            let criteria = schema.normalize_pairs(pairs)?;
            let records = engine.show(schema.class, &criteria, layer)?;
            Ok(report::records_document(schema, &records))
        }
    }
}

fn split_pair(pair: &str) -> Result<(&str, &str), Error> {
    pair.split_once('=')
        .map(|(name, value)| (name.trim(), value))
        .ok_or_else(|| Error::schema(format!("expected KEY=VALUE, got \"{pair}\"")))
}

fn render(doc: &Value) -> String {
    serde_json::to_string_pretty(doc).unwrap_or_else(|_| doc.to_string())
}

fn emit_failure(msg: &str) -> ExitCode {
    println!("{}", render(&serde_json::json!({ "failed": true, "msg": msg })));
    ExitCode::FAILURE
}
