//! elastic-converge CLI
//!
//! Runs the convergence engine against an in-memory cluster described by a
//! TOML scenario, for dry-running state declarations.

use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use elastic_converge::config::EffectiveConfig;
use elastic_converge::mock::Scenario;
use elastic_converge::observability::{init_logging, LogFormat};
use elastic_converge::{
    ConvergenceOutcome, Context, ResourceKind, StateController, StateDeclaration,
};

#[derive(Parser)]
#[command(name = "elastic-converge")]
#[command(about = "Converge ML jobs and datafeeds onto declared states", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Drive a resource to a desired state and print the outcome as JSON
    Reconcile {
        #[command(flatten)]
        target: TargetArgs,

        /// Desired state (job: opened|closed, datafeed: started|stopped)
        #[arg(long)]
        state: String,

        /// Force the stop-style transition (close/stop)
        #[arg(long)]
        force: bool,

        /// Overall timeout, e.g. "30s" or "1m30s" (default from config)
        #[arg(long)]
        timeout: Option<String>,

        /// Datafeed search start (RFC 3339 or epoch millis)
        #[arg(long)]
        start: Option<String>,

        /// Datafeed search end (RFC 3339 or epoch millis)
        #[arg(long)]
        end: Option<String>,

        #[command(flatten)]
        settings: SettingsArgs,
    },

    /// Stop managing a resource (datafeeds are stopped and deleted)
    Delete {
        #[command(flatten)]
        target: TargetArgs,

        #[command(flatten)]
        settings: SettingsArgs,
    },

    /// Print the effective configuration
    Config {
        #[command(flatten)]
        settings: SettingsArgs,
    },
}

#[derive(Args)]
struct TargetArgs {
    /// Scenario file describing the mock cluster
    #[arg(long, short = 's')]
    scenario: PathBuf,

    /// Resource kind (job, datafeed)
    #[arg(long)]
    kind: ResourceKind,

    /// Resource id
    #[arg(long)]
    id: String,
}

#[derive(Args)]
struct SettingsArgs {
    /// Path to a TOML config file
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Override the poll interval
    #[arg(long)]
    poll_interval_ms: Option<u64>,

    /// Override the log format (pretty, json)
    #[arg(long)]
    log_format: Option<LogFormat>,
}

impl SettingsArgs {
    fn overrides(&self) -> Option<serde_json::Value> {
        let mut overrides = serde_json::Map::new();
        if let Some(ms) = self.poll_interval_ms {
            overrides.insert("poll_interval_ms".to_string(), ms.into());
        }
        if let Some(format) = self.log_format {
            overrides.insert("log_format".to_string(), format.as_str().into());
        }
        if overrides.is_empty() {
            None
        } else {
            Some(serde_json::Value::Object(overrides))
        }
    }

    /// Load config and install logging; exits on error
    fn load(&self) -> EffectiveConfig {
        match EffectiveConfig::build(self.config.as_deref(), self.overrides()) {
            Ok(config) => {
                init_logging(config.settings.log_format);
                config
            }
            Err(e) => {
                eprintln!("Error loading config: {}", e);
                process::exit(1);
            }
        }
    }
}

fn main() {
    let cli = Cli::parse();

    let code = match cli.command {
        Commands::Reconcile {
            target,
            state,
            force,
            timeout,
            start,
            end,
            settings,
        } => {
            let declaration = StateDeclaration {
                kind: target.kind,
                id: target.id.clone(),
                state,
                force,
                timeout,
                start,
                end,
            };
            run_reconcile(&target, declaration, &settings.load())
        }
        Commands::Delete { target, settings } => run_delete(&target, &settings.load()),
        Commands::Config { settings } => run_config(&settings.load()),
    };

    process::exit(code);
}

/// Root context, cancelled on Ctrl-C
fn interruptible_context() -> Context {
    let (ctx, cancel) = Context::background().with_cancel();
    if let Err(e) = ctrlc::set_handler(move || {
        tracing::warn!("interrupt received, cancelling");
        cancel.cancel();
    }) {
        tracing::warn!(error = %e, "failed to install interrupt handler");
    }
    ctx
}

fn load_controller(scenario: &Path, config: &EffectiveConfig) -> StateController {
    let cluster = match Scenario::from_path(scenario).and_then(|s| s.build()) {
        Ok(cluster) => cluster,
        Err(e) => {
            eprintln!("Error loading scenario: {}", e);
            process::exit(1);
        }
    };
    StateController::with_poller(Arc::new(cluster), config.settings.poller())
}

fn print_json(json: Result<String, serde_json::Error>) {
    match json {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Error serializing output: {}", e);
            process::exit(1);
        }
    }
}

fn run_reconcile(target: &TargetArgs, declaration: StateDeclaration, config: &EffectiveConfig) -> i32 {
    let controller = load_controller(&target.scenario, config);
    let desired = declaration.state.clone();

    let outcome = match declaration.into_request(&config.settings.timeout_policy()) {
        Ok(request) => controller.reconcile(&interruptible_context(), &request),
        Err(err) => ConvergenceOutcome::failed(err, None),
    };

    print_json(outcome.report(target.kind, &target.id, &desired).to_json());
    outcome.error().map_or(0, |e| e.exit_code())
}

fn run_delete(target: &TargetArgs, config: &EffectiveConfig) -> i32 {
    let controller = load_controller(&target.scenario, config);

    match controller.delete(&interruptible_context(), target.kind, &target.id) {
        Ok(outcome) => {
            print_json(serde_json::to_string_pretty(&serde_json::json!({
                "kind": target.kind,
                "resource_id": target.id,
                "outcome": outcome,
            })));
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            e.exit_code()
        }
    }
}

fn run_config(config: &EffectiveConfig) -> i32 {
    print_json(config.to_json());
    0
}
