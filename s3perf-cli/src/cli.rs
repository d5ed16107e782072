use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use argh::FromArgs;
use s3perf_backend::S3CompatibleBackend;
use s3perf_bench::wire::{self, WireFormat};
use s3perf_bench::{Backends, BenchResult, autoheal, ops, perftest, validate};
use serde_json::Value;

use crate::config::Config;
use crate::observability;

/// Compares an S3-compatible endpoint with an accelerating proxy in front of it.
#[derive(Debug, FromArgs)]
struct Args {
    /// path to the YAML configuration file
    #[argh(option, short = 'c')]
    pub config: Option<PathBuf>,

    #[argh(subcommand)]
    pub command: Command,
}

#[derive(Debug, FromArgs)]
#[argh(subcommand)]
enum Command {
    Bench(BenchCommand),
    AutoHeal(AutoHealCommand),
    Validate(ValidateCommand),
    Ops(OpsCommand),
}

impl Command {
    fn name(&self) -> &'static str {
        match self {
            Command::Bench(_) => "bench",
            Command::AutoHeal(_) => "autoheal",
            Command::Validate(_) => "validate",
            Command::Ops(_) => "ops",
        }
    }

    fn event(&self) -> Option<&Path> {
        match self {
            Command::Bench(BenchCommand { event })
            | Command::AutoHeal(AutoHealCommand { event })
            | Command::Validate(ValidateCommand { event })
            | Command::Ops(OpsCommand { event }) => event.as_deref(),
        }
    }
}

/// benchmark both endpoints and print latency, throughput and object size statistics
///
/// The event selects the operation with `requestType` (PUT_OBJECT, GET_OBJECT, GET_OBJECT_TTFB,
/// GET_OBJECT_PASSTHROUGH, GET_OBJECT_PASSTHROUGH_TTFB, DELETE_OBJECT, LIST_OBJECTS_V2 or ALL) and
/// requires a `bucket`.
#[derive(Debug, FromArgs)]
#[argh(subcommand, name = "bench")]
struct BenchCommand {
    /// path to the JSON event, read from stdin when omitted
    #[argh(positional)]
    event: Option<PathBuf>,
}

/// measure how long it takes until an object is readable through the accelerated endpoint
#[derive(Debug, FromArgs)]
#[argh(subcommand, name = "autoheal")]
struct AutoHealCommand {
    /// path to the JSON event, read from stdin when omitted
    #[argh(positional)]
    event: Option<PathBuf>,
}

/// print the MD5 digests of an object as served by both endpoints
#[derive(Debug, FromArgs)]
#[argh(subcommand, name = "validate")]
struct ValidateCommand {
    /// path to the JSON event, read from stdin when omitted
    #[argh(positional)]
    event: Option<PathBuf>,
}

/// run a single bucket or object request against one endpoint
#[derive(Debug, FromArgs)]
#[argh(subcommand, name = "ops")]
struct OpsCommand {
    /// path to the JSON event, read from stdin when omitted
    #[argh(positional)]
    event: Option<PathBuf>,
}

/// Bootstrap the runtime and execute the CLI command.
pub fn execute() -> Result<()> {
    let args: Args = argh::from_env();
    let config = Config::load(args.config.as_deref())?;

    // Sentry should be initialized before creating the async runtime.
    let _sentry_guard = observability::init_sentry(&config);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .thread_name("s3perf-rt")
        .enable_all()
        .build()?;
    let _runtime_guard = runtime.enter();

    observability::init_tracing(&config);
    tracing::debug!(?config);

    let event = read_event(args.command.event())?;
    let backends = connect(&config)?;

    let (response, succeeded) =
        runtime.block_on(dispatch(&args.command, &config, &backends, event));
    println!("{}", serde_json::to_string_pretty(&response)?);

    if !succeeded {
        anyhow::bail!("{} request failed", args.command.name());
    }
    Ok(())
}

/// Reads the JSON event from `path`, or from stdin if no path is given.
fn read_event(path: Option<&Path>) -> Result<Value> {
    let event = match path {
        Some(path) => {
            let file = File::open(path)
                .with_context(|| format!("failed to open event file {}", path.display()))?;
            serde_json::from_reader(BufReader::new(file)).context("failed to parse event JSON")?
        }
        None => serde_json::from_reader(io::stdin().lock())
            .context("failed to parse event JSON from stdin")?,
    };

    Ok(event)
}

fn connect(config: &Config) -> Result<Backends> {
    let reference = S3CompatibleBackend::new("reference", config.reference.backend_config())
        .context("failed to configure reference endpoint")?;
    let accelerated = S3CompatibleBackend::new("accelerated", config.accelerated.backend_config())
        .context("failed to configure accelerated endpoint")?;

    Ok(Backends::new(Arc::new(reference), Arc::new(accelerated)))
}

/// Runs `command` and renders its response, which is a structured error if the run failed.
async fn dispatch(
    command: &Command,
    config: &Config,
    backends: &Backends,
    event: Value,
) -> (Value, bool) {
    match command {
        Command::Bench(_) => {
            respond(perftest::process_event(backends, &config.defaults, event).await)
        }
        Command::AutoHeal(_) => {
            let poller = config.autoheal.poller();
            respond(autoheal::process_event(backends, &poller, event).await)
        }
        Command::Validate(_) => respond(validate::process_event(backends, event).await),
        Command::Ops(_) => respond(ops::process_event(backends, event).await),
    }
}

fn respond<T: WireFormat>(result: BenchResult<T>) -> (Value, bool) {
    if let Err(ref error) = result {
        tracing::error!(
            error = error as &dyn std::error::Error,
            code = error.error_code(),
            "request failed"
        );
    }

    (wire::respond(&result), result.is_ok())
}
