mod logging;

use clap::Parser;
use engines::EngineRegistry;
use logging::{init_logging, LogArgs};
use manifest::ManifestStore;
use models::TenantSlug;
use orchestrator::{CommandIngestor, Ingestor, NoopIngestor, OnboardError, Orchestrator, Settings};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use warehouse::{ConnectOpts, Target, Warehouse};

/// Operator-facing progress tag. ASCII only: these lines must survive
/// legacy Windows terminals.
const TAG: &str = "[stardeck]";

/// starctl is the CLI of the analytics control plane: it initializes the
/// connector blueprint registry and onboards tenants.
#[derive(Debug, Parser)]
#[command(author, name = "starctl", version)]
struct Starctl {
    #[clap(flatten)]
    log_args: LogArgs,

    #[clap(subcommand)]
    subcommand: Subcommand,
}

#[derive(Debug, clap::Subcommand)]
#[clap(rename_all = "kebab-case")]
enum Subcommand {
    /// Run the full onboarding pipeline for one tenant.
    ///
    /// Exit codes: 0 success, 2 unknown schema, 3 blueprint collision,
    /// 4 warehouse error, 5 cancelled.
    Onboard(OnboardArgs),
    /// Build the connector blueprint registry from the shipped catalog
    InitializeConnectorLibrary(InitializeArgs),
    /// Serve the onboarding HTTP surface
    Serve(ServeArgs),
}

#[derive(Debug, clap::Args)]
struct TargetArgs {
    /// Warehouse target: sandbox (file-local) or dev (managed)
    #[arg(long, default_value = "sandbox")]
    target: Target,
    /// Root of file-local state
    #[arg(long, default_value = ".stardeck")]
    data_dir: PathBuf,
}

#[derive(Debug, clap::Args)]
struct InitializeArgs {
    /// Warehouse target: sandbox (file-local) or dev (managed)
    target: Target,
    /// Root of file-local state
    #[arg(long, default_value = ".stardeck")]
    data_dir: PathBuf,
}

#[derive(Debug, clap::Args)]
struct OnboardArgs {
    /// The tenant to onboard
    tenant_slug: String,

    #[clap(flatten)]
    target: TargetArgs,

    /// Days of source history to ingest
    #[arg(long, default_value_t = 30)]
    days: u32,
    /// Stop scheduling models after the first failure
    #[arg(long)]
    fail_fast: bool,
    /// Maximum concurrently-running models
    #[arg(long, default_value_t = 4)]
    fan_out: usize,
    /// Per-statement deadline, seconds
    #[arg(long, default_value_t = 60)]
    statement_timeout: u64,
    /// External ingestion program; omit when rows are already landed
    #[arg(long)]
    ingestor: Option<PathBuf>,
}

#[derive(Debug, clap::Args)]
struct ServeArgs {
    #[clap(flatten)]
    target: TargetArgs,

    /// Bind address of the HTTP surface
    #[arg(long, default_value = "127.0.0.1:8080")]
    addr: String,
    /// Days of source history per onboarding request
    #[arg(long, default_value_t = 30)]
    days: u32,
}

fn main() {
    let cli = Starctl::parse();
    init_logging(&cli.log_args);

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("{TAG} failed to start runtime: {err}");
            std::process::exit(1);
        }
    };

    let code = runtime.block_on(run(cli.subcommand));
    std::process::exit(code);
}

async fn run(subcommand: Subcommand) -> i32 {
    match subcommand {
        Subcommand::Onboard(args) => onboard(args).await,
        Subcommand::InitializeConnectorLibrary(args) => initialize_connector_library(args).await,
        Subcommand::Serve(args) => serve(args).await,
    }
}

fn connect(args: &TargetArgs) -> Result<Arc<dyn Warehouse>, warehouse::Error> {
    let wh = warehouse::connect(&ConnectOpts {
        target: args.target,
        data_dir: args.data_dir.clone(),
    })?;
    Ok(Arc::new(wh))
}

fn build_orchestrator(args: &OnboardArgs) -> Result<Orchestrator, anyhow::Error> {
    let wh = connect(&args.target)?;
    let manifest = Arc::new(ManifestStore::open(args.target.data_dir.join("tenants.yaml"))?);

    let ingestor: Arc<dyn Ingestor> = match &args.ingestor {
        Some(program) => Arc::new(CommandIngestor {
            program: program.clone(),
            extra_args: Vec::new(),
        }),
        None => Arc::new(NoopIngestor),
    };

    Ok(Orchestrator::new(
        wh,
        manifest,
        EngineRegistry::standard(),
        ingestor,
        Settings {
            fan_out: args.fan_out,
            statement_timeout: std::time::Duration::from_secs(args.statement_timeout),
            fail_fast: args.fail_fast,
            artifact_root: args.target.data_dir.join("generated"),
        },
    ))
}

async fn onboard(args: OnboardArgs) -> i32 {
    let slug = TenantSlug::new(args.tenant_slug.clone());
    println!("{TAG} onboarding tenant {slug} ({} days, target {})", args.days, args.target.target);

    let orchestrator = match build_orchestrator(&args) {
        Ok(orchestrator) => orchestrator,
        Err(err) => {
            eprintln!("{TAG} setup failed: {err:#}");
            return 4;
        }
    };

    // Ctrl-C requests cooperative cancellation; in-flight models finish
    // or time out before we exit.
    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("{TAG} cancellation requested; draining in-flight models");
            signal_token.cancel();
        }
    });

    match orchestrator.onboard(&slug, args.days, cancel).await {
        Ok(outcome) => {
            println!(
                "{TAG} run {} complete: {} model executions",
                outcome.invocation_id,
                outcome.results.len()
            );
            for star in &outcome.star_tables {
                println!("{TAG} star table ready: {star}");
            }
            println!("{TAG} tenant {slug} is active");
            0
        }
        Err(err) => {
            eprintln!("{TAG} onboarding failed: {err:#}");
            err.exit_code()
        }
    }
}

async fn initialize_connector_library(args: InitializeArgs) -> i32 {
    let target = TargetArgs {
        target: args.target,
        data_dir: args.data_dir,
    };
    let wh = match connect(&target) {
        Ok(wh) => wh,
        Err(err) => {
            eprintln!("{TAG} setup failed: {err:#}");
            return 4;
        }
    };

    match catalog::initialize(&*wh, &catalog::list_supported()).await {
        Ok(count) => {
            println!("{TAG} connector library initialized: {count} blueprints registered");
            0
        }
        Err(err @ catalog::Error::Collision { .. }) => {
            eprintln!("{TAG} initialization failed: {err:#}");
            3
        }
        Err(err) => {
            eprintln!("{TAG} initialization failed: {err:#}");
            4
        }
    }
}

async fn serve(args: ServeArgs) -> i32 {
    let onboard_args = OnboardArgs {
        tenant_slug: String::new(),
        target: args.target,
        days: args.days,
        fail_fast: false,
        fan_out: 4,
        statement_timeout: 60,
        ingestor: None,
    };
    let orchestrator = match build_orchestrator(&onboard_args) {
        Ok(orchestrator) => Arc::new(orchestrator),
        Err(err) => {
            eprintln!("{TAG} setup failed: {err:#}");
            return 4;
        }
    };

    let router = orchestrator::api::router(orchestrator, args.days);
    let listener = match tokio::net::TcpListener::bind(&args.addr).await {
        Ok(listener) => listener,
        Err(err) => {
            eprintln!("{TAG} failed to bind {}: {err}", args.addr);
            return 1;
        }
    };

    println!("{TAG} serving onboarding API on {}", args.addr);
    if let Err(err) = axum::serve(listener, router).await {
        eprintln!("{TAG} server failed: {err}");
        return 1;
    }
    0
}
