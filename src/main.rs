use clap::Parser;
use mqguard::cli::Cli;
use mqguard::config::{self, ReporterSpec};
use mqguard::mqtt::run_broker_client;
use mqguard::periodic::{run_periodic_checker, DEFAULT_PERIOD};
use mqguard::reporting::line::LineReporter;
use mqguard::reporting::streaming::tcp::SocketReporter;
use mqguard::reporting::streaming::websocket::WebsocketReporter;
use mqguard::reporting::{Reporter, ReportingManager};
use mqguard::supervisor::{run_registry_task, RegistryEvent};
use mqguard::time::SystemClock;
use mqguard::DeviceRegistry;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

fn init_tracing(verbose: bool) {
    let default_directive = if verbose { "mqguard=debug" } else { "mqguard=info" };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| default_directive.into()))
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    info!(version = mqguard::VERSION, "mqguard starting");

    if let Err(err) = run(cli).await {
        error!(error = %err, "fatal error");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> mqguard::Result<()> {
    let loaded = config::load(&cli.config)?;
    info!(
        brokers = loaded.brokers.len(),
        devices = loaded.devices.len(),
        reporters = loaded.reporters.len(),
        "configuration loaded"
    );

    let shutdown = CancellationToken::new();
    let (events_tx, events_rx) = mpsc::channel::<RegistryEvent>(256);

    let mut registry = DeviceRegistry::new(Arc::new(SystemClock));
    for (name, guard) in loaded.devices {
        registry.add_guarded_device(name, guard);
    }

    let mut reporters: Vec<Arc<dyn Reporter>> = Vec::new();
    for spec in loaded.reporters {
        let reporter: Arc<dyn Reporter> = match spec {
            ReporterSpec::Print => Arc::new(LineReporter::stdout()),
            ReporterSpec::Log { path } => Arc::new(LineReporter::to_file(path)?),
            ReporterSpec::Socket { listen_address } => Arc::new(SocketReporter::new(listen_address, events_tx.clone())),
            ReporterSpec::Websocket { listen_address } => Arc::new(WebsocketReporter::new(listen_address, events_tx.clone())),
        };
        reporters.push(reporter);
    }
    let reporting = Arc::new(ReportingManager::new(reporters));
    reporting.start();

    let registry_task = tokio::spawn(run_registry_task(registry, events_rx, reporting.clone()));

    let mut broker_tasks = Vec::new();
    for broker in loaded.brokers {
        let events = events_tx.clone();
        let shutdown = shutdown.clone();
        broker_tasks.push(tokio::spawn(async move {
            if let Err(err) = run_broker_client(broker, events, shutdown).await {
                error!(error = %err, "broker client exited with an error");
            }
        }));
    }

    let periodic_task = tokio::spawn(run_periodic_checker(DEFAULT_PERIOD, events_tx.clone(), shutdown.clone()));

    tokio::signal::ctrl_c().await.expect("failed to listen for ctrl-c");
    info!("shutdown signal received");
    shutdown.cancel();
    reporting.stop().await;

    for task in broker_tasks {
        let _ = task.await;
    }
    let _ = periodic_task.await;
    drop(events_tx);
    let _ = registry_task.await;

    info!("mqguard stopped");
    Ok(())
}
