use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Method;
use soulfriend_pwa::{
    AppConfig, Capabilities, ClientRegistry, DiskCacheStorage, FileSubmissionQueue, HttpNetwork,
    NotificationCenter, Request, ServiceWorker, WebAppManifest, server, sync::run_sync_loop,
};
use tokio_util::sync::CancellationToken;

fn print_usage() {
    eprintln!("Usage: soulfriend-pwa [OPTIONS]");
    eprintln!();
    eprintln!("Serves the SOULFRIEND app through an offline-caching worker.");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --config <PATH>     Config file (default: {})", AppConfig::default_path().display());
    eprintln!("  --host <HOST>       Bind address (overrides [server] host)");
    eprintln!("  --port <PORT>       Bind port (overrides [server] port)");
    eprintln!("  --origin <URL>      Backend origin (overrides [worker] origin)");
    eprintln!("  -h, --help          Show this help");
    eprintln!();
    eprintln!("Set RUST_LOG to change log verbosity (default: info).");
}

fn value_of(args: &[String], i: usize, flag: &str) -> String {
    args.get(i).cloned().unwrap_or_else(|| {
        eprintln!("Error: {flag} requires a value");
        std::process::exit(1);
    })
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => log::info!("Received SIGINT"),
                    _ = sigterm.recv() => log::info!("Received SIGTERM"),
                }
            }
            Err(e) => {
                log::warn!("Cannot listen for SIGTERM: {e}");
                tokio::signal::ctrl_c().await.ok();
                log::info!("Received SIGINT");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await.ok();
        log::info!("Received SIGINT");
    }
}

#[tokio::main]
async fn main() -> soulfriend_pwa::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut config_path = AppConfig::default_path();
    let mut host = None;
    let mut port = None;
    let mut origin = None;

    let args: Vec<String> = env::args().skip(1).collect();
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--config" => {
                i += 1;
                config_path = PathBuf::from(value_of(&args, i, "--config"));
            }
            "--host" => {
                i += 1;
                host = Some(value_of(&args, i, "--host"));
            }
            "--port" => {
                i += 1;
                let value = value_of(&args, i, "--port");
                port = Some(value.parse::<u16>().unwrap_or_else(|_| {
                    eprintln!("Error: invalid port '{value}'");
                    std::process::exit(1);
                }));
            }
            "--origin" => {
                i += 1;
                origin = Some(value_of(&args, i, "--origin"));
            }
            "-h" | "--help" => {
                print_usage();
                std::process::exit(0);
            }
            other => {
                eprintln!("Error: unknown argument '{other}'");
                print_usage();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    let mut config = AppConfig::load_or_create(&config_path)?;
    log::info!("Loaded config from {}", config_path.display());
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }
    if let Some(origin) = origin {
        config.worker = config.worker.with_origin(&origin);
    }

    let clients = Arc::new(ClientRegistry::new());
    let worker = Arc::new(ServiceWorker::new(
        config.worker.clone(),
        Capabilities {
            caches: Arc::new(DiskCacheStorage::new(config.paths.cache_dir.clone())),
            network: Arc::new(HttpNetwork::new()?),
            queue: Arc::new(FileSubmissionQueue::new(config.paths.queue_file.clone())),
            clients: clients.clone(),
            notifier: Arc::new(NotificationCenter::new()),
        },
    ));

    // Without a completed install the proxy still routes, it just starts cold
    match worker.install().await {
        Ok(_) => {
            if let Err(e) = worker.activate().await {
                log::error!("Activation failed: {e}");
            }
        }
        Err(e) => log::warn!("Continuing without pre-cached resources: {e}"),
    }

    let cancel = CancellationToken::new();
    let probe = Request::for_url(Method::GET, worker.config().resolve(&config.server.probe_path)?);
    let sync_task = tokio::spawn(run_sync_loop(
        worker.sync_manager(),
        worker.network(),
        probe,
        Duration::from_secs(config.server.probe_interval_secs.max(1)),
        cancel.clone(),
    ));

    let signal_token = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        signal_token.cancel();
    });

    let app = server::app(worker, clients, &WebAppManifest::default())?;
    let served = server::run_server(app, &config.server.host, config.server.port, cancel.clone()).await;

    cancel.cancel();
    if let Err(e) = sync_task.await {
        log::error!("Background sync task failed: {e}");
    }
    log::info!("Shutdown complete");
    served
}
