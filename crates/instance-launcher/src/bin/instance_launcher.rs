//! Instance launcher CLI
//!
//! Usage:
//!   instance-launcher                     # read config from env / ./.env, serve /health
//!   instance-launcher -e prod.env         # load a specific env file
//!   instance-launcher -p 8080             # serve /health on port 8080
//!   instance-launcher --no-health-server  # exit as soon as the instance is launched
//!
//! Environment:
//!   LAMBDA_API_KEY, SSH_KEY_NAME, INSTANCE_TYPE_NAME, CHECK_INTERVAL_SECONDS,
//!   ERROR_WAIT_SECONDS, REQUEST_TIMEOUT_SECONDS, LAUNCH_TIMEOUT_SECONDS, PORT,
//!   LAMBDA_API_BASE_URL, HEALTH_SERVER

use anyhow::Context;
use argh::FromArgs;
use instance_launcher::config::load_env_file;
use instance_launcher::logging::setup_logging;
use instance_launcher::{
    health_channel, run_health_server, LambdaClient, Launcher, LauncherConfig,
};
use std::path::Path;
use tokio::sync::watch;

/// Launch one GPU instance as soon as capacity appears
#[derive(FromArgs)]
struct Args {
    /// show version information
    #[argh(switch, short = 'V')]
    version: bool,

    /// path to an env file (default: ./.env when present)
    #[argh(option, short = 'e')]
    env_file: Option<String>,

    /// port for the /health endpoint (overrides PORT)
    #[argh(option, short = 'p')]
    port: Option<u16>,

    /// do not serve /health; exit once the instance is launched
    #[argh(switch)]
    no_health_server: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Args = argh::from_env();

    if args.version {
        println!("instance-launcher {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    // Load the env file first so RUST_LOG from it applies.
    let env_file = load_env_file(args.env_file.as_deref().map(Path::new))
        .context("failed to load env file")?;

    setup_logging();
    log::info!("Starting instance launcher...");
    match env_file {
        Some(path) => log::info!("Loaded environment from {}", path.display()),
        None => log::info!("No .env file found"),
    }

    let mut config = LauncherConfig::from_env().context("invalid configuration")?;
    if let Some(port) = args.port {
        config.port = port;
    }
    if args.no_health_server {
        config.health_server = false;
    }
    for name in config.missing_credentials() {
        log::warn!("{} is not set; provider calls will fail", name);
    }
    log::info!("{:?}", config);

    // Create shutdown channel
    let (shutdown_tx, shutdown_rx) = watch::channel(());

    // Set up Ctrl+C handler
    ctrlc::set_handler({
        let shutdown_tx = shutdown_tx.clone();
        move || {
            log::info!("Received Ctrl+C, shutting down gracefully...");
            shutdown_tx.send(()).ok();
        }
    })
    .context("failed to install Ctrl+C handler")?;

    let client = LambdaClient::new(&config).context("failed to build HTTP client")?;
    let (publisher, view) = health_channel();
    let mut launcher = Launcher::new(client, &config, publisher);

    let loop_shutdown = shutdown_rx.clone();
    let loop_task = tokio::spawn(async move { launcher.run(loop_shutdown).await });

    if config.health_server {
        // Keeps serving the final status after the launch until Ctrl+C.
        run_health_server(view, config.port, shutdown_rx)
            .await
            .with_context(|| format!("health server failed on port {}", config.port))?;
        loop_task.abort();
    } else {
        match loop_task.await.context("launcher task failed")? {
            Some(_) => log::info!("Instance launched."),
            None => log::info!("Stopped before an instance was launched."),
        }
    }

    log::info!("Instance launcher finished.");
    Ok(())
}
