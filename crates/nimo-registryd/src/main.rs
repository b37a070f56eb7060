//! Standalone Registry process (§4.5/§5): binds the command port, announces
//! it over mDNS, and serves the full Registry command vocabulary until
//! asked to stop — by a `stop!` request, or by SIGINT/SIGTERM/SIGUSR2.
//!
//! The CLI front-ends that operators use to *drive* a running Registry
//! (add-channel, disconnect, list, shutdown) are out of scope; this binary
//! only hosts the process spec.md assumes exists.

use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::Parser;
use mdns_sd::ServiceDaemon;
use tracing_subscriber::EnvFilter;

use nimo_registry::{register_all, Registry, StatusBroadcaster};
use nimo_service::{CommandAcceptor, HandlerTableBuilder, StopHandler};

#[derive(Parser, Debug)]
#[command(name = "nimo-registryd")]
#[command(about = "Hosts a standalone nImO Registry process")]
struct Args {
    /// Configuration file path; falls back to the platform default, then
    /// to built-in defaults if that is absent too.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Local interface the command port and status socket bind to.
    #[arg(long, default_value = "0.0.0.0")]
    interface: Ipv4Addr,

    /// Address announced over mDNS as this Registry's reachable endpoint.
    /// Must be a real address of this host, not `0.0.0.0`.
    #[arg(long, default_value = "127.0.0.1")]
    address: Ipv4Addr,

    /// Node name this Registry announces itself under.
    #[arg(long, default_value = "nimo-registry")]
    name: String,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("failed to build the Tokio runtime");

    rt.block_on(run(args));
}

async fn run(args: Args) {
    let config_path = args.config.unwrap_or_else(nimo_config::default_path);
    let config = nimo_config::load(&config_path);
    tracing::info!(path = %config_path.display(), ?config, "loaded configuration");

    let registry = Arc::new(Registry::new());

    let broadcaster = match StatusBroadcaster::bind(args.interface, config.status_address, config.status_port).await
    {
        Ok(b) => Some(Arc::new(b)),
        Err(err) => {
            tracing::warn!(error = %err, "failed to bind status broadcaster; continuing without one");
            None
        }
    };

    let keep_running = Arc::new(AtomicBool::new(true));
    let mut builder = HandlerTableBuilder::new();
    builder = register_all(builder, Arc::clone(&registry), broadcaster.clone());
    builder = builder.register(Arc::new(StopHandler::new(Arc::clone(&keep_running), || {
        tracing::info!("stop! received; shutting down");
    })));
    let table = builder.build();

    let acceptor = match CommandAcceptor::bind(args.interface, table).await {
        Ok(a) => Arc::new(a),
        Err(err) => {
            tracing::error!(error = %err, "failed to bind command port");
            std::process::exit(1);
        }
    };
    let command_port = acceptor.local_addr().port();
    tracing::info!(address = %args.address, port = command_port, "command port bound");

    let daemon = match ServiceDaemon::new() {
        Ok(d) => d,
        Err(err) => {
            tracing::error!(error = %err, "failed to start mDNS daemon");
            std::process::exit(1);
        }
    };
    let hostname = gethostname::gethostname().to_string_lossy().into_owned();
    if let Err(err) = nimo_discovery::announce(&daemon, &args.name, &hostname, args.address, command_port) {
        tracing::error!(error = %err, "failed to announce registry endpoint over mDNS");
        std::process::exit(1);
    }

    let run_handle = {
        let acceptor = Arc::clone(&acceptor);
        tokio::spawn(async move { acceptor.run().await })
    };

    wait_for_shutdown_signal(Arc::clone(&keep_running)).await;
    acceptor.shutdown();
    let _ = run_handle.await;
    let _ = daemon.shutdown();
    tracing::info!("registry process exiting");
}

/// Waits for whichever comes first: the `stop!` handler flipping
/// `keep_running` to false, or an external SIGINT/SIGTERM/SIGUSR2 (the
/// platform equivalents `spec.md` §5 names; SIGUSR2 has no Windows
/// equivalent, so that branch is unix-only).
async fn wait_for_shutdown_signal(keep_running: Arc<AtomicBool>) {
    let poll_keep_running = async {
        while keep_running.load(Ordering::SeqCst) {
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        }
    };

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        let mut sigusr2 = signal(SignalKind::user_defined2()).expect("failed to install SIGUSR2 handler");
        tokio::select! {
            _ = poll_keep_running => tracing::info!("stop! handler requested shutdown"),
            _ = tokio::signal::ctrl_c() => tracing::info!("received SIGINT"),
            _ = sigterm.recv() => tracing::info!("received SIGTERM"),
            _ = sigusr2.recv() => tracing::info!("received SIGUSR2"),
        }
    }

    #[cfg(not(unix))]
    {
        tokio::select! {
            _ = poll_keep_running => tracing::info!("stop! handler requested shutdown"),
            _ = tokio::signal::ctrl_c() => tracing::info!("received SIGINT"),
        }
    }
}
