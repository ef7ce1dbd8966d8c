use color_eyre::Result;
use eyre::WrapErr as _;
use mcc_collectors::{
    collect_once,
    spawn_supervisors,
    stop_supervisors,
    Envelope,
    Hub,
};
use mcc_config::{
    Args,
    Config,
};
use mcc_http::create_router;
use mcc_services::ServiceClients;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

pub struct App {
    config: Config,
    once: bool,
}

impl App {
    pub fn new(args: Args) -> Result<Self> {
        let config = Config::new(&args).wrap_err("Failed to load configuration")?;
        config.validate()?;
        info!(
            config_dir = %config.config_dir().display(),
            services = config.configured_services().len(),
            "Configuration loaded"
        );
        Ok(Self {
            config,
            once: args.once,
        })
    }

    /// Probes the services, then either runs one collection pass (`--once`)
    /// or serves until Ctrl-C / SIGTERM.
    pub async fn run(self) -> Result<()> {
        let cancel = CancellationToken::new();
        let clients = ServiceClients::from_settings(&self.config.configured_services(), &cancel);
        defer! {
            clients.close_all();
        }

        if clients.is_empty() {
            warn!("No services configured; every domain will publish empty payloads");
        }
        for (name, reachable) in clients.probe_all().await {
            if reachable {
                info!(service = %name, "Service reachable");
            } else {
                warn!(service = %name, "Service unreachable");
            }
        }

        let hub = Hub::new();
        if self.once {
            return print_envelopes(&collect_once(&hub, &clients).await);
        }

        let supervisors = spawn_supervisors(&hub, &clients, &self.config.intervals, &cancel);
        let served = serve(self.config.server.listen_address, hub, cancel.clone()).await;

        cancel.cancel();
        stop_supervisors(supervisors).await;
        info!("Shutdown complete");
        served
    }
}

fn print_envelopes(envelopes: &[std::sync::Arc<Envelope>]) -> Result<()> {
    let envelopes = envelopes.iter().map(|e| e.as_ref()).collect::<Vec<_>>();
    println!("{}", serde_json::to_string_pretty(&envelopes)?);
    Ok(())
}

async fn serve(address: SocketAddr, hub: Hub, cancel: CancellationToken) -> Result<()> {
    let router = create_router(hub)?;
    let listener = TcpListener::bind(address)
        .await
        .wrap_err_with(|| format!("Failed to bind {address}"))?;
    info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal(cancel))
        .await?;
    Ok(())
}

async fn shutdown_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{
            signal,
            SignalKind,
        };
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                error!("Failed to listen for SIGTERM: {err}");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl-C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
        _ = cancel.cancelled() => {}
    }
    cancel.cancel();
}
