// # iprotated - IP Rotation Daemon
//
// This daemon is a THIN integration layer:
// 1. Reading settings from environment variables
// 2. Loading the instance configuration file
// 3. Building the provider, orchestrator and request handler
// 4. Serving the HTTP routes until SIGTERM/SIGINT
//
// Rotation logic lives in `iprotate-core`. See `settings.rs` for the
// environment variables.
//
// ## Example
//
// ```bash
// export AWS_REGION=ap-northeast-1
// export IPROTATE_CONFIG=/etc/iprotate/config.json
//
// iprotated
// curl 'http://localhost:8080/change-ip?instance=proxy-1'
// ```

use anyhow::{Context, Result};
use axum::Router;
use iprotate_core::{
    CloudProviderClient, ConfigStore, MemoryCloudProvider, RotationOrchestrator,
    RotationRequestHandler,
};
use iprotated::{AppState, ProviderKind, Settings, router};
use std::process::ExitCode;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{Level, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Exit codes for different termination scenarios
///
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum IprotateExitCode {
    CleanShutdown = 0,
    ConfigError = 1,
    RuntimeError = 2,
}

impl From<IprotateExitCode> for ExitCode {
    fn from(code: IprotateExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

fn main() -> ExitCode {
    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return IprotateExitCode::ConfigError.into();
        }
    };

    if let Err(e) = settings.validate() {
        eprintln!("Configuration validation error: {:#}", e);
        return IprotateExitCode::ConfigError.into();
    }

    let log_level = settings.tracing_level().unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return IprotateExitCode::ConfigError.into();
    }

    info!("Starting iprotated");

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return IprotateExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        let (listener, app) = match startup(&settings).await {
            Ok(parts) => parts,
            Err(e) => {
                error!("Startup error: {:#}", e);
                return IprotateExitCode::ConfigError;
            }
        };

        info!("Server starting on port {}", settings.port);

        if let Err(e) = serve(listener, app).await {
            error!("Daemon error: {:#}", e);
            IprotateExitCode::RuntimeError
        } else {
            IprotateExitCode::CleanShutdown
        }
    });

    result.into()
}

/// Load the configuration, build the service and bind the listener
async fn startup(settings: &Settings) -> Result<(TcpListener, Router)> {
    let config = ConfigStore::from_file(&settings.config_path).with_context(|| {
        format!(
            "failed to load instance configuration from {}",
            settings.config_path.display()
        )
    })?;

    info!("Loaded {} instance(s) from config", config.len());
    for instance in config.list() {
        info!(
            "Managing instance: {} ({} / {})",
            instance.name, instance.instance_name, instance.static_ip_name
        );
    }

    let provider = build_provider(settings, &config).await?;
    info!(
        "Using {} provider in region {}",
        provider.provider_name(),
        settings.region
    );

    let orchestrator = RotationOrchestrator::new(provider, settings.propagation_policy());
    let handler = RotationRequestHandler::new(Arc::new(config), Arc::new(orchestrator));
    let app = router(AppState::new(Arc::new(handler)));

    let addr = settings.listen_addr();
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    Ok((listener, app))
}

/// Serve requests until a shutdown signal arrives
async fn serve(listener: TcpListener, app: Router) -> Result<()> {
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    info!("Shutting down iprotated");
    Ok(())
}

/// Build the configured CloudProviderClient
async fn build_provider(
    settings: &Settings,
    config: &ConfigStore,
) -> Result<Arc<dyn CloudProviderClient>> {
    match settings.provider {
        ProviderKind::Memory => {
            warn!("Using in-memory provider; no cloud resources will be touched");
            let provider = config
                .list()
                .iter()
                .enumerate()
                .fold(MemoryCloudProvider::new(), |provider, (i, instance)| {
                    provider.with_instance(
                        instance.instance_name.clone(),
                        format!("198.51.100.{}", 10 + i % 200),
                    )
                });
            Ok(Arc::new(provider))
        }
        #[cfg(feature = "lightsail")]
        ProviderKind::Lightsail => {
            let provider =
                iprotate_provider_lightsail::LightsailProvider::from_region(settings.region.clone())
                    .await;
            Ok(Arc::new(provider))
        }
        #[cfg(not(feature = "lightsail"))]
        ProviderKind::Lightsail => anyhow::bail!(
            "IPROTATE_PROVIDER=lightsail requires the `lightsail` feature. \
            Rebuild with default features or set IPROTATE_PROVIDER=memory"
        ),
    }
}

/// Resolve when SIGTERM or SIGINT is received
#[cfg(unix)]
async fn shutdown_signal() {
    let (mut sigterm, mut sigint) = match (
        signal(SignalKind::terminate()),
        signal(SignalKind::interrupt()),
    ) {
        (Ok(sigterm), Ok(sigint)) => (sigterm, sigint),
        (Err(e), _) | (_, Err(e)) => {
            error!("Failed to setup signal handlers: {}", e);
            std::future::pending::<()>().await;
            return;
        }
    };

    let received = tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    };
    info!("Received shutdown signal: {}", received);
}

/// Resolve when CTRL-C is received
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Received shutdown signal: SIGINT"),
        Err(e) => {
            error!("Failed to wait for CTRL-C: {}", e);
            std::future::pending::<()>().await;
        }
    }
}
