use std::{
    collections::BTreeSet,
    process,
    sync::{Arc, OnceLock},
};

use blazebee_exporter::{
    config::Config,
    core::{
        collectors::{registry::Registry, traits::Host},
        executor::Executor,
        readiness::{Readiness, ReadinessState},
        snapshot::ProcfsSnapshotProvider,
    },
    http::{self, AppState},
    logger::LoggerManager,
    print_error,
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

static CONFIG: OnceLock<Config> = OnceLock::new();

pub fn config() -> &'static Config {
    CONFIG.get_or_init(|| {
        Config::new().unwrap_or_else(|e| {
            print_error!("{}", e);
            process::exit(1);
        })
    })
}

fn log_collectors_table(enabled: &[String], available: &[&'static str]) {
    let enabled_set: BTreeSet<&str> = enabled.iter().map(String::as_str).collect();
    let available_set: BTreeSet<&str> = available.iter().copied().collect();

    let all_names: BTreeSet<&str> = enabled_set.union(&available_set).copied().collect();

    let name_width = all_names
        .iter()
        .map(|s| s.len())
        .max()
        .unwrap_or(10)
        .max("Collector".len());

    info!("{:<width$} | Status", "Collector", width = name_width);
    info!("{}-+-{}", "-".repeat(name_width), "-".repeat(12));

    for name in all_names {
        let status = match (enabled_set.contains(name), available_set.contains(name)) {
            (true, true) => "ENABLED",
            // configured, but not compiled in or unsupported on this platform
            (true, false) => "ENABLED (missing)",
            (false, _) => "DISABLED",
        };
        info!("{:<width$} | {}", name, status, width = name_width);
    }
}

/// Resolves on Ctrl+C or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cfg = config();
    let logger_manager = LoggerManager::new(cfg.logger.clone()).unwrap_or_else(|e| {
        print_error!("Failed to setup Log Manager: {}", e);
        process::exit(1);
    });
    logger_manager.init().unwrap_or_else(|e| {
        print_error!("Failed to init Log Manager: {}", e);
        process::exit(1);
    });
    info!(
        "Starting blazebee-exporter version {}...",
        env!("CARGO_PKG_VERSION")
    );
    info!("Log level: {}", cfg.logger.level);
    debug!("{:#?}", cfg.web);

    let readiness = Readiness::new();
    readiness.set_state(ReadinessState::NotReadyYet(
        "initializing collectors".to_string(),
    ));

    let available = Registry::available();
    let enabled = cfg.collectors.resolve_enabled(&available);
    log_collectors_table(&enabled, &available);

    let mut registry = if enabled.is_empty() {
        warn!("No collectors enabled; scrapes will only carry exporter metrics");
        Registry::new()
    } else {
        Registry::from_inventory()
            .select(&enabled)
            .unwrap_or_else(|e| {
                error!("Invalid collector configuration: {}", e);
                process::exit(1);
            })
    };

    let host = Host::new(&cfg.collectors.procfs_root);
    if let Err(e) = registry.initialize(&host).await {
        error!("{}", e);
        process::exit(1);
    }

    let executor = Executor::new(
        cfg.collectors.namespace.as_str(),
        Arc::new(ProcfsSnapshotProvider::new(&cfg.collectors.procfs_root)),
        cfg.collectors.buffer_capacity,
    );

    let listener = TcpListener::bind(cfg.web.listen_address.as_str())
        .await
        .unwrap_or_else(|e| {
            error!("Failed to bind {}: {}", cfg.web.listen_address, e);
            process::exit(1);
        });

    let state = AppState::new(registry, executor, cfg.web.clone(), readiness.clone());
    let registry = state.registry.clone();
    let shutdown = CancellationToken::new();
    let mut server = tokio::spawn(http::serve(
        listener,
        http::router(state),
        shutdown.clone(),
    ));

    readiness.set_state(ReadinessState::Ready);
    info!(
        "Serving {} collector(s) at {}",
        registry.len(),
        cfg.web.telemetry_path
    );

    let mut exit_code = 0;
    tokio::select! {
        result = &mut server => {
            error!("HTTP server stopped unexpectedly: {:?}", result);
            exit_code = 1;
        }
        _ = shutdown_signal() => {
            info!("Received shutdown signal, initiating graceful shutdown...");
            readiness.set_state(ReadinessState::ShuttingDown);
            shutdown.cancel();
            match server.await {
                Ok(Ok(())) => debug!("HTTP server drained"),
                Ok(Err(e)) => error!("HTTP server failed while draining: {}", e),
                Err(e) => error!("HTTP server task failed: {}", e),
            }
        }
    }

    registry.close().await;
    info!("Shutdown complete");

    if exit_code != 0 {
        process::exit(exit_code);
    }
    Ok(())
}
