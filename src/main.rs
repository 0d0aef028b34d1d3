use std::io;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tracing::{info, warn};

use guesthouse::config::Config;
use guesthouse::engine::Engine;
use guesthouse::{compactor, observability, tls, wire};

const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Resolves on ctrl-c, or SIGTERM on unix.
async fn shutdown_signal() -> io::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate())?;
        tokio::select! {
            r = tokio::signal::ctrl_c() => r,
            _ = sigterm.recv() => Ok(()),
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await
    }
}

/// Wait until every connection permit is back, or the deadline passes.
async fn drain_connections(semaphore: &Semaphore, max_connections: usize) {
    let deadline = tokio::time::Instant::now() + DRAIN_TIMEOUT;
    while semaphore.available_permits() < max_connections {
        if tokio::time::Instant::now() >= deadline {
            let remaining = max_connections - semaphore.available_permits();
            warn!("drain timeout, {remaining} connections still open");
            return;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    info!("all connections drained");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let config = Config::from_env()?;
    observability::init(config.metrics_port)?;
    let tls_acceptor = match config.tls_paths() {
        Some((cert, key)) => Some(tls::load_tls_acceptor(cert, key)?),
        None => None,
    };

    std::fs::create_dir_all(&config.data_dir)?;
    let engine = Arc::new(Engine::new(config.wal_path(), config.engine_config())?);
    tokio::spawn(compactor::run_compactor(engine.clone(), config.compact_threshold));

    let semaphore = Arc::new(Semaphore::new(config.max_connections));
    let listener = TcpListener::bind(config.listen_addr()).await?;
    info!(
        addr = %config.listen_addr(),
        data_dir = %config.data_dir.display(),
        max_connections = config.max_connections,
        conflict_mode = ?config.conflict_mode,
        tls = tls_acceptor.is_some(),
        metrics_port = ?config.metrics_port,
        "guesthouse ready"
    );

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        let (socket, peer) = tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok(conn) => conn,
                Err(e) => {
                    tracing::error!("accept error: {e}");
                    continue;
                }
            },
            signal = &mut shutdown => {
                if let Err(e) = signal {
                    warn!("signal handler failed: {e}");
                }
                info!("shutting down, no longer accepting connections");
                break;
            }
        };

        let Ok(permit) = semaphore.clone().try_acquire_owned() else {
            warn!("connection limit reached, rejecting {peer}");
            metrics::counter!(observability::CONNECTIONS_REJECTED_TOTAL).increment(1);
            continue;
        };

        info!("connection from {peer}");
        metrics::counter!(observability::CONNECTIONS_TOTAL).increment(1);
        metrics::gauge!(observability::CONNECTIONS_ACTIVE).increment(1.0);

        let engine = engine.clone();
        let password = config.password.clone();
        let tls = tls_acceptor.clone();
        tokio::spawn(async move {
            if let Err(e) = wire::process_connection(socket, engine, password, tls).await {
                tracing::error!("connection error from {peer}: {e}");
            }
            metrics::gauge!(observability::CONNECTIONS_ACTIVE).decrement(1.0);
            drop(permit);
        });
    }

    drain_connections(&semaphore, config.max_connections).await;
    if let Err(e) = engine.compact_wal().await {
        warn!("final compaction failed: {e}");
    }
    info!("guesthouse stopped");
    Ok(())
}
