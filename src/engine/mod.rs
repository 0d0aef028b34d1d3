mod availability;
mod conflict;
mod error;
mod mutations;
mod queries;
mod resolver;
pub mod store;
#[cfg(test)]
mod tests;

pub use availability::{booked_periods_by_house, free_spans, merge_overlapping, subtract_intervals};
pub use conflict::{find_conflict, ConflictMode};
pub use error::EngineError;

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::info;

use crate::model::*;
use crate::wal::Wal;

use store::Tables;

// ── Group-commit WAL channel ─────────────────────────────

pub(super) enum WalCommand {
    Append {
        event: Event,
        response: Ack,
    },
    Compact {
        events: Vec<Event>,
        response: Ack,
    },
    AppendsSinceCompact {
        response: oneshot::Sender<u64>,
    },
}

/// Most commands taken off the channel per wake-up; one fsync covers every
/// append among them.
const MAX_BATCH: usize = 512;

pub(super) type Ack = oneshot::Sender<io::Result<()>>;

/// Owns the WAL. Each wake-up drains whatever commands are queued, buffers
/// consecutive appends and syncs them once before answering their senders.
/// Commands are handled in arrival order.
async fn wal_writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<WalCommand>) {
    let mut commands = Vec::with_capacity(MAX_BATCH);
    let mut pending: Vec<Ack> = Vec::new();

    while rx.recv_many(&mut commands, MAX_BATCH).await > 0 {
        let mut buffer_err: Option<io::Error> = None;
        for cmd in commands.drain(..) {
            match cmd {
                WalCommand::Append { event, response } => {
                    if buffer_err.is_none()
                        && let Err(e) = wal.append_buffered(&event)
                    {
                        buffer_err = Some(e);
                    }
                    pending.push(response);
                }
                other => {
                    sync_and_ack(&mut wal, &mut pending, buffer_err.take());
                    handle_control(&mut wal, other);
                }
            }
        }
        sync_and_ack(&mut wal, &mut pending, buffer_err.take());
    }
}

/// Flush buffered appends and tell each waiting writer how it went.
fn sync_and_ack(wal: &mut Wal, pending: &mut Vec<Ack>, buffer_err: Option<io::Error>) {
    if pending.is_empty() {
        return;
    }
    metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE).record(pending.len() as f64);
    let started = std::time::Instant::now();
    // Flush even after a buffering error so partial bytes don't trail into the next batch.
    let flushed = wal.flush_sync();
    metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
        .record(started.elapsed().as_secs_f64());

    let failure = buffer_err.or(flushed.err());
    if let Some(e) = &failure {
        tracing::error!("WAL flush failed for {} events: {e}", pending.len());
    }
    for ack in pending.drain(..) {
        let result = match &failure {
            None => Ok(()),
            Some(e) => Err(io::Error::new(e.kind(), e.to_string())),
        };
        let _ = ack.send(result);
    }
}

fn handle_control(wal: &mut Wal, cmd: WalCommand) {
    match cmd {
        WalCommand::Compact { events, response } => {
            let result = Wal::write_compact_file(wal.path(), &events)
                .and_then(|()| wal.swap_compact_file());
            let _ = response.send(result);
        }
        WalCommand::AppendsSinceCompact { response } => {
            let _ = response.send(wal.appends_since_compact());
        }
        WalCommand::Append { event, response } => {
            let result = wal.append_buffered(&event).and_then(|()| wal.flush_sync());
            let _ = response.send(result);
        }
    }
}

// ── Engine ───────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Deadline for acquiring the store for one operation.
    pub op_timeout: Duration,
    pub conflict_mode: ConflictMode,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            op_timeout: Duration::from_secs(5),
            conflict_mode: ConflictMode::Overlap,
        }
    }
}

pub struct Engine {
    pub(super) tables: RwLock<Tables>,
    pub(super) wal_tx: mpsc::Sender<WalCommand>,
    pub(super) config: EngineConfig,
}

impl Engine {
    /// Replay the WAL at `wal_path` and start the group-commit writer.
    /// Must be called from within a tokio runtime.
    pub fn new(wal_path: PathBuf, config: EngineConfig) -> io::Result<Self> {
        let (wal, events) = Wal::open_and_replay(&wal_path)?;
        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        let mut tables = Tables::new();
        for event in &events {
            tables.apply(event);
        }
        info!(
            "replayed {} WAL events from {}: {} houses, {} clients, {} services, {} rentals",
            events.len(),
            wal_path.display(),
            tables.houses.len(),
            tables.clients.len(),
            tables.services.len(),
            tables.rentals.len(),
        );

        Ok(Self {
            tables: RwLock::new(tables),
            wal_tx,
            config,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Shared access to the store, bounded by the operation deadline.
    pub(super) async fn read_tables(&self) -> Result<RwLockReadGuard<'_, Tables>, EngineError> {
        tokio::time::timeout(self.config.op_timeout, self.tables.read())
            .await
            .map_err(|_| EngineError::Timeout)
    }

    /// Exclusive access to the store: the transaction every mutation runs in.
    pub(super) async fn write_tables(&self) -> Result<RwLockWriteGuard<'_, Tables>, EngineError> {
        tokio::time::timeout(self.config.op_timeout, self.tables.write())
            .await
            .map_err(|_| EngineError::Timeout)
    }

    /// Write event to WAL via the background group-commit writer.
    async fn wal_append(&self, event: &Event) -> Result<(), EngineError> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Append {
                event: event.clone(),
                response: tx,
            })
            .await
            .map_err(|_| EngineError::Storage("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::Storage("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::Storage(e.to_string()))
    }

    /// WAL-append then apply, under the caller's write guard.
    pub(super) async fn persist_and_apply(
        &self,
        tables: &mut Tables,
        event: &Event,
    ) -> Result<(), EngineError> {
        self.wal_append(event).await?;
        tables.apply(event);
        Ok(())
    }

    /// Compact the WAL by rewriting it with only the events needed to recreate the current state.
    pub async fn compact_wal(&self) -> Result<(), EngineError> {
        // Hold the read lock until the swap so no append lands between snapshot and rewrite.
        let tables = self.read_tables().await?;
        let events = tables.snapshot_events();

        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Compact { events, response: tx })
            .await
            .map_err(|_| EngineError::Storage("WAL writer shut down".into()))?;
        let result = rx
            .await
            .map_err(|_| EngineError::Storage("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::Storage(e.to_string()));
        drop(tables);
        result
    }

    pub async fn wal_appends_since_compact(&self) -> u64 {
        let (tx, rx) = oneshot::channel();
        if self
            .wal_tx
            .send(WalCommand::AppendsSinceCompact { response: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}
