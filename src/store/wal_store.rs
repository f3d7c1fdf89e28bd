use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot, RwLock};
use tracing::{debug, error, info};
use ulid::Ulid;

use crate::model::*;
use crate::wal::Wal;

use super::{ReservationStore, StoreError};

pub type SharedReservations = Arc<RwLock<StoredReservations>>;

// ── Group-commit WAL channel ─────────────────────────────

enum WalCommand {
    Append {
        event: Event,
        response: oneshot::Sender<io::Result<()>>,
    },
    Compact {
        events: Vec<Event>,
        response: oneshot::Sender<io::Result<()>>,
    },
    AppendsSinceCompact {
        response: oneshot::Sender<u64>,
    },
}

/// Owns the log. Appends that queue up while a flush is pending are written
/// together and share one fsync.
async fn wal_writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<WalCommand>) {
    while let Some(cmd) = rx.recv().await {
        let (event, response) = match cmd {
            WalCommand::Append { event, response } => (event, response),
            other => {
                handle_control(&mut wal, other);
                continue;
            }
        };
        let mut batch = vec![(event, response)];
        let mut deferred = None;
        loop {
            match rx.try_recv() {
                Ok(WalCommand::Append { event, response }) => batch.push((event, response)),
                Ok(other) => {
                    deferred = Some(other);
                    break;
                }
                Err(_) => break,
            }
        }

        metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE).record(batch.len() as f64);
        let flush_start = std::time::Instant::now();
        let result = flush_batch(&mut wal, &batch);
        metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
            .record(flush_start.elapsed().as_secs_f64());
        for (_, tx) in batch {
            let _ = tx.send(match &result {
                Ok(()) => Ok(()),
                Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
            });
        }

        if let Some(cmd) = deferred {
            handle_control(&mut wal, cmd);
        }
    }
}

fn flush_batch(wal: &mut Wal, batch: &[(Event, oneshot::Sender<io::Result<()>>)]) -> io::Result<()> {
    let appended = batch
        .iter()
        .try_for_each(|(event, _)| wal.append_buffered(event));
    // Flush even after a failed append so a partial batch does not leak
    // into the next one.
    let flushed = wal.flush_sync();
    appended.and(flushed)
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
        WalCommand::Append { .. } => unreachable!("appends are batched by the writer loop"),
    }
}

/// Durable store: an in-memory copy of every class's list, written through
/// to an append-only log and rebuilt from it on open.
pub struct WalStore {
    lists: DashMap<Priority, SharedReservations>,
    wal_tx: mpsc::Sender<WalCommand>,
    compact_threshold: u64,
}

impl WalStore {
    /// Replay the log at `path` and start its writer task. Must run inside a
    /// tokio runtime.
    pub fn open(path: PathBuf, compact_threshold: u64) -> io::Result<Self> {
        let events = Wal::replay(&path)?;
        let wal = Wal::open(&path)?;
        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        let store = Self {
            lists: DashMap::new(),
            wal_tx,
            compact_threshold,
        };
        for event in &events {
            match event {
                Event::ReservationsReplaced {
                    priority,
                    version,
                    reservations,
                    ..
                } => {
                    let stored = StoredReservations {
                        version: *version,
                        reservations: reservations.clone(),
                    };
                    store
                        .lists
                        .insert(*priority, Arc::new(RwLock::new(stored)));
                }
            }
        }
        info!(
            "replayed {} records from {} ({} classes)",
            events.len(),
            path.display(),
            store.lists.len()
        );
        Ok(store)
    }

    fn shared(&self, priority: Priority) -> SharedReservations {
        self.lists.entry(priority).or_default().value().clone()
    }

    /// Write event to WAL via the background group-commit writer.
    async fn wal_append(&self, event: &Event) -> Result<(), StoreError> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Append {
                event: event.clone(),
                response: tx,
            })
            .await
            .map_err(|_| StoreError::Unavailable("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| StoreError::Unavailable("WAL writer dropped response".into()))?
            .map_err(|e| StoreError::Unavailable(format!("WAL write failed: {e}")))
    }

    pub async fn appends_since_compact(&self) -> Result<u64, StoreError> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::AppendsSinceCompact { response: tx })
            .await
            .map_err(|_| StoreError::Unavailable("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| StoreError::Unavailable("WAL writer dropped response".into()))
    }

    /// Rewrite the log as one record per class. Every class is write-locked
    /// while the snapshot is taken and swapped in, so no save can slip
    /// between the two.
    pub async fn compact(&self) -> Result<(), StoreError> {
        let mut guards = Vec::with_capacity(Priority::ALL.len());
        for priority in Priority::ALL {
            guards.push((priority, self.shared(priority).write_owned().await));
        }
        let events: Vec<Event> = guards
            .iter()
            .filter(|(_, g)| g.version > 0)
            .map(|(priority, g)| Event::ReservationsReplaced {
                id: Ulid::new(),
                priority: *priority,
                version: g.version,
                reservations: g.reservations.clone(),
            })
            .collect();

        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Compact {
                events,
                response: tx,
            })
            .await
            .map_err(|_| StoreError::Unavailable("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| StoreError::Unavailable("WAL writer dropped response".into()))?
            .map_err(|e| StoreError::Unavailable(format!("WAL compaction failed: {e}")))?;
        drop(guards);
        debug!("compacted reservation log");
        Ok(())
    }

    /// Compact once the log has grown past the threshold. The save that
    /// triggered it is already durable, so a failure here is only logged.
    async fn maybe_compact(&self) {
        let result = match self.appends_since_compact().await {
            Ok(n) if n >= self.compact_threshold => self.compact().await,
            Ok(_) => return,
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            error!("compaction failed, log keeps growing: {e}");
        }
    }
}

#[async_trait]
impl ReservationStore for WalStore {
    async fn load(&self, priority: Priority) -> Result<StoredReservations, StoreError> {
        Ok(self.shared(priority).read().await.clone())
    }

    async fn save(
        &self,
        priority: Priority,
        expected_version: u64,
        reservations: Vec<Ms>,
    ) -> Result<u64, StoreError> {
        let shared = self.shared(priority);
        let mut guard = shared.write().await;
        if guard.version != expected_version {
            return Err(StoreError::VersionConflict {
                priority,
                expected: expected_version,
                actual: guard.version,
            });
        }
        let version = guard.version + 1;
        let event = Event::ReservationsReplaced {
            id: Ulid::new(),
            priority,
            version,
            reservations,
        };
        self.wal_append(&event).await?;
        let Event::ReservationsReplaced { reservations, .. } = event;
        guard.version = version;
        guard.reservations = reservations;
        drop(guard);

        self.maybe_compact().await;
        Ok(version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_wal_path(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("slotbook_test_wal_store");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        let _ = std::fs::remove_file(&path);
        path
    }

    #[tokio::test]
    async fn save_then_reopen() {
        let path = test_wal_path("reopen.wal");
        {
            let store = WalStore::open(path.clone(), 1000).unwrap();
            store.save(Priority::P1, 0, vec![100]).await.unwrap();
            store.save(Priority::P1, 1, vec![100, 200]).await.unwrap();
            store.save(Priority::R2, 0, vec![300]).await.unwrap();
        }

        let store = WalStore::open(path, 1000).unwrap();
        let p1 = store.load(Priority::P1).await.unwrap();
        assert_eq!(p1.version, 2);
        assert_eq!(p1.reservations, vec![100, 200]);
        assert_eq!(store.load(Priority::R2).await.unwrap().reservations, vec![300]);
        assert_eq!(store.load(Priority::P3).await.unwrap(), StoredReservations::default());
    }

    #[tokio::test]
    async fn stale_save_is_not_logged() {
        let path = test_wal_path("stale.wal");
        {
            let store = WalStore::open(path.clone(), 1000).unwrap();
            store.save(Priority::P2, 0, vec![1]).await.unwrap();
            let err = store.save(Priority::P2, 0, vec![9]).await.unwrap_err();
            assert!(matches!(err, StoreError::VersionConflict { actual: 1, .. }));
            assert_eq!(store.appends_since_compact().await.unwrap(), 1);
        }
        let store = WalStore::open(path, 1000).unwrap();
        assert_eq!(store.load(Priority::P2).await.unwrap().reservations, vec![1]);
    }

    #[tokio::test]
    async fn threshold_triggers_compaction() {
        let path = test_wal_path("auto_compact.wal");
        {
            let store = WalStore::open(path.clone(), 4).unwrap();
            let mut list = Vec::new();
            for v in 0..10u64 {
                list.push(v as i64 * 1000);
                store.save(Priority::R1, v, list.clone()).await.unwrap();
            }
            assert!(store.appends_since_compact().await.unwrap() < 4);
        }

        let replayed = Wal::replay(&path).unwrap();
        assert!(replayed.len() < 10, "log should have been compacted, got {}", replayed.len());

        let store = WalStore::open(path, 4).unwrap();
        let r1 = store.load(Priority::R1).await.unwrap();
        assert_eq!(r1.version, 10);
        assert_eq!(r1.reservations.len(), 10);
    }

    #[tokio::test]
    async fn explicit_compaction_keeps_every_class() {
        let path = test_wal_path("explicit_compact.wal");
        let store = WalStore::open(path.clone(), 1000).unwrap();
        store.save(Priority::P1, 0, vec![1]).await.unwrap();
        store.save(Priority::P1, 1, vec![1, 2]).await.unwrap();
        store.save(Priority::R3, 0, vec![3]).await.unwrap();
        store.compact().await.unwrap();

        let replayed = Wal::replay(&path).unwrap();
        assert_eq!(replayed.len(), 2);
        let mut classes: Vec<Priority> = replayed.iter().map(Event::priority).collect();
        classes.sort();
        assert_eq!(classes, vec![Priority::P1, Priority::R3]);

        // Still writable after the swap.
        store.save(Priority::R3, 1, vec![3, 4]).await.unwrap();
        assert_eq!(Wal::replay(&path).unwrap().len(), 3);
    }

    #[tokio::test]
    async fn failed_compaction_does_not_fail_the_save() {
        let path = test_wal_path("blocked_compact.wal");
        let tmp = path.with_extension("wal.tmp");
        let _ = std::fs::remove_file(&tmp);
        let _ = std::fs::remove_dir_all(&tmp);
        std::fs::create_dir_all(&tmp).unwrap();

        let store = WalStore::open(path.clone(), 1).unwrap();
        let mut list = Vec::new();
        for v in 0..3u64 {
            list.push(v as i64 * 1000);
            assert_eq!(store.save(Priority::P1, v, list.clone()).await.unwrap(), v + 1);
        }
        assert!(store.compact().await.is_err());

        let stored = store.load(Priority::P1).await.unwrap();
        assert_eq!(stored.version, 3);
        assert_eq!(stored.reservations, list);
        std::fs::remove_dir_all(&tmp).unwrap();

        let reopened = WalStore::open(path, 1).unwrap();
        assert_eq!(reopened.load(Priority::P1).await.unwrap(), stored);
    }
}
