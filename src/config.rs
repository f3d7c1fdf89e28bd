use std::path::PathBuf;
use std::sync::Arc;

use crate::engine::{Engine, EngineError};
use crate::limits::DEFAULT_MAX_CONFLICT_RETRIES;
use crate::store::{InMemoryStore, ReservationStore, WalStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Wal,
    Memory,
}

/// Process settings, read once from `SLOTBOOK_*` environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub store: StoreBackend,
    pub data_dir: PathBuf,
    pub compact_threshold: u64,
    pub max_conflict_retries: u32,
    pub metrics_port: Option<u16>,
}

impl Config {
    pub fn from_env() -> Result<Self, EngineError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Unparseable numbers fall back to defaults;
    /// an unknown store backend is an error.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, EngineError> {
        let backend = lookup("SLOTBOOK_STORE").map(|s| s.trim().to_ascii_lowercase());
        let store = match backend.as_deref() {
            None | Some("") | Some("wal") => StoreBackend::Wal,
            Some("memory") => StoreBackend::Memory,
            Some(other) => {
                return Err(EngineError::StoreUnavailable(format!(
                    "unknown store backend {other:?}"
                )));
            }
        };
        let data_dir = lookup("SLOTBOOK_DATA_DIR").unwrap_or_else(|| "./data".into());
        let compact_threshold = lookup("SLOTBOOK_COMPACT_THRESHOLD")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1000);
        let max_conflict_retries = lookup("SLOTBOOK_MAX_CONFLICT_RETRIES")
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_MAX_CONFLICT_RETRIES);
        let metrics_port = lookup("SLOTBOOK_METRICS_PORT").and_then(|s| s.parse().ok());
        Ok(Self {
            store,
            data_dir: PathBuf::from(data_dir),
            compact_threshold,
            max_conflict_retries,
            metrics_port,
        })
    }

    pub fn wal_path(&self) -> PathBuf {
        self.data_dir.join("reservations.wal")
    }

    /// Open the configured backend. The WAL store needs a tokio runtime.
    pub fn open_store(&self) -> Result<Arc<dyn ReservationStore>, EngineError> {
        match self.store {
            StoreBackend::Memory => Ok(Arc::new(InMemoryStore::new())),
            StoreBackend::Wal => {
                let unavailable =
                    |e: std::io::Error| EngineError::StoreUnavailable(format!("{}: {e}", self.data_dir.display()));
                std::fs::create_dir_all(&self.data_dir).map_err(unavailable)?;
                let store =
                    WalStore::open(self.wal_path(), self.compact_threshold).map_err(unavailable)?;
                Ok(Arc::new(store))
            }
        }
    }

    pub fn build_engine(&self) -> Result<Engine, EngineError> {
        Ok(Engine::new(self.open_store()?).with_max_conflict_retries(self.max_conflict_retries))
    }
}
