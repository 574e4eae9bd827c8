use std::path::Path;

use tokio::sync::{mpsc, oneshot};

use xemphim_core::error::CoreError;
use xemphim_core::storage::{KeyValueStore, Storage};

/// Async handle to the SQLite key-value store, which lives on its own thread.
#[derive(Clone)]
pub struct StorageHandle {
    tx: mpsc::UnboundedSender<DbCommand>,
}

enum DbCommand {
    Get {
        key: String,
        reply: oneshot::Sender<Result<Option<String>, CoreError>>,
    },
    Set {
        key: String,
        value: String,
        reply: oneshot::Sender<Result<(), CoreError>>,
    },
    Remove {
        key: String,
        reply: oneshot::Sender<Result<(), CoreError>>,
    },
}

impl StorageHandle {
    pub fn open(path: &Path) -> Option<Self> {
        let storage = Storage::open(path)
            .map_err(|e| tracing::error!("Failed to open database: {e}"))
            .ok()?;
        Self::spawn(storage)
    }

    /// In-memory store, for tests and throwaway sessions.
    pub fn open_memory() -> Option<Self> {
        let storage = Storage::open_memory()
            .map_err(|e| tracing::error!("Failed to open in-memory database: {e}"))
            .ok()?;
        Self::spawn(storage)
    }

    fn spawn(storage: Storage) -> Option<Self> {
        let (tx, rx) = mpsc::unbounded_channel();

        std::thread::Builder::new()
            .name("storage-actor".into())
            .spawn(move || actor_loop(storage, rx))
            .map_err(|e| tracing::error!("Failed to spawn storage thread: {e}"))
            .ok()?;

        Some(Self { tx })
    }
}

impl KeyValueStore for StorageHandle {
    async fn get(&self, key: &str) -> Result<Option<String>, CoreError> {
        let (reply, rx) = oneshot::channel();
        let _ = self.tx.send(DbCommand::Get {
            key: key.to_string(),
            reply,
        });
        rx.await.unwrap_or_else(|_| Err(actor_closed()))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), CoreError> {
        let (reply, rx) = oneshot::channel();
        let _ = self.tx.send(DbCommand::Set {
            key: key.to_string(),
            value: value.to_string(),
            reply,
        });
        rx.await.unwrap_or_else(|_| Err(actor_closed()))
    }

    async fn remove(&self, key: &str) -> Result<(), CoreError> {
        let (reply, rx) = oneshot::channel();
        let _ = self.tx.send(DbCommand::Remove {
            key: key.to_string(),
            reply,
        });
        rx.await.unwrap_or_else(|_| Err(actor_closed()))
    }
}

fn actor_closed() -> CoreError {
    CoreError::StorageRead("storage actor closed".into())
}

fn actor_loop(storage: Storage, mut rx: mpsc::UnboundedReceiver<DbCommand>) {
    while let Some(cmd) = rx.blocking_recv() {
        match cmd {
            DbCommand::Get { key, reply } => {
                let _ = reply.send(storage.get(&key));
            }
            DbCommand::Set { key, value, reply } => {
                let _ = reply.send(storage.set(&key, &value));
            }
            DbCommand::Remove { key, reply } => {
                let _ = reply.send(storage.remove(&key));
            }
        }
    }
    tracing::debug!("Storage actor stopped");
}
