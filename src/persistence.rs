//! Durable storage for orchestrator state.
//!
//! The orchestrator never blocks a recognition request on storage: every
//! mutation hands a snapshot to [`StateWriter`], whose background task
//! saves snapshots in the order they were taken. Saves are best-effort;
//! a failure is logged and counted and in-memory state stays authoritative.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, Mutex};

use crate::codec::{decode_state, encode_state};
use crate::error::PersistenceError;
use crate::state::OrchestratorState;

/// Storage backend for the whole orchestrator state
#[async_trait]
pub trait PersistenceGateway: Send + Sync {
    /// Load the last saved state. `Ok(None)` means nothing was ever saved.
    async fn load(&self) -> Result<Option<OrchestratorState>, PersistenceError>;

    /// Replace the saved state with `state`
    async fn save(&self, state: &OrchestratorState) -> Result<(), PersistenceError>;
}

/// JSON document on the local filesystem
///
/// Writes go to a sibling temp file that is renamed over the target, so a
/// crash mid-write never leaves a truncated document behind.
#[derive(Debug, Clone)]
pub struct JsonFilePersistence {
    path: PathBuf,
}

impl JsonFilePersistence {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "state.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl PersistenceGateway for JsonFilePersistence {
    async fn load(&self) -> Result<Option<OrchestratorState>, PersistenceError> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        decode_state(&contents)
            .map(Some)
            .map_err(|e| PersistenceError::Decode(e.to_string()))
    }

    async fn save(&self, state: &OrchestratorState) -> Result<(), PersistenceError> {
        let encoded = encode_state(state)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let temp_path = self.temp_path();
        tokio::fs::write(&temp_path, encoded).await?;
        tokio::fs::rename(&temp_path, &self.path).await?;

        Ok(())
    }
}

/// In-process gateway holding the encoded document, for tests and embedding
#[derive(Debug, Default)]
pub struct MemoryPersistence {
    document: Mutex<Option<String>>,
    saves: AtomicUsize,
    fail_saves: AtomicBool,
}

impl MemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Gateway pre-populated with `state`, as if it had been saved earlier
    pub fn with_state(state: &OrchestratorState) -> Result<Self, PersistenceError> {
        Ok(Self::with_document(encode_state(state)?))
    }

    /// Gateway pre-populated with a raw document, valid or not
    pub fn with_document(document: impl Into<String>) -> Self {
        Self {
            document: Mutex::new(Some(document.into())),
            ..Self::default()
        }
    }

    /// Make every subsequent save fail with an I/O error
    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    /// Number of successful saves so far
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    /// Last saved state, decoded
    pub async fn stored(&self) -> Option<OrchestratorState> {
        let document = self.document.lock().await;
        document.as_deref().and_then(|doc| decode_state(doc).ok())
    }
}

#[async_trait]
impl PersistenceGateway for MemoryPersistence {
    async fn load(&self) -> Result<Option<OrchestratorState>, PersistenceError> {
        let document = self.document.lock().await;
        match document.as_deref() {
            Some(doc) => decode_state(doc)
                .map(Some)
                .map_err(|e| PersistenceError::Decode(e.to_string())),
            None => Ok(None),
        }
    }

    async fn save(&self, state: &OrchestratorState) -> Result<(), PersistenceError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(PersistenceError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "simulated storage failure",
            )));
        }

        let encoded = encode_state(state)?;
        *self.document.lock().await = Some(encoded);
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Debug)]
enum WriterMessage {
    Save(Box<OrchestratorState>),
    Flush(oneshot::Sender<()>),
}

/// Background saver handle
///
/// Snapshots sent from a single lock holder arrive in mutation order.
/// When saves fall behind, queued snapshots are coalesced and only the
/// newest one is written.
#[derive(Clone)]
pub struct StateWriter {
    sender: mpsc::UnboundedSender<WriterMessage>,
}

impl StateWriter {
    /// Spawn the writer task on the current tokio runtime
    pub fn spawn(gateway: Arc<dyn PersistenceGateway>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            writer_task(gateway, rx).await;
        });

        Self { sender: tx }
    }

    /// Queue a snapshot for saving (non-blocking)
    pub fn save(&self, state: OrchestratorState) {
        if self
            .sender
            .send(WriterMessage::Save(Box::new(state)))
            .is_err()
        {
            tracing::warn!("State writer stopped; snapshot dropped");
        }
    }

    /// Wait until every snapshot queued before this call has been handled
    pub async fn flush(&self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.sender.send(WriterMessage::Flush(ack_tx)).is_err() {
            return;
        }
        let _ = ack_rx.await;
    }
}

async fn writer_task(
    gateway: Arc<dyn PersistenceGateway>,
    mut rx: mpsc::UnboundedReceiver<WriterMessage>,
) {
    while let Some(message) = rx.recv().await {
        let mut pending = None;
        let mut acks = Vec::new();

        match message {
            WriterMessage::Save(state) => pending = Some(state),
            WriterMessage::Flush(ack) => acks.push(ack),
        }

        // Drain whatever queued up behind the first message
        while let Ok(message) = rx.try_recv() {
            match message {
                WriterMessage::Save(state) => pending = Some(state),
                WriterMessage::Flush(ack) => acks.push(ack),
            }
        }

        if let Some(state) = pending {
            write_snapshot(gateway.as_ref(), &state).await;
        }

        for ack in acks {
            let _ = ack.send(());
        }
    }

    tracing::debug!("State writer task shutting down");
}

async fn write_snapshot(gateway: &dyn PersistenceGateway, state: &OrchestratorState) {
    let start = std::time::Instant::now();

    match gateway.save(state).await {
        Ok(()) => {
            tracing::debug!(
                providers = state.providers.len(),
                duration_ms = start.elapsed().as_millis(),
                "State saved"
            );
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to save orchestrator state");
            crate::metrics::record_persist_failure();
        }
    }
}
