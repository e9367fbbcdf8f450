use crate::error::IoError;
use ascension_core::WorldStore;
use ascension_data::WorldState;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Commands for the background writer thread.
enum StoreCommand {
    Save(WorldState),
    Load(Sender<anyhow::Result<Option<WorldState>>>),
    Flush(Sender<()>),
    Stop,
}

/// Fire-and-forget wrapper around a blocking store.
///
/// `save` only queues the state; a writer thread performs the write. When
/// several saves are queued only the newest is written. Write failures are
/// logged and counted, never reported to the caller.
pub struct BackgroundStore {
    sender: Sender<StoreCommand>,
    failures: Arc<AtomicU64>,
    worker: Option<JoinHandle<()>>,
}

impl BackgroundStore {
    /// Spawns the writer thread that owns `inner`.
    pub fn new<S: WorldStore + 'static>(inner: S) -> Self {
        let (tx, rx) = mpsc::channel();
        let failures = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&failures);
        let worker = thread::Builder::new()
            .name("ascension-store".into())
            .spawn(move || run_writer(inner, rx, counter))
            .map_err(|e| tracing::error!(error = %e, "Failed to spawn store writer"))
            .ok();
        Self {
            sender: tx,
            failures,
            worker,
        }
    }

    /// Writes that failed on the writer thread so far.
    #[must_use]
    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }
}

fn run_writer<S: WorldStore>(inner: S, rx: Receiver<StoreCommand>, failures: Arc<AtomicU64>) {
    let write = |state: &WorldState| {
        if let Err(e) = inner.save(state) {
            failures.fetch_add(1, Ordering::Relaxed);
            let transient = e
                .downcast_ref::<IoError>()
                .map_or(true, IoError::is_transient);
            if transient {
                tracing::warn!(error = %e, "Background save failed");
            } else {
                tracing::error!(error = %e, "Background save rejected");
            }
        }
    };

    while let Ok(cmd) = rx.recv() {
        match cmd {
            StoreCommand::Save(mut state) => {
                let mut pending = None;
                // Coalesce queued saves; anything else waits its turn.
                loop {
                    match rx.try_recv() {
                        Ok(StoreCommand::Save(newer)) => state = newer,
                        Ok(other) => {
                            pending = Some(other);
                            break;
                        }
                        Err(_) => break,
                    }
                }
                write(&state);
                match pending {
                    Some(StoreCommand::Load(reply)) => {
                        let _ = reply.send(inner.load());
                    }
                    Some(StoreCommand::Flush(reply)) => {
                        if let Err(e) = inner.flush() {
                            tracing::warn!(error = %e, "Store flush failed");
                        }
                        let _ = reply.send(());
                    }
                    Some(StoreCommand::Stop) => break,
                    Some(StoreCommand::Save(_)) | None => {}
                }
            }
            StoreCommand::Load(reply) => {
                let _ = reply.send(inner.load());
            }
            StoreCommand::Flush(reply) => {
                if let Err(e) = inner.flush() {
                    tracing::warn!(error = %e, "Store flush failed");
                }
                let _ = reply.send(());
            }
            StoreCommand::Stop => break,
        }
    }
    tracing::debug!("Store writer stopped");
}

impl WorldStore for BackgroundStore {
    fn load(&self) -> anyhow::Result<Option<WorldState>> {
        let (tx, rx) = mpsc::channel();
        self.sender
            .send(StoreCommand::Load(tx))
            .map_err(|_| IoError::WriterGone("load"))?;
        rx.recv().map_err(|_| IoError::WriterGone("load"))?
    }

    fn save(&self, state: &WorldState) -> anyhow::Result<()> {
        self.sender
            .send(StoreCommand::Save(state.clone()))
            .map_err(|_| IoError::WriterGone("save"))?;
        Ok(())
    }

    fn flush(&self) -> anyhow::Result<()> {
        let (tx, rx) = mpsc::channel();
        self.sender
            .send(StoreCommand::Flush(tx))
            .map_err(|_| IoError::WriterGone("flush"))?;
        rx.recv().map_err(|_| IoError::WriterGone("flush"))?;
        Ok(())
    }
}

impl Drop for BackgroundStore {
    fn drop(&mut self) {
        let _ = self.sender.send(StoreCommand::Stop);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}
