//! Persistence runtime: one worker thread owns the backend and applies
//! store commands strictly in the order they were sent, so a save issued
//! after another is always applied after it.

mod backend;
mod error;

pub use crate::backend::{JsonFileBackend, KeyValueBackend, MemoryBackend, StoreFile};
pub use crate::error::StoreError;
pub use bus::{CategoryState, StoreEvent};

use bus::{Bus, StoreCommand};
use core_types::{DocumentUrl, HighlightDescriptor};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread::{self, JoinHandle};
use url::Url;

/// Canonical store key for a document address. The fragment is dropped so
/// every anchor of one page shares a record list.
pub fn normalize_url(raw: &str) -> Result<DocumentUrl, StoreError> {
    let mut url = Url::parse(raw.trim()).map_err(|err| StoreError::InvalidUrl {
        url: raw.to_string(),
        reason: err.to_string(),
    })?;
    url.set_fragment(None);
    Ok(url.into())
}

pub fn start_store_runtime(backend: impl KeyValueBackend + 'static) -> StoreHandle {
    let (bus, cmd_rx) = Bus::open();
    let evt_tx = bus.evt_tx.clone();
    let worker = thread::Builder::new()
        .name("store-runtime".to_string())
        .spawn(move || run(backend, cmd_rx, evt_tx));
    let worker = match worker {
        Ok(worker) => Some(worker),
        Err(err) => {
            log::warn!(target: "store.runtime", "could not start store thread: {err}");
            None
        }
    };
    StoreHandle { bus, worker }
}

fn run(mut backend: impl KeyValueBackend, cmd_rx: Receiver<StoreCommand>, evt_tx: Sender<StoreEvent>) {
    while let Ok(cmd) = cmd_rx.recv() {
        match cmd {
            StoreCommand::Load { url, reply } => {
                let result = backend.load(&url).map_err(|err| err.to_string());
                if let Err(err) = &result {
                    log::warn!(target: "store.runtime", "load {url} failed: {err}");
                }
                let _ = reply.send(result);
            }
            StoreCommand::Save { url, descriptors } => {
                let count = descriptors.len();
                match backend.save(&url, &descriptors) {
                    Ok(()) => {
                        log::debug!(target: "store.runtime", "saved {count} highlight(s) for {url}");
                        let _ = evt_tx.send(StoreEvent::Saved { url, count });
                    }
                    Err(err) => {
                        log::warn!(target: "store.runtime", "save {url} failed: {err}");
                        let _ = evt_tx.send(StoreEvent::Failed {
                            url: Some(url),
                            error: err.to_string(),
                        });
                    }
                }
            }
            StoreCommand::RememberCategory { category } => {
                match backend.remember_category(&category) {
                    Ok(()) => {
                        let _ = evt_tx.send(StoreEvent::CategoryRemembered { category });
                    }
                    Err(err) => {
                        log::warn!(target: "store.runtime", "remember category failed: {err}");
                        let _ = evt_tx.send(StoreEvent::Failed {
                            url: None,
                            error: err.to_string(),
                        });
                    }
                }
            }
            StoreCommand::LoadCategories { reply } => {
                let _ = reply.send(backend.categories().map_err(|err| err.to_string()));
            }
            StoreCommand::Flush { reply } => {
                let _ = reply.send(());
            }
            StoreCommand::Shutdown => break,
        }
    }
    log::debug!(target: "store.runtime", "store runtime stopped");
}

/// Caller side of a running store.
pub struct StoreHandle {
    bus: Bus,
    worker: Option<JoinHandle<()>>,
}

impl StoreHandle {
    fn send(&self, cmd: StoreCommand) -> Result<(), StoreError> {
        self.bus.cmd_tx.send(cmd).map_err(|_| StoreError::Disconnected)
    }

    pub fn load(&self, url: &str) -> Result<Vec<HighlightDescriptor>, StoreError> {
        let (reply, answer) = mpsc::channel();
        self.send(StoreCommand::Load {
            url: url.to_string(),
            reply,
        })?;
        answer
            .recv()
            .map_err(|_| StoreError::Disconnected)?
            .map_err(StoreError::Backend)
    }

    /// Queue a replacement of `url`'s list. Returns once queued; the outcome
    /// arrives later as a [`StoreEvent`].
    pub fn save(&self, url: &str, descriptors: Vec<HighlightDescriptor>) -> Result<(), StoreError> {
        self.send(StoreCommand::Save {
            url: url.to_string(),
            descriptors,
        })
    }

    pub fn remember_category(&self, category: &str) -> Result<(), StoreError> {
        self.send(StoreCommand::RememberCategory {
            category: category.to_string(),
        })
    }

    pub fn categories(&self) -> Result<CategoryState, StoreError> {
        let (reply, answer) = mpsc::channel();
        self.send(StoreCommand::LoadCategories { reply })?;
        answer
            .recv()
            .map_err(|_| StoreError::Disconnected)?
            .map_err(StoreError::Backend)
    }

    /// Block until every command sent so far has been applied.
    pub fn flush(&self) -> Result<(), StoreError> {
        let (reply, answer) = mpsc::channel();
        self.send(StoreCommand::Flush { reply })?;
        answer.recv().map_err(|_| StoreError::Disconnected)
    }

    /// Events produced so far, without waiting.
    pub fn drain_events(&self) -> Vec<StoreEvent> {
        let mut out = Vec::new();
        loop {
            match self.bus.evt_rx.try_recv() {
                Ok(event) => out.push(event),
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => return out,
            }
        }
    }

    /// Apply everything queued, then stop the worker.
    pub fn shutdown(mut self) -> Result<(), StoreError> {
        self.stop()
    }

    fn stop(&mut self) -> Result<(), StoreError> {
        let Some(worker) = self.worker.take() else {
            return Ok(());
        };
        let sent = self.send(StoreCommand::Shutdown);
        if worker.join().is_err() {
            log::warn!(target: "store.runtime", "store thread panicked");
            return Err(StoreError::Disconnected);
        }
        sent
    }
}

impl Drop for StoreHandle {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fragments_are_stripped() {
        assert_eq!(
            normalize_url("https://example.test/a/page?x=1#intro").unwrap(),
            "https://example.test/a/page?x=1"
        );
        assert_eq!(
            normalize_url("https://example.test/a/page#other").unwrap(),
            normalize_url("https://example.test/a/page").unwrap()
        );
    }

    #[test]
    fn relative_urls_are_rejected() {
        assert!(matches!(
            normalize_url("/a/page"),
            Err(StoreError::InvalidUrl { .. })
        ));
    }
}
