//! The automation layer that supplies raw message rows.
//!
//! The worker only sees the async [`Collaborator`] trait.  Sources that do
//! blocking I/O implement [`BlockingSource`] instead and are driven from a
//! dedicated OS thread by [`ThreadedCollaborator`], so a slow scrape never
//! stalls the runtime that also serves operator commands.
pub mod feed_file;

use std::thread;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::{info, warn};

/// One visible row of the live message table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RawRow {
    /// Range / number column (usually contains the receiving phone number).
    pub range_info: String,
    /// Message body column.
    pub message_text: String,
}

#[cfg(test)]
impl RawRow {
    pub fn new(range_info: impl Into<String>, message_text: impl Into<String>) -> Self {
        Self {
            range_info: range_info.into(),
            message_text: message_text.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum CollaboratorError {
    #[error("collaborator unavailable: {0}")]
    Unavailable(String),

    #[error("collaborator thread is gone")]
    Disconnected,
}

/// Navigation primitives and row supply, as consumed by the poll worker.
#[async_trait]
pub trait Collaborator: Send {
    /// Reach (or verify) the monitoring view.  `false` on unrecoverable failure.
    async fn ensure_ready(&mut self) -> bool;

    /// Currently visible rows.  An empty batch is a normal result.
    async fn fetch_rows(&mut self) -> Result<Vec<RawRow>, CollaboratorError>;

    /// Re-navigate / refresh after a stale or stuck view.
    async fn force_resync(&mut self) -> bool;

    /// Release every automation resource.
    async fn shutdown(&mut self);
}

/// Synchronous counterpart of [`Collaborator`] for sources doing blocking I/O.
pub trait BlockingSource: Send + 'static {
    fn ensure_ready(&mut self) -> bool;
    fn fetch_rows(&mut self) -> Result<Vec<RawRow>, CollaboratorError>;
    fn force_resync(&mut self) -> bool;
    fn shutdown(&mut self);
}

enum Request {
    EnsureReady(oneshot::Sender<bool>),
    FetchRows(oneshot::Sender<Result<Vec<RawRow>, CollaboratorError>>),
    ForceResync(oneshot::Sender<bool>),
    Shutdown(oneshot::Sender<()>),
}

/// Runs a [`BlockingSource`] on its own thread and talks to it over a channel.
///
/// Dropping the handle without calling `shutdown` closes the channel; the
/// thread then shuts the source down on its own.
pub struct ThreadedCollaborator {
    tx: mpsc::Sender<Request>,
}

impl ThreadedCollaborator {
    pub fn spawn<S: BlockingSource>(source: S) -> std::io::Result<Self> {
        let (tx, rx) = mpsc::channel(8);
        thread::Builder::new()
            .name("collaborator".into())
            .spawn(move || serve(source, rx))?;
        Ok(Self { tx })
    }

    async fn call<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> Request,
    ) -> Result<T, CollaboratorError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(make(reply_tx))
            .await
            .map_err(|_| CollaboratorError::Disconnected)?;
        reply_rx.await.map_err(|_| CollaboratorError::Disconnected)
    }
}

fn serve<S: BlockingSource>(mut source: S, mut rx: mpsc::Receiver<Request>) {
    while let Some(req) = rx.blocking_recv() {
        match req {
            Request::EnsureReady(reply) => {
                let _ = reply.send(source.ensure_ready());
            }
            Request::FetchRows(reply) => {
                let _ = reply.send(source.fetch_rows());
            }
            Request::ForceResync(reply) => {
                let _ = reply.send(source.force_resync());
            }
            Request::Shutdown(reply) => {
                source.shutdown();
                let _ = reply.send(());
                info!("Collaborator thread finished.");
                return;
            }
        }
    }
    // Every sender dropped without an explicit shutdown.
    warn!("Collaborator handle dropped – releasing source");
    source.shutdown();
}

#[async_trait]
impl Collaborator for ThreadedCollaborator {
    async fn ensure_ready(&mut self) -> bool {
        self.call(Request::EnsureReady).await.unwrap_or(false)
    }

    async fn fetch_rows(&mut self) -> Result<Vec<RawRow>, CollaboratorError> {
        self.call(Request::FetchRows).await?
    }

    async fn force_resync(&mut self) -> bool {
        self.call(Request::ForceResync).await.unwrap_or(false)
    }

    async fn shutdown(&mut self) {
        if self.call(Request::Shutdown).await.is_err() {
            warn!("Collaborator thread already gone at shutdown");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    struct CountingSource {
        fetches: usize,
        shutdowns: Arc<AtomicUsize>,
    }

    impl BlockingSource for CountingSource {
        fn ensure_ready(&mut self) -> bool {
            true
        }

        fn fetch_rows(&mut self) -> Result<Vec<RawRow>, CollaboratorError> {
            self.fetches += 1;
            if self.fetches == 2 {
                return Err(CollaboratorError::Unavailable("page gone".into()));
            }
            Ok(vec![RawRow::new("201001234567", format!("fetch {}", self.fetches))])
        }

        fn force_resync(&mut self) -> bool {
            self.fetches = 0;
            true
        }

        fn shutdown(&mut self) {
            self.shutdowns.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn source() -> (CountingSource, Arc<AtomicUsize>) {
        let shutdowns = Arc::new(AtomicUsize::new(0));
        (
            CountingSource {
                fetches: 0,
                shutdowns: Arc::clone(&shutdowns),
            },
            shutdowns,
        )
    }

    #[tokio::test]
    async fn threaded_calls_round_trip() {
        let (src, shutdowns) = source();
        let mut c = ThreadedCollaborator::spawn(src).unwrap();

        assert!(c.ensure_ready().await);
        let rows = c.fetch_rows().await.unwrap();
        assert_eq!(rows[0].message_text, "fetch 1");
        assert!(matches!(
            c.fetch_rows().await,
            Err(CollaboratorError::Unavailable(_))
        ));
        assert!(c.force_resync().await);
        assert_eq!(c.fetch_rows().await.unwrap()[0].message_text, "fetch 1");

        c.shutdown().await;
        assert_eq!(shutdowns.load(Ordering::SeqCst), 1);

        // Thread has exited: further calls report disconnection.
        assert!(!c.ensure_ready().await);
        assert!(matches!(
            c.fetch_rows().await,
            Err(CollaboratorError::Disconnected)
        ));
    }

    #[tokio::test]
    async fn dropping_handle_still_releases_source() {
        let (src, shutdowns) = source();
        let c = ThreadedCollaborator::spawn(src).unwrap();
        drop(c);

        for _ in 0..100 {
            if shutdowns.load(Ordering::SeqCst) == 1 {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        panic!("source was not shut down after the handle was dropped");
    }
}
