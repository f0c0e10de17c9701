use crate::candidates::Candidate;
use crate::error::ScanError;
use crate::scanner::Scanner;
use crate::types::{ScanEvent, ScanReport};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Owns a scanner and guarantees at most one run is in flight at a time.
///
/// The caller (typically the presentation layer) holds the session and talks
/// to a running scan only through the returned [`ScanHandle`].
#[derive(Clone)]
pub struct ScanSession {
    scanner: Arc<Scanner>,
    active: Arc<AtomicBool>,
}

impl ScanSession {
    pub fn new(scanner: Scanner) -> Self {
        Self {
            scanner: Arc::new(scanner),
            active: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Start a scan on a background task.
    ///
    /// Fails with [`ScanError::AlreadyScanning`] while a previous run is still
    /// going; cancel it and `join` it first.
    pub fn start(&self, candidates: Vec<Candidate>) -> Result<ScanHandle, ScanError> {
        if self
            .active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(ScanError::AlreadyScanning);
        }

        let cancel = CancellationToken::new();
        let (tx, rx) = mpsc::unbounded_channel();
        let scanner = self.scanner.clone();
        let active = ActiveGuard(self.active.clone());
        let token = cancel.clone();

        let task = tokio::spawn(async move {
            let _active = active; // released when the run ends, even on panic
            scanner.run(&candidates, &token, &tx).await
        });

        Ok(ScanHandle {
            events: rx,
            cancel,
            task,
        })
    }
}

struct ActiveGuard(Arc<AtomicBool>);

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// The caller's side of one running scan.
pub struct ScanHandle {
    events: mpsc::UnboundedReceiver<ScanEvent>,
    cancel: CancellationToken,
    task: JoinHandle<ScanReport>,
}

impl ScanHandle {
    /// Next event from the worker, in the order stages ran. `None` once the
    /// run has finished and every event has been taken.
    pub async fn next_event(&mut self) -> Option<ScanEvent> {
        self.events.recv().await
    }

    /// Ask the worker to stop at its next checkpoint.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the run to end. Events not yet taken are discarded.
    pub async fn join(self) -> Result<ScanReport, ScanError> {
        self.task.await.map_err(|e| ScanError::WorkerFailed {
            reason: e.to_string(),
        })
    }
}
