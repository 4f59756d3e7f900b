//! Request lifecycle controller.
//!
//! One [`Lifecycle`] is shared by a request and every redirect hop forked
//! from it. It owns the state machine
//!
//! ```text
//! Created -> Started -> Opened -> { Resolved, Rejected }
//! ```
//!
//! along with the abort/timeout flags, the first rejection reason, the
//! transfer counters and the typed listeners that replace the event emitter
//! of callback-based clients.
//!
//! # Abort
//!
//! Aborting is idempotent and cooperative: the first effective call sets the
//! flag, records the reason, notifies abort listeners, emits a final progress
//! event and wakes every task waiting on [`Lifecycle::cancelled`]. Calls made
//! after the request is already aborted, settled or fully transferred are
//! no-ops.
//!
//! # Locking
//!
//! State lives behind a `parking_lot::Mutex` that is never held while a
//! listener runs, so listeners may call back into the request (for example to
//! abort it) without deadlocking.

use crate::error::{BoxError, Error, ErrorCode};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::watch;

/// Progress listener. Returning an error aborts the request with it as cause.
pub type ProgressListener = Arc<dyn Fn(&Progress) -> Result<(), BoxError> + Send + Sync>;

/// Abort listener
pub type AbortListener = Arc<dyn Fn() + Send + Sync>;

/// Redirect listener, called with the resolved next URL.
pub type RedirectListener = Arc<dyn Fn(&str) + Send + Sync>;

/// Lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Built, middleware may still be attached
    Created,
    /// Dispatch has begun
    Started,
    /// The transport has been invoked
    Opened,
    /// Settled with a response
    Resolved,
    /// Settled with an error
    Rejected,
}

/// Snapshot of the transfer counters.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Progress {
    /// Bytes written so far
    pub uploaded_bytes: u64,
    /// Expected upload size, when known
    pub upload_length: Option<u64>,
    /// Bytes read so far
    pub downloaded_bytes: u64,
    /// Expected download size, when known
    pub download_length: Option<u64>,
    /// Upload ratio in `[0, 1]`
    pub uploaded: f64,
    /// Download ratio in `[0, 1]`
    pub downloaded: f64,
}

impl Progress {
    /// `(uploaded + downloaded) / 2`
    pub fn completed(&self) -> f64 {
        (self.uploaded + self.downloaded) / 2.0
    }

    /// Bytes moved in both directions
    pub fn completed_bytes(&self) -> u64 {
        self.uploaded_bytes + self.downloaded_bytes
    }

    /// Sum of the known lengths
    pub fn total_bytes(&self) -> u64 {
        self.upload_length.unwrap_or(0) + self.download_length.unwrap_or(0)
    }
}

#[derive(Clone, Copy)]
pub(crate) enum Direction {
    Upload,
    Download,
}

#[derive(Default, Clone)]
pub(crate) struct Listeners {
    progress: Vec<ProgressListener>,
    abort: Vec<AbortListener>,
    redirect: Vec<RedirectListener>,
}

struct State {
    phase: Phase,
    opened: bool,
    aborted: bool,
    timed_out: bool,
    reason: Option<Error>,
    progress: Progress,
    listeners: Listeners,
}

/// Shared lifecycle state of one logical request.
pub struct Lifecycle {
    state: Mutex<State>,
    abort_tx: watch::Sender<bool>,
}

impl Lifecycle {
    pub(crate) fn new() -> Self {
        Self::with_listeners(Listeners::default())
    }

    pub(crate) fn with_listeners(listeners: Listeners) -> Self {
        let (abort_tx, _) = watch::channel(false);
        Lifecycle {
            state: Mutex::new(State {
                phase: Phase::Created,
                opened: false,
                aborted: false,
                timed_out: false,
                reason: None,
                progress: Progress::default(),
                listeners,
            }),
            abort_tx,
        }
    }

    pub(crate) fn listeners(&self) -> Listeners {
        self.state.lock().listeners.clone()
    }

    /// Current phase
    pub fn phase(&self) -> Phase {
        self.state.lock().phase
    }

    /// Transition `Created -> Started`; `false` when already started.
    pub(crate) fn start(&self) -> bool {
        let mut state = self.state.lock();
        if state.phase != Phase::Created {
            return false;
        }
        state.phase = Phase::Started;
        true
    }

    pub(crate) fn mark_opened(&self) {
        let mut state = self.state.lock();
        state.opened = true;
        if state.phase == Phase::Started {
            state.phase = Phase::Opened;
        }
    }

    pub(crate) fn settle(&self, resolved: bool) {
        let mut state = self.state.lock();
        if !matches!(state.phase, Phase::Resolved | Phase::Rejected) {
            state.phase = if resolved { Phase::Resolved } else { Phase::Rejected };
        }
    }

    /// Whether dispatch has begun
    pub fn is_started(&self) -> bool {
        self.phase() != Phase::Created
    }

    /// Whether the transport has been invoked
    pub fn is_opened(&self) -> bool {
        self.state.lock().opened
    }

    /// Whether the request was aborted
    pub fn is_aborted(&self) -> bool {
        self.state.lock().aborted
    }

    /// Whether the request timed out
    pub fn is_timed_out(&self) -> bool {
        self.state.lock().timed_out
    }

    /// The first recorded rejection reason
    pub fn reason(&self) -> Option<Error> {
        self.state.lock().reason.clone()
    }

    /// Counter snapshot
    pub fn progress(&self) -> Progress {
        self.state.lock().progress
    }

    /// Abort with the default `EABORT` reason.
    pub fn abort(&self) -> bool {
        self.abort_with(None)
    }

    /// Abort, recording `reason` unless an earlier reason exists.
    ///
    /// Returns `true` only for the first effective abort.
    pub(crate) fn abort_with(&self, reason: Option<Error>) -> bool {
        self.abort_inner(reason, false)
    }

    /// Record a timeout reason and abort.
    pub(crate) fn time_out(&self, reason: Error) -> bool {
        self.abort_inner(Some(reason), true)
    }

    fn abort_inner(&self, reason: Option<Error>, timed_out: bool) -> bool {
        let listeners = {
            let mut state = self.state.lock();
            let settled = matches!(state.phase, Phase::Resolved | Phase::Rejected);
            if settled || state.aborted || state.progress.completed() >= 1.0 {
                return false;
            }
            state.aborted = true;
            state.timed_out = timed_out;
            if state.reason.is_none() {
                state.reason = reason;
            }
            state.listeners.abort.clone()
        };

        tracing::debug!("request aborted");
        self.abort_tx.send_replace(true);

        for listener in listeners {
            listener();
        }
        self.emit_progress();
        true
    }

    /// Resolves once the request is aborted.
    pub async fn cancelled(&self) {
        let mut rx = self.abort_tx.subscribe();
        // The sender lives as long as `self`, so this only returns on abort.
        let _ = rx.wait_for(|aborted| *aborted).await;
    }

    pub(crate) fn on_progress(&self, listener: ProgressListener) {
        self.state.lock().listeners.progress.push(listener);
    }

    pub(crate) fn on_abort(&self, listener: AbortListener) {
        self.state.lock().listeners.abort.push(listener);
    }

    pub(crate) fn on_redirect(&self, listener: RedirectListener) {
        self.state.lock().listeners.redirect.push(listener);
    }

    pub(crate) fn emit_redirect(&self, url: &str) {
        let listeners = self.state.lock().listeners.redirect.clone();
        for listener in listeners {
            listener(url);
        }
    }

    fn emit_progress(&self) {
        let (progress, listeners) = {
            let state = self.state.lock();
            (state.progress, state.listeners.progress.clone())
        };

        tracing::trace!(completed = progress.completed(), "progress");
        for listener in listeners {
            if let Err(cause) = listener(&progress) {
                let reason = Error::new(ErrorCode::Abort, cause.to_string()).with_cause(cause);
                self.abort_with(Some(reason));
                return;
            }
        }
    }

    /// Zero the transfer counters before another attempt, such as the next
    /// redirect hop.
    pub(crate) fn reset_progress(&self) {
        self.state.lock().progress = Progress::default();
    }

    pub(crate) fn set_length(&self, direction: Direction, length: Option<u64>) {
        let mut state = self.state.lock();
        match direction {
            Direction::Upload => state.progress.upload_length = length,
            Direction::Download => state.progress.download_length = length,
        }
    }

    /// Update a byte counter; emits progress only when the count changes.
    pub(crate) fn set_bytes(&self, direction: Direction, bytes: u64) {
        {
            let mut state = self.state.lock();
            let progress = &mut state.progress;
            let (current, length, ratio) = match direction {
                Direction::Upload => (
                    &mut progress.uploaded_bytes,
                    progress.upload_length,
                    &mut progress.uploaded,
                ),
                Direction::Download => (
                    &mut progress.downloaded_bytes,
                    progress.download_length,
                    &mut progress.downloaded,
                ),
            };
            if *current == bytes {
                return;
            }
            *current = bytes;
            if let Some(length) = length.filter(|l| *l > 0) {
                *ratio = (bytes as f64 / length as f64).min(1.0);
            }
        }
        self.emit_progress();
    }

    /// Mark one direction as fully transferred.
    pub(crate) fn finish(&self, direction: Direction) {
        let changed = {
            let mut state = self.state.lock();
            let progress = &mut state.progress;
            let (bytes, length, ratio) = match direction {
                Direction::Upload => (
                    &mut progress.uploaded_bytes,
                    &mut progress.upload_length,
                    &mut progress.uploaded,
                ),
                Direction::Download => (
                    &mut progress.downloaded_bytes,
                    &mut progress.download_length,
                    &mut progress.downloaded,
                ),
            };
            let changed = *ratio < 1.0;
            *ratio = 1.0;
            if length.is_none() {
                *length = Some(*bytes);
            }
            changed
        };
        if changed {
            self.emit_progress();
        }
    }
}

/// Handle given to transports for reporting transfer progress.
///
/// Cheap to clone and `'static`, so it can be moved into body streams.
#[derive(Clone)]
pub struct ProgressReporter {
    lifecycle: Arc<Lifecycle>,
}

impl ProgressReporter {
    pub(crate) fn new(lifecycle: Arc<Lifecycle>) -> Self {
        ProgressReporter { lifecycle }
    }

    /// Expected upload size
    pub fn upload_length(&self, length: Option<u64>) {
        self.lifecycle.set_length(Direction::Upload, length);
    }

    /// Total bytes uploaded so far
    pub fn uploaded(&self, bytes: u64) {
        self.lifecycle.set_bytes(Direction::Upload, bytes);
    }

    /// Upload complete
    pub fn finish_upload(&self) {
        self.lifecycle.finish(Direction::Upload);
    }

    /// Expected download size
    pub fn download_length(&self, length: Option<u64>) {
        self.lifecycle.set_length(Direction::Download, length);
    }

    /// Total bytes downloaded so far
    pub fn downloaded(&self, bytes: u64) {
        self.lifecycle.set_bytes(Direction::Download, bytes);
    }

    /// Download complete
    pub fn finish_download(&self) {
        self.lifecycle.finish(Direction::Download);
    }

    /// Whether the request has been aborted
    pub fn is_aborted(&self) -> bool {
        self.lifecycle.is_aborted()
    }
}
