//! Request registry
//!
//! Keeps one record per in-flight request, keyed by the caller's opaque id.
//! The registry is the only shared mutable state in the relay. The id map
//! and each session are locked separately: delta forwarding and cancellation
//! of one session serialize on that session's lock, while other requests
//! proceed.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use crate::sink::EventSink;

/// Live bookkeeping record for one request
#[derive(Clone)]
pub struct RequestSession {
    /// Caller-supplied request identifier
    pub id: String,
    /// Distinguishes successive sessions created under the same id
    pub generation: u64,
    /// Where this request's events go
    pub destination: Arc<dyn EventSink>,
    /// Concatenation of every delta forwarded so far
    pub accumulated_text: String,
    /// When the session was created
    pub created_at: DateTime<Utc>,
    cancel: CancellationToken,
}

impl RequestSession {
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl fmt::Debug for RequestSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestSession")
            .field("id", &self.id)
            .field("generation", &self.generation)
            .field("accumulated_len", &self.accumulated_text.len())
            .field("created_at", &self.created_at)
            .field("cancelled", &self.is_cancelled())
            .finish_non_exhaustive()
    }
}

/// Capability held by the task driving one session
///
/// Every registry call made with a handle is a no-op once the session it
/// names has been retired, even if a newer session reuses the same id.
#[derive(Clone)]
pub struct SessionHandle {
    pub id: String,
    pub generation: u64,
    pub token: CancellationToken,
    pub destination: Arc<dyn EventSink>,
}

impl fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionHandle")
            .field("id", &self.id)
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

/// Shared slot for one session, locked independently of the map
type Slot = Arc<Mutex<RequestSession>>;

/// Map value: the generation is copied out so lookups never wait on a slot
struct Entry {
    generation: u64,
    slot: Slot,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // Entries stay consistent even if a holder panicked mid-operation
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Keyed store of live request sessions
///
/// The map lock is only held for lookups and insertions. Each session has
/// its own lock, taken to append and forward a delta and to cancel, so a
/// slow destination only delays its own request.
#[derive(Default)]
pub struct RequestRegistry {
    sessions: Mutex<HashMap<String, Entry>>,
    next_generation: AtomicU64,
}

impl RequestRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn sessions(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
        lock(&self.sessions)
    }

    /// Slot for `handle`, if the live session under its id has its generation
    fn slot(&self, handle: &SessionHandle) -> Option<Slot> {
        self.sessions()
            .get(&handle.id)
            .filter(|entry| entry.generation == handle.generation)
            .map(|entry| entry.slot.clone())
    }

    /// Register a new session for `id`
    ///
    /// A still-live session under the same id is superseded: its
    /// cancellation token fires and it is dropped without any event.
    #[instrument(skip(self, destination))]
    pub fn create(&self, id: &str, destination: Arc<dyn EventSink>) -> SessionHandle {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed) + 1;
        let token = CancellationToken::new();

        let session = RequestSession {
            id: id.to_string(),
            generation,
            destination: destination.clone(),
            accumulated_text: String::new(),
            created_at: Utc::now(),
            cancel: token.clone(),
        };
        let entry = Entry {
            generation,
            slot: Arc::new(Mutex::new(session)),
        };

        let previous = self.sessions().insert(id.to_string(), entry);
        if let Some(previous) = previous {
            lock(&previous.slot).cancel.cancel();
            debug!(
                superseded_generation = previous.generation,
                "Superseded live session"
            );
        }

        debug!(generation, "Session created");
        SessionHandle {
            id: id.to_string(),
            generation,
            token,
            destination,
        }
    }

    /// Snapshot of the live session for `id`, if any
    pub fn get(&self, id: &str) -> Option<RequestSession> {
        let slot = self.sessions().get(id).map(|entry| entry.slot.clone())?;
        let session = lock(&slot).clone();
        Some(session)
    }

    /// Remove whatever session is registered under `id`
    pub fn remove(&self, id: &str) -> Option<RequestSession> {
        let entry = self.sessions().remove(id)?;
        let session = lock(&entry.slot).clone();
        Some(session)
    }

    /// Whether the session behind `handle` is still registered and not cancelled
    pub fn is_live(&self, handle: &SessionHandle) -> bool {
        self.slot(handle)
            .map(|slot| !lock(&slot).is_cancelled())
            .unwrap_or(false)
    }

    /// Append a delta and forward it to the session's destination
    ///
    /// Both happen under the session's lock, which `cancel` also takes, so a
    /// delta is never forwarded after `cancel` has returned. Returns `false`
    /// if the session is gone.
    pub fn forward_delta(&self, handle: &SessionHandle, text: &str) -> bool {
        let Some(slot) = self.slot(handle) else {
            return false;
        };

        let mut session = lock(&slot);
        if session.is_cancelled() {
            return false;
        }
        session.accumulated_text.push_str(text);
        session.destination.delta(&session.id, text);
        true
    }

    /// Accumulated text of the session behind `handle`, if still live
    pub fn accumulated_text(&self, handle: &SessionHandle) -> Option<String> {
        let slot = self.slot(handle)?;
        let text = lock(&slot).accumulated_text.clone();
        Some(text)
    }

    /// Remove the session behind `handle` at the end of its run
    ///
    /// Returns the final record, or `None` if it was already cancelled or
    /// superseded, in which case the caller must not emit terminal events.
    pub fn retire(&self, handle: &SessionHandle) -> Option<RequestSession> {
        let entry = {
            let mut sessions = self.sessions();
            let matches = sessions
                .get(&handle.id)
                .is_some_and(|entry| entry.generation == handle.generation);
            if !matches {
                return None;
            }
            sessions.remove(&handle.id)?
        };

        let session = lock(&entry.slot);
        if session.is_cancelled() {
            return None;
        }
        Some(session.clone())
    }

    /// Mark the session for `id` cancelled and remove it
    ///
    /// Fires the session's cancellation token, which aborts a pending HTTP
    /// call or stream read. Returns `None` when nothing was registered.
    #[instrument(skip(self))]
    pub fn cancel(&self, id: &str) -> Option<RequestSession> {
        let entry = self.sessions().remove(id)?;

        let session = lock(&entry.slot);
        session.cancel.cancel();
        debug!(
            generation = session.generation,
            accumulated_len = session.accumulated_text.len(),
            "Session cancelled"
        );
        Some(session.clone())
    }

    /// Number of live sessions
    pub fn len(&self) -> usize {
        self.sessions().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
