//! Session-affinity state machine.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use tokio::sync::watch;

/// One-shot signal. Fired at most once; replaced wholesale on reset.
#[derive(Debug)]
struct Latch {
    tx: watch::Sender<bool>,
}

impl Latch {
    fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    fn fire(&self) {
        let _ = self.tx.send(true);
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

#[derive(Debug)]
struct AffinityState {
    session_id: Option<String>,
    latch: Latch,
}

/// Lifecycle of the sticky-session identifier for one target.
///
/// States: idle (no identifier, no probe), acquiring (exactly one probe
/// request in flight, guarded by an atomic flag), established (identifier
/// cached). All mutation goes through the one internal lock; the lock is
/// never held across an await point.
#[derive(Debug)]
pub struct SessionAffinity {
    state: Mutex<AffinityState>,
    probe_in_flight: AtomicBool,
}

impl Default for SessionAffinity {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionAffinity {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(AffinityState {
                session_id: None,
                latch: Latch::new(),
            }),
            probe_in_flight: AtomicBool::new(false),
        }
    }

    /// Transition idle → acquiring. Returns true when the caller won the
    /// race and must issue the probe request; false when a probe is
    /// already in flight or has completed.
    pub fn begin_acquire(&self) -> bool {
        self.probe_in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Fire the current latch; the probe finished, successfully or not.
    /// Waiters are released either way so a failed probe cannot starve
    /// them.
    pub fn complete(&self) {
        self.state.lock().expect("affinity state poisoned").latch.fire();
    }

    /// Cache a new identifier. Unconditional overwrite: concurrent
    /// responses race and the last one processed wins.
    pub fn update(&self, session_id: &str) {
        let mut state = self.state.lock().expect("affinity state poisoned");
        state.session_id = Some(session_id.to_string());
    }

    /// The cached identifier, if any.
    pub fn session_id(&self) -> Option<String> {
        self.state
            .lock()
            .expect("affinity state poisoned")
            .session_id
            .clone()
    }

    /// Reset to idle: fire and replace the latch, clear the identifier,
    /// allow a new probe. Late waiters parked on the old latch observe
    /// its firing and never hang.
    pub fn clear(&self) {
        let mut state = self.state.lock().expect("affinity state poisoned");
        state.latch.fire();
        state.latch = Latch::new();
        state.session_id = None;
        self.probe_in_flight.store(false, Ordering::SeqCst);
    }

    /// Wait for an in-flight (or completed) acquisition and return the
    /// cached identifier; `None` when no probe was ever issued or the
    /// probe failed to obtain one. No timeout.
    pub async fn wait_established(&self) -> Option<String> {
        if self.probe_in_flight.load(Ordering::SeqCst) {
            let mut rx = {
                let state = self.state.lock().expect("affinity state poisoned");
                state.latch.subscribe()
            };
            // A closed channel means the latch was replaced by clear(),
            // which fires before replacing; treat it as released.
            let _ = rx.wait_for(|fired| *fired).await;
        }
        self.session_id()
    }
}
