use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use time::OffsetDateTime;
use tokio::sync::watch;

use crate::types::Identity;

/// Source of "now" for expiry checks.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> OffsetDateTime;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

/// Single source of truth for the signed-in identity.
///
/// Share it as `Arc<SessionStore>`. Consumers only read; every write goes
/// through [`AuthService`](crate::AuthService).
pub struct SessionStore {
    identity: watch::Sender<Option<Identity>>,
    hydrated: watch::Sender<bool>,
    /// Bumped by every clear, under the identity channel's lock.
    generation: AtomicU64,
    clock: Arc<dyn Clock>,
}

impl SessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    #[must_use]
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        let (identity, _) = watch::channel(None);
        let (hydrated, _) = watch::channel(false);
        Self {
            identity,
            hydrated,
            generation: AtomicU64::new(0),
            clock,
        }
    }

    /// Snapshot of the stored identity, expired or not.
    #[must_use]
    pub fn current_identity(&self) -> Option<Identity> {
        self.identity.borrow().clone()
    }

    /// The stored identity, only if its token is still valid.
    #[must_use]
    pub fn authenticated_identity(&self) -> Option<Identity> {
        let now = self.now();
        self.identity
            .borrow()
            .as_ref()
            .filter(|identity| !identity.is_expired_at(now))
            .cloned()
    }

    /// Checked against the clock on every call.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        let now = self.now();
        self.identity
            .borrow()
            .as_ref()
            .is_some_and(|identity| !identity.is_expired_at(now))
    }

    #[must_use]
    pub fn now(&self) -> OffsetDateTime {
        self.clock.now()
    }

    /// Receives every identity change (login, logout, expiry).
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Option<Identity>> {
        self.identity.subscribe()
    }

    /// `true` once startup restoration has finished, whatever it found.
    #[must_use]
    pub fn is_hydrated(&self) -> bool {
        *self.hydrated.borrow()
    }

    /// Resolves once startup restoration has finished.
    pub async fn hydrated(&self) {
        let mut rx = self.hydrated.subscribe();
        // The sender lives in `self`, so the channel cannot close while we wait.
        let _ = rx.wait_for(|done| *done).await;
    }

    pub(crate) fn set(&self, identity: Identity) {
        tracing::debug!(user_id = %identity.id, role = %identity.role, "Session identity set");
        self.identity.send_replace(Some(identity));
    }

    /// Set `identity` only if nothing has cleared the session since
    /// `generation` was read. Returns whether it was set.
    pub(crate) fn set_if_generation(&self, identity: Identity, generation: u64) -> bool {
        let user_id = identity.id.clone();
        let set = self.identity.send_if_modified(|slot| {
            if self.generation.load(Ordering::SeqCst) != generation {
                return false;
            }
            *slot = Some(identity);
            true
        });
        if set {
            tracing::debug!(%user_id, "Session identity set");
        }
        set
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    pub(crate) fn clear(&self) -> Option<Identity> {
        let mut previous = None;
        self.identity.send_modify(|slot| {
            self.generation.fetch_add(1, Ordering::SeqCst);
            previous = slot.take();
        });
        if previous.is_some() {
            tracing::debug!("Session identity cleared");
        }
        previous
    }

    pub(crate) fn mark_hydrated(&self) {
        self.hydrated.send_replace(true);
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("authenticated", &self.is_authenticated())
            .field("hydrated", &self.is_hydrated())
            .finish_non_exhaustive()
    }
}
