//! Session identity and the arena that owns session handles by id.
//!
//! spec.md §9 flags the source's cyclic ownership (loop ↔ registry ↔
//! sessions ↔ write thread, all via raw pointers) as something a systems
//! rewrite must not reproduce. This module is the fix: sessions are referred
//! to everywhere by a stable [`SessionId`], never by raw pointer, and the
//! [`SessionArena`] is the single place that owns the `Arc<dyn Session>`
//! itself.

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::iface::{NewSessionParams, Session, SessionCommand};
use crate::peer::PeerKey;

/// Stable identifier for a session, assigned once and never reused while any
/// reference to that session survives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(u64);

impl SessionId {
    pub(crate) fn from_raw(raw: u64) -> Self {
        Self(raw)
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "session#{}", self.0)
    }
}

/// Constructs and destroys session objects.
///
/// Implemented by the embedding application — the receive core knows only
/// that it can ask for a new session given connection parameters, and that
/// it must hand a session back here before it is truly gone.
pub trait SessionFactory: Send + Sync {
    fn create_session(&self, params: NewSessionParams) -> Arc<dyn Session>;

    /// Release any resources the factory holds for `session`. Called only
    /// after the registry no longer references it.
    fn destroy_session(&self, session: Arc<dyn Session>);
}

/// A request, queued by a session itself, to be removed from the registry
/// and destroyed.
///
/// spec.md §9 note 2 traces `RemoveAndDestroySession`'s occasional failure
/// to find a session back to reentrant-lock races in the source. This crate
/// avoids the problem structurally: a session never calls back into the
/// registry directly. It only ever pushes an intent here; the receive loop
/// applies it on its own thread, between datagrams, with no lock held by the
/// pushing thread in the loop's way.
#[derive(Debug, Clone, Copy)]
pub struct TeardownIntent {
    pub id: SessionId,
    pub peer_key: PeerKey,
}

#[derive(Default)]
struct TeardownQueue {
    pending: Mutex<Vec<TeardownIntent>>,
}

impl TeardownQueue {
    fn push(&self, intent: TeardownIntent) {
        self.pending.lock().push(intent);
    }

    fn drain(&self) -> Vec<TeardownIntent> {
        std::mem::take(&mut *self.pending.lock())
    }
}

/// The "reverse destruction callback" of spec.md §3: a session holds one of
/// these and calls [`request_removal`](Self::request_removal) on whatever
/// thread decides the session is done. Thread-safe and idempotent — calling
/// it twice just queues the same intent twice, and the receive loop's
/// `SessionRegistry::remove`/`SessionArena::destroy` are themselves
/// idempotent, so the second application is a harmless no-op (logged).
#[derive(Debug, Clone)]
pub struct TeardownHandle {
    id: SessionId,
    peer_key: PeerKey,
    queue: Arc<TeardownQueue>,
}

impl TeardownHandle {
    pub fn request_removal(&self) {
        self.queue.push(TeardownIntent {
            id: self.id,
            peer_key: self.peer_key,
        });
    }
}

/// Owns every live session by id and the factory that creates/destroys them.
pub struct SessionArena {
    next_id: AtomicU64,
    sessions: HashMap<SessionId, Arc<dyn Session>>,
    factory: Box<dyn SessionFactory>,
    teardowns: Arc<TeardownQueue>,
}

impl SessionArena {
    pub fn new(factory: Box<dyn SessionFactory>) -> Self {
        Self {
            next_id: AtomicU64::new(1),
            sessions: HashMap::new(),
            factory,
            teardowns: Arc::new(TeardownQueue::default()),
        }
    }

    /// Create a new session via the factory and take ownership of it under a
    /// freshly allocated id, wiring in a [`TeardownHandle`] bound to that id
    /// and the peer's registry key.
    pub fn create(
        &mut self,
        address: Ipv4Addr,
        port: u16,
        command: SessionCommand,
        resend_window_size: u32,
        peer_key: PeerKey,
    ) -> (SessionId, Arc<dyn Session>) {
        let id = SessionId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let teardown = TeardownHandle {
            id,
            peer_key,
            queue: self.teardowns.clone(),
        };
        let params = NewSessionParams {
            address,
            port,
            command,
            resend_window_size,
            teardown,
        };
        let session = self.factory.create_session(params);
        self.sessions.insert(id, session.clone());
        (id, session)
    }

    pub fn get(&self, id: SessionId) -> Option<Arc<dyn Session>> {
        self.sessions.get(&id).cloned()
    }

    /// Remove `id` from the arena and destroy it via the factory. Idempotent:
    /// a miss is simply a no-op (the caller logs separately).
    pub fn destroy(&mut self, id: SessionId) -> bool {
        match self.sessions.remove(&id) {
            Some(session) => {
                self.factory.destroy_session(session);
                true
            }
            None => false,
        }
    }

    /// Drain teardown requests queued by sessions since the last call.
    pub fn drain_teardowns(&self) -> Vec<TeardownIntent> {
        self.teardowns.drain()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Destroy every remaining session, in unspecified order — called on
    /// loop shutdown (spec.md §5).
    pub fn destroy_all(&mut self) {
        for (_, session) in self.sessions.drain() {
            self.factory.destroy_session(session);
        }
    }
}
