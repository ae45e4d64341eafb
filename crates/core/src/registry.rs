//! The concurrent `PeerKey -> SessionId` registry.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::error::{ReceiveError, Result};
use crate::peer::PeerKey;
use crate::session::SessionId;

/// Maps each active peer to the id of the session handling it.
///
/// Reads always take the `RwLock`'s read half. spec.md §5/§9 notes that the
/// original implementation skipped the lock on reads and relied on the
/// underlying map tolerating concurrent structural mutation — not a
/// guarantee a plain `HashMap` provides. This rewrite always locks,
/// trading a little throughput for soundness.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<PeerKey, SessionId>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up the session id installed for `key`, if any.
    pub fn lookup(&self, key: PeerKey) -> Option<SessionId> {
        self.sessions.read().get(&key).copied()
    }

    /// Install `id` under `key`. Fails if the key is already occupied —
    /// callers must remove the stale entry first if that's the intent.
    pub fn insert(&self, key: PeerKey, id: SessionId) -> Result<()> {
        let mut sessions = self.sessions.write();
        if sessions.contains_key(&key) {
            return Err(ReceiveError::DuplicateKey);
        }
        sessions.insert(key, id);
        Ok(())
    }

    /// Remove the mapping for `key`, if present. Idempotent: a second call
    /// for the same key simply returns `None`.
    pub fn remove(&self, key: PeerKey) -> Option<SessionId> {
        self.sessions.write().remove(&key)
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn key(port: u16) -> PeerKey {
        PeerKey::new(Ipv4Addr::new(192, 0, 2, 10), port)
    }

    #[test]
    fn insert_then_lookup() {
        let registry = SessionRegistry::new();
        let id = SessionId::from_raw(1);
        registry.insert(key(1), id).unwrap();
        assert_eq!(registry.lookup(key(1)), Some(id));
    }

    #[test]
    fn insert_duplicate_key_fails() {
        let registry = SessionRegistry::new();
        registry.insert(key(1), SessionId::from_raw(1)).unwrap();
        let err = registry.insert(key(1), SessionId::from_raw(2)).unwrap_err();
        assert!(matches!(err, ReceiveError::DuplicateKey));
    }

    #[test]
    fn remove_is_idempotent() {
        let registry = SessionRegistry::new();
        registry.insert(key(1), SessionId::from_raw(1)).unwrap();
        assert_eq!(registry.remove(key(1)), Some(SessionId::from_raw(1)));
        assert_eq!(registry.remove(key(1)), None);
    }

    #[test]
    fn at_most_one_session_per_key() {
        let registry = SessionRegistry::new();
        registry.insert(key(1), SessionId::from_raw(1)).unwrap();
        assert!(registry.insert(key(1), SessionId::from_raw(2)).is_err());
        assert_eq!(registry.lookup(key(1)), Some(SessionId::from_raw(1)));
    }
}
