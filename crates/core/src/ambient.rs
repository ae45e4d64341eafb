//! Best-effort platform hooks that have no portable stdlib equivalent.
//!
//! Real-time scheduling priority is one of these: raising it is OS-specific,
//! and getting it wrong (or silently failing) should never take down the
//! receive loop. Callers treat this as advisory.

/// Attempt to raise the calling thread's scheduling priority.
///
/// No cross-platform priority-setting crate is part of this crate's
/// dependency stack, so this is a documented no-op that logs rather than
/// silently pretending to have done something. An embedder that needs real
/// priority boosting should do it before spawning the receive thread, where
/// platform-specific APIs are easier to reach for without tying this crate
/// to one.
pub fn try_boost_priority() {
    tracing::warn!("boost_priority requested but no priority backend is wired up; continuing at normal priority");
}
