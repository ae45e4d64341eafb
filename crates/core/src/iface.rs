//! Narrow interfaces the receive core requires from its collaborators.
//!
//! The session state machine (reliability window, ack/order/fragment
//! reassembly, application delivery) and the send-side thread are explicitly
//! out of scope (spec.md §1) — the core only ever talks to them through
//! these two traits.

use std::net::Ipv4Addr;

use crate::buffer::PacketBuffer;
use crate::session::{SessionId, TeardownHandle};

/// Command issued to a freshly created session, distinguishing an
/// inbound-initiated session (peer sent `SessionRequest`) from one the core
/// originated itself via the rendezvous.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionCommand {
    /// Created in response to a peer's `SessionRequest`.
    Accept,
    /// Created by the receive loop on behalf of `NewOutgoingConnection`.
    Connect,
}

/// The inbound contract from the receive loop into a session.
///
/// Implemented by the (out-of-scope) session state machine. A `Session`
/// never blocks the receive loop for long: these calls should enqueue work
/// and return.
pub trait Session: Send + Sync {
    /// The 32-bit key negotiated at session setup, used for CRC and the
    /// stream cipher.
    fn encrypt_key(&self) -> u32;

    /// Peer address, in network byte order.
    fn address(&self) -> u32;

    /// Peer UDP port, in network byte order.
    fn port(&self) -> u16;

    /// Set the initial resend window size (`ServerPacketWindow` or
    /// `ClientPacketWindow`, depending on peer type).
    fn set_resend_window_size(&self, size: u32);

    /// Record whether this session was accepted or self-initiated.
    fn set_command(&self, command: SessionCommand);

    /// Deliver a session-control-family datagram (ack/order/ping/disconnect,
    /// reliable, or setup). Ownership of `buf` transfers to the session.
    fn handle_session_packet(&self, buf: PacketBuffer);

    /// Deliver a fastpath-family datagram. Ownership of `buf` transfers to
    /// the session.
    fn handle_fastpath_packet(&self, buf: PacketBuffer);
}

/// The outbound contract the receive loop requires from the write thread.
pub trait WriteThread: Send + Sync {
    /// Announce a newly installed session. Per spec.md §5, the receive loop
    /// publishes to the registry *before* calling this — the write thread
    /// must treat this call as the acquire edge for that publication.
    fn new_session(&self, id: SessionId, session: std::sync::Arc<dyn Session>);

    /// Enqueue a packet for the write thread to deliver to `id`'s peer.
    fn enqueue(&self, id: SessionId, buf: PacketBuffer);
}

/// Parameters needed to construct a new session, gathered by the receive
/// loop before handing off to a [`crate::session::SessionFactory`].
#[derive(Debug, Clone)]
pub struct NewSessionParams {
    pub address: Ipv4Addr,
    pub port: u16,
    pub command: SessionCommand,
    pub resend_window_size: u32,
    /// Callback the session uses to request its own removal and
    /// destruction — the reverse of `handle_session_packet`/
    /// `handle_fastpath_packet` (spec.md §3, "RemoveAndDestroySession").
    pub teardown: TeardownHandle,
}
