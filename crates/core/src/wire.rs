//! Wire opcode tables and the packet-family classifier (spec.md §3, §4.G, §6).
//!
//! Two disjoint families are identified from the first two bytes of a
//! datagram, interpreted as big-endian `u16` `T`:
//!
//! - session-control: `T > 0x00ff && (T & 0x00ff) == 0` — the first byte
//!   carries the opcode, the second is always `0x00`.
//! - fastpath: first byte `< FASTPATH_OPCODE_LIMIT` — the first byte *is*
//!   the opcode, the second byte belongs to the payload.
//!
//! Exact opcode byte values should be taken from a reference capture; the
//! values below follow spec.md §6's illustrative table. What matters for
//! correctness is which family and sub-family each opcode falls into.

/// Exclusive upper bound on a fastpath opcode's first byte.
pub const FASTPATH_OPCODE_LIMIT: u8 = 0x0d;

pub const SESSION_REQUEST: u8 = 0x01;
pub const SESSION_RESPONSE: u8 = 0x02;
pub const MULTI_PACKET: u8 = 0x03;
pub const DISCONNECT: u8 = 0x05;
pub const PING: u8 = 0x06;
pub const NET_STAT_REQUEST: u8 = 0x07;
pub const NET_STAT_RESPONSE: u8 = 0x08;
pub const DATA_CHANNEL_FIRST: u8 = 0x09;
pub const DATA_CHANNEL_LAST: u8 = 0x0c;
pub const DATA_FRAG_FIRST: u8 = 0x0d;
pub const DATA_FRAG_LAST: u8 = 0x10;
pub const DATA_ACK_FIRST: u8 = 0x11;
pub const DATA_ACK_LAST: u8 = 0x14;
pub const DATA_ORDER_FIRST: u8 = 0x15;
pub const DATA_ORDER_LAST: u8 = 0x18;
pub const FATAL_ERROR: u8 = 0x1d;
pub const FATAL_ERROR_RESPONSE: u8 = 0x1e;

/// The wire family a datagram belongs to, per the spec.md §4.G decision
/// table. Each variant dictates CRC/decrypt/decompress treatment in
/// [`crate::receive`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketFamily {
    /// `Disconnect, DataAck1..4, DataOrder1..4, Ping` — CRC-checked,
    /// decrypted, never compressed.
    SessionAckOrderPingDisconnect,
    /// `MultiPacket, NetStatReq/Resp, DataChannel1..4, DataFrag1..4` —
    /// CRC-checked, decrypted, optionally compressed.
    SessionReliable,
    /// `SessionRequest, SessionResponse, FatalError, FatalErrorResponse` —
    /// delivered raw: no CRC, no decrypt (no key is established yet for
    /// `SessionRequest`, and the others mirror that bypass for symmetry).
    SessionSetup,
    /// First byte `< FASTPATH_OPCODE_LIMIT` — CRC-checked, decrypted,
    /// optionally compressed, delivered to the fastpath handler.
    Fastpath,
    /// Anything else. Dropped.
    Unknown,
}

/// Classify a datagram's family from its first two bytes.
///
/// Callers must ensure the datagram is at least 2 bytes long before calling
/// this (spec.md's `TooSmall` check happens earlier in the receive loop).
pub fn classify(b0: u8, b1: u8) -> PacketFamily {
    let t: u16 = ((b0 as u16) << 8) | (b1 as u16);
    if t > 0x00ff && (t & 0x00ff) == 0 {
        classify_session_opcode(b0)
    } else if b0 < FASTPATH_OPCODE_LIMIT {
        PacketFamily::Fastpath
    } else {
        PacketFamily::Unknown
    }
}

fn classify_session_opcode(opcode: u8) -> PacketFamily {
    match opcode {
        SESSION_REQUEST | SESSION_RESPONSE | FATAL_ERROR | FATAL_ERROR_RESPONSE => {
            PacketFamily::SessionSetup
        }
        DISCONNECT | PING => PacketFamily::SessionAckOrderPingDisconnect,
        DATA_ACK_FIRST..=DATA_ACK_LAST => PacketFamily::SessionAckOrderPingDisconnect,
        DATA_ORDER_FIRST..=DATA_ORDER_LAST => PacketFamily::SessionAckOrderPingDisconnect,
        MULTI_PACKET | NET_STAT_REQUEST | NET_STAT_RESPONSE => PacketFamily::SessionReliable,
        DATA_CHANNEL_FIRST..=DATA_CHANNEL_LAST => PacketFamily::SessionReliable,
        DATA_FRAG_FIRST..=DATA_FRAG_LAST => PacketFamily::SessionReliable,
        _ => PacketFamily::Unknown,
    }
}

/// Whether `opcode` (the datagram's first byte) is `SessionRequest` —
/// the one opcode the receive loop answers even with no session installed.
pub fn is_session_request(opcode: u8) -> bool {
    opcode == SESSION_REQUEST
}
