//! Error types for the UDP session receive core.

/// Errors surfaced by the receive core's public API.
///
/// Per-datagram classification failures (`TooSmall`, `UnknownSession`,
/// `CrcMismatch`, `UnknownOpcode`) never escape the receive loop — they are
/// logged and the loop continues. Only the variants that affect the loop's
/// own control surface (`RendezvousBusy`, `DuplicateKey`, `Io`, `Config`,
/// `InvalidAddress`) are returned to callers.
#[derive(Debug, thiserror::Error)]
pub enum ReceiveError {
    /// Underlying socket I/O failure (not a timeout/`WouldBlock`).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A second outbound connection request arrived before the loop drained
    /// the pending one. The rendezvous slot is single-producer by contract.
    #[error("rendezvous slot already holds a pending request")]
    RendezvousBusy,

    /// `SessionRegistry::insert` was called for a `PeerKey` already occupied.
    #[error("session already registered for this peer")]
    DuplicateKey,

    /// Datagram carried 2 bytes or fewer — too small to hold an opcode plus CRC.
    #[error("datagram too small to contain opcode and CRC trailer")]
    TooSmall,

    /// Datagram exceeded the configured maximum message size.
    ///
    /// Not fatal: the loop truncates to the configured limit and keeps
    /// processing, but the condition is reported for logging.
    #[error("datagram of {len} bytes exceeds max message size {max}")]
    Oversize { len: usize, max: usize },

    /// No session is registered for the sending peer, and the datagram was
    /// not a `SessionRequest`.
    #[error("no session registered for this peer")]
    UnknownSession,

    /// The CRC16 trailer did not match the computed value.
    #[error("CRC mismatch")]
    CrcMismatch,

    /// First bytes did not match any known session-control or fastpath
    /// opcode.
    #[error("unrecognized opcode")]
    UnknownOpcode,

    /// Config file could not be parsed or read.
    #[error("config error: {0}")]
    Config(String),

    /// `NewOutgoingConnection`'s dotted-quad address string did not parse
    /// as an IPv4 address (spec.md §4.G step 1: "parse dotted-quad").
    #[error("invalid dotted-quad address {0:?}: {1}")]
    InvalidAddress(String, std::net::AddrParseError),
}

/// Convenience alias for `Result<T, ReceiveError>`.
pub type Result<T> = std::result::Result<T, ReceiveError>;
