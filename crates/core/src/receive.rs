//! The receive loop: the core of the whole crate (spec.md §4.G).
//!
//! One dedicated thread owns a single [`UdpSocket`] and, each iteration:
//!
//! 1. drains the [`OutboundRendezvous`], originating any pending session;
//! 2. applies any [`TeardownIntent`]s sessions have queued for themselves;
//! 3. polls the socket with a bounded timeout;
//! 4. classifies, CRC-checks, decrypts, and optionally decompresses the
//!    datagram, then hands it to the owning session.

use std::net::{Ipv4Addr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::buffer::{PacketBuffer, PacketBufferPool};
use crate::config::ReceiveCoreConfig;
use crate::crypto;
use crate::error::Result;
use crate::iface::{SessionCommand, WriteThread};
use crate::peer::PeerKey;
use crate::registry::SessionRegistry;
use crate::rendezvous::OutboundRendezvous;
use crate::session::{SessionArena, SessionFactory};
use crate::wire::{self, PacketFamily};

/// How long a single socket poll blocks before the loop checks the exit
/// flag, drains the rendezvous, and applies queued teardowns again.
///
/// spec.md §9 note 4 flags the source's 50µs `select` + 10µs sleep as a
/// legacy shape better replaced by one blocking receive bounded by a real
/// timeout primitive — this is that replacement.
const POLL_TIMEOUT: Duration = Duration::from_micros(50);

/// Minimum datagram length for the ack/order/ping/disconnect family: a
/// 2-byte opcode header plus a 2-byte CRC trailer, no payload required.
const ACK_FAMILY_MIN_LEN: usize = 4;

/// Minimum datagram length for the reliable family: 2-byte opcode header,
/// 1-byte compression flag, 2-byte CRC trailer.
const RELIABLE_MIN_LEN: usize = 5;

/// Minimum datagram length for fastpath: 1-byte opcode header, 1-byte
/// compression flag, 2-byte CRC trailer.
const FASTPATH_MIN_LEN: usize = 4;

/// The UDP session-protocol receive core.
///
/// Owns the socket, the registry, the rendezvous slot, and the session
/// arena. Everything it needs from the outside world (session construction,
/// write-side notification) comes in through traits at construction time.
pub struct ReceiveLoop {
    socket: UdpSocket,
    registry: SessionRegistry,
    rendezvous: Arc<OutboundRendezvous>,
    arena: SessionArena,
    pool: PacketBufferPool,
    write_thread: Arc<dyn WriteThread>,
    config: ReceiveCoreConfig,
    exit: Arc<AtomicBool>,
    recv_buf: PacketBuffer,
}

impl ReceiveLoop {
    pub fn new(
        socket: UdpSocket,
        factory: Box<dyn SessionFactory>,
        write_thread: Arc<dyn WriteThread>,
        config: ReceiveCoreConfig,
        rendezvous: Arc<OutboundRendezvous>,
        exit: Arc<AtomicBool>,
    ) -> Result<Self> {
        socket.set_read_timeout(Some(POLL_TIMEOUT))?;
        if config.boost_priority {
            crate::ambient::try_boost_priority();
        }
        let pool = PacketBufferPool::new(config.max_payload());
        let recv_buf = pool.checkout();
        Ok(Self {
            socket,
            registry: SessionRegistry::new(),
            rendezvous,
            arena: SessionArena::new(factory),
            pool,
            write_thread,
            config,
            exit,
            recv_buf,
        })
    }

    /// A read-only handle to the registry, e.g. for metrics/diagnostics.
    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Run the loop until the exit flag is set. Spawn this on its own
    /// thread; it blocks for the lifetime of the core.
    pub fn run(&mut self) {
        tracing::info!("receive loop starting");
        while !self.exit.load(Ordering::Acquire) {
            self.drain_rendezvous();
            self.apply_teardowns();

            match self.poll_once() {
                Ok(Some((len, peer_ip, peer_port))) => {
                    self.process_datagram(len, peer_ip, peer_port);
                }
                Ok(None) => {} // timed out, nothing to do this iteration
                Err(e) => {
                    tracing::error!(error = %e, "receive loop socket error, exiting");
                    break;
                }
            }
        }
        tracing::info!("receive loop exiting, destroying remaining sessions");
        self.arena.destroy_all();
    }

    fn drain_rendezvous(&mut self) {
        let Some(req) = self.rendezvous.take() else {
            return;
        };
        let peer_key = PeerKey::new(req.address, req.port);
        let (id, session) = self.arena.create(
            req.address,
            req.port,
            SessionCommand::Connect,
            self.config.resend_window_size(),
            peer_key,
        );
        session.set_command(SessionCommand::Connect);
        session.set_resend_window_size(self.config.resend_window_size());
        match self.registry.insert(peer_key, id) {
            Ok(()) => {
                tracing::info!(peer = %peer_key, %id, "outbound session originated");
                self.write_thread.new_session(id, session);
            }
            Err(e) => {
                tracing::warn!(peer = %peer_key, error = %e, "outbound rendezvous collided with an existing session");
                self.arena.destroy(id);
            }
        }
    }

    fn apply_teardowns(&mut self) {
        for intent in self.arena.drain_teardowns() {
            let removed_from_registry = self.registry.remove(intent.peer_key).is_some();
            let destroyed = self.arena.destroy(intent.id);
            if !removed_from_registry || !destroyed {
                tracing::debug!(
                    id = %intent.id,
                    peer = %intent.peer_key,
                    removed_from_registry,
                    destroyed,
                    "teardown intent applied to an already-gone session"
                );
            } else {
                tracing::info!(id = %intent.id, peer = %intent.peer_key, "session torn down");
            }
        }
    }

    /// Block up to [`POLL_TIMEOUT`] for a datagram. Returns `Ok(None)` on a
    /// timeout (the common case on an idle socket), `Ok(Some(..))` with the
    /// received length and peer address/port on success.
    fn poll_once(&mut self) -> Result<Option<(usize, Ipv4Addr, u16)>> {
        match self.socket.recv_from(self.recv_buf.raw_mut()) {
            Ok((len, peer)) => {
                let (ip, port) = match peer {
                    std::net::SocketAddr::V4(v4) => (*v4.ip(), v4.port()),
                    std::net::SocketAddr::V6(_) => {
                        tracing::warn!("dropping datagram from IPv6 peer, core is IPv4-only");
                        return Ok(None);
                    }
                };
                Ok(Some((len, ip, port)))
            }
            Err(e)
                if e.kind() == std::io::ErrorKind::WouldBlock
                    || e.kind() == std::io::ErrorKind::TimedOut =>
            {
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Classify, verify, decrypt, optionally decompress, and dispatch one
    /// received datagram (spec.md §4.G steps 3-5).
    fn process_datagram(&mut self, mut recv_len: usize, peer_ip: Ipv4Addr, peer_port: u16) {
        if recv_len <= 2 {
            tracing::trace!(peer = %PeerKey::new(peer_ip, peer_port), recv_len, "datagram too small, dropping");
            return;
        }

        let max = self.config.max_message_size;
        if recv_len > max {
            tracing::warn!(peer = %PeerKey::new(peer_ip, peer_port), recv_len, max, "oversize datagram, truncating");
            recv_len = max;
        }

        let peer_key = PeerKey::new(peer_ip, peer_port);
        let b0 = self.recv_buf.raw_mut()[0];
        let b1 = self.recv_buf.raw_mut()[1];
        let family = wire::classify(b0, b1);

        let existing = self.registry.lookup(peer_key);
        let session = match existing {
            Some(id) => self.arena.get(id).map(|s| (id, s)),
            None => None,
        };

        let (session_id, session) = match session {
            Some(pair) => pair,
            None => {
                if family == PacketFamily::SessionSetup && wire::is_session_request(b0) {
                    match self.create_inbound_session(peer_ip, peer_port, peer_key) {
                        Some(pair) => pair,
                        None => return,
                    }
                } else {
                    tracing::trace!(peer = %peer_key, opcode = b0, "session not found, dropping");
                    return;
                }
            }
        };

        let encrypt_key = session.encrypt_key();

        // Swap in a fresh buffer for the next iteration up front; `recv_buf`
        // below is the one we just filled from the socket and are about to
        // consume/deliver. This keeps "checkout a fresh buffer" (spec.md
        // §4.G step 5) from racing with whatever we deliver this iteration.
        let mut buf = std::mem::replace(&mut self.recv_buf, self.pool.checkout());
        buf.set_size(recv_len);

        match family {
            PacketFamily::SessionSetup => {
                session.handle_session_packet(buf);
            }
            PacketFamily::SessionAckOrderPingDisconnect => {
                self.dispatch_ack_order_ping_disconnect(buf, encrypt_key, session.as_ref());
            }
            PacketFamily::SessionReliable => {
                self.dispatch_reliable(buf, encrypt_key, session.as_ref());
            }
            PacketFamily::Fastpath => {
                self.dispatch_fastpath(buf, encrypt_key, session.as_ref());
            }
            PacketFamily::Unknown => {
                tracing::trace!(peer = %peer_key, session = %session_id, opcode = b0, "unknown opcode, dropping");
                self.pool.release(buf);
            }
        }
    }

    fn create_inbound_session(
        &mut self,
        peer_ip: Ipv4Addr,
        peer_port: u16,
        peer_key: PeerKey,
    ) -> Option<(crate::session::SessionId, Arc<dyn crate::iface::Session>)> {
        let (id, session) = self.arena.create(
            peer_ip,
            peer_port,
            SessionCommand::Accept,
            self.config.resend_window_size(),
            peer_key,
        );
        session.set_command(SessionCommand::Accept);
        session.set_resend_window_size(self.config.resend_window_size());

        match self.registry.insert(peer_key, id) {
            Ok(()) => {
                tracing::info!(peer = %peer_key, %id, "inbound session accepted");
                self.write_thread.new_session(id, session.clone());
                Some((id, session))
            }
            Err(e) => {
                tracing::warn!(peer = %peer_key, error = %e, "duplicate SessionRequest raced session creation");
                self.arena.destroy(id);
                None
            }
        }
    }

    fn crc_trailer(buf: &PacketBuffer, recv_len: usize) -> [u8; 2] {
        let data = buf.as_slice();
        [data[recv_len - 2], data[recv_len - 1]]
    }

    fn check_crc(buf: &PacketBuffer, recv_len: usize, key: u32) -> bool {
        let data = buf.as_slice();
        crypto::crc16_matches(&data[..recv_len - 2], key, Self::crc_trailer(buf, recv_len))
    }

    fn log_crc_mismatch(peer_session: &dyn crate::iface::Session, buf: &PacketBuffer, recv_len: usize, key: u32) {
        let mut dump = buf.as_slice()[..recv_len].to_vec();
        crypto::decrypt_in_place(&mut dump, key);
        tracing::debug!(
            addr = peer_session.address(),
            port = peer_session.port(),
            payload = %hex_dump(&dump),
            "CRC mismatch; dump is an opportunistic decrypt for debugging only, not state-affecting"
        );
    }

    fn dispatch_ack_order_ping_disconnect(
        &mut self,
        buf: PacketBuffer,
        key: u32,
        session: &dyn crate::iface::Session,
    ) {
        let recv_len = buf.size();
        if recv_len < ACK_FAMILY_MIN_LEN {
            tracing::trace!(recv_len, "ack-family datagram too short for header+CRC, dropping");
            self.pool.release(buf);
            return;
        }
        let mut buf = buf;
        if !Self::check_crc(&buf, recv_len, key) {
            Self::log_crc_mismatch(session, &buf, recv_len, key);
            self.pool.release(buf);
            return;
        }
        crypto::decrypt_in_place(&mut buf.as_mut_slice()[2..recv_len - 2], key);
        session.handle_session_packet(buf);
    }

    fn dispatch_reliable(&mut self, mut buf: PacketBuffer, key: u32, session: &dyn crate::iface::Session) {
        let recv_len = buf.size();
        if recv_len < RELIABLE_MIN_LEN {
            tracing::trace!(recv_len, "reliable-family datagram too short for header+CRC, dropping");
            self.pool.release(buf);
            return;
        }
        if !Self::check_crc(&buf, recv_len, key) {
            Self::log_crc_mismatch(session, &buf, recv_len, key);
            self.pool.release(buf);
            return;
        }
        crypto::decrypt_in_place(&mut buf.as_mut_slice()[2..recv_len - 2], key);

        // Capped to leave room for the 2-byte opcode header re-prepended on
        // the success path below, so `out.fill_from` can never overflow the
        // pooled buffer's capacity (buffer.rs's `fill_from` asserts on it).
        let mut decompressed = vec![0u8; self.pool.max_payload().saturating_sub(2)];
        let decompressed_len = crypto::decompress(&buf.as_slice()[2..recv_len - 3], &mut decompressed);

        if decompressed_len > 0 {
            let mut out = self.pool.checkout();
            let mut payload = Vec::with_capacity(2 + decompressed_len);
            payload.extend_from_slice(&buf.as_slice()[..2]);
            payload.extend_from_slice(&decompressed[..decompressed_len]);
            out.fill_from(&payload);
            out.set_compressed(true);
            self.pool.release(buf);
            session.handle_session_packet(out);
        } else {
            buf.set_size(recv_len - 3);
            session.handle_session_packet(buf);
        }
    }

    fn dispatch_fastpath(&mut self, mut buf: PacketBuffer, key: u32, session: &dyn crate::iface::Session) {
        let recv_len = buf.size();
        if recv_len < FASTPATH_MIN_LEN {
            tracing::trace!(recv_len, "fastpath datagram too short for header+CRC, dropping");
            self.pool.release(buf);
            return;
        }
        if !Self::check_crc(&buf, recv_len, key) {
            Self::log_crc_mismatch(session, &buf, recv_len, key);
            self.pool.release(buf);
            return;
        }
        crypto::decrypt_in_place(&mut buf.as_mut_slice()[1..recv_len - 2], key);

        let comp_flag = buf.as_slice()[recv_len - 3];
        let decompressed_len = if comp_flag == 1 {
            // Capped to leave room for the 1-byte opcode header re-prepended
            // on the success path below (same overflow hazard as the
            // reliable-family branch above).
            let mut decompressed = vec![0u8; self.pool.max_payload().saturating_sub(1)];
            let len = crypto::decompress(&buf.as_slice()[1..recv_len - 3], &mut decompressed);
            if len > 0 {
                let mut out = self.pool.checkout();
                let mut payload = Vec::with_capacity(1 + len);
                payload.push(buf.as_slice()[0]);
                payload.extend_from_slice(&decompressed[..len]);
                out.fill_from(&payload);
                out.set_compressed(true);
                self.pool.release(buf);
                session.handle_fastpath_packet(out);
                return;
            }
            len
        } else {
            0
        };

        let _ = decompressed_len;
        buf.set_size(recv_len - 3);
        session.handle_fastpath_packet(buf);
    }
}

fn hex_dump(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect::<Vec<_>>().join(" ")
}
