//! # swg-receive-core — UDP session-protocol receive core
//!
//! The receive-side half of a SOE/SWG-style UDP session protocol: a single
//! dedicated thread demultiplexes inbound datagrams by peer, runs the
//! CRC/decrypt/decompress pipeline, and dispatches to a session owned
//! elsewhere in the process.
//!
//! ## What this crate does *not* do
//!
//! The session state machine (reliability window, ack/order bookkeeping,
//! fragment reassembly, application-level message delivery) and the
//! send-side thread are deliberately out of scope. This crate talks to both
//! only through the [`Session`](iface::Session) and
//! [`WriteThread`](iface::WriteThread) traits — an embedding application
//! supplies the implementations.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────┐
//! │  Embedding service (session state machine,  │
//! │  write thread) — out of scope here          │
//! ├──────────────────────────────────────────────┤
//! │  receive   — ReceiveLoop, the core algorithm │
//! │  session   — SessionId, SessionArena, teardown│
//! │  registry  — PeerKey -> SessionId map        │
//! │  rendezvous— outbound-connection mailbox     │
//! ├──────────────────────────────────────────────┤
//! │  wire      — opcode tables, family classifier│
//! │  crypto    — keyed CRC16, stream cipher, zlib │
//! │  peer      — PeerKey                         │
//! │  buffer    — pooled PacketBuffer              │
//! ├──────────────────────────────────────────────┤
//! │  config    — ReceiveCoreConfig (TOML)         │
//! │  error     — ReceiveError and Result          │
//! └────────────────────────────────────────────┘
//! ```
//!
//! ## Quick start
//!
//! ```no_run
//! use std::net::UdpSocket;
//! use std::sync::{atomic::AtomicBool, Arc};
//! use swg_receive_core::{config::ReceiveCoreConfig, rendezvous::OutboundRendezvous, ReceiveLoop};
//!
//! # struct MyFactory;
//! # impl swg_receive_core::session::SessionFactory for MyFactory {
//! #     fn create_session(&self, _: swg_receive_core::iface::NewSessionParams) -> std::sync::Arc<dyn swg_receive_core::iface::Session> { unimplemented!() }
//! #     fn destroy_session(&self, _: std::sync::Arc<dyn swg_receive_core::iface::Session>) {}
//! # }
//! # struct MyWriteThread;
//! # impl swg_receive_core::iface::WriteThread for MyWriteThread {
//! #     fn new_session(&self, _: swg_receive_core::session::SessionId, _: std::sync::Arc<dyn swg_receive_core::iface::Session>) {}
//! #     fn enqueue(&self, _: swg_receive_core::session::SessionId, _: swg_receive_core::buffer::PacketBuffer) {}
//! # }
//! let socket = UdpSocket::bind("0.0.0.0:44453").unwrap();
//! let mut core = ReceiveLoop::new(
//!     socket,
//!     Box::new(MyFactory),
//!     Arc::new(MyWriteThread),
//!     ReceiveCoreConfig::default(),
//!     Arc::new(OutboundRendezvous::new()),
//!     Arc::new(AtomicBool::new(false)),
//! ).unwrap();
//! core.run();
//! ```
//!
//! ## Crate layout
//!
//! - [`receive`] — [`ReceiveLoop`], the core algorithm.
//! - [`session`] — [`session::SessionId`], [`session::SessionArena`], teardown plumbing.
//! - [`registry`] — [`registry::SessionRegistry`].
//! - [`rendezvous`] — [`rendezvous::OutboundRendezvous`].
//! - [`wire`] — opcode constants and [`wire::classify`].
//! - [`crypto`] — CRC16, stream cipher, zlib-class (de)compression.
//! - [`peer`] — [`peer::PeerKey`].
//! - [`buffer`] — [`buffer::PacketBuffer`] and [`buffer::PacketBufferPool`].
//! - [`config`] — [`config::ReceiveCoreConfig`].
//! - [`iface`] — [`iface::Session`] and [`iface::WriteThread`], the seams to the rest of the service.
//! - [`error`] — [`error::ReceiveError`] and [`error::Result`].
//! - [`ambient`] — best-effort platform hooks with no portable stdlib equivalent.

pub mod ambient;
pub mod buffer;
pub mod config;
pub mod crypto;
pub mod error;
pub mod iface;
pub mod peer;
pub mod receive;
pub mod registry;
pub mod rendezvous;
pub mod session;
pub mod wire;

pub use error::{ReceiveError, Result};
pub use receive::ReceiveLoop;
