use std::io;
use std::net::UdpSocket;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::Parser;
use swg_receive_core::config::ReceiveCoreConfig;
use swg_receive_core::iface::{NewSessionParams, Session, SessionCommand, WriteThread};
use swg_receive_core::rendezvous::OutboundRendezvous;
use swg_receive_core::session::{SessionFactory, SessionId};
use swg_receive_core::{buffer::PacketBuffer, ReceiveLoop};

#[derive(Parser)]
#[command(
    name = "swg-receive-sim",
    about = "Standalone harness for the UDP session-protocol receive core"
)]
struct Args {
    /// Bind address (host:port)
    #[arg(long, short, default_value = "0.0.0.0:44453")]
    bind: String,

    /// Optional TOML config file; falls back to built-in defaults.
    #[arg(long, short)]
    config: Option<PathBuf>,
}

/// A session that does nothing but log — the real reliability/reassembly
/// state machine is out of scope for this crate (see the crate docs).
struct LoggingSession {
    address: u32,
    port: u16,
}

impl Session for LoggingSession {
    fn encrypt_key(&self) -> u32 {
        0
    }
    fn address(&self) -> u32 {
        self.address
    }
    fn port(&self) -> u16 {
        self.port
    }
    fn set_resend_window_size(&self, size: u32) {
        tracing::debug!(size, "resend window size set");
    }
    fn set_command(&self, command: SessionCommand) {
        tracing::debug!(?command, "session command set");
    }
    fn handle_session_packet(&self, buf: PacketBuffer) {
        tracing::trace!(len = buf.size(), "session packet delivered");
    }
    fn handle_fastpath_packet(&self, buf: PacketBuffer) {
        tracing::trace!(len = buf.size(), "fastpath packet delivered");
    }
}

struct LoggingSessionFactory;

impl SessionFactory for LoggingSessionFactory {
    fn create_session(&self, params: NewSessionParams) -> Arc<dyn Session> {
        tracing::info!(addr = %params.address, port = params.port, ?params.command, "session created");
        Arc::new(LoggingSession {
            address: u32::from_be_bytes(params.address.octets()),
            port: params.port,
        })
    }

    fn destroy_session(&self, _session: Arc<dyn Session>) {
        tracing::info!("session destroyed");
    }
}

struct LoggingWriteThread;

impl WriteThread for LoggingWriteThread {
    fn new_session(&self, id: SessionId, _session: Arc<dyn Session>) {
        tracing::info!(%id, "write thread notified of new session");
    }
    fn enqueue(&self, id: SessionId, buf: PacketBuffer) {
        tracing::trace!(%id, len = buf.size(), "write thread enqueue (no-op harness)");
    }
}

fn main() {
    tracing_subscriber::fmt::init();

    let args = Args::parse();

    let config = match args.config {
        Some(path) => ReceiveCoreConfig::load(&path).unwrap_or_else(|e| {
            eprintln!("failed to load config from {}: {e}", path.display());
            std::process::exit(1);
        }),
        None => ReceiveCoreConfig::default(),
    };

    let socket = UdpSocket::bind(&args.bind).unwrap_or_else(|e| {
        eprintln!("failed to bind {}: {e}", args.bind);
        std::process::exit(1);
    });

    let exit = Arc::new(AtomicBool::new(false));
    let rendezvous = Arc::new(OutboundRendezvous::new());

    let mut receive_loop = ReceiveLoop::new(
        socket,
        Box::new(LoggingSessionFactory),
        Arc::new(LoggingWriteThread),
        config,
        rendezvous,
        exit.clone(),
    )
    .unwrap_or_else(|e| {
        eprintln!("failed to start receive core: {e}");
        std::process::exit(1);
    });

    let handle = std::thread::spawn(move || receive_loop.run());

    println!("receive core on {} — press Enter to stop", args.bind);
    let mut input = String::new();
    io::stdin().read_line(&mut input).unwrap();

    exit.store(true, Ordering::SeqCst);
    handle.join().expect("receive loop thread panicked");
}
