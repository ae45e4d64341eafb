//! Receive-core configuration (spec.md §6).

use serde::Deserialize;

use crate::error::{ReceiveError, Result};

/// Configuration enumerated in spec.md §6, plus the handful of ambient knobs
/// (`max_message_size`, `boost_priority`) the receive loop itself needs.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReceiveCoreConfig {
    /// `MaxPayload` for server↔server peers.
    pub server_server_reliable_size: u32,
    /// `MaxPayload` for server↔client peers.
    pub server_client_reliable_size: u32,
    /// Initial resend window for server-originated sessions.
    pub server_packet_window: u32,
    /// Initial resend window for client-originated sessions.
    pub client_packet_window: u32,
    /// Per-service message heap size, handed to the session factory.
    pub message_factory_heap_size: u32,
    /// Selects `server_*` sizing over `client_*` when constructing sessions.
    pub server_service: bool,
    /// Datagrams larger than this are processed up to the limit, with a
    /// warning, rather than dropped outright (spec.md §4.G step 3).
    pub max_message_size: usize,
    /// Attempt to raise the receive thread to an elevated scheduling class.
    /// Best-effort; unsupported platforms log a warning and continue at
    /// normal priority (spec.md §9).
    pub boost_priority: bool,
}

impl Default for ReceiveCoreConfig {
    fn default() -> Self {
        Self {
            server_server_reliable_size: 496,
            server_client_reliable_size: 496,
            server_packet_window: 20,
            client_packet_window: 20,
            message_factory_heap_size: 65536,
            server_service: false,
            max_message_size: 1024,
            boost_priority: false,
        }
    }
}

impl ReceiveCoreConfig {
    /// `MaxPayload` this config selects, depending on `server_service`.
    pub fn max_payload(&self) -> usize {
        if self.server_service {
            self.server_server_reliable_size as usize
        } else {
            self.server_client_reliable_size as usize
        }
    }

    /// Initial resend window this config selects, depending on
    /// `server_service`.
    pub fn resend_window_size(&self) -> u32 {
        if self.server_service {
            self.server_packet_window
        } else {
            self.client_packet_window
        }
    }

    /// Load configuration from a TOML file, falling back to field defaults
    /// for anything the file omits.
    pub fn load(path: &std::path::Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ReceiveError::Config(format!("reading {}: {e}", path.display())))?;
        toml::from_str(&contents)
            .map_err(|e| ReceiveError::Config(format!("parsing {}: {e}", path.display())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_select_client_sizing_when_not_a_server_service() {
        let config = ReceiveCoreConfig::default();
        assert_eq!(config.max_payload(), config.server_client_reliable_size as usize);
        assert_eq!(config.resend_window_size(), config.client_packet_window);
    }

    #[test]
    fn server_service_selects_server_sizing() {
        let mut config = ReceiveCoreConfig::default();
        config.server_service = true;
        config.server_server_reliable_size = 1024;
        config.server_packet_window = 64;
        assert_eq!(config.max_payload(), 1024);
        assert_eq!(config.resend_window_size(), 64);
    }

    #[test]
    fn partial_toml_falls_back_to_defaults() {
        let config: ReceiveCoreConfig = toml::from_str("server_service = true\n").unwrap();
        assert!(config.server_service);
        assert_eq!(
            config.server_client_reliable_size,
            ReceiveCoreConfig::default().server_client_reliable_size
        );
    }
}
