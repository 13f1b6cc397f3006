//! Relay configuration from command-line flags and environment.

use std::time::Duration;

use clap::Parser;

use crate::signaling::{DEFAULT_SIGNALING_PATH, DEFAULT_SIGNALING_PORT};

pub const DEFAULT_PONG_TIMEOUT_SECS: u64 = 10;

/// WebSocket ping/pong settings for one connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Keepalive {
    pub interval: Duration,
    pub pong_timeout: Duration,
}

#[derive(Parser, Debug, Clone)]
#[command(name = "anytalk-relay")]
#[command(about = "WebSocket signaling relay pairing peers by room key", long_about = None)]
pub struct RelayConfig {
    /// Host address to bind the relay to
    #[arg(short = 'H', long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port number to bind the relay to
    #[arg(short = 'p', long, env = "PORT", default_value_t = DEFAULT_SIGNALING_PORT)]
    pub port: u16,

    /// Request path on which WebSocket upgrades are accepted
    #[arg(long, env = "SIGNALING_PATH", default_value = DEFAULT_SIGNALING_PATH)]
    pub path: String,

    /// Keepalive ping period in seconds (0 or unset disables keepalive)
    #[arg(long, env = "PING_INTERVAL_SECS")]
    pub ping_interval: Option<u64>,

    /// Seconds to wait for a pong before dropping the peer
    #[arg(long, env = "PONG_TIMEOUT_SECS", default_value_t = DEFAULT_PONG_TIMEOUT_SECS)]
    pub pong_timeout: u64,

    /// Default log level when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_SIGNALING_PORT,
            path: DEFAULT_SIGNALING_PATH.to_string(),
            ping_interval: None,
            pong_timeout: DEFAULT_PONG_TIMEOUT_SECS,
            log_level: "info".to_string(),
        }
    }
}

impl RelayConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn keepalive(&self) -> Option<Keepalive> {
        self.ping_interval
            .filter(|secs| *secs > 0)
            .map(|secs| Keepalive {
                interval: Duration::from_secs(secs),
                pong_timeout: Duration::from_secs(self.pong_timeout.max(1)),
            })
    }
}
