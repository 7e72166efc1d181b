//! Server configuration.

use crate::auth::AuthConfig;

/// Configuration for the trove server.
///
/// Not serializable: the embedded credential set must never round-trip
/// through config dumps.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Host to bind (default `"127.0.0.1"`).
    pub host: String,
    /// Port to bind (default `0` for auto-assign).
    pub port: u16,
    /// Heartbeat broadcast interval in seconds.
    pub heartbeat_interval_secs: u64,
    /// Sessions idle longer than this are reclaimed by the sweep.
    pub idle_timeout_secs: u64,
    /// Depth of each session's outbound frame queue.
    pub sink_queue_depth: usize,
    /// Bearer credential set; empty means public mode.
    pub auth: AuthConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            heartbeat_interval_secs: 30,
            idle_timeout_secs: 90,
            sink_queue_depth: 64,
            auth: AuthConfig::open(),
        }
    }
}
