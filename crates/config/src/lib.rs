pub use std::time::Duration;

/// Directory holding config, topology, metadata sidecars and the per-peer
/// chunk directories.
pub const BASE_PATH: &str = "./shared";

pub const CONFIG_FILE: &str = "config.txt";
pub const TOPOLOGY_FILE: &str = "topologia.txt";

/// Suffix of metadata sidecar files: `<file>.p2p`.
pub const METADATA_SUFFIX: &str = ".p2p";
/// Separates a chunk artifact name from its index: `<file>.ch<i>`.
pub const CHUNK_SUFFIX: &str = ".ch";

/// Control datagrams and stream control headers are capped at this size.
pub const CONTROL_MESSAGE_MAX_SIZE: usize = 1024;
pub const TCP_MAX_PENDING_CONNECTIONS: i32 = 10;
/// Stream-plane port is the control-plane port plus this offset.
pub const STREAM_PORT_OFFSET: u16 = 1000;
/// Workers handling inbound control datagrams.
pub const CONTROL_WORKERS: usize = 8;

/// Pause between successive neighbor sends of a flooded DISCOVERY.
pub const DISCOVERY_MESSAGE_INTERVAL: Duration = Duration::from_secs(1);
/// Grace period for neighbor peers to bind their servers.
pub const SERVER_STARTUP_DELAY: Duration = Duration::from_secs(5);
/// How long the per-file response window stays open.
pub const RESPONSE_TIMEOUT: Duration = Duration::from_secs(10);
/// Sleep after each rate-capped block on the stream plane.
pub const RATE_PACING_INTERVAL: Duration = Duration::from_secs(1);
