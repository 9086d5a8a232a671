//! Caller-facing configuration for a transfer.

use std::path::PathBuf;
use std::time::Duration;

/// Parameters for a single `send_file` / `send_file_udp` call.
///
/// Mirrors the narrow interface the CLI driver and log analyzer on the other
/// side of this crate's boundary already agree on: filename, host, port,
/// buffer size, and send interval.
#[derive(Debug, Clone)]
pub struct TransferConfig {
    pub filename: PathBuf,
    pub host: String,
    pub port: u16,
    /// Size in bytes of each outgoing datagram, header included. The
    /// Sender derives its per-chunk payload size by subtracting the data
    /// frame header from this value.
    pub buffer_size: u32,
    /// Delay between consecutive packets in the initial burst.
    pub send_interval: Duration,
}

impl TransferConfig {
    /// Payload bytes available per data frame once the frame header is
    /// subtracted from `buffer_size`.
    pub fn chunk_payload_size(&self) -> usize {
        (self.buffer_size as usize).saturating_sub(crate::protocol::DATA_FRAME_HEADER_SIZE)
    }
}

/// Default datagram size used when a caller has no reason to deviate: a
/// conservative MTU-safe payload.
pub const DEFAULT_BUFFER_SIZE: u32 = 1480;

/// Default socket send/receive buffer size, matching the original's
/// `BUFFER_SIZE` constant used for `SO_SNDBUF`/`SO_RCVBUF`.
pub const DEFAULT_SOCKET_BUFFER_SIZE: usize = 1024 * 1024 * 1024;
