//! Outcome and progress types returned across the transfer boundary.

use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters for an in-progress transfer. Atomic so a caller can poll
/// progress from another thread while `send_file`/`start_server` blocks on
/// the socket — the transfer loop itself is single-threaded and only ever
/// updates these from its own thread.
pub struct TransferStats {
    pub total_bytes: AtomicU64,
    pub total_chunks: AtomicU64,
    pub bytes_transferred: AtomicU64,
    pub chunks_transferred: AtomicU64,
    pub retransmits: AtomicU64,
}

impl TransferStats {
    pub fn new() -> Self {
        TransferStats {
            total_bytes: AtomicU64::new(0),
            total_chunks: AtomicU64::new(0),
            bytes_transferred: AtomicU64::new(0),
            chunks_transferred: AtomicU64::new(0),
            retransmits: AtomicU64::new(0),
        }
    }

    pub fn set_total(&self, bytes: u64, chunks: u64) {
        self.total_bytes.store(bytes, Ordering::Relaxed);
        self.total_chunks.store(chunks, Ordering::Relaxed);
    }

    pub fn record_sent(&self, bytes: u64) {
        self.bytes_transferred.fetch_add(bytes, Ordering::Relaxed);
        self.chunks_transferred.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_retransmit(&self) {
        self.retransmits.fetch_add(1, Ordering::Relaxed);
    }

    /// Progress as a fraction 0.0 - 1.0, by bytes sent against total bytes.
    pub fn progress(&self) -> f64 {
        let total = self.total_bytes.load(Ordering::Relaxed);
        if total == 0 {
            return 0.0;
        }
        let done = self.bytes_transferred.load(Ordering::Relaxed);
        (done as f64 / total as f64).min(1.0)
    }
}

impl Default for TransferStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of `send_file`. Replaces the original's convention of appending a
/// `-1` sentinel to the loss list on final timeout with an explicit variant
/// — see `DESIGN.md`'s open-question resolutions.
#[derive(Debug, Clone)]
pub enum SendOutcome {
    /// An empty NACK arrived: the receiver confirmed every chunk.
    /// `rounds` holds the missing-sequence list reported by each NACK round
    /// that preceded it, oldest first.
    Completed { rounds: Vec<Vec<u32>> },
    /// Five consecutive NACK-wait timeouts elapsed with no reply.
    /// `rounds` holds whatever NACK rounds were received before the
    /// timeouts began.
    TimedOut { rounds: Vec<Vec<u32>> },
}

impl SendOutcome {
    pub fn rounds(&self) -> &[Vec<u32>] {
        match self {
            SendOutcome::Completed { rounds } | SendOutcome::TimedOut { rounds } => rounds,
        }
    }

    pub fn succeeded(&self) -> bool {
        matches!(self, SendOutcome::Completed { .. })
    }
}

/// Result of `send_file_udp` / `start_server_udp`'s reply exchange, mirroring
/// the JSON-shaped report the best-effort mirror's original sent back over
/// the wire.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct UdpTransferReport {
    pub success: bool,
    pub received_packets: u32,
    pub expected_packets: u32,
    pub packet_loss: u32,
    /// Percentage of expected packets lost, 0.0-100.0.
    pub loss_rate: f64,
    pub error: Option<String>,
}

impl UdpTransferReport {
    pub fn from_counts(received_packets: u32, expected_packets: u32) -> Self {
        let packet_loss = expected_packets.saturating_sub(received_packets);
        // Percentage (0-100), not a fraction — matches `udp.py`'s
        // `packet_loss / expected_packets * 100`.
        let loss_rate = if expected_packets == 0 {
            0.0
        } else {
            packet_loss as f64 / expected_packets as f64 * 100.0
        };
        UdpTransferReport {
            success: packet_loss == 0,
            received_packets,
            expected_packets,
            packet_loss,
            loss_rate,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        UdpTransferReport {
            success: false,
            received_packets: 0,
            expected_packets: 0,
            packet_loss: 0,
            loss_rate: 0.0,
            error: Some(error.into()),
        }
    }
}
