//! Structured transfer logging.
//!
//! The state machines in [`crate::sender`] and [`crate::receiver`] never call
//! `tracing` directly — they emit [`TransferEvent`]s to an injected
//! [`TransferLogger`], the way the global logging facility the original
//! implementation relies on should have been treated: a sink passed at the
//! core boundary, not a hidden process-wide dependency.

use std::fmt;

/// One structured event in a transfer's lifecycle.
#[derive(Debug, Clone)]
pub enum TransferEvent {
    /// Sender: the initial burst over all sequences has started.
    BurstStarted { total_chunks: u32 },
    /// Sender: the initial burst has completed; waiting on the first NACK.
    BurstComplete { chunks_sent: u32 },
    /// Sender: a NACK round reported these sequences missing.
    NackReceived { round: u32, missing: Vec<u32> },
    /// Sender: retransmitted one sequence in response to a NACK.
    Retransmit { sequence: u32 },
    /// Sender: the NACK wait timed out; the pivot packet was resent.
    NackTimeout { consecutive: u32, pivot: u32 },
    /// Sender: five consecutive NACK timeouts — transfer failed.
    SenderFailed { pivot: u32 },
    /// Sender: an empty NACK arrived — transfer is complete.
    SenderComplete { rounds: u32 },
    /// Receiver: a valid header was parsed; the collection phase started.
    HeaderReceived { filename: String, total_chunks: u32 },
    /// Receiver: a frame failed to decode as a header and was discarded.
    HeaderRejected,
    /// Receiver: the pivot sequence arrived; completeness was evaluated.
    PivotReached { sequence: u32, missing: usize },
    /// Receiver: a NACK frame could not be sent (e.g. oversized payload).
    NackSendFailed { reason: String },
    /// Receiver: the socket went idle past the configured timeout.
    ReceiverIdleTimeout,
    /// Receiver: the file was written to disk, with this many absent chunks.
    Finalized { path: String, missing_chunks: usize },
    /// Either peer: a data frame was too short to parse.
    ProtocolViolation { detail: String },
}

impl fmt::Display for TransferEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BurstStarted { total_chunks } => {
                write!(f, "burst_started total_chunks={total_chunks}")
            }
            Self::BurstComplete { chunks_sent } => {
                write!(f, "burst_complete chunks_sent={chunks_sent}")
            }
            Self::NackReceived { round, missing } => {
                write!(f, "nack_received round={round} missing={}", missing.len())
            }
            Self::Retransmit { sequence } => write!(f, "retransmit sequence={sequence}"),
            Self::NackTimeout { consecutive, pivot } => {
                write!(f, "nack_timeout consecutive={consecutive} pivot={pivot}")
            }
            Self::SenderFailed { pivot } => write!(f, "sender_failed pivot={pivot}"),
            Self::SenderComplete { rounds } => write!(f, "sender_complete rounds={rounds}"),
            Self::HeaderReceived { filename, total_chunks } => {
                write!(f, "header_received filename={filename} total_chunks={total_chunks}")
            }
            Self::HeaderRejected => write!(f, "header_rejected"),
            Self::PivotReached { sequence, missing } => {
                write!(f, "pivot_reached sequence={sequence} missing={missing}")
            }
            Self::NackSendFailed { reason } => write!(f, "nack_send_failed reason={reason}"),
            Self::ReceiverIdleTimeout => write!(f, "receiver_idle_timeout"),
            Self::Finalized { path, missing_chunks } => {
                write!(f, "finalized path={path} missing_chunks={missing_chunks}")
            }
            Self::ProtocolViolation { detail } => write!(f, "protocol_violation detail={detail}"),
        }
    }
}

/// Sink for [`TransferEvent`]s. Implementations can forward to `tracing`,
/// a test-local `Vec`, or discard entirely.
pub trait TransferLogger: Send + Sync {
    fn log(&self, event: TransferEvent);
}

/// Logger that forwards to the `tracing` crate.
pub struct TracingLogger;

impl TransferLogger for TracingLogger {
    fn log(&self, event: TransferEvent) {
        match &event {
            TransferEvent::HeaderReceived { .. }
            | TransferEvent::BurstStarted { .. }
            | TransferEvent::SenderComplete { .. }
            | TransferEvent::SenderFailed { .. }
            | TransferEvent::Finalized { .. }
            | TransferEvent::ReceiverIdleTimeout
            | TransferEvent::ProtocolViolation { .. } => {
                tracing::info!("{}", event);
            }
            _ => {
                tracing::debug!("{}", event);
            }
        }
    }
}

/// Logger that discards every event. Used by tests that only care about the
/// return value.
pub struct NullLogger;

impl TransferLogger for NullLogger {
    fn log(&self, _event: TransferEvent) {}
}
