//! Selective-retransmission reliable datagram transfer core, plus a
//! best-effort UDP mirror, for one-shot file transfer benchmarking.
//!
//! Two transports share the same [`TransferConfig`] shape:
//!
//! - [`sender::send_file`] / [`receiver::start_server`]: a NACK-driven
//!   handshake that retransmits until the receiver confirms every chunk or
//!   the sender gives up after repeated silence.
//! - [`udp_mirror::send_file_udp`] / [`udp_mirror::start_server_udp`]: fire
//!   the file once, no retries, and report whatever loss the receiver
//!   observed — a baseline to measure the reliable path against.
//!
//! Both sides take a [`logging::TransferLogger`] rather than writing to a
//! process-wide log target, so a caller benchmarking many transfers in one
//! process can attribute events to the run that produced them.

pub mod chunker;
pub mod config;
pub mod error;
pub mod logging;
pub mod nack;
pub mod protocol;
pub mod reassembler;
pub mod receiver;
pub mod sender;
pub mod stats;
pub mod udp_mirror;

pub use config::TransferConfig;
pub use error::{Result, TransferError};
pub use logging::{NullLogger, TracingLogger, TransferEvent, TransferLogger};
pub use receiver::start_server;
pub use sender::{send_file, send_file_with_stats};
pub use stats::{SendOutcome, TransferStats, UdpTransferReport};
pub use udp_mirror::{send_file_udp, start_server_udp};
