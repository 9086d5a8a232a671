//! The selective-retransmission Sender.
//!
//! State machine: INIT -> BURSTING -> AWAITING_NACK -> RETRANSMITTING, with
//! AWAITING_NACK/RETRANSMITTING alternating once per NACK round until either
//! an empty NACK arrives (DONE) or five consecutive NACK-wait timeouts
//! elapse with no reply at all (FAILED).

use std::collections::HashMap;
use std::net::{SocketAddr, UdpSocket};
use std::time::Duration;

use socket2::{Domain, Protocol as SockProtocol, Socket, Type};

use crate::chunker::Chunker;
use crate::config::TransferConfig;
use crate::error::{Result, TransferError};
use crate::logging::{TransferEvent, TransferLogger};
use crate::nack::decode_nack;
use crate::protocol::{encode_data_frame, TransferHeader, DATA_FRAME_HEADER_SIZE};
use crate::stats::{SendOutcome, TransferStats};

/// How long the Sender waits for a single NACK round before treating it as
/// a timeout and retransmitting the pivot sequence.
const NACK_WAIT_TIMEOUT: Duration = Duration::from_millis(500);

/// Consecutive NACK-wait timeouts (with no reply of any kind in between)
/// before the transfer is declared failed.
const MAX_CONSECUTIVE_TIMEOUTS: u32 = 5;

/// Send `config.filename` to `config.host:config.port` and drive the
/// selective-retransmission handshake to completion or failure.
///
/// Equivalent to [`send_file_with_stats`] with a freshly created,
/// unshared [`TransferStats`] — use that entry point directly when a
/// caller wants to poll progress from another thread while this call
/// blocks.
pub fn send_file(config: &TransferConfig, logger: &dyn TransferLogger) -> Result<SendOutcome> {
    send_file_with_stats(config, &TransferStats::new(), logger)
}

/// Send `config.filename` to `config.host:config.port` and drive the
/// selective-retransmission handshake to completion or failure.
///
/// `stats` is reset with this transfer's totals and updated as chunks go
/// out and are retransmitted; a caller that shares it with another thread
/// can poll progress while this call blocks.
pub fn send_file_with_stats(
    config: &TransferConfig,
    stats: &TransferStats,
    logger: &dyn TransferLogger,
) -> Result<SendOutcome> {
    let chunk_payload_size = config.chunk_payload_size();
    if chunk_payload_size == 0 {
        return Err(TransferError::Config(
            "buffer_size must exceed the data frame header size".to_string(),
        ));
    }

    let chunker = Chunker::open(&config.filename, chunk_payload_size)?;
    let total_chunks = chunker.total_chunks();
    stats.set_total(chunker.file_size(), total_chunks as u64);

    let target: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|e| TransferError::Config(format!("invalid host/port: {e}")))?;

    let socket = create_sender_socket()?;
    socket.connect(target).map_err(TransferError::Socket)?;

    let filename = config
        .filename
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| TransferError::Config("filename has no valid UTF-8 base name".to_string()))?
        .to_string();

    let header = TransferHeader {
        buffer_size: config.buffer_size,
        total_chunks,
        filename,
    };
    socket.send(&header.encode()).map_err(TransferError::Socket)?;

    logger.log(TransferEvent::BurstStarted { total_chunks });

    let mut packet_dict: HashMap<u32, Vec<u8>> = HashMap::with_capacity(total_chunks as usize);
    let mut send_buf = vec![0u8; DATA_FRAME_HEADER_SIZE + chunk_payload_size];

    for item in chunker {
        let (sequence, payload) = item?;
        let len = encode_data_frame(&mut send_buf, sequence, &payload);
        socket.send(&send_buf[..len]).map_err(TransferError::Socket)?;
        stats.record_sent(payload.len() as u64);
        packet_dict.insert(sequence, send_buf[..len].to_vec());

        if !config.send_interval.is_zero() {
            std::thread::sleep(config.send_interval);
        }
    }

    logger.log(TransferEvent::BurstComplete {
        chunks_sent: total_chunks,
    });

    socket
        .set_read_timeout(Some(NACK_WAIT_TIMEOUT))
        .map_err(TransferError::Socket)?;

    run_handshake(&socket, &packet_dict, total_chunks, stats, logger)
}

/// AWAITING_NACK / RETRANSMITTING loop. `pivot` starts as the last sequence
/// sent, since that is the packet whose arrival the Receiver's pivot check
/// is keyed on; it advances to `max(missing)` after every non-empty NACK
/// round, matching the Receiver's own pivot recomputation.
fn run_handshake(
    socket: &UdpSocket,
    packet_dict: &HashMap<u32, Vec<u8>>,
    total_chunks: u32,
    stats: &TransferStats,
    logger: &dyn TransferLogger,
) -> Result<SendOutcome> {
    let mut pivot = total_chunks.saturating_sub(1);
    let mut rounds: Vec<Vec<u32>> = Vec::new();
    let mut round_number: u32 = 0;
    let mut recv_buf = vec![0u8; 32 * 1024];

    loop {
        let missing = match await_nack_round(socket, packet_dict, pivot, stats, logger, &mut recv_buf)? {
            Some(missing) => missing,
            None => {
                logger.log(TransferEvent::SenderFailed { pivot });
                return Ok(SendOutcome::TimedOut { rounds });
            }
        };

        round_number += 1;
        logger.log(TransferEvent::NackReceived {
            round: round_number,
            missing: missing.clone(),
        });
        rounds.push(missing.clone());

        if missing.is_empty() {
            logger.log(TransferEvent::SenderComplete {
                rounds: round_number,
            });
            return Ok(SendOutcome::Completed { rounds });
        }

        pivot = missing.iter().copied().max().unwrap_or(pivot);
        for sequence in &missing {
            if let Some(packet) = packet_dict.get(sequence) {
                socket.send(packet).map_err(TransferError::Socket)?;
                stats.record_retransmit();
                logger.log(TransferEvent::Retransmit { sequence: *sequence });
            }
        }
    }
}

/// Waits for one NACK frame, retransmitting `pivot` and retrying on each
/// timeout. Returns `Ok(None)` once `MAX_CONSECUTIVE_TIMEOUTS` timeouts have
/// elapsed with no reply at all.
fn await_nack_round(
    socket: &UdpSocket,
    packet_dict: &HashMap<u32, Vec<u8>>,
    pivot: u32,
    stats: &TransferStats,
    logger: &dyn TransferLogger,
    recv_buf: &mut [u8],
) -> Result<Option<Vec<u32>>> {
    let mut consecutive_timeouts = 0u32;

    loop {
        match socket.recv(recv_buf) {
            Ok(n) => return Ok(Some(decode_nack(&recv_buf[..n]))),
            Err(e) if is_timeout(&e) => {
                consecutive_timeouts += 1;
                logger.log(TransferEvent::NackTimeout {
                    consecutive: consecutive_timeouts,
                    pivot,
                });
                if consecutive_timeouts > MAX_CONSECUTIVE_TIMEOUTS {
                    return Ok(None);
                }
                if let Some(packet) = packet_dict.get(&pivot) {
                    socket.send(packet).map_err(TransferError::Socket)?;
                    stats.record_retransmit();
                }
            }
            Err(e) => return Err(TransferError::Socket(e)),
        }
    }
}

fn is_timeout(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
    )
}

/// The Sender's socket is left at the kernel default send buffer size —
/// only the Receiver raises its buffer, per `spec.md` §5.
fn create_sender_socket() -> Result<UdpSocket> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(SockProtocol::UDP))
        .map_err(TransferError::Socket)?;
    socket.set_nonblocking(false).map_err(TransferError::Socket)?;
    let bind_addr: SocketAddr = "0.0.0.0:0".parse().expect("valid literal address");
    socket.bind(&bind_addr.into()).map_err(TransferError::Socket)?;
    Ok(socket.into())
}
