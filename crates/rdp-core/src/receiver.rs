//! The selective-retransmission Receiver.
//!
//! State machine: LISTENING -> HEADERED -> COLLECTING -> FINALIZING, with a
//! COLLECTING -> ABORTED transition on idle timeout or on a data frame that
//! fails to parse. `start_server` loops forever across transfers, returning
//! only on a fatal resource error (e.g. the bind itself failing).

use std::net::{SocketAddr, UdpSocket};
use std::path::Path;
use std::time::Duration;

use socket2::{Domain, Protocol as SockProtocol, Socket, Type};

use crate::error::{Result, TransferError};
use crate::logging::{TransferEvent, TransferLogger};
use crate::nack::{encode_nack, MAX_NACK_PER_FRAME};
use crate::protocol::{decode_data_frame, TransferHeader, TRANSFER_HEADER_SIZE};
use crate::reassembler::Reassembler;

/// How long COLLECTING waits for the next data frame before abandoning the
/// in-progress transfer.
const IDLE_TIMEOUT: Duration = Duration::from_secs(5);

/// Bind `host:port` and serve transfers, one at a time, forever.
pub fn start_server(
    host: &str,
    port: u16,
    target_dir: &Path,
    logger: &dyn TransferLogger,
) -> Result<()> {
    let bind_addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .map_err(|e| TransferError::Config(format!("invalid host/port: {e}")))?;
    let socket = create_receiver_socket(bind_addr)?;

    std::fs::create_dir_all(target_dir).map_err(TransferError::Fatal)?;

    loop {
        receive_one_transfer(&socket, target_dir, logger)?;
    }
}

/// Runs LISTENING through FINALIZING/ABORTED for a single transfer, then
/// returns so the caller can loop back to LISTENING for the next one. Only
/// a fatal socket error propagates as `Err`; everything else is absorbed and
/// logged, matching the design's "the server never crashes on bad input"
/// invariant.
fn receive_one_transfer(
    socket: &UdpSocket,
    target_dir: &Path,
    logger: &dyn TransferLogger,
) -> Result<()> {
    socket.set_read_timeout(None).map_err(TransferError::Socket)?;

    let mut header_buf = vec![0u8; TRANSFER_HEADER_SIZE.max(512)];
    let (header, peer) = loop {
        let (n, from) = match socket.recv_from(&mut header_buf) {
            Ok(v) => v,
            Err(e) => return Err(TransferError::Socket(e)),
        };
        match TransferHeader::decode(&header_buf[..n]) {
            Some(header) => break (header, from),
            None => {
                logger.log(TransferEvent::HeaderRejected);
                continue;
            }
        }
    };

    logger.log(TransferEvent::HeaderReceived {
        filename: header.filename.clone(),
        total_chunks: header.total_chunks,
    });

    socket
        .set_read_timeout(Some(IDLE_TIMEOUT))
        .map_err(TransferError::Socket)?;

    let mut reassembler = Reassembler::new(header.total_chunks);
    let mut pivot = header.total_chunks.saturating_sub(1);
    let mut recv_buf = vec![0u8; header.buffer_size.max(DATA_FRAME_MIN_BUF) as usize];

    while !reassembler.is_complete() {
        let (n, from) = match socket.recv_from(&mut recv_buf) {
            Ok(v) => v,
            Err(e) if is_timeout(&e) => {
                logger.log(TransferEvent::ReceiverIdleTimeout);
                return Ok(());
            }
            Err(e) => return Err(TransferError::Socket(e)),
        };

        if from != peer {
            continue;
        }

        let frame = match decode_data_frame(&recv_buf[..n]) {
            Some(frame) => frame,
            None => {
                logger.log(TransferEvent::ProtocolViolation {
                    detail: format!("undecodable data frame, {n} bytes"),
                });
                return Ok(());
            }
        };

        reassembler.insert(frame.sequence, frame.payload.to_vec());

        if frame.sequence == pivot {
            let missing = reassembler.missing();
            logger.log(TransferEvent::PivotReached {
                sequence: frame.sequence,
                missing: missing.len(),
            });

            if let Some(&new_pivot) = missing.iter().max() {
                pivot = new_pivot;
            }

            send_nack(socket, &peer, &missing, logger);
        }
    }

    let dest = sanitized_dest_path(target_dir, &header.filename);
    let (final_path, missing_chunks) = reassembler.finalize(&dest)?;
    logger.log(TransferEvent::Finalized {
        path: final_path.display().to_string(),
        missing_chunks,
    });

    Ok(())
}

/// Smallest buffer a data frame plus its header could need; guards against a
/// sender-declared `buffer_size` of 0 leaving no room to even read a header.
const DATA_FRAME_MIN_BUF: u32 = 512;

fn send_nack(socket: &UdpSocket, peer: &SocketAddr, missing: &[u32], logger: &dyn TransferLogger) {
    let capped = if missing.len() > MAX_NACK_PER_FRAME {
        logger.log(TransferEvent::NackSendFailed {
            reason: format!(
                "{} missing sequences exceeds cap of {MAX_NACK_PER_FRAME}, truncating",
                missing.len()
            ),
        });
        &missing[..MAX_NACK_PER_FRAME]
    } else {
        missing
    };

    let wire = encode_nack(capped);
    if let Err(e) = socket.send_to(&wire, peer) {
        logger.log(TransferEvent::NackSendFailed {
            reason: e.to_string(),
        });
    }
}

/// Only the base name of the sender-declared filename is used, so a
/// malicious or buggy peer can't walk the path out of `target_dir`.
fn sanitized_dest_path(target_dir: &Path, filename: &str) -> std::path::PathBuf {
    let base = Path::new(filename)
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "received_file".into());
    target_dir.join(base)
}

fn is_timeout(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
    )
}

fn create_receiver_socket(addr: SocketAddr) -> Result<UdpSocket> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(SockProtocol::UDP))
        .map_err(TransferError::Fatal)?;
    socket.set_nonblocking(false).map_err(TransferError::Fatal)?;
    let _ = socket.set_recv_buffer_size(crate::config::DEFAULT_SOCKET_BUFFER_SIZE);
    socket.bind(&addr.into()).map_err(TransferError::Fatal)?;
    Ok(socket.into())
}
