//! Best-effort UDP mirror: no header handshake, no NACK round, no
//! retransmission. Loss is only ever detected, never recovered — the point
//! is to give the benchmark harness a baseline to compare the RDP core
//! against.
//!
//! Wire format, all textual/JSON except the data frames:
//!
//! ```text
//! header   (sender -> receiver, once): b"FILE_INFO:" + JSON(FileInfo)
//! data     (sender -> receiver, total_chunks times, no retransmit):
//!            [0..4)  seq_num        u32 big-endian
//!            [4..8)  total_chunks   u32 big-endian
//!            [8..12) data_size      u32 big-endian
//!            [12..]  payload, data_size bytes
//! terminator (sender -> receiver, once): b"TRANSFER_END" (12 bytes)
//! report   (receiver -> sender, once): JSON(UdpTransferReport)
//! ```

use std::net::{SocketAddr, UdpSocket};
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use socket2::{Domain, Protocol as SockProtocol, Socket, Type};

use crate::config::{TransferConfig, DEFAULT_SOCKET_BUFFER_SIZE};
use crate::error::{Result, TransferError};
use crate::logging::{TransferEvent, TransferLogger};
use crate::stats::UdpTransferReport;

const HEADER_MARKER: &[u8] = b"FILE_INFO:";
const END_MARKER: &[u8] = b"TRANSFER_END";
const DATA_FRAME_HEADER_SIZE: usize = 12;

/// Read timeout for the collection loop. A gap this long with no packet at
/// all (including a lost `TRANSFER_END`) ends the transfer.
const COLLECTION_TIMEOUT: Duration = Duration::from_secs(10);

/// Threshold checked against time-since-last-packet once a read times out.
/// Since the read itself only ever times out after `COLLECTION_TIMEOUT`,
/// this is always satisfied by the time it's checked — the same is true of
/// the original this is ported from, which checks an equivalent condition
/// inside the same style of `except timeout` branch. Kept for fidelity
/// rather than collapsed into a bare `COLLECTION_TIMEOUT`-only exit, since a
/// shorter read timeout with this check re-added would restore the
/// finer-grained behavior the constant's name implies.
const POST_LAST_PACKET_GRACE: Duration = Duration::from_secs(3);

/// How long the sender waits for the receiver's report after `TRANSFER_END`.
const REPORT_WAIT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Serialize, Deserialize)]
struct FileInfo {
    filename: String,
    filesize: u64,
    total_chunks: u32,
    chunk_size: u32,
}

/// Send `config.filename` once, with no retransmission, and return whatever
/// loss report the receiver sends back (or a failed report if none arrives).
pub fn send_file_udp(config: &TransferConfig, logger: &dyn TransferLogger) -> Result<UdpTransferReport> {
    let header_overhead = DATA_FRAME_HEADER_SIZE;
    let chunk_size = (config.buffer_size as usize).saturating_sub(header_overhead);
    if chunk_size == 0 {
        return Err(TransferError::Config(
            "buffer_size must exceed the UDP mirror frame header size".to_string(),
        ));
    }

    if !config.filename.exists() {
        return Err(TransferError::SourceNotFound(config.filename.clone()));
    }
    let file_size = std::fs::metadata(&config.filename)
        .map_err(TransferError::Fatal)?
        .len();
    let total_chunks = if file_size == 0 {
        1
    } else {
        file_size.div_ceil(chunk_size as u64) as u32
    };

    let target: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|e| TransferError::Config(format!("invalid host/port: {e}")))?;
    let socket = create_mirror_socket()?;
    socket.connect(target).map_err(TransferError::Socket)?;

    let filename = config
        .filename
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| TransferError::Config("filename has no valid UTF-8 base name".to_string()))?
        .to_string();

    let info = FileInfo {
        filename,
        filesize: file_size,
        total_chunks,
        chunk_size: chunk_size as u32,
    };
    let info_json = serde_json::to_vec(&info).map_err(|e| TransferError::Protocol(e.to_string()))?;
    let mut header_packet = HEADER_MARKER.to_vec();
    header_packet.extend_from_slice(&info_json);
    socket.send(&header_packet).map_err(TransferError::Socket)?;

    logger.log(TransferEvent::BurstStarted { total_chunks });

    let chunker = crate::chunker::Chunker::open(&config.filename, chunk_size)?;
    let mut send_buf = vec![0u8; DATA_FRAME_HEADER_SIZE + chunk_size];
    for item in chunker {
        let (sequence, payload) = item?;
        send_buf[0..4].copy_from_slice(&sequence.to_be_bytes());
        send_buf[4..8].copy_from_slice(&total_chunks.to_be_bytes());
        send_buf[8..12].copy_from_slice(&(payload.len() as u32).to_be_bytes());
        send_buf[12..12 + payload.len()].copy_from_slice(&payload);
        socket
            .send(&send_buf[..DATA_FRAME_HEADER_SIZE + payload.len()])
            .map_err(TransferError::Socket)?;

        if !config.send_interval.is_zero() {
            std::thread::sleep(config.send_interval);
        }
    }

    socket.send(END_MARKER).map_err(TransferError::Socket)?;
    logger.log(TransferEvent::BurstComplete {
        chunks_sent: total_chunks,
    });

    socket
        .set_read_timeout(Some(REPORT_WAIT_TIMEOUT))
        .map_err(TransferError::Socket)?;

    let mut reply_buf = vec![0u8; 4096];
    match socket.recv(&mut reply_buf) {
        Ok(n) => serde_json::from_slice::<UdpTransferReport>(&reply_buf[..n])
            .map_err(|e| TransferError::Protocol(format!("malformed report: {e}"))),
        Err(_) => Ok(UdpTransferReport::failed("no report received from peer")),
    }
}

/// Serve UDP mirror transfers, one at a time, forever. A transfer that
/// suffers any packet loss at all is reported as failed and its bytes are
/// discarded rather than written with gaps.
pub fn start_server_udp(
    host: &str,
    port: u16,
    target_dir: &Path,
    logger: &dyn TransferLogger,
) -> Result<()> {
    let bind_addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .map_err(|e| TransferError::Config(format!("invalid host/port: {e}")))?;
    let socket = create_mirror_socket_bound(bind_addr)?;
    std::fs::create_dir_all(target_dir).map_err(TransferError::Fatal)?;

    loop {
        receive_one_mirror_transfer(&socket, target_dir, logger)?;
    }
}

fn receive_one_mirror_transfer(
    socket: &UdpSocket,
    target_dir: &Path,
    logger: &dyn TransferLogger,
) -> Result<()> {
    socket.set_read_timeout(None).map_err(TransferError::Socket)?;

    let mut header_buf = vec![0u8; 4096];
    let (info, peer) = loop {
        let (n, from) = socket.recv_from(&mut header_buf).map_err(TransferError::Socket)?;
        if !header_buf[..n].starts_with(HEADER_MARKER) {
            continue;
        }
        match serde_json::from_slice::<FileInfo>(&header_buf[HEADER_MARKER.len()..n]) {
            Ok(info) => break (info, from),
            Err(_) => {
                logger.log(TransferEvent::HeaderRejected);
                continue;
            }
        }
    };

    logger.log(TransferEvent::HeaderReceived {
        filename: info.filename.clone(),
        total_chunks: info.total_chunks,
    });

    let mut chunks: std::collections::HashMap<u32, Vec<u8>> = std::collections::HashMap::new();
    socket
        .set_read_timeout(Some(COLLECTION_TIMEOUT))
        .map_err(TransferError::Socket)?;

    let mut recv_buf = vec![0u8; 65536];
    let mut last_packet = std::time::Instant::now();
    loop {
        match socket.recv_from(&mut recv_buf) {
            Ok((n, from)) => {
                if from != peer {
                    continue;
                }
                if &recv_buf[..n] == END_MARKER {
                    break;
                }
                if n < DATA_FRAME_HEADER_SIZE {
                    continue;
                }
                let seq_num = u32::from_be_bytes(recv_buf[0..4].try_into().unwrap());
                let data_size = u32::from_be_bytes(recv_buf[8..12].try_into().unwrap()) as usize;
                let end = DATA_FRAME_HEADER_SIZE.saturating_add(data_size).min(n);
                chunks.insert(seq_num, recv_buf[DATA_FRAME_HEADER_SIZE..end].to_vec());
                last_packet = std::time::Instant::now();
            }
            Err(e) if is_timeout(&e) => {
                if last_packet.elapsed() > POST_LAST_PACKET_GRACE {
                    logger.log(TransferEvent::ReceiverIdleTimeout);
                    break;
                }
            }
            Err(e) => return Err(TransferError::Socket(e)),
        }
    }

    let received_packets = chunks.len() as u32;
    let expected_packets = info.total_chunks;
    let report = UdpTransferReport::from_counts(received_packets, expected_packets);

    let report = if report.success {
        let dest = sanitized_dest_path(target_dir, &info.filename);
        match write_chunks_in_order(&dest, &chunks, info.total_chunks) {
            Ok(final_path) => {
                logger.log(TransferEvent::Finalized {
                    path: final_path.display().to_string(),
                    missing_chunks: 0,
                });
                report
            }
            Err(e) => UdpTransferReport::failed(e.to_string()),
        }
    } else {
        let mut report = report;
        report.error = Some(format!(
            "packet loss {} of {} expected",
            report.packet_loss, report.expected_packets
        ));
        report
    };

    let reply = serde_json::to_vec(&report).map_err(|e| TransferError::Protocol(e.to_string()))?;
    let _ = socket.send_to(&reply, peer);
    socket.set_read_timeout(None).map_err(TransferError::Socket)?;

    Ok(())
}

fn write_chunks_in_order(
    dest: &Path,
    chunks: &std::collections::HashMap<u32, Vec<u8>>,
    total_chunks: u32,
) -> Result<std::path::PathBuf> {
    let final_path = crate::reassembler::collision_free_path(dest);
    if let Some(parent) = final_path.parent() {
        std::fs::create_dir_all(parent).map_err(TransferError::Fatal)?;
    }
    let mut file = std::fs::File::create(&final_path).map_err(TransferError::Fatal)?;
    use std::io::Write;
    for seq in 0..total_chunks {
        if let Some(payload) = chunks.get(&seq) {
            file.write_all(payload).map_err(TransferError::Fatal)?;
        }
    }
    Ok(final_path)
}

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

/// The sending side is left at the kernel default send buffer size — only
/// the receiving side raises its buffer, matching the RDP sender/receiver
/// split in `sender.rs`/`receiver.rs`.
fn create_mirror_socket() -> Result<UdpSocket> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(SockProtocol::UDP))
        .map_err(TransferError::Socket)?;
    socket.set_nonblocking(false).map_err(TransferError::Socket)?;
    let bind_addr: SocketAddr = "0.0.0.0:0".parse().expect("valid literal address");
    socket.bind(&bind_addr.into()).map_err(TransferError::Socket)?;
    Ok(socket.into())
}

fn create_mirror_socket_bound(addr: SocketAddr) -> Result<UdpSocket> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(SockProtocol::UDP))
        .map_err(TransferError::Fatal)?;
    socket.set_nonblocking(false).map_err(TransferError::Fatal)?;
    let _ = socket.set_recv_buffer_size(DEFAULT_SOCKET_BUFFER_SIZE);
    socket.bind(&addr.into()).map_err(TransferError::Fatal)?;
    Ok(socket.into())
}
