//! Exercises the RDP handshake's loss-recovery and failure paths through a
//! relay that sits between a real sender and a real receiver and drops
//! datagrams on command — rather than hand-rolling a fake peer, this lets
//! the actual `sender`/`receiver` state machines run end to end.

use std::collections::HashSet;
use std::fs;
use std::io::Write;
use std::net::UdpSocket;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use rdp_core::config::DEFAULT_BUFFER_SIZE;
use rdp_core::logging::NullLogger;
use rdp_core::{send_file, start_server, TransferConfig};

const TRANSFER_HEADER_WIRE_SIZE: usize = 512;

fn free_port() -> u16 {
    let probe = UdpSocket::bind("127.0.0.1:0").unwrap();
    probe.local_addr().unwrap().port()
}

fn temp_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("rdp_core_reliability_{name}_{}", std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    dir
}

fn write_pattern_file(path: &PathBuf, size: usize) {
    let mut f = fs::File::create(path).unwrap();
    let data: Vec<u8> = (0..size).map(|i| (i % 251) as u8).collect();
    f.write_all(&data).unwrap();
}

/// A relay between a sender and a receiver. `drop_once` holds data-frame
/// sequence numbers to drop the first time they're seen; every later
/// retransmission of the same sequence passes through. `drop_all_reverse`
/// drops every receiver -> sender datagram (i.e. every NACK).
fn run_relay(listen_port: u16, target_port: u16, drop_once: HashSet<u32>, drop_all_reverse: bool) {
    let relay = UdpSocket::bind(("127.0.0.1", listen_port)).unwrap();
    relay.set_read_timeout(Some(Duration::from_secs(6))).unwrap();
    let mut client_addr = None;
    let mut buf = vec![0u8; 65536];
    let already_dropped: Mutex<HashSet<u32>> = Mutex::new(HashSet::new());

    loop {
        let (n, from) = match relay.recv_from(&mut buf) {
            Ok(v) => v,
            Err(_) => return,
        };

        if from.port() == target_port {
            if drop_all_reverse {
                continue;
            }
            if let Some(client) = client_addr {
                let _ = relay.send_to(&buf[..n], client);
            }
            continue;
        }

        client_addr = Some(from);

        if n != TRANSFER_HEADER_WIRE_SIZE && n >= 4 {
            let sequence = u32::from_be_bytes(buf[0..4].try_into().unwrap());
            if drop_once.contains(&sequence) {
                let mut dropped = already_dropped.lock().unwrap();
                if dropped.insert(sequence) {
                    continue;
                }
            }
        }

        let _ = relay.send_to(&buf[..n], ("127.0.0.1", target_port));
    }
}

fn run_transfer_through_relay(
    dir: &std::path::Path,
    file_size: usize,
    drop_once: HashSet<u32>,
    drop_all_reverse: bool,
) -> (rdp_core::SendOutcome, PathBuf, PathBuf) {
    let input_path = dir.join("input.bin");
    write_pattern_file(&input_path, file_size);

    let server_port = free_port();
    let server_dir = dir.join("received");
    std::thread::spawn(move || {
        let _ = start_server("127.0.0.1", server_port, &server_dir, &NullLogger);
    });
    std::thread::sleep(Duration::from_millis(100));

    let relay_port = free_port();
    std::thread::spawn(move || run_relay(relay_port, server_port, drop_once, drop_all_reverse));
    std::thread::sleep(Duration::from_millis(100));

    let config = TransferConfig {
        filename: input_path.clone(),
        host: "127.0.0.1".to_string(),
        port: relay_port,
        buffer_size: DEFAULT_BUFFER_SIZE,
        send_interval: Duration::ZERO,
    };
    let outcome = send_file(&config, &NullLogger).expect("send_file failed");
    (outcome, input_path, dir.join("received").join("input.bin"))
}

/// S2: a handful of scattered sequences lost on the first pass are
/// recovered by exactly one NACK round, and the file still arrives intact.
#[test]
fn recovers_from_scattered_packet_loss() {
    let dir = temp_dir("s2_scattered");
    let drop_once: HashSet<u32> = [5, 17, 100].into_iter().collect();
    let (outcome, input_path, output_path) =
        run_transfer_through_relay(&dir, 300_000, drop_once, false);

    assert!(outcome.succeeded(), "expected Completed, got {outcome:?}");
    assert!(
        outcome.rounds().iter().any(|round| !round.is_empty()),
        "expected at least one non-empty NACK round"
    );

    std::thread::sleep(Duration::from_millis(200));
    assert_eq!(fs::read(&input_path).unwrap(), fs::read(&output_path).unwrap());
}

/// S3: losing the pivot sequence itself (the very last one sent) still
/// recovers, via the sender's own NACK-timeout retransmission rather than
/// an explicit NACK round.
#[test]
fn recovers_when_pivot_packet_is_lost() {
    let dir = temp_dir("s3_pivot_lost");
    let file_size = 20_000; // a handful of 1472-byte chunks
    let chunk_payload = DEFAULT_BUFFER_SIZE as usize - 8;
    let total_chunks = (file_size as u64).div_ceil(chunk_payload as u64) as u32;
    let pivot = total_chunks - 1;

    let drop_once: HashSet<u32> = [pivot].into_iter().collect();
    let (outcome, input_path, output_path) =
        run_transfer_through_relay(&dir, file_size, drop_once, false);

    assert!(outcome.succeeded(), "expected Completed, got {outcome:?}");

    std::thread::sleep(Duration::from_millis(200));
    assert_eq!(fs::read(&input_path).unwrap(), fs::read(&output_path).unwrap());
}

/// S4: every NACK is lost in transit. The receiver finishes collecting the
/// file just fine, but the sender never hears back and gives up after five
/// consecutive timeouts.
#[test]
fn times_out_when_nack_channel_is_totally_lost() {
    let dir = temp_dir("s4_reverse_loss");
    let (outcome, _input_path, _output_path) =
        run_transfer_through_relay(&dir, 20_000, HashSet::new(), true);

    assert!(
        matches!(outcome, rdp_core::SendOutcome::TimedOut { .. }),
        "expected TimedOut, got {outcome:?}"
    );
}
