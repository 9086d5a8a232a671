//! RDP wire format.
//!
//! Three frame shapes share one datagram channel, distinguished by size and
//! arrival order rather than a type tag — the receiver's first frame is
//! always a transfer header, everything after is a data frame, and NACK
//! frames travel the reverse direction only. A production protocol would add
//! a one-byte type tag (see `SPEC_FULL.md` §9); this crate preserves the
//! original's fragile-but-specified framing for wire compatibility.
//!
//! ```text
//! transfer header (sender -> receiver, once):
//!   [0..4]    buffer_size    u32 big-endian
//!   [4..8]    total_chunks   u32 big-endian
//!   [8..264]  filename       UTF-8, NUL-padded, 256 bytes
//!   padded with zeroes up to 512 bytes on the wire; only 264 are read back.
//!
//! data frame (sender -> receiver, total_chunks times plus retransmits):
//!   [0..4]    sequence        u32 big-endian
//!   [4..8]    payload_length  u32 big-endian
//!   [8..]     payload         raw bytes, payload_length bytes
//! ```

/// Size of the `sequence` + `payload_length` fields preceding a data
/// frame's payload.
pub const DATA_FRAME_HEADER_SIZE: usize = 8;

/// Size of the filename field in a transfer header.
pub const FILENAME_FIELD_SIZE: usize = 256;

/// Size of the logical transfer header (`buffer_size` + `total_chunks` +
/// `filename`), before wire padding.
pub const TRANSFER_HEADER_SIZE: usize = 4 + 4 + FILENAME_FIELD_SIZE;

/// Size the transfer header is zero-padded to on the wire.
pub const TRANSFER_HEADER_WIRE_SIZE: usize = 512;

/// A transfer header: sent once, at the start of a transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferHeader {
    pub buffer_size: u32,
    pub total_chunks: u32,
    pub filename: String,
}

impl TransferHeader {
    /// Encode into a fixed `TRANSFER_HEADER_WIRE_SIZE`-byte datagram.
    ///
    /// # Panics
    /// Panics if the UTF-8 encoding of `filename` is longer than
    /// `FILENAME_FIELD_SIZE` bytes.
    pub fn encode(&self) -> Vec<u8> {
        let name_bytes = self.filename.as_bytes();
        assert!(
            name_bytes.len() <= FILENAME_FIELD_SIZE,
            "filename exceeds {FILENAME_FIELD_SIZE} bytes"
        );

        let mut buf = vec![0u8; TRANSFER_HEADER_WIRE_SIZE];
        buf[0..4].copy_from_slice(&self.buffer_size.to_be_bytes());
        buf[4..8].copy_from_slice(&self.total_chunks.to_be_bytes());
        buf[8..8 + name_bytes.len()].copy_from_slice(name_bytes);
        buf
    }

    /// Decode the first `TRANSFER_HEADER_SIZE` bytes of a received datagram.
    ///
    /// Returns `None` if the frame is too short to contain a header, or if
    /// the filename field fails to UTF-8 decode after NUL-trimming — per
    /// the design, a garbled header is discarded rather than treated as a
    /// fatal error, so the receiver can tolerate stale traffic on its port.
    pub fn decode(data: &[u8]) -> Option<Self> {
        if data.len() < TRANSFER_HEADER_SIZE {
            return None;
        }
        let buffer_size = u32::from_be_bytes(data[0..4].try_into().ok()?);
        let total_chunks = u32::from_be_bytes(data[4..8].try_into().ok()?);
        let name_field = &data[8..8 + FILENAME_FIELD_SIZE];
        let trimmed = trim_nul(name_field);
        let filename = std::str::from_utf8(trimmed).ok()?.to_string();

        Some(TransferHeader {
            buffer_size,
            total_chunks,
            filename,
        })
    }
}

fn trim_nul(bytes: &[u8]) -> &[u8] {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    &bytes[..end]
}

/// A parsed data frame: a sequence number and its payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataFrame<'a> {
    pub sequence: u32,
    pub payload: &'a [u8],
}

/// Encode a data frame into `buf`. `buf` must be at least
/// `DATA_FRAME_HEADER_SIZE + payload.len()` bytes; returns the number of
/// bytes written.
pub fn encode_data_frame(buf: &mut [u8], sequence: u32, payload: &[u8]) -> usize {
    let total = DATA_FRAME_HEADER_SIZE + payload.len();
    assert!(buf.len() >= total, "buffer too small for data frame");

    buf[0..4].copy_from_slice(&sequence.to_be_bytes());
    buf[4..8].copy_from_slice(&(payload.len() as u32).to_be_bytes());
    buf[DATA_FRAME_HEADER_SIZE..total].copy_from_slice(payload);
    total
}

/// Decode a data frame from a received datagram. Returns `None` if the
/// datagram is shorter than the header, or claims a `payload_length` that
/// the datagram doesn't actually carry — both are protocol violations at
/// the call site.
pub fn decode_data_frame(data: &[u8]) -> Option<DataFrame<'_>> {
    if data.len() < DATA_FRAME_HEADER_SIZE {
        return None;
    }
    let sequence = u32::from_be_bytes(data[0..4].try_into().ok()?);
    let payload_length = u32::from_be_bytes(data[4..8].try_into().ok()?) as usize;
    let end = DATA_FRAME_HEADER_SIZE.checked_add(payload_length)?;
    if data.len() < end {
        return None;
    }
    Some(DataFrame {
        sequence,
        payload: &data[DATA_FRAME_HEADER_SIZE..end],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_header() {
        let header = TransferHeader {
            buffer_size: 1480,
            total_chunks: 710,
            filename: "movie.mp4".to_string(),
        };
        let wire = header.encode();
        assert_eq!(wire.len(), TRANSFER_HEADER_WIRE_SIZE);
        let decoded = TransferHeader::decode(&wire).unwrap();
        assert_eq!(decoded, header);
    }

    #[test]
    fn header_tolerates_trailing_padding() {
        let header = TransferHeader {
            buffer_size: 1,
            total_chunks: 1,
            filename: "a".to_string(),
        };
        let wire = header.encode();
        // The receiver only reads the first TRANSFER_HEADER_SIZE bytes.
        let decoded = TransferHeader::decode(&wire[..TRANSFER_HEADER_SIZE]).unwrap();
        assert_eq!(decoded, header);
    }

    #[test]
    fn header_rejects_bad_utf8() {
        let mut buf = vec![0u8; TRANSFER_HEADER_SIZE];
        buf[8] = 0xFF; // invalid UTF-8 start byte, no NUL before it
        buf[9] = 0xFE;
        assert!(TransferHeader::decode(&buf).is_none());
    }

    #[test]
    fn header_rejects_short_frame() {
        assert!(TransferHeader::decode(&[0u8; 10]).is_none());
    }

    #[test]
    fn roundtrip_data_frame() {
        let mut buf = vec![0u8; 64];
        let payload = b"hello world";
        let len = encode_data_frame(&mut buf, 42, payload);
        let frame = decode_data_frame(&buf[..len]).unwrap();
        assert_eq!(frame.sequence, 42);
        assert_eq!(frame.payload, payload);
    }

    #[test]
    fn data_frame_rejects_truncated_payload() {
        let mut buf = vec![0u8; 64];
        let len = encode_data_frame(&mut buf, 1, b"0123456789");
        // Truncate mid-payload: the claimed payload_length no longer fits.
        assert!(decode_data_frame(&buf[..len - 3]).is_none());
    }

    #[test]
    fn data_frame_rejects_too_short_for_header() {
        assert!(decode_data_frame(&[0u8; 4]).is_none());
    }
}
