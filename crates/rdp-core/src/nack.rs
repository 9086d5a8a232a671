//! NACK frame codec.
//!
//! Unlike the transfer header and data frames, which use network byte
//! order, a NACK frame is a packed array of signed 32-bit integers in the
//! **host's native byte order** — this reproduces a latent bug in the
//! original implementation (`array.array("i")`, which serializes in
//! whatever order the machine that built it runs). A reimplementation that
//! only ever talks to itself on one architecture never notices; one that
//! interoperates with a transcript captured on a big-endian host would. We
//! preserve the behavior rather than silently switching to big-endian, per
//! the design note in `SPEC_FULL.md` §9.
//!
//! An empty NACK frame (zero bytes) means "every chunk arrived; the
//! transfer is complete."

/// Upper bound on how many missing sequences a single NACK frame reports.
/// A round with more losses than this is split is never generated by this
/// crate's Receiver — see `SPEC_FULL.md` §9, open question (i). The
/// constant sizes the Sender's own receive buffer.
pub const MAX_NACK_PER_FRAME: usize = 8192;

/// Encode a set of missing sequence numbers as a NACK frame.
///
/// Order is whatever the caller passes in — per `spec.md` §5, NACK
/// contents are an unordered set and retransmission order carries no
/// meaning.
pub fn encode_nack(missing: &[u32]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(missing.len() * 4);
    for &seq in missing {
        buf.extend_from_slice(&(seq as i32).to_ne_bytes());
    }
    buf
}

/// Decode a NACK frame into its sequence numbers. An empty or misaligned
/// (not a multiple of 4 bytes) frame decodes to an empty list; an empty
/// list is exactly the sentinel for "transfer complete," so a corrupt tail
/// fragment is treated the same as "nothing missing" rather than a protocol
/// error — the Sender will simply stop.
pub fn decode_nack(data: &[u8]) -> Vec<u32> {
    data.chunks_exact(4)
        .map(|chunk| {
            let raw = i32::from_ne_bytes(chunk.try_into().unwrap());
            raw as u32
        })
        .collect()
}
