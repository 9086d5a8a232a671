//! Slices a file into fixed-size, sequence-numbered chunks.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::error::{Result, TransferError};

/// A finite, non-restartable producer of `(sequence, payload)` pairs. Reads
/// the source file exactly once, in order — chunks flow past the codec and
/// into the Sender's packet dictionary in the same pass, per the design's
/// "the file is never re-read" invariant.
pub struct Chunker {
    file: File,
    chunk_size: usize,
    next_sequence: u32,
    total_chunks: u32,
    file_size: u64,
    remaining: u64,
}

impl Chunker {
    /// Open `path` and compute `total_chunks` from its size. Returns
    /// [`TransferError::SourceNotFound`] if the file doesn't exist, or a
    /// fatal error if it exists but can't be opened/stat'd.
    pub fn open(path: &Path, chunk_size: usize) -> Result<Self> {
        if !path.exists() {
            return Err(TransferError::SourceNotFound(path.to_path_buf()));
        }
        let file = File::open(path).map_err(TransferError::Fatal)?;
        let file_size = file
            .metadata()
            .map_err(TransferError::Fatal)?
            .len();

        let total_chunks = total_chunks_for(file_size, chunk_size);

        Ok(Chunker {
            file,
            chunk_size,
            next_sequence: 0,
            total_chunks,
            file_size,
            remaining: file_size,
        })
    }

    pub fn total_chunks(&self) -> u32 {
        self.total_chunks
    }

    pub fn file_size(&self) -> u64 {
        self.file_size
    }
}

/// `ceil(file_size / chunk_size)`, with a zero-byte file still producing
/// exactly one (empty) chunk so the header/handshake has something to
/// trigger on.
fn total_chunks_for(file_size: u64, chunk_size: usize) -> u32 {
    if file_size == 0 {
        return 1;
    }
    file_size.div_ceil(chunk_size as u64) as u32
}

impl Iterator for Chunker {
    type Item = Result<(u32, Vec<u8>)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next_sequence >= self.total_chunks {
            return None;
        }

        let to_read = (self.remaining as usize).min(self.chunk_size);
        let mut buf = vec![0u8; to_read];
        if let Err(e) = self.file.read_exact(&mut buf) {
            return Some(Err(TransferError::Fatal(e)));
        }

        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.remaining -= to_read as u64;

        Some(Ok((sequence, buf)))
    }
}
