//! Receiver-side chunk collection and final file assembly.

use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{Result, TransferError};

/// Accumulates chunks as they arrive out of order, and answers "what's
/// still missing" on demand — the Receiver asks this once per pivot
/// arrival rather than maintaining its own bookkeeping.
pub struct Reassembler {
    total_chunks: u32,
    chunks: HashMap<u32, Vec<u8>>,
}

impl Reassembler {
    pub fn new(total_chunks: u32) -> Self {
        Reassembler {
            total_chunks,
            chunks: HashMap::new(),
        }
    }

    /// Record a chunk. Later arrivals of an already-seen sequence overwrite
    /// the earlier payload — duplicates are harmless, per the design.
    pub fn insert(&mut self, sequence: u32, payload: Vec<u8>) {
        self.chunks.insert(sequence, payload);
    }

    pub fn received_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_complete(&self) -> bool {
        self.chunks.len() as u32 >= self.total_chunks
    }

    /// Every sequence in `0..total_chunks` not yet recorded, ascending.
    pub fn missing(&self) -> Vec<u32> {
        (0..self.total_chunks)
            .filter(|seq| !self.chunks.contains_key(seq))
            .collect()
    }

    /// Write chunks `0..total_chunks` to `path` in order, substituting
    /// nothing for any sequence never received (the write simply skips it,
    /// leaving a gap in the output — matching the original's behavior of
    /// writing only the chunks it has and warning about the rest).
    ///
    /// If `path` already exists, a numeric suffix is inserted before the
    /// extension (`name.ext` -> `name(1).ext` -> `name(2).ext` ...) so an
    /// earlier transfer to the same directory is never clobbered.
    pub fn finalize(&self, path: &Path) -> Result<(PathBuf, usize)> {
        let final_path = collision_free_path(path);
        if let Some(parent) = final_path.parent() {
            std::fs::create_dir_all(parent).map_err(TransferError::Fatal)?;
        }

        let mut file = File::create(&final_path).map_err(TransferError::Fatal)?;
        let mut missing_chunks = 0usize;
        for seq in 0..self.total_chunks {
            match self.chunks.get(&seq) {
                Some(payload) => file.write_all(payload).map_err(TransferError::Fatal)?,
                None => missing_chunks += 1,
            }
        }

        Ok((final_path, missing_chunks))
    }
}

/// Finds the first path of the form `name.ext`, `name(1).ext`, `name(2).ext`
/// ... that does not already exist.
pub(crate) fn collision_free_path(path: &Path) -> PathBuf {
    if !path.exists() {
        return path.to_path_buf();
    }

    let parent = path.parent().unwrap_or_else(|| Path::new(""));
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("file");
    let ext = path.extension().and_then(|s| s.to_str());

    for n in 1.. {
        let candidate_name = match ext {
            Some(ext) => format!("{stem}({n}).{ext}"),
            None => format!("{stem}({n})"),
        };
        let candidate = parent.join(candidate_name);
        if !candidate.exists() {
            return candidate;
        }
    }
    unreachable!("collision_free_path: exhausted an infinite range")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_before_any_insert() {
        let r = Reassembler::new(5);
        assert_eq!(r.missing(), vec![0, 1, 2, 3, 4]);
        assert!(!r.is_complete());
    }

    #[test]
    fn complete_after_all_inserted() {
        let mut r = Reassembler::new(3);
        r.insert(0, vec![1]);
        r.insert(1, vec![2]);
        r.insert(2, vec![3]);
        assert!(r.missing().is_empty());
        assert!(r.is_complete());
    }

    #[test]
    fn finalize_skips_absent_chunks() {
        let mut r = Reassembler::new(3);
        r.insert(0, b"AA".to_vec());
        r.insert(2, b"CC".to_vec());
        let path = std::env::temp_dir().join("rdp_core_reassembler_gap_test.bin");
        let _ = std::fs::remove_file(&path);
        let (final_path, missing) = r.finalize(&path).unwrap();
        assert_eq!(missing, 1);
        let contents = std::fs::read(&final_path).unwrap();
        assert_eq!(contents, b"AACC");
        let _ = std::fs::remove_file(&final_path);
    }

    #[test]
    fn finalize_suffixes_on_collision() {
        let path = std::env::temp_dir().join("rdp_core_reassembler_collision_test.bin");
        std::fs::write(&path, b"existing").unwrap();

        let mut r = Reassembler::new(1);
        r.insert(0, b"new".to_vec());
        let (final_path, _) = r.finalize(&path).unwrap();

        assert_ne!(final_path, path);
        assert_eq!(
            final_path.file_name().unwrap().to_str().unwrap(),
            "rdp_core_reassembler_collision_test(1).bin"
        );

        let _ = std::fs::remove_file(&path);
        let _ = std::fs::remove_file(&final_path);
    }
}
