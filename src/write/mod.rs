//! Memory-mapped output file handling.
//!
//! The emitter knows the exact size of the output before writing anything
//! (the section table fixes every raw pointer), so the file is created at
//! full size up front and memory-mapped for random-access writes. All
//! writes are bounds-checked; the mapping is flushed once by
//! [`Output::finalize`].

use std::path::Path;

use memmap2::{MmapMut, MmapOptions};

use crate::{Error, Result};

/// A memory-mapped output file sized up front.
pub struct Output {
    mmap: MmapMut,
}

impl Output {
    /// Creates (or truncates) the output file at `size` bytes and maps it.
    ///
    /// The fresh mapping is zero-filled, which doubles as the padding
    /// between and after the written regions.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::WriteFailed`] if the file cannot be created,
    /// sized, or mapped.
    pub fn create(path: &Path, size: u64) -> Result<Self> {
        let file = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .map_err(|e| Error::WriteFailed {
                message: format!("Failed to create output file: {e}"),
            })?;

        file.set_len(size).map_err(|e| Error::WriteFailed {
            message: format!("Failed to set output file size: {e}"),
        })?;

        let mmap = unsafe {
            MmapOptions::new()
                .map_mut(&file)
                .map_err(|e| Error::WriteFailed {
                    message: format!("Failed to map output file: {e}"),
                })?
        };

        Ok(Self { mmap })
    }

    /// Writes `data` at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::WriteFailed`] if the write would reach past
    /// the end of the file.
    pub fn write_at(&mut self, offset: u64, data: &[u8]) -> Result<()> {
        let start = offset as usize;
        let Some(end) = start.checked_add(data.len()) else {
            return Err(Error::WriteFailed {
                message: format!("Write offset overflow: offset={offset}, len={}", data.len()),
            });
        };

        if end > self.mmap.len() {
            return Err(Error::WriteFailed {
                message: format!(
                    "Write would exceed file size: offset={}, len={}, file_size={}",
                    offset,
                    data.len(),
                    self.mmap.len()
                ),
            });
        }

        self.mmap[start..end].copy_from_slice(data);
        Ok(())
    }

    /// Flushes the mapping to disk.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::WriteFailed`] if the flush fails.
    pub fn finalize(self) -> Result<()> {
        self.mmap.flush().map_err(|e| Error::WriteFailed {
            message: format!("Failed to flush output file: {e}"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_land_at_their_offsets() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.bin");

        let mut output = Output::create(&path, 0x100).unwrap();
        output.write_at(0, b"MZ").unwrap();
        output.write_at(0x80, &[0xAA, 0xBB]).unwrap();
        output.finalize().unwrap();

        let written = std::fs::read(&path).unwrap();
        assert_eq!(written.len(), 0x100);
        assert_eq!(&written[0..2], b"MZ");
        assert_eq!(written[2], 0); // untouched bytes stay zero
        assert_eq!(&written[0x80..0x82], &[0xAA, 0xBB]);
    }

    #[test]
    fn out_of_bounds_write_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.bin");

        let mut output = Output::create(&path, 8).unwrap();
        assert!(output.write_at(6, &[1, 2, 3]).is_err());
        assert!(output.write_at(u64::MAX, &[1]).is_err());
    }
}
