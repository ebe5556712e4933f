//! Raw bytes of the input image.
//!
//! The rewrite engine reads its input exactly once: the headers are parsed
//! and every section's raw span is copied into owned buffers, after which
//! the input is never consulted again. [`InputImage`] covers the two
//! sources the pipeline accepts - a read-only memory map of the file on
//! disk, or a buffer an embedding caller already holds.

use std::{fs, path::Path};

use memmap2::Mmap;

use crate::{pe::SectionHeader, Error, Result};

/// The PE image being rewritten, before any of it is copied out.
#[derive(Debug)]
pub enum InputImage {
    /// Read-only memory map of the file on disk
    Mapped(Mmap),
    /// An image already in memory
    Owned(Vec<u8>),
}

impl InputImage {
    /// Maps the file at `path` read-only.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::FileError`] if the file cannot be opened or
    /// mapped.
    pub fn open(path: &Path) -> Result<Self> {
        let file = fs::File::open(path)?;
        let mmap = unsafe { Mmap::map(&file) }?;
        Ok(Self::Mapped(mmap))
    }

    /// Wraps an image that is already in memory.
    #[must_use]
    pub fn from_vec(data: Vec<u8>) -> Self {
        Self::Owned(data)
    }

    /// The whole image.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        match self {
            Self::Mapped(mmap) => mmap,
            Self::Owned(data) => data,
        }
    }

    /// Copies a section's raw span out of the image: `size_of_raw_data`
    /// bytes starting at `pointer_to_raw_data`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::OutOfBounds`] when the header's raw span
    /// reaches past the end of the file.
    pub fn read_section(&self, header: &SectionHeader) -> Result<Vec<u8>> {
        let data = self.data();
        let start = header.pointer_to_raw_data as usize;
        let Some(end) = start.checked_add(header.size_of_raw_data as usize) else {
            return Err(Error::OutOfBounds);
        };

        if end > data.len() {
            return Err(Error::OutOfBounds);
        }

        Ok(data[start..end].to_vec())
    }
}
