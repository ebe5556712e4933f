// Copyright 2025-2026 relocrypt contributors
//
// Licensed under the MIT license. See the LICENSE file in the repository
// root for the full text.
//
// SPDX-License-Identifier: MIT

#![doc(html_no_source)]
#![deny(missing_docs)]
//#![deny(unsafe_code)]
// - 'file/mod.rs' uses mmap to map the input file into memory
// - 'write/mod.rs' uses mmap for the sized-up-front output file

//! # relocrypt
//!
//! A post-build obfuscator for 32-bit PE executables that hides bytes
//! inside the Windows loader's own base relocation pass.
//!
//! The engine relocates the image *on disk* to the base the loader will
//! really choose, strips the relocation table, and declares a bogus image
//! base near the top of the address space. Byte ranges picked by the
//! caller are then "encrypted" by subtracting a known delta from each
//! 32-bit word and describing the word with an ordinary `HIGHLOW`
//! relocation entry. When the loader maps the binary and replays those
//! relocations, it re-adds the delta and thereby restores the original
//! bytes - the decryption routine ships with every copy of Windows, and
//! the on-disk file shows nothing but plausible relocation data.
//!
//! # Architecture
//!
//! - **File Layer**: the memory-mapped input image ([`crate::file`])
//! - **PE Layer**: mutable PE32 headers and the relocation directory
//!   ([`crate::pe`])
//! - **Image Layer**: owned section contents ([`crate::image`])
//! - **Rewrite Layer**: queued obfuscation requests and fixup packing
//!   ([`crate::rewrite`])
//! - **Controller**: the pipeline orchestrator ([`crate::Recompiler`])
//!
//! # Usage Examples
//!
//! ```rust,no_run
//! use relocrypt::Recompiler;
//! use std::path::Path;
//!
//! let mut rec = Recompiler::new();
//! rec.load_image(Path::new("target.exe"))?;
//! rec.load_sections()?;
//! rec.perform_on_disk_relocations()?;
//!
//! // Queue whatever should be unreadable on disk.
//! rec.rewrite_header()?;
//! rec.fixup_base()?;
//! rec.rewrite_section(".text")?;
//! rec.rewrite_matches(b"kernel32.dll")?;
//!
//! rec.write_output(Path::new("target_obf.exe"))?;
//! # Ok::<(), relocrypt::Error>(())
//! ```
//!
//! # Scope
//!
//! PE32 only. Relocation types other than `ABSOLUTE` and `HIGHLOW` are
//! rejected, the relocation section must be the final section, and
//! Authenticode signatures do not survive (the checksum is zeroed).

#[macro_use]
mod error;

pub mod file;
pub mod image;
pub mod pe;
pub mod prelude;
pub mod rewrite;
pub mod stub;
pub mod utils;
pub mod write;

mod recompiler;

/// `relocrypt` Result type.
///
/// A type alias for `std::result::Result<T, Error>` where the error type is
/// always [`crate::Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// `relocrypt` Error type.
pub use error::Error;

/// Main entry point: the pipeline controller.
pub use recompiler::Recompiler;
