//! PE32 structure support: mutable headers, flag types, and the base
//! relocation directory.
//!
//! This is the write-capable half of the PE plumbing the rewrite engine
//! sits on. Container parsing is delegated to goblin; everything the
//! engine mutates (header fields, section table, relocation directory) is
//! mirrored into owned structs that serialize back to the on-disk layout.
//!
//! # Key Components
//!
//! - [`crate::pe::PeHeaders`] - DOS region, COFF/optional headers, data
//!   directories and section table, all editable
//! - [`crate::pe::RelocationDirectory`] - parse, clear and rebuild the base
//!   relocation table
//! - [`crate::pe::DllCharacteristics`] / [`crate::pe::SectionCharacteristics`] -
//!   typed flag fields
//!
//! The two load bases the whole scheme revolves around live here as well:
//! [`TRICKY_BASE_ADDRESS`] is the declared base that static analyzers see,
//! [`ACTUALIZED_BASE_ADDRESS`] is where the Windows loader actually puts
//! the image after rejecting it.

mod flags;
mod headers;
mod relocs;

pub use flags::{DllCharacteristics, SectionCharacteristics};
pub use headers::{
    DataDirectory, FileHeader, OptionalHeader, PeHeaders, SectionHeader, DIRECTORY_BASE_RELOC,
    DIRECTORY_COUNT, DIRECTORY_IAT, DIRECTORY_IMPORT,
};
pub use relocs::{
    decode_entry, encode_entry, RelocationBlock, RelocationDirectory, IMAGE_REL_BASED_ABSOLUTE,
    IMAGE_REL_BASED_HIGHLOW, RELOC_BLOCK_SPAN,
};

/// The bogus image base declared in the output binary.
///
/// It sits so close to the top of the 32-bit address space that the loader
/// always rejects it, and `TRICKY + 2 * ACTUALIZED` wraps to `ACTUALIZED`,
/// which is what makes the relocation arithmetic land where it should.
pub const TRICKY_BASE_ADDRESS: u32 = 0xFFFF_0000;

/// The base the loader actually picks once it has rejected
/// [`TRICKY_BASE_ADDRESS`]: the lowest address a 32-bit image can map at.
pub const ACTUALIZED_BASE_ADDRESS: u32 = 0x0001_0000;
