//! # relocrypt Prelude
//!
//! Convenient re-exports of the types most callers need.

/// The main error type for all relocrypt operations
pub use crate::Error;

/// The result type used throughout relocrypt
pub use crate::Result;

/// The pipeline controller
pub use crate::Recompiler;

/// Mutable PE32 header model
pub use crate::pe::PeHeaders;

/// Relocation directory model and entry codec
pub use crate::pe::{
    decode_entry, encode_entry, RelocationDirectory, IMAGE_REL_BASED_ABSOLUTE,
    IMAGE_REL_BASED_HIGHLOW,
};

/// Typed flag fields
pub use crate::pe::{DllCharacteristics, SectionCharacteristics};

/// The two load bases the scheme revolves around
pub use crate::pe::{ACTUALIZED_BASE_ADDRESS, TRICKY_BASE_ADDRESS};

/// Queued rewrite descriptions
pub use crate::rewrite::RewriteBlock;
