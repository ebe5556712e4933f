use thiserror::Error;

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type covering every failure this library can return.
///
/// Variants fall into three groups: pipeline errors that correspond to a
/// specific precondition of the rewrite engine (`AslrRequired`,
/// `NotRelocated`, `PackerInvariantViolation`, ...), structural errors
/// raised while reading or rebuilding the PE image (`BadHeader`,
/// `Malformed`, `OutOfBounds`, ...), and wrapped I/O or parser errors.
///
/// # Examples
///
/// ```rust,no_run
/// use relocrypt::{Error, Recompiler};
/// use std::path::Path;
///
/// let mut rec = Recompiler::new();
/// match rec.load_image(Path::new("target.exe")) {
///     Ok(()) => println!("loaded"),
///     Err(Error::BadHeader(msg)) => eprintln!("not a PE32 image: {msg}"),
///     Err(e) => eprintln!("error: {e}"),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// The MZ or PE signature is wrong, or the image is not a parseable PE32.
    #[error("Bad PE header: {0}")]
    BadHeader(String),

    /// The input binary does not have the dynamic-base (ASLR) flag set.
    ///
    /// On-disk relocation repurposes the loader's ASLR fixup pass, so the
    /// input must opt into relocation in the first place.
    #[error("Binary must have ASLR enabled to perform on-disk relocations")]
    AslrRequired,

    /// A layout the rewrite engine does not support.
    ///
    /// Currently: PE32+ images, and images whose relocation section is not
    /// the final section (the emitter grows the relocation section on disk,
    /// which is only safe for the last section).
    #[error("Unsupported image layout: {0}")]
    UnsupportedLayout(String),

    /// The image declares no base-relocation directory.
    #[error("Image has no base relocation directory")]
    MissingRelocDir,

    /// A relocation block's target RVA is not covered by any section.
    #[error("Relocation has no matching section, RVA: {rva:#010x}")]
    OrphanReloc {
        /// Page RVA of the orphaned relocation block
        rva: u32,
    },

    /// A relocation entry with a type other than ABSOLUTE (0) or HIGHLOW (3).
    #[error("Unknown relocation type: {kind:#x}")]
    UnknownRelocType {
        /// The 4-bit type nibble of the offending entry
        kind: u16,
    },

    /// A rewrite was queued before on-disk relocations were performed.
    #[error("On-disk relocations must be performed before doing rewrites")]
    NotRelocated,

    /// Rewrites were queued but the image still carries relocations.
    ///
    /// The emitter builds the new relocation directory from scratch; any
    /// pre-existing blocks at that point mean the pipeline was driven out
    /// of order.
    #[error("No relocation table should exist if rewrites are present")]
    PackerInvariantViolation,

    /// The ASLR preselection stub could not be built.
    #[error("Failed to build ASLR preselection stub: {0}")]
    StubBuildFailed(String),

    /// An out of bound access was attempted while reading the image.
    #[error("Out of bound read would have occurred")]
    OutOfBounds,

    /// The file is damaged and could not be parsed.
    ///
    /// Includes the source location where the malformation was detected.
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// Writing the output image failed.
    #[error("Write failed: {message}")]
    WriteFailed {
        /// What went wrong while producing the output file
        message: String,
    },

    /// File I/O error.
    #[error("{0}")]
    FileError(#[from] std::io::Error),

    /// Error from the goblin crate during PE parsing.
    #[error("{0}")]
    GoblinErr(#[from] goblin::error::Error),
}
