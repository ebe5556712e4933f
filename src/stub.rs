//! ASLR preselection stub builder.
//!
//! The Windows 10 variant keeps ASLR enabled and instead chains a small
//! position-independent stub before the original entry point. The stub
//! resolves the base the loader actually chose and transfers control to
//! the original entry point relative to that base, so the relocation
//! replay stays consistent no matter which base was selected.
//!
//! The blob is x86: it pulls the image base out of the PEB
//! (`fs:[0x30] -> PEB`, `ImageBaseAddress` at offset 8), adds the original
//! entry-point RVA and jumps there. The rewrite engine treats the result
//! as opaque bytes.

use crate::{Error, Result};

// mov eax, fs:[0x30]      64 A1 30 00 00 00
// mov eax, [eax + 8]      8B 40 08
// add eax, imm32          05 xx xx xx xx
// jmp eax                 FF E0
const STUB_TEMPLATE: [u8; 16] = [
    0x64, 0xA1, 0x30, 0x00, 0x00, 0x00, // mov eax, fs:[0x30]
    0x8B, 0x40, 0x08, // mov eax, [eax + 8]
    0x05, 0x00, 0x00, 0x00, 0x00, // add eax, original_ep_rva
    0xFF, 0xE0, // jmp eax
];

const EP_PATCH_OFFSET: usize = 10;

/// Builds the preselection stub for a given original entry-point RVA.
///
/// # Errors
///
/// Returns [`crate::Error::StubBuildFailed`] if the image has no entry
/// point to chain to.
pub fn prepare_stub(original_ep_rva: u32) -> Result<Vec<u8>> {
    if original_ep_rva == 0 {
        return Err(Error::StubBuildFailed(
            "image has no entry point to chain to".into(),
        ));
    }

    let mut stub = STUB_TEMPLATE.to_vec();
    stub[EP_PATCH_OFFSET..EP_PATCH_OFFSET + 4].copy_from_slice(&original_ep_rva.to_le_bytes());
    Ok(stub)
}
