//! Flag fields of the PE32 optional header and section table.

use bitflags::bitflags;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    /// `DllCharacteristics` bits of the optional header
    pub struct DllCharacteristics: u16 {
        /// Image can be relocated at load time (ASLR opt-in)
        const DYNAMIC_BASE = 0x0040;
        /// Code integrity checks are enforced
        const FORCE_INTEGRITY = 0x0080;
        /// Image is NX compatible
        const NX_COMPAT = 0x0100;
        /// Image is isolation aware, but should not be isolated
        const NO_ISOLATION = 0x0200;
        /// Image does not use structured exception handling
        const NO_SEH = 0x0400;
        /// Do not bind the image
        const NO_BIND = 0x0800;
        /// Image must execute in an AppContainer
        const APPCONTAINER = 0x1000;
        /// Image is a WDM driver
        const WDM_DRIVER = 0x2000;
        /// Image supports Control Flow Guard
        const GUARD_CF = 0x4000;
        /// Image is Terminal Server aware
        const TERMINAL_SERVER_AWARE = 0x8000;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    /// `Characteristics` bits of a section header
    pub struct SectionCharacteristics: u32 {
        /// Section contains executable code
        const CNT_CODE = 0x0000_0020;
        /// Section contains initialized data
        const CNT_INITIALIZED_DATA = 0x0000_0040;
        /// Section contains uninitialized data
        const CNT_UNINITIALIZED_DATA = 0x0000_0080;
        /// Section can be discarded as needed
        const MEM_DISCARDABLE = 0x0200_0000;
        /// Section cannot be cached
        const MEM_NOT_CACHED = 0x0400_0000;
        /// Section is not pageable
        const MEM_NOT_PAGED = 0x0800_0000;
        /// Section can be shared in memory
        const MEM_SHARED = 0x1000_0000;
        /// Section can be executed as code
        const MEM_EXECUTE = 0x2000_0000;
        /// Section can be read
        const MEM_READ = 0x4000_0000;
        /// Section can be written to
        const MEM_WRITE = 0x8000_0000;
    }
}

impl SectionCharacteristics {
    /// The access given to an injected stub section: executable, writable,
    /// readable initialized code.
    #[must_use]
    pub fn stub_section() -> Self {
        Self::MEM_EXECUTE
            | Self::MEM_WRITE
            | Self::MEM_READ
            | Self::CNT_INITIALIZED_DATA
            | Self::CNT_CODE
    }
}
