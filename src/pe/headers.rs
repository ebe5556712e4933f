//! Mutable PE32 header model.
//!
//! Parsing leans on goblin for the container structure (MZ/PE signatures,
//! COFF header, section table); the parsed values are then mirrored into
//! plain mutable structs so the rewrite engine can edit header fields and
//! re-serialize the whole header region from scratch. The DOS header and
//! stub are never interpreted beyond `e_lfanew` and are carried through to
//! the output verbatim.
//!
//! Only PE32 is modeled. PE32+ images are rejected at parse time; widening
//! the field types would silently break the 32-bit wrapping arithmetic the
//! relocation rewrites depend on.

use goblin::pe::{header::Header, optional_header, section_table::SectionTable};

use crate::{
    pe::flags::{DllCharacteristics, SectionCharacteristics},
    Error, Result,
};

/// Number of data directory slots in a PE32 optional header.
pub const DIRECTORY_COUNT: usize = 16;
/// Data directory index of the import table.
pub const DIRECTORY_IMPORT: usize = 1;
/// Data directory index of the base relocation table.
pub const DIRECTORY_BASE_RELOC: usize = 5;
/// Data directory index of the import address table.
pub const DIRECTORY_IAT: usize = 12;

const PE_SIGNATURE: u32 = 0x0000_4550;
const COFF_HEADER_SIZE: u32 = 20;
const OPTIONAL_HEADER_SIZE: u16 = 224;
const SECTION_HEADER_SIZE: u32 = 40;

fn read_u16(bytes: &[u8], offset: usize) -> Result<u16> {
    bytes
        .get(offset..offset + 2)
        .map(|b| u16::from_le_bytes(b.try_into().unwrap()))
        .ok_or(Error::OutOfBounds)
}

fn read_u32(bytes: &[u8], offset: usize) -> Result<u32> {
    bytes
        .get(offset..offset + 4)
        .map(|b| u32::from_le_bytes(b.try_into().unwrap()))
        .ok_or(Error::OutOfBounds)
}

fn align_up(value: u32, alignment: u32) -> u32 {
    if alignment == 0 {
        value
    } else {
        value.div_ceil(alignment) * alignment
    }
}

/// One data directory slot: an RVA plus a byte length.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DataDirectory {
    /// RVA of the directory's data, 0 if absent
    pub virtual_address: u32,
    /// Size of the directory's data in bytes
    pub size: u32,
}

/// COFF file header fields.
#[derive(Debug, Clone)]
pub struct FileHeader {
    /// Target machine type (0x14C for x86)
    pub machine: u16,
    /// Number of entries in the section table
    pub number_of_sections: u16,
    /// Link timestamp
    pub time_date_stamp: u32,
    /// File offset of the COFF symbol table, 0 for images
    pub pointer_to_symbol_table: u32,
    /// Number of COFF symbols
    pub number_of_symbols: u32,
    /// Size of the optional header that follows
    pub size_of_optional_header: u16,
    /// Image characteristics bits
    pub characteristics: u16,
}

/// PE32 optional header fields, all held mutably.
#[derive(Debug, Clone)]
#[allow(missing_docs)]
pub struct OptionalHeader {
    pub magic: u16,
    pub major_linker_version: u8,
    pub minor_linker_version: u8,
    pub size_of_code: u32,
    pub size_of_initialized_data: u32,
    pub size_of_uninitialized_data: u32,
    pub address_of_entry_point: u32,
    pub base_of_code: u32,
    pub base_of_data: u32,
    pub image_base: u32,
    pub section_alignment: u32,
    pub file_alignment: u32,
    pub major_operating_system_version: u16,
    pub minor_operating_system_version: u16,
    pub major_image_version: u16,
    pub minor_image_version: u16,
    pub major_subsystem_version: u16,
    pub minor_subsystem_version: u16,
    pub win32_version_value: u32,
    pub size_of_image: u32,
    pub size_of_headers: u32,
    pub checksum: u32,
    pub subsystem: u16,
    pub dll_characteristics: u16,
    pub size_of_stack_reserve: u32,
    pub size_of_stack_commit: u32,
    pub size_of_heap_reserve: u32,
    pub size_of_heap_commit: u32,
    pub loader_flags: u32,
    pub number_of_rva_and_sizes: u32,
}

/// One section table entry.
#[derive(Debug, Clone)]
pub struct SectionHeader {
    /// 8-byte section name, NUL padded
    pub name: [u8; 8],
    /// Size of the section when mapped
    pub virtual_size: u32,
    /// RVA of the section when mapped
    pub virtual_address: u32,
    /// Size of the section's data on disk, a multiple of the file alignment
    pub size_of_raw_data: u32,
    /// File offset of the section's data
    pub pointer_to_raw_data: u32,
    /// COFF relocations pointer, 0 for images
    pub pointer_to_relocations: u32,
    /// COFF line numbers pointer, 0 for images
    pub pointer_to_linenumbers: u32,
    /// COFF relocation count, 0 for images
    pub number_of_relocations: u16,
    /// COFF line number count, 0 for images
    pub number_of_linenumbers: u16,
    /// Section characteristics bits
    pub characteristics: u32,
}

impl SectionHeader {
    /// The section name with trailing NUL padding removed.
    #[must_use]
    pub fn name_str(&self) -> String {
        let end = self
            .name
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(self.name.len());
        String::from_utf8_lossy(&self.name[..end]).into_owned()
    }

    /// Replaces the section name, truncating or NUL padding to 8 bytes.
    pub fn set_name(&mut self, name: &str) {
        let mut padded = [0_u8; 8];
        let bytes = name.as_bytes();
        let len = bytes.len().min(8);
        padded[..len].copy_from_slice(&bytes[..len]);
        self.name = padded;
    }

    fn write_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.name);
        out.extend_from_slice(&self.virtual_size.to_le_bytes());
        out.extend_from_slice(&self.virtual_address.to_le_bytes());
        out.extend_from_slice(&self.size_of_raw_data.to_le_bytes());
        out.extend_from_slice(&self.pointer_to_raw_data.to_le_bytes());
        out.extend_from_slice(&self.pointer_to_relocations.to_le_bytes());
        out.extend_from_slice(&self.pointer_to_linenumbers.to_le_bytes());
        out.extend_from_slice(&self.number_of_relocations.to_le_bytes());
        out.extend_from_slice(&self.number_of_linenumbers.to_le_bytes());
        out.extend_from_slice(&self.characteristics.to_le_bytes());
    }
}

/// The full mutable header region of a PE32 image.
///
/// Owns the raw DOS region (everything before the PE signature), the COFF
/// and optional headers, the 16 data directories, and the section table.
/// All of it can be edited and re-serialized with [`PeHeaders::serialize`];
/// [`PeHeaders::make_valid`] recomputes the dependent size fields after
/// structural edits.
#[derive(Debug, Clone)]
pub struct PeHeaders {
    dos_region: Vec<u8>,
    /// COFF file header
    pub file: FileHeader,
    /// PE32 optional header
    pub optional: OptionalHeader,
    /// The 16 data directory slots
    pub directories: [DataDirectory; DIRECTORY_COUNT],
    /// Section table, in file order
    pub sections: Vec<SectionHeader>,
}

impl PeHeaders {
    /// Parses the header region of a PE32 image.
    ///
    /// # Errors
    ///
    /// - [`crate::Error::BadHeader`] if the MZ or PE signature is wrong
    /// - [`crate::Error::UnsupportedLayout`] for PE32+ images
    /// - [`crate::Error::GoblinErr`] if goblin rejects the container
    /// - [`crate::Error::OutOfBounds`] for truncated headers
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < 0x40 || &bytes[0..2] != b"MZ" {
            return Err(Error::BadHeader("missing MZ signature".into()));
        }

        let e_lfanew = read_u32(bytes, 0x3C)? as usize;
        if read_u32(bytes, e_lfanew).ok() != Some(PE_SIGNATURE) {
            return Err(Error::BadHeader("missing PE signature".into()));
        }

        // Decide the optional-header flavor before goblin gets a say, so a
        // PE32+ image reports the layout problem rather than a parse error.
        match read_u16(bytes, e_lfanew + 4 + COFF_HEADER_SIZE as usize)? {
            optional_header::MAGIC_32 => {}
            optional_header::MAGIC_64 => {
                return Err(Error::UnsupportedLayout(
                    "PE32+ (64-bit) images are not supported".into(),
                ));
            }
            magic => {
                return Err(Error::BadHeader(format!(
                    "unknown optional header magic {magic:#06x}"
                )));
            }
        }

        let header = Header::parse(bytes)?;
        if header.optional_header.is_none() {
            return Err(Error::BadHeader("image has no optional header".into()));
        }

        let coff = header.coff_header;
        let file = FileHeader {
            machine: coff.machine,
            number_of_sections: coff.number_of_sections,
            time_date_stamp: coff.time_date_stamp,
            pointer_to_symbol_table: coff.pointer_to_symbol_table,
            number_of_symbols: coff.number_of_symbol_table,
            size_of_optional_header: coff.size_of_optional_header,
            characteristics: coff.characteristics,
        };

        // goblin widens several optional-header fields to u64; read the PE32
        // layout directly so every field keeps its on-disk width.
        let opt = e_lfanew + 4 + COFF_HEADER_SIZE as usize;
        if bytes.len() < opt + usize::from(OPTIONAL_HEADER_SIZE) {
            return Err(Error::OutOfBounds);
        }
        let optional = OptionalHeader {
            magic: read_u16(bytes, opt)?,
            major_linker_version: bytes[opt + 2],
            minor_linker_version: bytes[opt + 3],
            size_of_code: read_u32(bytes, opt + 4)?,
            size_of_initialized_data: read_u32(bytes, opt + 8)?,
            size_of_uninitialized_data: read_u32(bytes, opt + 12)?,
            address_of_entry_point: read_u32(bytes, opt + 16)?,
            base_of_code: read_u32(bytes, opt + 20)?,
            base_of_data: read_u32(bytes, opt + 24)?,
            image_base: read_u32(bytes, opt + 28)?,
            section_alignment: read_u32(bytes, opt + 32)?,
            file_alignment: read_u32(bytes, opt + 36)?,
            major_operating_system_version: read_u16(bytes, opt + 40)?,
            minor_operating_system_version: read_u16(bytes, opt + 42)?,
            major_image_version: read_u16(bytes, opt + 44)?,
            minor_image_version: read_u16(bytes, opt + 46)?,
            major_subsystem_version: read_u16(bytes, opt + 48)?,
            minor_subsystem_version: read_u16(bytes, opt + 50)?,
            win32_version_value: read_u32(bytes, opt + 52)?,
            size_of_image: read_u32(bytes, opt + 56)?,
            size_of_headers: read_u32(bytes, opt + 60)?,
            checksum: read_u32(bytes, opt + 64)?,
            subsystem: read_u16(bytes, opt + 68)?,
            dll_characteristics: read_u16(bytes, opt + 70)?,
            size_of_stack_reserve: read_u32(bytes, opt + 72)?,
            size_of_stack_commit: read_u32(bytes, opt + 76)?,
            size_of_heap_reserve: read_u32(bytes, opt + 80)?,
            size_of_heap_commit: read_u32(bytes, opt + 84)?,
            loader_flags: read_u32(bytes, opt + 88)?,
            number_of_rva_and_sizes: read_u32(bytes, opt + 92)?,
        };

        let mut directories = [DataDirectory::default(); DIRECTORY_COUNT];
        let present = (optional.number_of_rva_and_sizes as usize).min(DIRECTORY_COUNT);
        for (i, dir) in directories.iter_mut().enumerate().take(present) {
            dir.virtual_address = read_u32(bytes, opt + 96 + i * 8)?;
            dir.size = read_u32(bytes, opt + 96 + i * 8 + 4)?;
        }

        let mut sections = Vec::with_capacity(file.number_of_sections as usize);
        let mut offset = opt + file.size_of_optional_header as usize;
        for _ in 0..file.number_of_sections {
            let table = SectionTable::parse(bytes, &mut offset, 0)?;
            sections.push(SectionHeader {
                name: table.name,
                virtual_size: table.virtual_size,
                virtual_address: table.virtual_address,
                size_of_raw_data: table.size_of_raw_data,
                pointer_to_raw_data: table.pointer_to_raw_data,
                pointer_to_relocations: table.pointer_to_relocations,
                pointer_to_linenumbers: table.pointer_to_linenumbers,
                number_of_relocations: table.number_of_relocations,
                number_of_linenumbers: table.number_of_linenumbers,
                characteristics: table.characteristics,
            });
        }

        Ok(Self {
            dos_region: bytes[..e_lfanew].to_vec(),
            file,
            optional,
            directories,
            sections,
        })
    }

    /// File offset (and RVA, since headers map 1:1) of the PE signature.
    #[must_use]
    pub fn address_of_pe_header(&self) -> u32 {
        self.dos_region.len() as u32
    }

    /// RVA of the 4-byte `AddressOfEntryPoint` field itself.
    #[must_use]
    pub fn entry_point_field_rva(&self) -> u32 {
        self.address_of_pe_header() + 4 + COFF_HEADER_SIZE + 16
    }

    /// RVA of the 4-byte `ImageBase` field itself.
    #[must_use]
    pub fn image_base_field_rva(&self) -> u32 {
        self.address_of_pe_header() + 4 + COFF_HEADER_SIZE + 28
    }

    /// Declared image base.
    #[must_use]
    pub fn image_base(&self) -> u32 {
        self.optional.image_base
    }

    /// Sets the declared image base.
    pub fn set_image_base(&mut self, base: u32) {
        self.optional.image_base = base;
    }

    /// Entry point RVA.
    #[must_use]
    pub fn address_of_entry_point(&self) -> u32 {
        self.optional.address_of_entry_point
    }

    /// Sets the entry point RVA.
    pub fn set_address_of_entry_point(&mut self, rva: u32) {
        self.optional.address_of_entry_point = rva;
    }

    /// DLL characteristics as typed flags.
    #[must_use]
    pub fn dll_characteristics(&self) -> DllCharacteristics {
        DllCharacteristics::from_bits_truncate(self.optional.dll_characteristics)
    }

    /// Replaces the DLL characteristics.
    pub fn set_dll_characteristics(&mut self, characteristics: DllCharacteristics) {
        self.optional.dll_characteristics = characteristics.bits();
    }

    /// The data directory at `index`.
    #[must_use]
    pub fn directory(&self, index: usize) -> DataDirectory {
        self.directories[index]
    }

    /// Sets the size of the data directory at `index`.
    pub fn set_directory_size(&mut self, index: usize, size: u32) {
        self.directories[index].size = size;
    }

    /// Translates an RVA to a file offset via the section table.
    ///
    /// RVAs inside the header region translate to themselves.
    #[must_use]
    pub fn rva_to_offset(&self, rva: u32) -> Option<u32> {
        if rva < self.optional.size_of_headers {
            return Some(rva);
        }
        for section in &self.sections {
            let span = section.virtual_size.max(section.size_of_raw_data);
            if rva >= section.virtual_address && rva < section.virtual_address + span {
                return Some(section.pointer_to_raw_data + (rva - section.virtual_address));
            }
        }
        None
    }

    /// Appends a section header named `name` with `size` bytes of data.
    ///
    /// The new section's RVA continues the virtual address space at the
    /// section alignment; its raw pointer continues the file at the file
    /// alignment. Characteristics start at zero. Returns the new index.
    pub fn add_section(&mut self, name: &str, size: u32) -> usize {
        let next_rva = self
            .sections
            .iter()
            .map(|s| s.virtual_address + s.virtual_size.max(s.size_of_raw_data))
            .max()
            .unwrap_or(self.optional.section_alignment);
        let next_raw = self
            .sections
            .iter()
            .map(|s| s.pointer_to_raw_data + s.size_of_raw_data)
            .max()
            .unwrap_or(self.optional.size_of_headers);

        let mut header = SectionHeader {
            name: [0; 8],
            virtual_size: size,
            virtual_address: align_up(next_rva, self.optional.section_alignment),
            size_of_raw_data: align_up(size, self.optional.file_alignment),
            pointer_to_raw_data: align_up(next_raw, self.optional.file_alignment),
            pointer_to_relocations: 0,
            pointer_to_linenumbers: 0,
            number_of_relocations: 0,
            number_of_linenumbers: 0,
            characteristics: 0,
        };
        header.set_name(name);

        self.sections.push(header);
        self.file.number_of_sections = self.sections.len() as u16;
        self.sections.len() - 1
    }

    /// Replaces the characteristics of the section at `index`.
    pub fn set_section_characteristics(
        &mut self,
        index: usize,
        characteristics: SectionCharacteristics,
    ) {
        self.sections[index].characteristics = characteristics.bits();
    }

    /// Recomputes the dependent header fields after structural edits.
    ///
    /// Number of sections, size of headers and size of image are derived
    /// from the section table; the checksum is zeroed (the output is not
    /// Authenticode signed).
    pub fn make_valid(&mut self) {
        self.file.number_of_sections = self.sections.len() as u16;
        self.file.size_of_optional_header = OPTIONAL_HEADER_SIZE;
        self.optional.number_of_rva_and_sizes = DIRECTORY_COUNT as u32;

        let headers_end = self.address_of_pe_header()
            + 4
            + COFF_HEADER_SIZE
            + u32::from(OPTIONAL_HEADER_SIZE)
            + SECTION_HEADER_SIZE * self.sections.len() as u32;
        self.optional.size_of_headers = align_up(headers_end, self.optional.file_alignment);

        let image_end = self
            .sections
            .iter()
            .map(|s| s.virtual_address + s.virtual_size.max(s.size_of_raw_data))
            .max()
            .unwrap_or(self.optional.size_of_headers);
        self.optional.size_of_image = align_up(image_end, self.optional.section_alignment);

        self.optional.checksum = 0;
    }

    /// End of the file as described by the section table.
    #[must_use]
    pub fn raw_file_end(&self) -> u32 {
        self.sections
            .iter()
            .map(|s| s.pointer_to_raw_data + s.size_of_raw_data)
            .max()
            .unwrap_or(self.optional.size_of_headers)
            .max(self.optional.size_of_headers)
    }

    /// Serializes the DOS region, PE signature, COFF and optional headers,
    /// data directories and section table into their on-disk byte form.
    #[must_use]
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.optional.size_of_headers as usize);

        out.extend_from_slice(&self.dos_region);
        out.extend_from_slice(&PE_SIGNATURE.to_le_bytes());

        out.extend_from_slice(&self.file.machine.to_le_bytes());
        out.extend_from_slice(&self.file.number_of_sections.to_le_bytes());
        out.extend_from_slice(&self.file.time_date_stamp.to_le_bytes());
        out.extend_from_slice(&self.file.pointer_to_symbol_table.to_le_bytes());
        out.extend_from_slice(&self.file.number_of_symbols.to_le_bytes());
        out.extend_from_slice(&self.file.size_of_optional_header.to_le_bytes());
        out.extend_from_slice(&self.file.characteristics.to_le_bytes());

        let o = &self.optional;
        out.extend_from_slice(&o.magic.to_le_bytes());
        out.push(o.major_linker_version);
        out.push(o.minor_linker_version);
        out.extend_from_slice(&o.size_of_code.to_le_bytes());
        out.extend_from_slice(&o.size_of_initialized_data.to_le_bytes());
        out.extend_from_slice(&o.size_of_uninitialized_data.to_le_bytes());
        out.extend_from_slice(&o.address_of_entry_point.to_le_bytes());
        out.extend_from_slice(&o.base_of_code.to_le_bytes());
        out.extend_from_slice(&o.base_of_data.to_le_bytes());
        out.extend_from_slice(&o.image_base.to_le_bytes());
        out.extend_from_slice(&o.section_alignment.to_le_bytes());
        out.extend_from_slice(&o.file_alignment.to_le_bytes());
        out.extend_from_slice(&o.major_operating_system_version.to_le_bytes());
        out.extend_from_slice(&o.minor_operating_system_version.to_le_bytes());
        out.extend_from_slice(&o.major_image_version.to_le_bytes());
        out.extend_from_slice(&o.minor_image_version.to_le_bytes());
        out.extend_from_slice(&o.major_subsystem_version.to_le_bytes());
        out.extend_from_slice(&o.minor_subsystem_version.to_le_bytes());
        out.extend_from_slice(&o.win32_version_value.to_le_bytes());
        out.extend_from_slice(&o.size_of_image.to_le_bytes());
        out.extend_from_slice(&o.size_of_headers.to_le_bytes());
        out.extend_from_slice(&o.checksum.to_le_bytes());
        out.extend_from_slice(&o.subsystem.to_le_bytes());
        out.extend_from_slice(&o.dll_characteristics.to_le_bytes());
        out.extend_from_slice(&o.size_of_stack_reserve.to_le_bytes());
        out.extend_from_slice(&o.size_of_stack_commit.to_le_bytes());
        out.extend_from_slice(&o.size_of_heap_reserve.to_le_bytes());
        out.extend_from_slice(&o.size_of_heap_commit.to_le_bytes());
        out.extend_from_slice(&o.loader_flags.to_le_bytes());
        out.extend_from_slice(&o.number_of_rva_and_sizes.to_le_bytes());

        for dir in &self.directories {
            out.extend_from_slice(&dir.virtual_address.to_le_bytes());
            out.extend_from_slice(&dir.size.to_le_bytes());
        }

        for section in &self.sections {
            section.write_to(&mut out);
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // A one-section PE32 with 0x200-aligned raw data, built by hand.
    fn minimal_image() -> Vec<u8> {
        let mut bytes = vec![0_u8; 0x400];
        bytes[0] = b'M';
        bytes[1] = b'Z';
        bytes[0x3C..0x40].copy_from_slice(&0x80_u32.to_le_bytes());

        // PE signature + COFF header
        bytes[0x80..0x84].copy_from_slice(&PE_SIGNATURE.to_le_bytes());
        bytes[0x84..0x86].copy_from_slice(&0x014C_u16.to_le_bytes()); // machine
        bytes[0x86..0x88].copy_from_slice(&1_u16.to_le_bytes()); // sections
        bytes[0x94..0x96].copy_from_slice(&224_u16.to_le_bytes()); // opt size
        bytes[0x96..0x98].copy_from_slice(&0x0102_u16.to_le_bytes()); // chars

        // optional header
        let opt = 0x98;
        bytes[opt..opt + 2].copy_from_slice(&0x010B_u16.to_le_bytes());
        bytes[opt + 16..opt + 20].copy_from_slice(&0x1000_u32.to_le_bytes()); // entry
        bytes[opt + 28..opt + 32].copy_from_slice(&0x0040_0000_u32.to_le_bytes()); // base
        bytes[opt + 32..opt + 36].copy_from_slice(&0x1000_u32.to_le_bytes()); // sec align
        bytes[opt + 36..opt + 40].copy_from_slice(&0x200_u32.to_le_bytes()); // file align
        bytes[opt + 56..opt + 60].copy_from_slice(&0x2000_u32.to_le_bytes()); // img size
        bytes[opt + 60..opt + 64].copy_from_slice(&0x200_u32.to_le_bytes()); // hdr size
        bytes[opt + 68..opt + 70].copy_from_slice(&3_u16.to_le_bytes()); // subsystem
        bytes[opt + 70..opt + 72].copy_from_slice(&0x0040_u16.to_le_bytes()); // dllchars
        bytes[opt + 92..opt + 96].copy_from_slice(&16_u32.to_le_bytes()); // dir count

        // section table: .text at RVA 0x1000, raw 0x200 @ 0x200
        let sec = opt + 96 + 128;
        bytes[sec..sec + 5].copy_from_slice(b".text");
        bytes[sec + 8..sec + 12].copy_from_slice(&0x200_u32.to_le_bytes());
        bytes[sec + 12..sec + 16].copy_from_slice(&0x1000_u32.to_le_bytes());
        bytes[sec + 16..sec + 20].copy_from_slice(&0x200_u32.to_le_bytes());
        bytes[sec + 20..sec + 24].copy_from_slice(&0x200_u32.to_le_bytes());
        bytes[sec + 36..sec + 40].copy_from_slice(&0x6000_0020_u32.to_le_bytes());

        bytes
    }

    #[test]
    fn parse_minimal_image() {
        let headers = PeHeaders::parse(&minimal_image()).unwrap();

        assert_eq!(headers.address_of_pe_header(), 0x80);
        assert_eq!(headers.image_base(), 0x0040_0000);
        assert_eq!(headers.address_of_entry_point(), 0x1000);
        assert!(headers
            .dll_characteristics()
            .contains(DllCharacteristics::DYNAMIC_BASE));

        assert_eq!(headers.sections.len(), 1);
        assert_eq!(headers.sections[0].name_str(), ".text");
        assert_eq!(headers.sections[0].virtual_address, 0x1000);
    }

    #[test]
    fn header_field_rvas() {
        let headers = PeHeaders::parse(&minimal_image()).unwrap();
        // e_lfanew 0x80: entry point field at +0x28, image base at +0x34
        assert_eq!(headers.entry_point_field_rva(), 0xA8);
        assert_eq!(headers.image_base_field_rva(), 0xB4);
    }

    #[test]
    fn rejects_bad_signatures() {
        let mut bytes = minimal_image();
        bytes[1] = b'X';
        assert!(matches!(
            PeHeaders::parse(&bytes),
            Err(Error::BadHeader(_))
        ));

        let mut bytes = minimal_image();
        bytes[0x81] = 0xFF;
        assert!(matches!(
            PeHeaders::parse(&bytes),
            Err(Error::BadHeader(_))
        ));
    }

    #[test]
    fn rejects_pe32_plus() {
        let mut bytes = minimal_image();
        bytes[0x98..0x9A].copy_from_slice(&0x020B_u16.to_le_bytes());
        assert!(matches!(
            PeHeaders::parse(&bytes),
            Err(Error::UnsupportedLayout(_))
        ));
    }

    #[test]
    fn serialize_round_trips() {
        let bytes = minimal_image();
        let headers = PeHeaders::parse(&bytes).unwrap();
        let serialized = headers.serialize();
        assert_eq!(&bytes[..serialized.len()], &serialized[..]);
    }

    #[test]
    fn add_section_continues_both_address_spaces() {
        let mut headers = PeHeaders::parse(&minimal_image()).unwrap();
        let index = headers.add_section(".presel", 0x10);

        let section = &headers.sections[index];
        assert_eq!(section.name_str(), ".presel");
        assert_eq!(section.virtual_address, 0x2000);
        assert_eq!(section.virtual_size, 0x10);
        assert_eq!(section.size_of_raw_data, 0x200);
        assert_eq!(section.pointer_to_raw_data, 0x400);
        assert_eq!(headers.file.number_of_sections, 2);
    }

    #[test]
    fn make_valid_recomputes_sizes() {
        let mut headers = PeHeaders::parse(&minimal_image()).unwrap();
        headers.add_section(".presel", 0x10);
        headers.make_valid();

        assert_eq!(headers.optional.size_of_image, 0x3000);
        assert_eq!(headers.optional.size_of_headers, 0x200);
        assert_eq!(headers.optional.checksum, 0);
    }

    #[test]
    fn rva_to_offset_translation() {
        let headers = PeHeaders::parse(&minimal_image()).unwrap();
        assert_eq!(headers.rva_to_offset(0xA8), Some(0xA8));
        assert_eq!(headers.rva_to_offset(0x1004), Some(0x204));
        assert_eq!(headers.rva_to_offset(0x8000), None);
    }
}
