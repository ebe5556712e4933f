//! The rewrite engine's controller.
//!
//! [`Recompiler`] drives the whole pipeline and enforces its ordering:
//!
//! ```text
//! load_image -> load_sections -> perform_on_disk_relocations
//!                             -> (rewrite_header, fixup_base,
//!                                 rewrite_section, rewrite_imports,
//!                                 rewrite_matches - any order, any count)
//!                             -> write_output
//! ```
//!
//! The on-disk relocation pass undoes the loader's job ahead of time: it
//! rebases every `HIGHLOW` fixup target to the base the loader will really
//! choose, then strips the relocation table and lies about the image base.
//! Queued rewrites then re-purpose the relocation machinery in the other
//! direction: each targeted word is decremented by the pack delta on disk
//! and described by a fresh relocation entry, so the loader itself
//! decrypts the bytes at load time. Static analysis of the file sees only
//! the obfuscated values.
//!
//! Everything is single threaded and non-suspending; a failed call leaves
//! the image in an intermediate state and the caller is expected to
//! abandon it.

use std::path::Path;

use log::{debug, info};

use crate::{
    file::InputImage,
    image::{section_by_rva, SectionContents},
    pe::{
        decode_entry, encode_entry, DllCharacteristics, PeHeaders, RelocationDirectory,
        SectionCharacteristics, ACTUALIZED_BASE_ADDRESS, DIRECTORY_BASE_RELOC, DIRECTORY_IAT,
        DIRECTORY_IMPORT, IMAGE_REL_BASED_ABSOLUTE, IMAGE_REL_BASED_HIGHLOW, TRICKY_BASE_ADDRESS,
    },
    rewrite::{packer::PackedBlocks, RewriteBlock},
    stub::prepare_stub,
    utils::search::find_all,
    write::Output,
    Error, Result,
};

/// Orchestrates loading, on-disk relocation, rewrite queueing and emission
/// for one PE32 image.
///
/// # Examples
///
/// ```rust,no_run
/// use relocrypt::Recompiler;
/// use std::path::Path;
///
/// let mut rec = Recompiler::new();
/// rec.load_image(Path::new("target.exe"))?;
/// rec.load_sections()?;
/// rec.perform_on_disk_relocations()?;
/// rec.rewrite_header()?;
/// rec.fixup_base()?;
/// rec.rewrite_imports()?;
/// rec.write_output(Path::new("target_obf.exe"))?;
/// # Ok::<(), relocrypt::Error>(())
/// ```
#[derive(Default)]
pub struct Recompiler {
    input: Option<InputImage>,
    headers: Option<PeHeaders>,
    relocs: RelocationDirectory,
    sections: Vec<SectionContents>,
    rewrite_blocks: Vec<RewriteBlock>,
    section_pool: Vec<usize>,
    multi_pass: bool,
    win10_attack: bool,
}

impl Recompiler {
    /// Creates a controller with no image loaded.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Switches the Windows 10 variant on or off.
    ///
    /// The Win10 attack keeps ASLR and the original relocation table and
    /// instead chains a preselection stub before the original entry point.
    /// Header and import rewrites are skipped in this mode.
    pub fn set_windows10_attack(&mut self, enabled: bool) {
        self.win10_attack = enabled;
    }

    /// Switches multi-pass rewriting on or off.
    ///
    /// With multi-pass enabled every queued rewrite appends its follow-up
    /// blocks, stacking additional loader-replayed passes over the same
    /// ranges.
    pub fn set_multi_pass(&mut self, enabled: bool) {
        self.multi_pass = enabled;
    }

    /// Reads and parses the PE image at `path`.
    ///
    /// # Errors
    ///
    /// Propagates I/O failures and header parse errors
    /// ([`crate::Error::BadHeader`], [`crate::Error::UnsupportedLayout`]).
    pub fn load_image(&mut self, path: &Path) -> Result<()> {
        let input = InputImage::open(path)?;
        self.load_input(input, &path.display().to_string())
    }

    /// Parses a PE image that is already in memory.
    ///
    /// # Errors
    ///
    /// Same as [`Recompiler::load_image`], minus the I/O.
    pub fn load_image_from(&mut self, data: Vec<u8>) -> Result<()> {
        self.load_input(InputImage::from_vec(data), "<memory>")
    }

    fn load_input(&mut self, input: InputImage, origin: &str) -> Result<()> {
        let headers = PeHeaders::parse(input.data())?;
        info!("successfully loaded PE file: {origin}");

        self.input = Some(input);
        self.headers = Some(headers);
        self.relocs = RelocationDirectory::new();
        self.sections.clear();
        self.rewrite_blocks.clear();
        self.section_pool.clear();
        Ok(())
    }

    /// Reads every section's raw bytes into owned buffers.
    ///
    /// Also enforces the layout precondition for the rest of the pipeline:
    /// the section holding the base relocation directory must be the final
    /// section, because the emitter later resizes it in place.
    ///
    /// # Errors
    ///
    /// - [`crate::Error::MissingRelocDir`] if no section covers the
    ///   relocation directory
    /// - [`crate::Error::UnsupportedLayout`] if that section is not last
    /// - [`crate::Error::OutOfBounds`] for raw spans past the end of file
    pub fn load_sections(&mut self) -> Result<()> {
        let Some(input) = &self.input else {
            return Err(malformed_error!("no image loaded"));
        };
        let Some(headers) = &self.headers else {
            return Err(malformed_error!("no image loaded"));
        };

        info!("loading sections");
        debug!(
            "{:<10}{:<12}{:<12}{:<12}{}",
            "name", "virtsize", "rawsize", "virtaddr", "rawaddr"
        );

        let mut sections = Vec::with_capacity(headers.sections.len());
        for (index, header) in headers.sections.iter().enumerate() {
            let section = SectionContents::load(index, header, input)?;
            debug!(
                "{:<10}{:<#12x}{:<#12x}{:<#12x}{:#x}",
                section.name, section.virtual_size, section.size, section.rva, section.raw_pointer
            );
            sections.push(section);
        }

        let reloc_dir = headers.directory(DIRECTORY_BASE_RELOC);
        self.sections = sections;

        let Some(reloc_index) = section_by_rva(&self.sections, reloc_dir.virtual_address, 4) else {
            return Err(Error::MissingRelocDir);
        };
        if reloc_index != self.sections.len() - 1 {
            return Err(Error::UnsupportedLayout(format!(
                "relocation section '{}' is not the final section",
                self.sections[reloc_index].name
            )));
        }

        Ok(())
    }

    /// Applies the loader's relocation pass on disk and strips the table.
    ///
    /// After this call the code and data are pre-adjusted to run at
    /// [`ACTUALIZED_BASE_ADDRESS`], the image declares
    /// [`TRICKY_BASE_ADDRESS`] with ASLR off (default mode), and no
    /// relocations remain. The loader, seeing an unreachable base and no
    /// ASLR flag, will map the image at the actualized base and apply no
    /// fixups of its own.
    ///
    /// In Win10 mode the base and the ASLR flag are left untouched (the
    /// flag is added if it was somehow absent); the relocation data is
    /// still applied and stripped.
    ///
    /// # Errors
    ///
    /// [`crate::Error::AslrRequired`], [`crate::Error::MissingRelocDir`],
    /// [`crate::Error::OrphanReloc`], [`crate::Error::UnknownRelocType`],
    /// or [`crate::Error::Malformed`] for unreadable fixup targets.
    pub fn perform_on_disk_relocations(&mut self) -> Result<()> {
        if self.headers.is_none() {
            return Err(malformed_error!("no image loaded"));
        }
        if self.sections.is_empty() {
            return Err(malformed_error!(
                "section contents must be loaded before doing any relocations"
            ));
        }

        let (characteristics, requested_base, reloc_dir) = {
            let headers = self.require_headers()?;
            (
                headers.dll_characteristics(),
                headers.image_base(),
                headers.directory(DIRECTORY_BASE_RELOC),
            )
        };

        if !self.win10_attack && !characteristics.contains(DllCharacteristics::DYNAMIC_BASE) {
            return Err(Error::AslrRequired);
        }

        if reloc_dir.virtual_address == 0 || reloc_dir.size == 0 {
            return Err(Error::MissingRelocDir);
        }
        let Some(reloc_index) =
            section_by_rva(&self.sections, reloc_dir.virtual_address, reloc_dir.size)
        else {
            return Err(Error::MissingRelocDir);
        };
        {
            let section = &self.sections[reloc_index];
            let start = (reloc_dir.virtual_address - section.rva) as usize;
            self.relocs =
                RelocationDirectory::parse(&section.data[start..start + reloc_dir.size as usize])?;
        }

        info!("preparing header for obfuscation");

        if !self.win10_attack {
            let stripped = characteristics.difference(DllCharacteristics::DYNAMIC_BASE);
            let headers = self.require_headers_mut()?;
            headers.set_dll_characteristics(stripped);
            info!("stripped dynamic-base flag");
            debug!("old characteristics: {:#06x}", characteristics.bits());
            debug!("new characteristics: {:#06x}", stripped.bits());

            headers.set_image_base(TRICKY_BASE_ADDRESS);
            info!(
                "changed image base to {:#010x} (was {:#010x})",
                TRICKY_BASE_ADDRESS, requested_base
            );
        } else if characteristics.contains(DllCharacteristics::DYNAMIC_BASE) {
            info!("[win10 attack] leaving dynamic-base flag set");
        } else {
            let added = characteristics.union(DllCharacteristics::DYNAMIC_BASE);
            self.require_headers_mut()?.set_dll_characteristics(added);
            info!("[win10 attack] added dynamic-base flag");
            debug!("old characteristics: {:#06x}", characteristics.bits());
            debug!("new characteristics: {:#06x}", added.bits());
        }

        // Relocate everything to the base the loader will actually pick.
        let delta = ACTUALIZED_BASE_ADDRESS.wrapping_sub(requested_base);
        let mut performed = 0_u32;
        let blocks: Vec<_> = self.relocs.blocks().cloned().collect();
        for block in &blocks {
            let Some(section_index) = section_by_rva(&self.sections, block.page_rva, 4) else {
                return Err(Error::OrphanReloc {
                    rva: block.page_rva,
                });
            };

            let section = &mut self.sections[section_index];
            for &entry in &block.entries {
                let (kind, page_offset) = decode_entry(entry);
                let address = block.page_rva + u32::from(page_offset);
                let offset = address - section.rva;

                if kind == IMAGE_REL_BASED_HIGHLOW {
                    let original = section.read_u32_at(offset).ok_or_else(|| {
                        malformed_error!("failed to read relocation target at RVA {:#010x}", address)
                    })?;
                    section.write_u32_at(offset, original.wrapping_add(delta));
                } else if kind != IMAGE_REL_BASED_ABSOLUTE {
                    return Err(Error::UnknownRelocType { kind });
                }

                performed += 1;
            }
        }

        info!("parsed original reloc table and applied {performed} relocations");
        debug!(
            "delta of {:#010x} applied, binary will load at {:#010x}",
            delta, ACTUALIZED_BASE_ADDRESS
        );

        self.relocs.clear();
        info!("cleared original reloc table");

        Ok(())
    }

    /// `true` once the image is in a state where rewrites may be queued.
    ///
    /// Default mode requires proof that the on-disk relocation pass ran:
    /// an empty relocation directory and the tricky image base. Win10 mode
    /// deliberately bypasses that proof, since the attack leaves the
    /// original relocation table and base intact.
    #[must_use]
    pub fn rewrite_ready(&self) -> bool {
        let Some(headers) = &self.headers else {
            return false;
        };
        if self.sections.is_empty() {
            return false;
        }
        if self.win10_attack {
            return true;
        }
        self.relocs.is_empty() && headers.image_base() == TRICKY_BASE_ADDRESS
    }

    fn check_ready(&self) -> Result<()> {
        if self.rewrite_ready() {
            Ok(())
        } else {
            Err(Error::NotRelocated)
        }
    }

    fn push_block(&mut self, block: RewriteBlock) {
        self.rewrite_blocks.push(block.clone());

        if self.multi_pass {
            let mut pass = 0;
            let mut current = block;
            while let Some(next) = current.next_multi_pass_block(pass) {
                self.rewrite_blocks.push(next.clone());
                current = next;
                pass += 1;
            }
        }
    }

    /// Queues the entry-point field rewrite. Skipped in Win10 mode, where
    /// the stub takes the entry point instead.
    ///
    /// # Errors
    ///
    /// [`crate::Error::NotRelocated`] before the on-disk relocation pass.
    pub fn rewrite_header(&mut self) -> Result<()> {
        self.check_ready()?;

        if self.win10_attack {
            info!("[win10 attack] skipping header entrypoint rewrite");
            return Ok(());
        }

        self.push_block(RewriteBlock::EntryPoint);
        info!("rewrote header entrypoint");
        Ok(())
    }

    /// Queues the image-base field rewrite, so the loader's replay leaves
    /// the in-memory base field matching the actual load base.
    ///
    /// # Errors
    ///
    /// [`crate::Error::NotRelocated`] before the on-disk relocation pass.
    pub fn fixup_base(&mut self) -> Result<()> {
        self.check_ready()?;

        self.push_block(RewriteBlock::ImageBase);
        info!("added fixup rewrite for image base; will match actual base in memory");
        Ok(())
    }

    /// Queues a rewrite of the named section's whole raw range.
    ///
    /// A missing section name is informational, not an error.
    ///
    /// # Errors
    ///
    /// [`crate::Error::NotRelocated`] before the on-disk relocation pass.
    pub fn rewrite_section(&mut self, name: &str) -> Result<()> {
        self.check_ready()?;

        match self.sections.iter().position(|s| s.name == name) {
            Some(index) => {
                let (rva, size) = (self.sections[index].rva, self.sections[index].size);
                self.push_block(RewriteBlock::SectionRange {
                    section: index,
                    offset: 0,
                    len: size,
                });
                info!("rewrote {name} section at RVA {rva:#010x}");
            }
            None => info!("seemingly no section named {name} to rewrite"),
        }

        Ok(())
    }

    /// Queues rewrites of the import machinery: the IAT, the import
    /// directory, and the hint/name and DLL-name blobs the IAT points at.
    ///
    /// Skipped in Win10 mode. Each absent table is informational.
    ///
    /// # Errors
    ///
    /// [`crate::Error::NotRelocated`] before the on-disk relocation pass.
    pub fn rewrite_imports(&mut self) -> Result<()> {
        self.check_ready()?;

        if self.win10_attack {
            info!("[win10 attack] skipping import obfuscation");
            return Ok(());
        }

        info!("obfuscating imports");

        let iat = self.require_headers()?.directory(DIRECTORY_IAT);
        if self.rewrite_subsection(iat.virtual_address, iat.size) {
            info!(
                "rewrote import address table from RVA {:#010x} to {:#010x}",
                iat.virtual_address,
                iat.virtual_address + iat.size
            );
        } else {
            info!("seemingly no import address table to rewrite");
        }

        let import = self.require_headers()?.directory(DIRECTORY_IMPORT);
        if self.rewrite_subsection(import.virtual_address, import.size) {
            info!(
                "rewrote import table from RVA {:#010x} to {:#010x}",
                import.virtual_address,
                import.virtual_address + import.size
            );
        } else {
            info!("seemingly no import table to rewrite");
        }

        // The hint/name and DLL-name blobs are not described by any
        // directory; bound them by the IAT entries that point into them.
        if let Some(iat_index) = section_by_rva(&self.sections, iat.virtual_address, iat.size) {
            let section = &self.sections[iat_index];
            let iat_offset = iat.virtual_address - section.rva;

            let mut lowest = u32::MAX;
            let mut highest = 0_u32;
            let mut offset = iat_offset;
            while offset < iat_offset + iat.size {
                let Some(value) = section.read_u32_at(offset) else {
                    break;
                };
                if value != 0 {
                    lowest = lowest.min(value);
                    highest = highest.max(value);
                }
                offset += 4;
            }

            if lowest < highest && self.rewrite_subsection(lowest, highest - lowest) {
                info!(
                    "rewrote import hint/name and dll name table from RVA {lowest:#010x} to {highest:#010x}"
                );
            } else {
                info!("seemingly no import hint/name and dll name table to rewrite");
            }
        }

        Ok(())
    }

    /// Queues a rewrite of every occurrence of `needle` across all
    /// sections, `needle.len() + 1` bytes per hit (the trailing NUL of C
    /// strings comes along). Returns the number of matches.
    ///
    /// # Errors
    ///
    /// [`crate::Error::NotRelocated`] before the on-disk relocation pass.
    pub fn rewrite_matches(&mut self, needle: &[u8]) -> Result<usize> {
        self.check_ready()?;

        info!(
            "obfuscating all instances of string: {}",
            String::from_utf8_lossy(needle)
        );

        let mut total = 0;
        for index in 0..self.sections.len() {
            for hit in find_all(&self.sections[index].data, needle) {
                debug!(
                    "match in {} at offset {hit:#x}",
                    self.sections[index].name
                );
                self.push_block(RewriteBlock::SectionRange {
                    section: index,
                    offset: hit as u32,
                    len: needle.len() as u32 + 1,
                });
                total += 1;
            }
        }

        if total == 0 {
            info!("no matches found");
        }
        Ok(total)
    }

    fn rewrite_subsection(&mut self, rva: u32, size: u32) -> bool {
        match section_by_rva(&self.sections, rva, size) {
            Some(index) => {
                let offset = rva - self.sections[index].rva;
                self.push_block(RewriteBlock::SectionRange {
                    section: index,
                    offset,
                    len: size,
                });
                true
            }
            None => false,
        }
    }

    /// Marks a section as reusable by [`Recompiler::alloc_section`].
    ///
    /// Dormant: nothing pools sections in the canonical pipeline.
    /// Repurposing a discardable section (which `.reloc` usually is) can
    /// yield a section with no in-memory backing, so reuse stays opt-in
    /// until that is resolved.
    pub fn pool_section(&mut self, index: usize) {
        self.section_pool.push(index);
    }

    /// Returns a section to host injected code, reusing a pooled section
    /// when one fits and appending a new one otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if no image is loaded.
    pub fn alloc_section(
        &mut self,
        name: &str,
        size: u32,
        access: SectionCharacteristics,
    ) -> Result<usize> {
        let final_index = self.sections.len().saturating_sub(1);
        let reusable = self.section_pool.iter().position(|&index| {
            let section = &self.sections[index];
            section.size >= size || section.index == final_index
        });

        let index = match reusable {
            Some(pool_position) => {
                let index = self.section_pool.remove(pool_position);
                info!("repurposed section {} as {name}", self.sections[index].name);

                let headers = self.require_headers_mut()?;
                headers.sections[index].set_name(name);
                headers.sections[index].virtual_size = size;
                headers.sections[index].size_of_raw_data = size;
                index
            }
            None => {
                let headers = self.require_headers_mut()?;
                let index = headers.add_section(name, size);
                headers.make_valid();
                info!("injected section {name}");

                let header = headers.sections[index].clone();
                self.sections
                    .push(SectionContents::from_header(index, &header));
                index
            }
        };

        self.require_headers_mut()?
            .set_section_characteristics(index, access);

        let header = self.require_headers()?.sections[index].clone();
        self.sections[index].refresh_from(&header);

        debug!("virtual size: {:#x}", self.sections[index].virtual_size);
        debug!("rva: {:#x}", self.sections[index].rva);
        debug!("raw size: {:#x}", self.sections[index].size);
        debug!("raw pointer: {:#x}", self.sections[index].raw_pointer);

        Ok(index)
    }

    /// Applies the queued rewrites, emits the fresh relocation directory,
    /// injects the preselection stub in Win10 mode, and writes the final
    /// image to `path`.
    ///
    /// Calling this more than once on the same controller is undefined.
    ///
    /// # Errors
    ///
    /// [`crate::Error::PackerInvariantViolation`] if rewrites were queued
    /// while relocations still exist, [`crate::Error::MissingRelocDir`] if
    /// the relocation section vanished, [`crate::Error::StubBuildFailed`]
    /// from the stub builder, and [`crate::Error::WriteFailed`] from the
    /// output file.
    pub fn write_output(&mut self, path: &Path) -> Result<()> {
        if self.headers.is_none() {
            return Err(malformed_error!("no image loaded"));
        }
        if self.sections.is_empty() {
            return Err(malformed_error!(
                "section contents must be loaded before writing output"
            ));
        }

        info!("generating output file");

        // Apply the queued rewrites and keep a ledger of the touched
        // words. Packed blocks are recorded in reverse queue order (front
        // insertion) so overlapping rewrites replay correctly; see the
        // packer module.
        let pack_delta = ACTUALIZED_BASE_ADDRESS.wrapping_sub(self.require_headers()?.image_base());

        let queue = self.rewrite_blocks.clone();

        // The base fixup must leave the loader-replayed field reading the
        // actual load base: seed the field with that runtime target, then
        // every pass decrements it like any other word, however many
        // passes stack.
        if queue
            .iter()
            .any(|block| matches!(block, RewriteBlock::ImageBase))
        {
            self.require_headers_mut()?
                .set_image_base(ACTUALIZED_BASE_ADDRESS);
        }

        let mut packed = PackedBlocks::new();
        for block in &queue {
            let sites: Vec<(u32, u32)> = block
                .sites(self.require_headers()?, &self.sections)
                .collect();
            let Some(&(first_rva, _)) = sites.first() else {
                continue;
            };

            packed.open(first_rva);
            for (rva, offset) in sites {
                self.apply_rewrite(block, offset, pack_delta)?;
                packed.record(rva);
            }
        }

        if !packed.is_empty() {
            info!("applied all rewrites to actual file contents");

            if !self.relocs.is_empty() {
                return Err(Error::PackerInvariantViolation);
            }

            for packed_block in packed.iter() {
                let block_index = self.relocs.add_block(packed_block.begin_rva);
                for &offset in &packed_block.offsets {
                    self.relocs
                        .add_entry(block_index, encode_entry(IMAGE_REL_BASED_HIGHLOW, offset));
                }
                // Pad to a 4-byte table boundary.
                if packed_block.offsets.len() % 2 == 1 {
                    self.relocs.add_entry(block_index, 0);
                }
            }

            info!(
                "generated reloc table for rewrites with {} entries",
                packed.len()
            );
        }

        // Embed the new reloc table in place of the old one, aligned on a
        // 512-byte boundary for filesystem mapping.
        let reloc_rva = self
            .require_headers()?
            .directory(DIRECTORY_BASE_RELOC)
            .virtual_address;
        let Some(reloc_index) = section_by_rva(&self.sections, reloc_rva, 4) else {
            return Err(Error::MissingRelocDir);
        };

        let table = self.relocs.rebuild();
        let table_len = table.len() as u32;
        let padded_len = {
            let section = &mut self.sections[reloc_index];
            section.data = table;
            let padded = section.data.len().next_multiple_of(512);
            section.data.resize(padded, 0);
            section.size = padded as u32;
            padded as u32
        };

        {
            let headers = self.require_headers_mut()?;
            headers.sections[reloc_index].virtual_size = table_len;
            headers.set_directory_size(DIRECTORY_BASE_RELOC, table_len);
            headers.sections[reloc_index].size_of_raw_data = padded_len;
            info!("updated PE header with new reloc meta-data");

            headers.make_valid();
            info!("validated new PE header");
        }

        if self.win10_attack {
            info!("[win10 attack] injecting ASLR preselection stub");

            let original_entry_point = self.require_headers()?.address_of_entry_point();
            let stub = prepare_stub(original_entry_point)?;

            let index = self.alloc_section(
                ".presel",
                stub.len() as u32,
                SectionCharacteristics::stub_section(),
            )?;
            let stub_rva = {
                let section = &mut self.sections[index];
                section.data[..stub.len()].copy_from_slice(&stub);
                section.rva
            };

            debug!("original entry point: {original_entry_point:#x}");
            debug!("stub section RVA: {stub_rva:#x}");
            debug!(
                "stub section offset: {:#x}",
                self.require_headers()?.rva_to_offset(stub_rva).unwrap_or(0)
            );

            self.require_headers_mut()?
                .set_address_of_entry_point(stub_rva);
            info!("entry point updated to stub RVA");
        }

        let headers = self.require_headers()?;
        let header_bytes = headers.serialize();
        let file_end = u64::from(headers.raw_file_end()).max(header_bytes.len() as u64);

        let mut output = Output::create(path, file_end)?;
        output.write_at(0, &header_bytes)?;
        info!("wrote MZ header, PE header and section meta-data to output file");

        for section in &self.sections {
            if !section.data.is_empty() {
                output.write_at(u64::from(section.raw_pointer), &section.data)?;
            }
        }
        output.finalize()?;
        info!("wrote PE section contents to output file");

        Ok(())
    }

    fn apply_rewrite(&mut self, block: &RewriteBlock, offset: u32, delta: u32) -> Result<()> {
        match *block {
            RewriteBlock::EntryPoint => {
                let headers = self.require_headers_mut()?;
                let entry_point = headers.address_of_entry_point();
                headers.set_address_of_entry_point(entry_point.wrapping_sub(delta));
            }
            RewriteBlock::ImageBase => {
                let headers = self.require_headers_mut()?;
                let base = headers.image_base();
                headers.set_image_base(base.wrapping_sub(delta));
            }
            RewriteBlock::SectionRange { section, .. } => {
                let section = &mut self.sections[section];
                let value = section.read_u32_at(offset).ok_or(Error::OutOfBounds)?;
                section.write_u32_at(offset, value.wrapping_sub(delta));
            }
        }
        Ok(())
    }

    /// The parsed headers, once an image is loaded.
    #[must_use]
    pub fn pe_headers(&self) -> Option<&PeHeaders> {
        self.headers.as_ref()
    }

    /// The loaded sections.
    #[must_use]
    pub fn sections(&self) -> &[SectionContents] {
        &self.sections
    }

    /// Number of rewrite blocks currently queued.
    #[must_use]
    pub fn queued_rewrites(&self) -> usize {
        self.rewrite_blocks.len()
    }

    fn require_headers(&self) -> Result<&PeHeaders> {
        self.headers
            .as_ref()
            .ok_or_else(|| malformed_error!("no image loaded"))
    }

    fn require_headers_mut(&mut self) -> Result<&mut PeHeaders> {
        self.headers
            .as_mut()
            .ok_or_else(|| malformed_error!("no image loaded"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_apis_gate_on_readiness() {
        let mut rec = Recompiler::new();
        assert!(!rec.rewrite_ready());

        assert!(matches!(rec.rewrite_header(), Err(Error::NotRelocated)));
        assert!(matches!(rec.fixup_base(), Err(Error::NotRelocated)));
        assert!(matches!(
            rec.rewrite_section(".text"),
            Err(Error::NotRelocated)
        ));
        assert!(matches!(rec.rewrite_imports(), Err(Error::NotRelocated)));
        assert!(matches!(
            rec.rewrite_matches(b"kernel32.dll"),
            Err(Error::NotRelocated)
        ));
        assert_eq!(rec.queued_rewrites(), 0);
    }

    #[test]
    fn load_sections_requires_an_image() {
        let mut rec = Recompiler::new();
        assert!(rec.load_sections().is_err());
        assert!(rec.perform_on_disk_relocations().is_err());
    }
}
