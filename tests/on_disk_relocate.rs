//! Integration tests for loading and the on-disk relocation pass.

mod common;

use common::*;
use relocrypt::{Error, Recompiler};

fn run_to_disk(input: Vec<u8>) -> relocrypt::Result<Vec<u8>> {
    let dir = tempfile::tempdir().unwrap();
    let out_path = dir.path().join("out.exe");

    let mut rec = Recompiler::new();
    rec.load_image_from(input)?;
    rec.load_sections()?;
    rec.perform_on_disk_relocations()?;
    rec.write_output(&out_path)?;

    Ok(std::fs::read(&out_path).unwrap())
}

#[test]
fn minimal_image_round_trips_with_tricky_base() {
    let input = PeBuilder::new()
        .section(".text", 0x1000, &[0xDE, 0xAD, 0xBE, 0xEF])
        .reloc_section(0x2000, &[(0x1000, vec![])])
        .build();

    let output = run_to_disk(input).unwrap();

    assert_eq!(image_base(&output), 0xFFFF_0000);
    // dynamic-base stripped, the other characteristic bits survive
    assert_eq!(dll_characteristics(&output), 0x8100);

    let (reloc_rva, reloc_size) = data_directory(&output, 5);
    assert_eq!(reloc_rva, 0x2000);
    assert_eq!(reloc_size, 0);
    assert!(reloc_blocks(&output).is_empty());

    let reloc = find_section(&output, ".reloc").unwrap();
    assert_eq!(reloc.virtual_size, 0);
    assert_eq!(reloc.raw_size, 0);

    assert_eq!(&section_data(&output, ".text")[..4], &[0xDE, 0xAD, 0xBE, 0xEF]);
}

#[test]
fn highlow_entries_are_rebased_on_disk() {
    // A pointer into the image at .text+0x10, described by the reloc table.
    let mut text = vec![0_u8; 0x20];
    text[0x10..0x14].copy_from_slice(&0x0040_1234_u32.to_le_bytes());

    let input = PeBuilder::new()
        .section(".text", 0x1000, &text)
        .reloc_section(0x2000, &[(0x1000, vec![(3 << 12) | 0x10, 0])])
        .build();

    let output = run_to_disk(input).unwrap();

    // 0x00401234 + (0x00010000 - 0x00400000) == 0x00011234
    let data = section_data(&output, ".text");
    assert_eq!(ru32(&data, 0x10), 0x0001_1234);
}

#[test]
fn aslr_is_required_in_default_mode() {
    let input = PeBuilder::new()
        .aslr(false)
        .section(".text", 0x1000, &[0; 4])
        .reloc_section(0x2000, &[(0x1000, vec![])])
        .build();

    let mut rec = Recompiler::new();
    rec.load_image_from(input).unwrap();
    rec.load_sections().unwrap();
    assert!(matches!(
        rec.perform_on_disk_relocations(),
        Err(Error::AslrRequired)
    ));
}

#[test]
fn reloc_section_must_be_last() {
    let input = PeBuilder::new()
        .reloc_section(0x1000, &[(0x2000, vec![])])
        .section(".text", 0x2000, &[0; 4])
        .build();

    let mut rec = Recompiler::new();
    rec.load_image_from(input).unwrap();
    assert!(matches!(
        rec.load_sections(),
        Err(Error::UnsupportedLayout(_))
    ));
}

#[test]
fn missing_reloc_directory_is_rejected() {
    let input = PeBuilder::new().section(".text", 0x1000, &[0; 4]).build();

    let mut rec = Recompiler::new();
    rec.load_image_from(input).unwrap();
    assert!(matches!(rec.load_sections(), Err(Error::MissingRelocDir)));
}

#[test]
fn high_and_low_entry_types_are_rejected() {
    // Types 1 (HIGH) and 2 (LOW) must not be treated as HIGHLOW.
    for kind in [1_u16, 2] {
        let input = PeBuilder::new()
            .section(".text", 0x1000, &[0; 0x20])
            .reloc_section(0x2000, &[(0x1000, vec![(kind << 12) | 0x10, 0])])
            .build();

        let mut rec = Recompiler::new();
        rec.load_image_from(input).unwrap();
        rec.load_sections().unwrap();
        match rec.perform_on_disk_relocations() {
            Err(Error::UnknownRelocType { kind: seen }) => assert_eq!(seen, kind),
            other => panic!("expected UnknownRelocType, got {other:?}"),
        }
    }
}

#[test]
fn absolute_padding_entries_are_skipped() {
    let input = PeBuilder::new()
        .section(".text", 0x1000, &[0; 0x20])
        .reloc_section(0x2000, &[(0x1000, vec![0, 0])])
        .build();

    let output = run_to_disk(input).unwrap();
    assert_eq!(&section_data(&output, ".text")[..0x20], &[0_u8; 0x20][..]);
}

#[test]
fn orphan_reloc_block_is_rejected() {
    let input = PeBuilder::new()
        .section(".text", 0x1000, &[0; 4])
        .reloc_section(0x2000, &[(0x5000, vec![(3 << 12) | 0x10, 0])])
        .build();

    let mut rec = Recompiler::new();
    rec.load_image_from(input).unwrap();
    rec.load_sections().unwrap();
    match rec.perform_on_disk_relocations() {
        Err(Error::OrphanReloc { rva }) => assert_eq!(rva, 0x5000),
        other => panic!("expected OrphanReloc, got {other:?}"),
    }
}

#[test]
fn rewrites_are_gated_until_relocation_ran() {
    let input = PeBuilder::new()
        .section(".text", 0x1000, &[0; 4])
        .reloc_section(0x2000, &[(0x1000, vec![])])
        .build();

    let mut rec = Recompiler::new();
    rec.load_image_from(input).unwrap();
    rec.load_sections().unwrap();

    assert!(!rec.rewrite_ready());
    assert!(matches!(rec.rewrite_header(), Err(Error::NotRelocated)));
    assert_eq!(rec.queued_rewrites(), 0);

    rec.perform_on_disk_relocations().unwrap();
    assert!(rec.rewrite_ready());
    rec.rewrite_header().unwrap();
    assert_eq!(rec.queued_rewrites(), 1);
}

#[test]
fn repeated_queueing_stacks_independent_rewrites() {
    let input = PeBuilder::new()
        .section(".text", 0x1000, &[0; 8])
        .reloc_section(0x2000, &[(0x1000, vec![])])
        .build();

    let mut rec = Recompiler::new();
    rec.load_image_from(input).unwrap();
    rec.load_sections().unwrap();
    rec.perform_on_disk_relocations().unwrap();

    for _ in 0..3 {
        rec.rewrite_section(".text").unwrap();
    }
    assert_eq!(rec.queued_rewrites(), 3);
}

#[test]
fn missing_section_name_is_not_fatal() {
    let input = PeBuilder::new()
        .section(".text", 0x1000, &[0; 8])
        .reloc_section(0x2000, &[(0x1000, vec![])])
        .build();

    let mut rec = Recompiler::new();
    rec.load_image_from(input).unwrap();
    rec.load_sections().unwrap();
    rec.perform_on_disk_relocations().unwrap();

    rec.rewrite_section(".nothere").unwrap();
    assert_eq!(rec.queued_rewrites(), 0);
}
