//! Integration tests for the Windows 10 variant: preselection stub
//! injection with ASLR left on.

mod common;

use common::*;
use relocrypt::{stub::prepare_stub, Recompiler};

fn sample_image(aslr: bool) -> Vec<u8> {
    let mut text = vec![0_u8; 0x40];
    text[0x10..0x14].copy_from_slice(&0x0040_1000_u32.to_le_bytes());

    PeBuilder::new()
        .entry_point(0x1234)
        .aslr(aslr)
        .section(".text", 0x1000, &text)
        .reloc_section(0x2000, &[(0x1000, vec![(3 << 12) | 0x10, 0])])
        .build()
}

fn obfuscate_win10(input: Vec<u8>) -> Vec<u8> {
    let dir = tempfile::tempdir().unwrap();
    let out_path = dir.path().join("out.exe");

    let mut rec = Recompiler::new();
    rec.set_windows10_attack(true);
    rec.load_image_from(input).unwrap();
    rec.load_sections().unwrap();
    rec.perform_on_disk_relocations().unwrap();
    rec.fixup_base().unwrap();
    rec.write_output(&out_path).unwrap();

    std::fs::read(&out_path).unwrap()
}

#[test]
fn stub_section_takes_the_entry_point() {
    let output = obfuscate_win10(sample_image(true));

    let presel = find_section(&output, ".presel").unwrap();
    assert_eq!(presel.characteristics, 0xE000_0060);
    assert_eq!(entry_point(&output), presel.rva);

    // The section holds exactly the stub built from the original entry
    // point RVA.
    let stub = prepare_stub(0x1234).unwrap();
    let data = section_data(&output, ".presel");
    assert_eq!(&data[..stub.len()], &stub[..]);
    assert!(data[stub.len()..].iter().all(|&b| b == 0));
}

#[test]
fn base_and_aslr_flag_are_left_alone() {
    let input = sample_image(true);
    let output = obfuscate_win10(input);

    assert_eq!(image_base(&output), 0x0040_0000);
    assert_eq!(dll_characteristics(&output) & 0x0040, 0x0040);
}

#[test]
fn missing_dynamic_base_flag_is_added_not_overwritten() {
    let input = sample_image(false);
    assert_eq!(dll_characteristics(&input), 0x8100);

    let output = obfuscate_win10(input);

    // ORed in: the other characteristic bits must survive.
    assert_eq!(dll_characteristics(&output), 0x8140);
}

#[test]
fn relocations_still_applied_and_table_rebuilt() {
    let output = obfuscate_win10(sample_image(true));

    // The on-disk pass rebased the .text pointer against the original
    // base: 0x00401000 + (0x00010000 - 0x00400000).
    let text = section_data(&output, ".text");
    assert_eq!(ru32(&text, 0x10), 0x0001_1000);

    // The emitted table only describes the queued base fixup.
    let blocks = reloc_blocks(&output);
    assert_eq!(blocks.len(), 1);
    assert_eq!(blocks[0].0, 0xB4);
}

#[test]
fn header_and_import_rewrites_are_skipped() {
    let mut rec = Recompiler::new();
    rec.set_windows10_attack(true);
    rec.load_image_from(sample_image(true)).unwrap();
    rec.load_sections().unwrap();

    // The Win10 gate is deliberately permissive: queueing works without
    // the on-disk pass.
    assert!(rec.rewrite_ready());

    rec.rewrite_header().unwrap();
    rec.rewrite_imports().unwrap();
    assert_eq!(rec.queued_rewrites(), 0);

    rec.fixup_base().unwrap();
    assert_eq!(rec.queued_rewrites(), 1);
}
