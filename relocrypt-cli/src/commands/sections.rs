use std::path::Path;

use anyhow::Context;
use relocrypt::Recompiler;

use crate::output::{Align, TabWriter};

pub fn run(path: &Path) -> anyhow::Result<()> {
    let mut rec = Recompiler::new();
    rec.load_image(path)
        .with_context(|| format!("failed to load {}", path.display()))?;

    let headers = rec
        .pe_headers()
        .context("image loaded without headers")?;

    println!(
        "image base {:#010x}, entry point {:#010x}, {} section(s)",
        headers.image_base(),
        headers.address_of_entry_point(),
        headers.sections.len()
    );

    let mut table = TabWriter::new(vec![
        ("Name", Align::Left),
        ("VirtSize", Align::Right),
        ("RawSize", Align::Right),
        ("VirtAddr", Align::Right),
        ("RawAddr", Align::Right),
    ]);
    for section in &headers.sections {
        table.row(vec![
            section.name_str(),
            format!("{:#x}", section.virtual_size),
            format!("{:#x}", section.size_of_raw_data),
            format!("{:#x}", section.virtual_address),
            format!("{:#x}", section.pointer_to_raw_data),
        ]);
    }
    table.print();

    Ok(())
}
