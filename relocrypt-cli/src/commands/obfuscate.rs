use std::path::Path;

use anyhow::Context;
use relocrypt::Recompiler;

/// What to queue between the on-disk relocation pass and emission.
pub struct ObfuscateOptions {
    pub win10: bool,
    pub multi_pass: bool,
    pub skip_header: bool,
    pub skip_base: bool,
    pub skip_imports: bool,
    pub sections: Vec<String>,
    pub strings: Vec<String>,
}

pub fn run(path: &Path, output: &Path, opts: &ObfuscateOptions) -> anyhow::Result<()> {
    let mut rec = Recompiler::new();
    rec.set_windows10_attack(opts.win10);
    rec.set_multi_pass(opts.multi_pass);

    rec.load_image(path)
        .with_context(|| format!("failed to load {}", path.display()))?;
    rec.load_sections().context("failed to load sections")?;
    rec.perform_on_disk_relocations()
        .context("on-disk relocation failed")?;

    if !opts.skip_header {
        rec.rewrite_header()?;
    }
    if !opts.skip_base {
        rec.fixup_base()?;
    }
    if !opts.skip_imports {
        rec.rewrite_imports()?;
    }
    for name in &opts.sections {
        rec.rewrite_section(name)?;
    }
    for needle in &opts.strings {
        rec.rewrite_matches(needle.as_bytes())?;
    }

    rec.write_output(output)
        .with_context(|| format!("failed to write {}", output.display()))?;

    println!(
        "{} -> {} ({} rewrites queued)",
        path.display(),
        output.display(),
        rec.queued_rewrites()
    );
    Ok(())
}
