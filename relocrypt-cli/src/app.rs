use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// relocrypt - hide PE32 bytes inside the Windows loader's relocation pass
#[derive(Debug, Parser)]
#[command(name = "relocrypt", version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOptions,

    #[command(subcommand)]
    pub command: Command,
}

/// Options shared across all subcommands.
#[derive(Debug, Parser)]
pub struct GlobalOptions {
    /// Enable verbose (debug-level) logging output.
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Relocate the image on disk and emit an obfuscated copy.
    Obfuscate {
        /// Path to the PE32 executable.
        #[arg(value_name = "FILE")]
        path: PathBuf,

        /// Output file for the obfuscated binary.
        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,

        /// Use the Windows 10 variant: keep ASLR and chain a preselection
        /// stub before the original entry point.
        #[arg(long)]
        win10: bool,

        /// Stack a second loader-replayed pass over every queued rewrite.
        #[arg(long)]
        multi_pass: bool,

        /// Don't obfuscate the entry-point header field.
        #[arg(long)]
        skip_header: bool,

        /// Don't queue the image-base fixup.
        #[arg(long)]
        skip_base: bool,

        /// Don't obfuscate the import machinery.
        #[arg(long)]
        skip_imports: bool,

        /// Obfuscate a whole section by name (repeatable).
        #[arg(long = "section", value_name = "NAME")]
        section: Vec<String>,

        /// Obfuscate every occurrence of a string (repeatable).
        #[arg(long = "string", value_name = "TEXT")]
        string: Vec<String>,
    },

    /// List the image's section table.
    Sections {
        /// Path to the PE32 executable.
        #[arg(value_name = "FILE")]
        path: PathBuf,
    },
}
