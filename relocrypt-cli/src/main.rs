mod app;
mod commands;
mod output;

use clap::Parser;

use crate::app::{Cli, Command};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Show relocrypt info+ on stderr; --verbose enables debug; RUST_LOG overrides
    let level = if cli.global.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter_module("relocrypt", level)
        .parse_default_env()
        .target(env_logger::Target::Stderr)
        .format_timestamp(None)
        .format_module_path(false)
        .format_target(false)
        .init();

    match &cli.command {
        Command::Obfuscate {
            path,
            output,
            win10,
            multi_pass,
            skip_header,
            skip_base,
            skip_imports,
            section,
            string,
        } => commands::obfuscate::run(
            path,
            output,
            &commands::obfuscate::ObfuscateOptions {
                win10: *win10,
                multi_pass: *multi_pass,
                skip_header: *skip_header,
                skip_base: *skip_base,
                skip_imports: *skip_imports,
                sections: section.clone(),
                strings: string.clone(),
            },
        ),
        Command::Sections { path } => commands::sections::run(path),
    }
}
