use std::process::ExitCode;

use clap::Parser;

use retouch::cli::{self, CliArgs};
use retouch::logger;
use retouch::settings::EditorSettings;

fn main() -> ExitCode {
    // Initialize session log (overwrites previous session log)
    logger::init();

    let args = CliArgs::parse();
    let settings = EditorSettings::load();
    cli::run(args, settings)
}
