//! `opswatch` binary: parses the command line and hands off to [`opswatch::cli_app::run`].

use clap::Parser;
use opswatch::cli_app::{Cli, run};

fn main() {
    let cli = Cli::parse();
    if let Err(err) = run(&cli) {
        eprintln!("opswatch: {err}");
        std::process::exit(1);
    }
}
