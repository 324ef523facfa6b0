//! `sawahguard` binary entrypoint.

use clap::Parser;
use sawahguard::cli_app::{Cli, run};

fn main() {
    let cli = Cli::parse();
    if let Err(err) = run(&cli) {
        eprintln!("sawahguard: {err}");
        std::process::exit(1);
    }
}
