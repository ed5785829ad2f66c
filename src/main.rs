//! Assetsmith - command-line tool for building web assets

use std::process::ExitCode;

use assetsmith::cli;

fn main() -> ExitCode {
    cli::run()
}
