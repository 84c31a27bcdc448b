//! `bgremove` command line entry point

use std::process::ExitCode;

fn main() -> ExitCode {
    bgremove::cli::main()
}
