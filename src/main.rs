use clap::Parser;
use quoteval::cli::{Cli, run};

fn main() -> std::process::ExitCode {
    run(Cli::parse())
}
