use clap::Parser;
use colored::Colorize;
use std::process::ExitCode;

use temp_ssh_access::config::{Args, ClientConfig};
use temp_ssh_access::{cli, logging};

fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let code = if e.use_stderr() { 1 } else { 0 };
            let _ = e.print();
            return ExitCode::from(code);
        }
    };

    logging::init(args.verbose);

    match ClientConfig::from_args(args).and_then(cli::connect::run) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", format!("Error [{}]:", e.phase()).red().bold(), e);
            ExitCode::from(e.exit_code())
        }
    }
}
