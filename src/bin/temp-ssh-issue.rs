use clap::Parser;
use colored::Colorize;
use std::process::ExitCode;

use temp_ssh_access::cli::issue::{self, IssueArgs};
use temp_ssh_access::logging;

fn main() -> ExitCode {
    let args = match IssueArgs::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let code = if e.use_stderr() { 1 } else { 0 };
            let _ = e.print();
            return ExitCode::from(code);
        }
    };

    logging::init(0);

    match issue::run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);
            ExitCode::from(e.exit_code())
        }
    }
}
