//! Issue an access token for a host

use chrono::{Duration, Local, NaiveDateTime};
use clap::Parser;
use colored::Colorize;
use zeroize::Zeroize;

use super::{prompt_new_key, prompt_secret};
use crate::crypto::OpensslAes256Cbc;
use crate::error::{AccessError, Result};
use crate::token::{self, CredentialRecord, EXPIRY_FORMAT};

#[derive(Parser, Debug, Clone)]
#[command(name = "temp-ssh-issue")]
#[command(version)]
#[command(about = "Issue an encrypted, time-limited SSH access token", long_about = None)]
pub struct IssueArgs {
    /// Host the token grants access to
    #[arg(long)]
    pub host: String,

    /// SSH port
    #[arg(long, default_value_t = 22)]
    pub port: u16,

    /// Account to log in as
    #[arg(long)]
    pub username: String,

    /// Absolute expiry, "YYYY-MM-DD HH:MM:SS" local time
    #[arg(long, conflicts_with = "valid_for")]
    pub expires: Option<String>,

    /// Minutes from now until the token expires
    #[arg(long, value_name = "MINUTES", default_value_t = 60)]
    pub valid_for: u32,
}

/// Work out the expiry string, refusing anything not in the future
pub fn resolve_expiry(expires: Option<&str>, valid_for_minutes: u32, now: NaiveDateTime) -> Result<String> {
    let at = match expires {
        Some(value) => token::parse_expiry(value)?,
        None => {
            if valid_for_minutes == 0 {
                return Err(AccessError::InvalidConfig(
                    "--valid-for must be at least 1 minute".into(),
                ));
            }
            now + Duration::minutes(i64::from(valid_for_minutes))
        }
    };

    if at <= now {
        return Err(AccessError::InvalidConfig(format!(
            "expiry {} is not in the future",
            at.format(EXPIRY_FORMAT)
        )));
    }

    Ok(at.format(EXPIRY_FORMAT).to_string())
}

pub fn run(args: IssueArgs) -> Result<()> {
    let expires = resolve_expiry(args.expires.as_deref(), args.valid_for, Local::now().naive_local())?;

    eprintln!("{}", "=== Issue SSH access token ===".cyan().bold());
    eprintln!();

    let mut password = prompt_secret(&format!("SSH password for {}@{}: ", args.username, args.host))?;
    let record = CredentialRecord::new(args.host, u32::from(args.port), args.username, password.clone(), expires);
    password.zeroize();
    let record = record?;

    eprintln!();
    let mut key = prompt_new_key()?;
    let issued = token::encode(&OpensslAes256Cbc::default(), &record, &key);
    key.zeroize();
    let issued = issued?;

    eprintln!();
    eprintln!(
        "{} {} until {}",
        "Token grants access to".green(),
        record.connection_string().bold(),
        record.expires().bold()
    );
    println!("{}", issued);

    Ok(())
}
