//! Flows behind the client and issuer binaries

pub mod connect;
pub mod issue;
pub mod terminal;

use colored::Colorize;
use zeroize::Zeroize;

use crate::error::Result;

/// Minimum length of a key chosen when issuing a token
pub const MIN_KEY_LEN: usize = 12;

/// Read a secret from the controlling terminal without echo
pub fn prompt_secret(prompt: &str) -> Result<String> {
    Ok(rpassword::prompt_password(prompt)?)
}

/// Check a freshly typed key and its confirmation
pub fn check_new_key(key: &str, confirm: &str) -> std::result::Result<(), String> {
    if key.chars().count() < MIN_KEY_LEN {
        return Err(format!("key must be at least {} characters", MIN_KEY_LEN));
    }
    if key != confirm {
        return Err("keys do not match".to_string());
    }
    Ok(())
}

/// Ask for a new token key with confirmation, repeating until it is usable
pub fn prompt_new_key() -> Result<String> {
    eprintln!("{}", "Choose a token key".cyan().bold());
    eprintln!("The recipient needs this key to open the token. Send it separately from the token.");
    eprintln!("Minimum length: {} characters\n", MIN_KEY_LEN);

    loop {
        let mut key = prompt_secret("Token key: ")?;
        let mut confirm = prompt_secret("Confirm token key: ")?;
        let verdict = check_new_key(&key, &confirm);
        confirm.zeroize();

        match verdict {
            Ok(()) => return Ok(key),
            Err(reason) => {
                key.zeroize();
                eprintln!("{} {}", "Error:".red(), reason);
            }
        }
    }
}
