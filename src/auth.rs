use anyhow::{Result, bail};
use std::io::{self, BufRead, IsTerminal};
use zeroize::Zeroizing;

pub const PASSWORD_ENV: &str = "VAULTKEY_PASSWORD";
pub const NEW_PASSWORD_ENV: &str = "VAULTKEY_NEW_PASSWORD";

/// Reads the current password.
///
/// Order: `VAULTKEY_PASSWORD`, first line of piped stdin, TTY prompt.
pub fn read_password() -> Result<Zeroizing<String>> {
    if let Some(pw) = from_env(PASSWORD_ENV) {
        return Ok(pw);
    }

    if !io::stdin().is_terminal() {
        let mut buf = Zeroizing::new(String::new());
        io::stdin().lock().read_line(&mut buf)?;
        trim_newline(&mut buf);
        if !buf.is_empty() {
            return Ok(buf);
        }
    } else {
        let pw = Zeroizing::new(rpassword::prompt_password("Password: ")?);
        if !pw.is_empty() {
            return Ok(pw);
        }
    }

    bail!("no password provided")
}

/// Reads a new password, asking twice unless it comes from the environment.
///
/// `env` is consulted first; piped stdin must carry the password on two lines.
pub fn read_new_password_with_confirmation(env: &str) -> Result<Zeroizing<String>> {
    if let Some(pw) = from_env(env) {
        return Ok(pw);
    }

    let (pw1, pw2) = if !io::stdin().is_terminal() {
        let stdin = io::stdin();
        let mut handle = stdin.lock();

        let mut pw1 = Zeroizing::new(String::new());
        let mut pw2 = Zeroizing::new(String::new());
        handle.read_line(&mut pw1)?;
        handle.read_line(&mut pw2)?;
        trim_newline(&mut pw1);
        trim_newline(&mut pw2);
        (pw1, pw2)
    } else {
        (
            Zeroizing::new(rpassword::prompt_password("New password: ")?),
            Zeroizing::new(rpassword::prompt_password("Confirm password: ")?),
        )
    };

    if pw1.is_empty() {
        bail!("password cannot be empty");
    }
    if pw1 != pw2 {
        bail!("passwords do not match");
    }

    Ok(pw1)
}

fn from_env(name: &str) -> Option<Zeroizing<String>> {
    std::env::var(name)
        .ok()
        .filter(|pw| !pw.is_empty())
        .map(Zeroizing::new)
}

fn trim_newline(s: &mut String) {
    while s.ends_with('\n') || s.ends_with('\r') {
        s.pop();
    }
}
