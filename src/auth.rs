use anyhow::{Result, bail};
use std::io::{self, BufRead, IsTerminal};
use zeroize::Zeroizing;

/// Passphrase for an existing vault.
///
/// Sources, in order:
/// - `GUARDIAN_PASSWORD="..." guardian get github`
/// - one line on stdin: `printf '%s\n' "$PW" | guardian get github`
/// - a TTY prompt
pub fn read_passphrase() -> Result<Zeroizing<String>> {
    if let Some(pw) = from_env("GUARDIAN_PASSWORD") {
        return Ok(pw);
    }

    if !io::stdin().is_terminal() {
        let pw = read_line(&mut io::stdin().lock())?;
        if !pw.is_empty() {
            return Ok(pw);
        }
    } else {
        let pw = Zeroizing::new(rpassword::prompt_password("Passphrase: ")?);
        if !pw.is_empty() {
            return Ok(pw);
        }
    }

    bail!("no passphrase provided")
}

/// New passphrase, entered twice.
///
/// `GUARDIAN_NEW_PASSWORD` skips the confirmation. Otherwise two lines are
/// read from stdin, or two prompts are shown on a TTY.
pub fn read_new_passphrase() -> Result<Zeroizing<String>> {
    if let Some(pw) = from_env("GUARDIAN_NEW_PASSWORD") {
        return Ok(pw);
    }

    let (first, second) = if io::stdin().is_terminal() {
        (
            Zeroizing::new(rpassword::prompt_password("New passphrase: ")?),
            Zeroizing::new(rpassword::prompt_password("Confirm passphrase: ")?),
        )
    } else {
        let mut stdin = io::stdin().lock();
        (read_line(&mut stdin)?, read_line(&mut stdin)?)
    };

    confirm(first, &second)
}

fn confirm(first: Zeroizing<String>, second: &str) -> Result<Zeroizing<String>> {
    if first.is_empty() {
        bail!("passphrase cannot be empty");
    }
    if first.as_str() != second {
        bail!("passphrases do not match");
    }
    Ok(first)
}

fn from_env(var: &str) -> Option<Zeroizing<String>> {
    std::env::var(var)
        .ok()
        .filter(|pw| !pw.is_empty())
        .map(Zeroizing::new)
}

/// One line without its terminator. Other whitespace is part of the
/// passphrase.
fn read_line(input: &mut impl BufRead) -> Result<Zeroizing<String>> {
    let mut line = Zeroizing::new(String::new());
    input.read_line(&mut line)?;
    while line.ends_with('\n') || line.ends_with('\r') {
        line.pop();
    }
    Ok(line)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_line_keeps_inner_and_trailing_spaces() {
        let mut input = io::Cursor::new("  correct horse \r\nnext\n");
        assert_eq!(read_line(&mut input).unwrap().as_str(), "  correct horse ");
        assert_eq!(read_line(&mut input).unwrap().as_str(), "next");
        assert_eq!(read_line(&mut input).unwrap().as_str(), "");
    }

    #[test]
    fn confirmation_must_match() {
        assert!(confirm(Zeroizing::new("a".into()), "a").is_ok());
        assert!(confirm(Zeroizing::new("a".into()), "b").is_err());
        assert!(confirm(Zeroizing::new(String::new()), "").is_err());
    }
}
