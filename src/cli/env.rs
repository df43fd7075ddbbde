//! Env commands - edit a profile's extra variables.

use std::io::{self, BufRead, IsTerminal};

use zeroize::Zeroizing;

use crate::cli::output;
use crate::core::domain::QualifiedSlug;
use crate::core::keyswitch::Keyswitch;
use crate::error::{Result, ValidationError};

/// Set `name=value` on a profile.
///
/// Without `value` the first line of stdin is used; stdin must be piped.
pub fn set(ks: &Keyswitch, target: &str, name: &str, value: Option<String>) -> Result<i32> {
    let target: QualifiedSlug = target.parse()?;
    let value = match value {
        Some(value) => Zeroizing::new(value),
        None => read_value(io::stdin().lock(), io::stdin().is_terminal(), name)?,
    };
    ks.env_set(&target, name, &value)?;
    output::success(&format!("set {} on {}", name, output::profile(&target.to_string())));
    Ok(0)
}

fn read_value(mut input: impl BufRead, terminal: bool, name: &str) -> Result<Zeroizing<String>> {
    if terminal {
        return Err(ValidationError::MissingValue(name.to_string()).into());
    }
    let mut line = Zeroizing::new(String::new());
    input.read_line(&mut line)?;
    let value = line.trim_end_matches(['\r', '\n']);
    if value.is_empty() {
        return Err(ValidationError::MissingValue(name.to_string()).into());
    }
    Ok(Zeroizing::new(value.to_string()))
}

/// Remove a variable from a profile.
pub fn unset(ks: &Keyswitch, target: &str, name: &str) -> Result<i32> {
    let target: QualifiedSlug = target.parse()?;
    if ks.env_unset(&target, name)? {
        output::success(&format!(
            "unset {} on {}",
            name,
            output::profile(&target.to_string())
        ));
    } else {
        output::dimmed(&format!("{} was not set", name));
    }
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_value_from_pipe() {
        let value = read_value("s3cr3t value\n".as_bytes(), false, "TOKEN").unwrap();
        assert_eq!(value.as_str(), "s3cr3t value");
    }

    #[test]
    fn test_read_value_requires_input() {
        assert!(read_value("".as_bytes(), false, "TOKEN").is_err());
        assert!(read_value("ignored\n".as_bytes(), true, "TOKEN").is_err());
    }
}
