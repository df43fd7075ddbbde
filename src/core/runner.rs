//! Injection proxy.
//!
//! Builds the environment for a child process from a decrypted profile and
//! runs the child with it. Secrets only ever live in this process's memory
//! and the child's environment; nothing is written to disk and the parent
//! environment is never modified.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::process::{Command, ExitStatus};

use tracing::{debug, info};
use zeroize::Zeroizing;

use crate::core::config::InjectSettings;
use crate::core::constants::{MASTER_KEY_ENV, PROFILE_NAME_VAR};
use crate::core::domain::{Credential, Profile};
use crate::core::validation::validate_env_name;
use crate::error::{Result, RunError};

/// The variables to inject into a child process.
///
/// Later layers win: the primary credential variables, then the profile's
/// extra variables, then per-invocation overrides.
#[derive(Default)]
pub struct Injection {
    vars: BTreeMap<String, Zeroizing<String>>,
}

impl Injection {
    /// Variables for `profile` under the configured variable names.
    pub fn for_profile(profile: &Profile, settings: &InjectSettings) -> Self {
        let mut injection = Self::default();
        match &profile.credential {
            Credential::ApiKey { key } => injection.set(&settings.api_key_var, key),
            Credential::OAuth {
                access_token,
                refresh_token,
                ..
            } => {
                injection.set(&settings.access_token_var, access_token);
                if let (Some(var), Some(token)) = (&settings.refresh_token_var, refresh_token) {
                    injection.set(var, token);
                }
            }
            Credential::Env => {}
        }
        for (name, value) in &profile.env {
            injection.set(name, value);
        }
        if settings.export_profile_name {
            injection.set(PROFILE_NAME_VAR, &profile.qualified_slug());
        }
        injection
    }

    /// Apply per-invocation overrides on top.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::InvalidEnvVar` for a bad variable name.
    pub fn with_overrides(mut self, overrides: &[(String, String)]) -> Result<Self> {
        for (name, value) in overrides {
            validate_env_name(name)?;
            self.set(name, value);
        }
        Ok(self)
    }

    fn set(&mut self, name: &str, value: &str) {
        self.vars
            .insert(name.to_string(), Zeroizing::new(value.to_string()));
    }

    /// Injected variable names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.vars.keys().map(String::as_str)
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(|v| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

impl std::fmt::Debug for Injection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Injection")
            .field("vars", &self.vars.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Run `command` with the current environment plus `injection`.
///
/// Standard streams are inherited. Blocks until the child exits.
///
/// # Returns
///
/// The child's exit code; `128 + signal` if it was killed by a signal.
///
/// # Errors
///
/// Returns `RunError::EmptyCommand` for an empty argv and
/// `RunError::CommandNotFound` if the program cannot be found.
pub fn run(command: &[String], injection: Injection) -> Result<i32> {
    let (program, args) = command.split_first().ok_or(RunError::EmptyCommand)?;

    let mut cmd = Command::new(program);
    cmd.args(args).env_remove(MASTER_KEY_ENV);
    for (name, value) in &injection.vars {
        cmd.env(name, value.as_str());
    }
    debug!(program = %program, vars = injection.len(), "spawning child");

    let status = cmd.status().map_err(|source| match source.kind() {
        ErrorKind::NotFound => RunError::CommandNotFound {
            program: program.clone(),
        },
        _ => RunError::Spawn {
            program: program.clone(),
            source,
        },
    })?;
    drop(injection);

    let code = exit_code(status);
    info!(program = %program, code, "child exited");
    Ok(code)
}

#[cfg(unix)]
fn exit_code(status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;

    status
        .code()
        .or_else(|| status.signal().map(|sig| 128 + sig))
        .unwrap_or(1)
}

#[cfg(not(unix))]
fn exit_code(status: ExitStatus) -> i32 {
    status.code().unwrap_or(1)
}
