//! Thin wrapper over the `git` executable.
//!
//! Every call runs `git -C <vault dir> ...` with prompts disabled and a fixed
//! locale, so failures surface as [`SyncError::Git`] with git's own stderr.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tracing::debug;

use crate::core::constants::SYNC_EXCLUDES;
use crate::core::store;
use crate::error::{Result, SyncError};

const IGNORE_FILE: &str = ".gitignore";
const REMOTE: &str = "origin";

/// A vault directory driven through git.
#[derive(Debug, Clone)]
pub struct Git {
    dir: PathBuf,
}

impl Git {
    /// Wrap `dir`.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::GitUnavailable` if `git` is not on `PATH`.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        which::which("git").map_err(|_| SyncError::GitUnavailable)?;
        Ok(Self { dir: dir.into() })
    }

    /// Clone `url` into `dir`, checking out `branch`.
    pub fn clone(url: &str, dir: &Path, branch: &str) -> Result<Self> {
        which::which("git").map_err(|_| SyncError::GitUnavailable)?;
        let target = dir.to_string_lossy();
        let output = spawn(
            base_command()
                .args(["clone", "--quiet", "--branch", branch, url])
                .arg(target.as_ref()),
        )?;
        check("clone", output)?;
        debug!(url = %url, dir = %dir.display(), "cloned");
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn is_repo(&self) -> bool {
        self.dir.join(".git").exists()
    }

    /// `git init` with `branch` as the initial branch.
    pub fn init(&self, branch: &str) -> Result<()> {
        self.run(&["init", "--quiet"])?;
        self.run(&["symbolic-ref", "HEAD", &format!("refs/heads/{}", branch)])?;
        Ok(())
    }

    /// URL of `origin`, if configured.
    pub fn remote_url(&self) -> Result<Option<String>> {
        let output = self.output(&["remote", "get-url", REMOTE])?;
        Ok(output
            .status
            .success()
            .then(|| String::from_utf8_lossy(&output.stdout).trim().to_string()))
    }

    /// Point `origin` at `url`, adding it if needed.
    pub fn set_remote(&self, url: &str) -> Result<()> {
        match self.remote_url()? {
            Some(current) if current == url => Ok(()),
            Some(_) => self.run(&["remote", "set-url", REMOTE, url]).map(drop),
            None => self.run(&["remote", "add", REMOTE, url]).map(drop),
        }
    }

    /// Write the ignore file that keeps machine-local files out of commits.
    pub fn write_ignore(&self) -> Result<()> {
        let mut text = SYNC_EXCLUDES.join("\n");
        text.push('\n');
        store::write_atomic(&self.dir.join(IGNORE_FILE), text.as_bytes())
    }

    /// Current commit, or `None` before the first commit.
    pub fn head(&self) -> Result<Option<String>> {
        self.rev_parse("HEAD")
    }

    /// Fetch `origin` and return the tip of `branch` there.
    pub fn fetch(&self, branch: &str) -> Result<Option<String>> {
        self.run(&["fetch", "--quiet", REMOTE])?;
        self.rev_parse(&format!("refs/remotes/{}/{}", REMOTE, branch))
    }

    pub fn merge_base(&self, a: &str, b: &str) -> Result<Option<String>> {
        let output = self.output(&["merge-base", a, b])?;
        match output.status.code() {
            Some(0) => Ok(Some(String::from_utf8_lossy(&output.stdout).trim().to_string())),
            Some(1) => Ok(None),
            _ => check("merge-base", output).map(|_| None),
        }
    }

    /// Whether `ancestor` is reachable from `descendant`.
    pub fn is_ancestor(&self, ancestor: &str, descendant: &str) -> Result<bool> {
        let output = self.output(&["merge-base", "--is-ancestor", ancestor, descendant])?;
        match output.status.code() {
            Some(0) => Ok(true),
            Some(1) => Ok(false),
            _ => check("merge-base", output).map(|_| false),
        }
    }

    /// Contents of `path` at `rev`, or `None` if it does not exist there.
    pub fn show(&self, rev: &str, path: &str) -> Result<Option<Vec<u8>>> {
        let object = format!("{}:{}", rev, path);
        if !self.output(&["cat-file", "-e", &object])?.status.success() {
            return Ok(None);
        }
        let output = self.output(&["cat-file", "blob", &object])?;
        check("cat-file", output).map(Some)
    }

    /// Stage everything and commit if anything changed.
    ///
    /// Returns whether a commit was made.
    pub fn commit_all(&self, message: &str) -> Result<bool> {
        self.run(&["add", "--all"])?;
        let status = self.run(&["status", "--porcelain"])?;
        if status.trim().is_empty() {
            return Ok(false);
        }
        self.commit(message)?;
        Ok(true)
    }

    /// Stage everything and commit unconditionally. Used to conclude a merge.
    pub fn commit_merge(&self, message: &str) -> Result<()> {
        self.run(&["add", "--all"])?;
        self.commit(message)
    }

    /// Begin a merge of `rev` that keeps the working tree as is.
    ///
    /// The caller rewrites the tree and concludes with [`Git::commit_merge`].
    pub fn start_merge(&self, rev: &str) -> Result<()> {
        self.run_as_author(&[
            "merge",
            "--quiet",
            "--no-commit",
            "--no-ff",
            "--allow-unrelated-histories",
            "-s",
            "ours",
            rev,
        ])
        .map(drop)
    }

    pub fn fast_forward(&self, rev: &str) -> Result<()> {
        self.run_as_author(&["merge", "--quiet", "--ff-only", rev])
            .map(drop)
    }

    /// Whether a merge was started and never concluded.
    pub fn merge_in_progress(&self) -> Result<bool> {
        Ok(self.rev_parse("MERGE_HEAD")?.is_some())
    }

    /// Drop an unfinished merge.
    ///
    /// Tries `merge --abort` first. If git refuses, `merge --quit` forgets
    /// the merge and leaves the working tree alone.
    pub fn abort_merge(&self) -> Result<()> {
        match self.run_as_author(&["merge", "--abort"]) {
            Ok(_) => Ok(()),
            Err(e) => {
                debug!(dir = %self.dir.display(), error = %e, "merge --abort refused, quitting");
                self.run_as_author(&["merge", "--quit"]).map(drop)
            }
        }
    }

    /// Push `branch` to `origin`.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::Diverged` if the remote has commits we do not.
    pub fn push(&self, branch: &str) -> Result<()> {
        let output = self.output(&["push", "--quiet", "--set-upstream", REMOTE, branch])?;
        if output.status.success() {
            return Ok(());
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        if ["rejected", "non-fast-forward", "fetch first"]
            .iter()
            .any(|marker| stderr.contains(marker))
        {
            return Err(SyncError::Diverged.into());
        }
        check("push", output).map(drop)
    }

    fn commit(&self, message: &str) -> Result<()> {
        self.run_as_author(&["commit", "--quiet", "-m", message])
            .map(drop)
    }

    /// `-c` overrides for commands that record commits or merge state.
    ///
    /// The fallback identity applies only when git has none configured.
    fn identity_args(&self) -> Result<Vec<String>> {
        let mut args: Vec<String> = vec!["-c".into(), "commit.gpgsign=false".into()];
        if !self.output(&["config", "user.email"])?.status.success() {
            let (name, email) = fallback_identity();
            args.extend(["-c".into(), format!("user.name={}", name)]);
            args.extend(["-c".into(), format!("user.email={}", email)]);
        }
        Ok(args)
    }

    fn run_as_author(&self, args: &[&str]) -> Result<String> {
        let mut full = self.identity_args()?;
        full.extend(args.iter().map(|a| a.to_string()));
        let full: Vec<&str> = full.iter().map(String::as_str).collect();
        self.run(&full)
    }

    fn rev_parse(&self, rev: &str) -> Result<Option<String>> {
        let output = self.output(&["rev-parse", "--verify", "--quiet", rev])?;
        Ok(output
            .status
            .success()
            .then(|| String::from_utf8_lossy(&output.stdout).trim().to_string()))
    }

    fn run(&self, args: &[&str]) -> Result<String> {
        let output = self.output(args)?;
        let command = args
            .iter()
            .find(|a| !a.starts_with('-') && !a.contains('='))
            .copied()
            .unwrap_or("git");
        check(command, output).map(|stdout| String::from_utf8_lossy(&stdout).into_owned())
    }

    fn output(&self, args: &[&str]) -> Result<Output> {
        debug!(dir = %self.dir.display(), args = ?args, "git");
        spawn(base_command().arg("-C").arg(&self.dir).args(args))
    }
}

fn base_command() -> Command {
    let mut cmd = Command::new("git");
    cmd.env("GIT_TERMINAL_PROMPT", "0").env("LC_ALL", "C");
    // Unit tests must not depend on the developer's git configuration.
    #[cfg(all(test, unix))]
    cmd.env("GIT_CONFIG_GLOBAL", "/dev/null")
        .env("GIT_CONFIG_NOSYSTEM", "1")
        .env_remove("GIT_AUTHOR_NAME")
        .env_remove("GIT_AUTHOR_EMAIL")
        .env_remove("GIT_COMMITTER_NAME")
        .env_remove("GIT_COMMITTER_EMAIL")
        .env_remove("EMAIL");
    cmd
}

fn spawn(cmd: &mut Command) -> Result<Output> {
    cmd.output().map_err(|e| match e.kind() {
        ErrorKind::NotFound => SyncError::GitUnavailable.into(),
        _ => e.into(),
    })
}

fn check(command: &str, output: Output) -> Result<Vec<u8>> {
    if output.status.success() {
        return Ok(output.stdout);
    }
    Err(SyncError::Git {
        command: command.to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
    }
    .into())
}

/// Committer identity for machines without git configured.
fn fallback_identity() -> (String, String) {
    let user = whoami::username();
    let host: String = whoami::devicename()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '-' })
        .collect();
    (format!("keyswitch ({})", user), format!("{}@{}", user, host))
}
