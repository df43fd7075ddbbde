//! Command-line interface.
//!
//! A thin dispatcher: every subcommand maps to one [`Keyswitch`] operation
//! and prints its result.

pub mod add;
pub mod audit;
pub mod bundle;
pub mod context;
pub mod env;
pub mod init;
pub mod output;
pub mod profiles;
pub mod run;
pub mod status;
pub mod sync;
pub mod team;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::core::domain::Action;
use crate::core::keyswitch::Keyswitch;
use crate::error::Result;

/// Keyswitch - encrypted credential profiles, one identity at a time.
#[derive(Parser)]
#[command(
    name = "keyswitch",
    about = "Encrypted credential profiles with context switching and injection",
    version
)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Top-level commands.
#[derive(Subcommand)]
pub enum Command {
    /// Create the keyswitch root, master key and personal vault
    Init,

    /// Add a credential profile
    Add {
        /// Display name; the slug is derived from it
        name: String,
        /// Email shown alongside the profile
        #[arg(long)]
        email: Option<String>,
        /// API key credential; takes precedence over OAuth tokens
        #[arg(long, env = "KEYSWITCH_API_KEY", hide_env_values = true)]
        api_key: Option<String>,
        /// OAuth access token credential
        #[arg(long)]
        access_token: Option<String>,
        /// OAuth refresh token
        #[arg(long, requires = "access_token")]
        refresh_token: Option<String>,
        /// Extra environment variable to inject
        #[arg(long = "env", value_name = "NAME=VALUE", value_parser = parse_pair)]
        env: Vec<(String, String)>,
        /// Tag (repeatable)
        #[arg(long = "tag")]
        tags: Vec<String>,
        /// Store in a joined team vault
        #[arg(long)]
        team: Option<String>,
        /// Replace an existing profile with the same slug
        #[arg(short, long)]
        force: bool,
    },

    /// Show a profile (secrets masked unless --unmask)
    Get {
        /// Profile slug, `team/slug` for team profiles
        profile: String,
        /// Show secret values in full
        #[arg(long)]
        unmask: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List profiles
    #[command(alias = "ls")]
    List {
        /// Only profiles with this tag
        #[arg(long)]
        tag: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Remove a profile
    #[command(alias = "rm")]
    Remove {
        /// Profile slug
        profile: String,
    },

    /// Edit a profile's extra environment variables
    Env {
        #[command(subcommand)]
        action: EnvAction,
    },

    /// Make a profile globally active
    Switch {
        /// Profile slug
        profile: String,
    },

    /// Show the active profile and where it comes from
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the active profile slug for the current directory
    Resolve,

    /// Link directories to profiles
    Context {
        #[command(subcommand)]
        action: ContextAction,
    },

    /// Run a command with the active profile injected
    Run {
        /// Override or add a variable for this run
        #[arg(long = "env", value_name = "NAME=VALUE", value_parser = parse_pair)]
        env: Vec<(String, String)>,
        /// Command and arguments to run
        #[arg(trailing_var_arg = true, allow_hyphen_values = true, required = true)]
        command: Vec<String>,
    },

    /// Show the access log
    Audit {
        /// Only entries for this profile
        #[arg(long)]
        profile: Option<String>,
        /// Only entries of this kind
        #[arg(long, value_enum)]
        action: Option<ActionArg>,
        /// Maximum number of entries
        #[arg(short = 'n', long, default_value_t = 20)]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Sync a vault through a git remote
    Sync {
        #[command(subcommand)]
        action: SyncAction,
    },

    /// Manage team vaults
    Team {
        #[command(subcommand)]
        action: TeamAction,
    },

    /// Write an encrypted bundle of the personal vault
    Export {
        /// Bundle path
        path: PathBuf,
    },

    /// Merge an encrypted bundle into the personal vault
    Import {
        /// Bundle path
        path: PathBuf,
        /// Replace existing profiles
        #[arg(short, long)]
        force: bool,
    },
}

/// Env subcommands.
#[derive(Subcommand)]
pub enum EnvAction {
    /// Set a variable
    ///
    /// The value may be omitted and piped on stdin instead, which keeps
    /// secrets out of the process list and shell history.
    Set {
        profile: String,
        name: String,
        #[arg(env = "KEYSWITCH_ENV_VALUE", hide_env_values = true)]
        value: Option<String>,
    },
    /// Remove a variable
    Unset { profile: String, name: String },
}

/// Context subcommands.
#[derive(Subcommand)]
pub enum ContextAction {
    /// Link a directory (default: current) to a profile
    Set {
        profile: String,
        #[arg(long)]
        dir: Option<PathBuf>,
    },
    /// Remove the link on a directory (default: current)
    Unset {
        #[arg(long)]
        dir: Option<PathBuf>,
    },
}

/// Sync subcommands.
#[derive(Subcommand)]
pub enum SyncAction {
    /// Configure the git remote
    Init {
        url: String,
        /// Team vault instead of the personal one
        #[arg(long)]
        team: Option<String>,
    },
    /// Commit and push
    Push {
        #[arg(long)]
        team: Option<String>,
    },
    /// Fetch and merge
    Pull {
        #[arg(long)]
        team: Option<String>,
    },
}

/// Team subcommands.
#[derive(Subcommand)]
pub enum TeamAction {
    /// Create a team vault and publish it
    Create {
        name: String,
        url: String,
        /// Team master key; generated when omitted
        #[arg(long, env = "KEYSWITCH_TEAM_KEY", hide_env_values = true)]
        master_key: Option<String>,
    },
    /// Join an existing team vault
    Join {
        name: String,
        url: String,
        /// Team master key, as shared by a member
        #[arg(long, env = "KEYSWITCH_TEAM_KEY", hide_env_values = true)]
        master_key: String,
    },
    /// List joined teams
    List {
        #[arg(long)]
        json: bool,
    },
    /// Leave a team and delete its local copy
    Leave { name: String },
}

/// Audit action filter.
#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum ActionArg {
    Read,
    Switch,
    Inject,
    Sync,
    Modify,
    Delete,
}

impl From<ActionArg> for Action {
    fn from(arg: ActionArg) -> Self {
        match arg {
            ActionArg::Read => Action::Read,
            ActionArg::Switch => Action::Switch,
            ActionArg::Inject => Action::Inject,
            ActionArg::Sync => Action::Sync,
            ActionArg::Modify => Action::Modify,
            ActionArg::Delete => Action::Delete,
        }
    }
}

fn parse_pair(s: &str) -> std::result::Result<(String, String), String> {
    s.split_once('=')
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .ok_or_else(|| format!("expected NAME=VALUE, got '{}'", s))
}

/// Execute a command.
///
/// # Returns
///
/// The process exit code: the child's for `run`, otherwise 0.
///
/// # Errors
///
/// Returns error if the command execution fails.
pub fn execute(command: Command) -> Result<i32> {
    let ks = Keyswitch::from_env()?;
    let result = dispatch(&ks, command);
    for warning in ks.take_warnings() {
        output::warn(&warning.to_string());
    }
    result
}

fn dispatch(ks: &Keyswitch, command: Command) -> Result<i32> {
    match command {
        Command::Init => init::execute(ks),
        Command::Add {
            name,
            email,
            api_key,
            access_token,
            refresh_token,
            env,
            tags,
            team,
            force,
        } => add::execute(
            ks,
            add::NewProfile {
                name,
                email,
                api_key,
                access_token,
                refresh_token,
                env,
                tags,
                team,
            },
            force,
        ),
        Command::Get {
            profile,
            unmask,
            json,
        } => profiles::get(ks, &profile, unmask, json),
        Command::List { tag, json } => profiles::list(ks, tag.as_deref(), json),
        Command::Remove { profile } => profiles::remove(ks, &profile),
        Command::Env { action } => match action {
            EnvAction::Set {
                profile,
                name,
                value,
            } => env::set(ks, &profile, &name, value),
            EnvAction::Unset { profile, name } => env::unset(ks, &profile, &name),
        },
        Command::Switch { profile } => status::switch(ks, &profile),
        Command::Status { json } => status::status(ks, json),
        Command::Resolve => status::resolve(ks),
        Command::Context { action } => match action {
            ContextAction::Set { profile, dir } => context::set(ks, &profile, dir),
            ContextAction::Unset { dir } => context::unset(ks, dir),
        },
        Command::Run { env, command } => run::execute(ks, &command, &env),
        Command::Audit {
            profile,
            action,
            limit,
            json,
        } => audit::execute(ks, profile, action.map(Action::from), limit, json),
        Command::Sync { action } => match action {
            SyncAction::Init { url, team } => sync::init(ks, &url, team.as_deref()),
            SyncAction::Push { team } => sync::push(ks, team.as_deref()),
            SyncAction::Pull { team } => sync::pull(ks, team.as_deref()),
        },
        Command::Team { action } => match action {
            TeamAction::Create {
                name,
                url,
                master_key,
            } => team::create(ks, &name, &url, master_key.as_deref()),
            TeamAction::Join {
                name,
                url,
                master_key,
            } => team::join(ks, &name, &url, &master_key),
            TeamAction::List { json } => team::list(ks, json),
            TeamAction::Leave { name } => team::leave(ks, &name),
        },
        Command::Export { path } => bundle::export(ks, &path),
        Command::Import { path, force } => bundle::import(ks, &path, force),
    }
}

/// The working directory, or `dir` when given.
fn working_dir(dir: Option<PathBuf>) -> Result<PathBuf> {
    match dir {
        Some(dir) => Ok(dir),
        None => Ok(std::env::current_dir()?),
    }
}
