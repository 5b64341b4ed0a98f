//! `ssh` command-line assembly and execution.
//!
//! [`SshInvocation`] is a builder over the argument vector passed to the
//! system `ssh` binary. Router host keys change with every reflash, so the
//! invocation never consults or records known hosts and re-enables the
//! legacy `ssh-rsa` algorithm that older dropbear builds still use.

use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};

use openwrt_connect_core::{Plan, Target};
use tracing::debug;

use crate::error::{Result, TransportError};

/// Default `ssh` program, looked up on `PATH`.
pub const SSH_PROGRAM: &str = "ssh";

#[cfg(windows)]
const NULL_DEVICE: &str = "NUL";
#[cfg(not(windows))]
const NULL_DEVICE: &str = "/dev/null";

/// `-o` options passed on every connection.
pub fn host_key_options() -> Vec<String> {
    vec![
        "StrictHostKeyChecking=no".to_string(),
        format!("UserKnownHostsFile={NULL_DEVICE}"),
        format!("GlobalKnownHostsFile={NULL_DEVICE}"),
        "HostKeyAlgorithms=+ssh-rsa".to_string(),
        "PubkeyAcceptedKeyTypes=+ssh-rsa".to_string(),
        "LogLevel=ERROR".to_string(),
    ]
}

/// Builder for one `ssh` process.
///
/// # Examples
///
/// ```
/// use openwrt_connect_core::Target;
/// use openwrt_connect_transport::SshInvocation;
///
/// let mut ssh = SshInvocation::new(&Target::new("root", "192.168.1.1"));
/// ssh.identity("/home/u/.ssh/key").tty(true).remote_command("uptime");
///
/// let args = ssh.args();
/// assert_eq!(args[args.len() - 2], "root@192.168.1.1");
/// assert_eq!(args[args.len() - 1], "uptime");
/// assert!(args.contains(&"-tt".into()));
/// ```
#[derive(Debug, Clone)]
pub struct SshInvocation {
    program: OsString,
    options: Vec<String>,
    identity: Option<PathBuf>,
    batch_mode: bool,
    connect_timeout: Option<u32>,
    tty: bool,
    target: String,
    remote_command: Option<String>,
}

impl SshInvocation {
    /// Creates an invocation for `target` with the standard host-key options.
    pub fn new(target: &Target) -> Self {
        Self {
            program: OsString::from(SSH_PROGRAM),
            options: host_key_options(),
            identity: None,
            batch_mode: false,
            connect_timeout: None,
            tty: false,
            target: target.to_string(),
            remote_command: None,
        }
    }

    /// Creates the invocation that executes `plan` with a forced terminal.
    pub fn from_plan(plan: &Plan) -> Self {
        let mut invocation = Self::new(plan.target());
        invocation.tty(true);
        if let Some(key) = plan.identity() {
            invocation.identity(key);
        }
        if let Some(command) = plan.remote_command() {
            invocation.remote_command(command);
        }
        invocation
    }

    /// Overrides the program (default: `ssh`).
    pub fn program(&mut self, program: impl Into<OsString>) -> &mut Self {
        self.program = program.into();
        self
    }

    pub fn identity(&mut self, key: impl AsRef<Path>) -> &mut Self {
        self.identity = Some(key.as_ref().to_path_buf());
        self
    }

    /// Fails instead of prompting for passwords.
    pub fn batch_mode(&mut self, enabled: bool) -> &mut Self {
        self.batch_mode = enabled;
        self
    }

    pub fn connect_timeout(&mut self, seconds: u32) -> &mut Self {
        self.connect_timeout = Some(seconds);
        self
    }

    /// Forces pseudo-terminal allocation (`-tt`).
    pub fn tty(&mut self, enabled: bool) -> &mut Self {
        self.tty = enabled;
        self
    }

    pub fn remote_command(&mut self, command: impl Into<String>) -> &mut Self {
        self.remote_command = Some(command.into());
        self
    }

    /// Argument vector, program excluded.
    pub fn args(&self) -> Vec<OsString> {
        let mut args = Vec::with_capacity(2 * self.options.len() + 8);
        let mut push_option = |value: String| {
            args.push(OsString::from("-o"));
            args.push(OsString::from(value));
        };

        for option in &self.options {
            push_option(option.clone());
        }
        if self.batch_mode {
            push_option("BatchMode=yes".to_string());
        }
        if let Some(seconds) = self.connect_timeout {
            push_option(format!("ConnectTimeout={seconds}"));
        }
        if let Some(key) = &self.identity {
            args.push(OsString::from("-i"));
            args.push(key.clone().into_os_string());
        }
        if self.tty {
            args.push(OsString::from("-tt"));
        }
        args.push(OsString::from(&self.target));
        if let Some(command) = &self.remote_command {
            args.push(OsString::from(command));
        }
        args
    }

    /// A [`Command`] ready to spawn; stdio is left to the caller.
    pub fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(self.args());
        command
    }

    /// Runs `ssh` attached to the current terminal and waits for it.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Spawn`] if `ssh` cannot be started.
    pub fn run(&self) -> Result<ExitStatus> {
        debug!(invocation = %self, "running ssh");
        self.command().status().map_err(|source| self.spawn_error(source))
    }

    pub(crate) fn spawn_error(&self, source: std::io::Error) -> TransportError {
        TransportError::Spawn {
            program: self.program.to_string_lossy().into_owned(),
            source,
        }
    }
}

impl fmt::Display for SshInvocation {
    /// Renders the invocation as a shell-style command line for display.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", display_arg(&self.program.to_string_lossy()))?;
        for arg in self.args() {
            write!(f, " {}", display_arg(&arg.to_string_lossy()))?;
        }
        Ok(())
    }
}

fn display_arg(arg: &str) -> String {
    let plain = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=@:+,%".contains(c));
    if plain {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}
