//! Remote execution plans.
//!
//! A [`Plan`] is the pure result of combining one [`CommandDef`] with a
//! target and an optional identity file. Nothing here touches the network or
//! spawns processes; the transport layer turns a plan into an `ssh`
//! invocation.
//!
//! Script and URL commands are gated: the install step only runs when the
//! command is not yet present on the router, and the command itself always
//! runs afterwards.
//!
//! ```text
//! command -v <name> >/dev/null 2>&1 || { <install>; }; <name>
//! ```

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::types::{CommandDef, CommandKind};

/// Directory used for downloaded installer scripts.
pub const FETCH_DIR: &str = "/tmp";

/// Login target on the router.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Target {
    pub user: String,
    pub address: String,
}

impl Target {
    pub fn new(user: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            address: address.into(),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.user, self.address)
    }
}

/// A fully assembled remote invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Plan {
    target: Target,
    identity: Option<PathBuf>,
    remote_command: Option<String>,
}

impl Plan {
    pub fn target(&self) -> &Target {
        &self.target
    }

    /// Private key passed to the transport, if any.
    pub fn identity(&self) -> Option<&Path> {
        self.identity.as_deref()
    }

    /// Command string run on the router. `None` for an interactive session.
    pub fn remote_command(&self) -> Option<&str> {
        self.remote_command.as_deref()
    }

    pub fn is_interactive(&self) -> bool {
        self.remote_command.is_none()
    }
}

/// Builder for [`Plan`] values.
///
/// # Examples
///
/// ```
/// use openwrt_connect_core::{CommandDef, CommandKind, PlanBuilder};
///
/// let cmd = CommandDef::new("tool").with_kind(CommandKind::RemoteFetch {
///     url: "https://example.com/tool.sh".into(),
/// });
/// let plan = PlanBuilder::new("192.168.1.1", "root")
///     .cache_token("1700000000")
///     .build(&cmd);
///
/// let remote = plan.remote_command().unwrap();
/// assert!(remote.contains("\"https://example.com/tool.sh?t=1700000000\""));
/// assert!(remote.ends_with("; tool"));
/// ```
#[derive(Debug, Clone)]
pub struct PlanBuilder {
    target: Target,
    identity: Option<PathBuf>,
    cache_token: Option<String>,
}

impl PlanBuilder {
    pub fn new(address: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            target: Target::new(user, address),
            identity: None,
            cache_token: None,
        }
    }

    /// Authenticates with the given private key.
    pub fn identity(mut self, key: impl Into<PathBuf>) -> Self {
        self.identity = Some(key.into());
        self
    }

    /// Same as [`identity`](Self::identity) but accepts an optional key.
    pub fn maybe_identity(mut self, key: Option<&Path>) -> Self {
        self.identity = key.map(Path::to_path_buf);
        self
    }

    /// Token appended to fetched URLs to bypass intermediate caches.
    pub fn cache_token(mut self, token: impl Into<String>) -> Self {
        self.cache_token = Some(token.into());
        self
    }

    /// Assembles the plan for `command`.
    pub fn build(&self, command: &CommandDef) -> Plan {
        let remote_command = match &command.kind {
            CommandKind::InteractiveSession => None,
            CommandKind::Script { body, .. } => {
                Some(gated(&command.name, &script_block(body)))
            }
            CommandKind::RemoteFetch { url } => {
                let url = with_cache_token(url, self.cache_token.as_deref());
                Some(gated(&command.name, &fetch_block(&command.name, &url)))
            }
            CommandKind::DirectCommand { command_line } => Some(command_line.clone()),
        };

        Plan {
            target: self.target.clone(),
            identity: self.identity.clone(),
            remote_command,
        }
    }

    /// Plan for a plain login shell.
    pub fn interactive(&self) -> Plan {
        Plan {
            target: self.target.clone(),
            identity: self.identity.clone(),
            remote_command: None,
        }
    }
}

/// Builds the plan for `command` without a cache token.
pub fn build_plan(command: &CommandDef, address: &str, user: &str, key: Option<&Path>) -> Plan {
    PlanBuilder::new(address, user)
        .maybe_identity(key)
        .build(command)
}

fn gated(name: &str, install: &str) -> String {
    format!("command -v {name} >/dev/null 2>&1 || {install}; {name}")
}

/// The body always sits on its own lines so a trailing `# comment` cannot
/// swallow the closing brace.
fn script_block(body: &str) -> String {
    let body = body.trim_end();
    if body.is_empty() {
        "{ :; }".to_string()
    } else {
        format!("{{\n{body}\n}}")
    }
}

fn fetch_block(name: &str, url: &str) -> String {
    let path = format!("{FETCH_DIR}/{name}.sh");
    format!(
        "{{ wget --no-check-certificate -q -O {path} \"{url}\" && chmod +x {path} && {path}; }}"
    )
}

fn with_cache_token(url: &str, token: Option<&str>) -> String {
    match token {
        Some(token) if url.contains('?') => format!("{url}&t={token}"),
        Some(token) => format!("{url}?t={token}"),
        None => url.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn script(name: &str, body: &str) -> CommandDef {
        CommandDef::new(name).with_kind(CommandKind::Script {
            body: body.into(),
            file: None,
        })
    }

    #[test]
    fn test_interactive_plan_has_no_remote_command() {
        let plan = build_plan(&CommandDef::new("shell"), "192.168.1.1", "root", None);
        assert!(plan.is_interactive());
        assert_eq!(plan.target().to_string(), "root@192.168.1.1");
        assert!(plan.identity().is_none());
    }

    #[test]
    fn test_script_plan_is_gated() {
        let plan = build_plan(&script("foo", "echo hi"), "192.168.1.1", "root", None);
        assert_eq!(
            plan.remote_command(),
            Some("command -v foo >/dev/null 2>&1 || {\necho hi\n}; foo")
        );
    }

    #[test]
    #[cfg(unix)]
    fn test_script_plans_pass_shell_syntax_check() {
        let commands = [
            script("foo", "echo hi # say hi"),
            script("luci", "opkg update\n# comment\nopkg install luci\n"),
            script("x", ""),
            CommandDef::new("tool").with_kind(CommandKind::RemoteFetch {
                url: "https://example.com/tool.sh?v=1".into(),
            }),
        ];
        let builder = PlanBuilder::new("192.168.1.1", "root").cache_token("42");
        for command in &commands {
            let plan = builder.build(command);
            let remote = plan.remote_command().unwrap();
            let status = std::process::Command::new("sh")
                .args(["-n", "-c", remote])
                .status()
                .unwrap();
            assert!(status.success(), "sh -n rejected: {remote}");
        }
    }

    #[test]
    fn test_multiline_script_plan_keeps_lines() {
        let plan = build_plan(
            &script("luci", "opkg update\nopkg install luci\n"),
            "10.0.0.1",
            "root",
            None,
        );
        assert_eq!(
            plan.remote_command(),
            Some("command -v luci >/dev/null 2>&1 || {\nopkg update\nopkg install luci\n}; luci")
        );
    }

    #[test]
    fn test_empty_script_body_still_valid_shell() {
        let plan = build_plan(&script("x", "  \n"), "10.0.0.1", "root", None);
        assert_eq!(
            plan.remote_command(),
            Some("command -v x >/dev/null 2>&1 || { :; }; x")
        );
    }

    #[test]
    fn test_fetch_plan_downloads_to_named_tmp_file() {
        let cmd = CommandDef::new("tool").with_kind(CommandKind::RemoteFetch {
            url: "https://example.com/tool.sh".into(),
        });
        let plan = build_plan(&cmd, "192.168.1.1", "root", None);
        assert_eq!(
            plan.remote_command(),
            Some(
                "command -v tool >/dev/null 2>&1 || { wget --no-check-certificate -q \
                 -O /tmp/tool.sh \"https://example.com/tool.sh\" && chmod +x /tmp/tool.sh \
                 && /tmp/tool.sh; }; tool"
            )
        );
    }

    #[test]
    fn test_cache_token_respects_existing_query() {
        assert_eq!(
            with_cache_token("https://x/a.sh?v=1", Some("42")),
            "https://x/a.sh?v=1&t=42"
        );
        assert_eq!(with_cache_token("https://x/a.sh", Some("42")), "https://x/a.sh?t=42");
        assert_eq!(with_cache_token("https://x/a.sh", None), "https://x/a.sh");
    }

    #[test]
    fn test_direct_command_is_literal() {
        let cmd = CommandDef::new("setup").with_kind(CommandKind::DirectCommand {
            command_line: "opkg update".into(),
        });
        let plan = build_plan(&cmd, "192.168.1.1", "admin", Some(Path::new("/k/id_rsa")));
        assert_eq!(plan.remote_command(), Some("opkg update"));
        assert_eq!(plan.identity(), Some(Path::new("/k/id_rsa")));
        assert_eq!(plan.target().to_string(), "admin@192.168.1.1");
    }

    #[test]
    fn test_build_is_deterministic() {
        let cmd = script("foo", "echo hi");
        let builder = PlanBuilder::new("192.168.1.1", "root").cache_token("1");
        assert_eq!(builder.build(&cmd), builder.build(&cmd));
    }
}
