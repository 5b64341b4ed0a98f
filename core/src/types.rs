//! Registry type definitions.
//!
//! A [`Config`] is built once from a `.conf` file and is read-only afterwards,
//! except for the script-file resolver filling in file-referenced bodies.
//! The types derive [`serde`] traits so the registry can be listed as JSON or
//! YAML by front ends.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Product name used when the `[general]` section does not override it.
pub const DEFAULT_PRODUCT_NAME: &str = "OpenWrt Connect";
/// Router address used when gateway detection finds nothing.
pub const DEFAULT_ADDRESS: &str = "192.168.1.1";
/// Remote login user.
pub const DEFAULT_REMOTE_USER: &str = "root";
/// Prefix of generated SSH key file names.
pub const DEFAULT_KEY_PREFIX: &str = "owrt-connect";

/// Content keys of a `[command.<name>]` section.
///
/// The first one encountered in a section decides the [`CommandKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKey {
    Script,
    Url,
    Cmd,
}

impl ContentKey {
    /// Key spelling as it appears in the config file.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Script => "script",
            Self::Url => "url",
            Self::Cmd => "cmd",
        }
    }

    /// Maps a config key to a content key, if it is one.
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "script" => Some(Self::Script),
            "url" => Some(Self::Url),
            "cmd" => Some(Self::Cmd),
            _ => None,
        }
    }
}

impl fmt::Display for ContentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Execution strategy of a command.
///
/// # Examples
///
/// ```
/// use openwrt_connect_core::CommandKind;
///
/// let kind = CommandKind::Script { body: String::new(), file: Some("./setup.sh".into()) };
/// assert!(kind.is_file_ref());
/// assert_eq!(kind.label(), "script");
/// assert_eq!(CommandKind::default(), CommandKind::InteractiveSession);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CommandKind {
    /// Open a login shell on the router (the default).
    #[default]
    InteractiveSession,
    /// Run `body` unless the command is already installed.
    Script {
        /// Script text. Empty until resolution for file references.
        body: String,
        /// The `./path` reference as written, for file-backed scripts.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        file: Option<String>,
    },
    /// Download and run an installer unless the command is already installed.
    RemoteFetch { url: String },
    /// Run a literal command line.
    DirectCommand { command_line: String },
}

impl CommandKind {
    /// Returns `true` for scripts loaded from a `./path` reference.
    pub fn is_file_ref(&self) -> bool {
        matches!(self, Self::Script { file: Some(_), .. })
    }

    /// Short human-readable type name.
    pub fn label(&self) -> &'static str {
        match self {
            Self::InteractiveSession => "ssh",
            Self::Script { .. } => "script",
            Self::RemoteFetch { .. } => "url",
            Self::DirectCommand { .. } => "cmd",
        }
    }
}

/// One `[command.<name>]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandDef {
    /// Name from the section header (never empty).
    pub name: String,
    /// Free-text description from the `label` key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Resolved execution strategy.
    #[serde(flatten)]
    pub kind: CommandKind,
    /// Content keys present in the section that did not decide `kind`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub shadowed: Vec<ContentKey>,
}

impl CommandDef {
    /// Creates an interactive-session command.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            label: None,
            kind: CommandKind::InteractiveSession,
            shadowed: Vec::new(),
        }
    }

    /// Sets the execution strategy.
    pub fn with_kind(mut self, kind: CommandKind) -> Self {
        self.kind = kind;
        self
    }

    /// Adds a label.
    pub fn with_label(mut self, label: &str) -> Self {
        self.label = Some(label.to_string());
        self
    }

    /// Label if present, otherwise the name.
    pub fn display_name(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.name)
    }
}

/// Parsed configuration: `[general]` settings plus the command registry.
///
/// # Examples
///
/// ```
/// use openwrt_connect_core::{CommandDef, Config};
///
/// let mut config = Config::default();
/// assert_eq!(config.remote_user, "root");
///
/// config.commands.push(CommandDef::new("shell"));
/// assert!(config.find_command("shell").is_some());
/// assert!(config.find_command("Shell").is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    pub product_name: String,
    pub default_address: String,
    pub remote_user: String,
    pub key_prefix: String,
    /// Commands in file order. Names may repeat.
    pub commands: Vec<CommandDef>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            product_name: DEFAULT_PRODUCT_NAME.to_string(),
            default_address: DEFAULT_ADDRESS.to_string(),
            remote_user: DEFAULT_REMOTE_USER.to_string(),
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            commands: Vec::new(),
        }
    }
}

impl Config {
    /// Finds a command by exact name. The first definition wins.
    pub fn find_command(&self, name: &str) -> Option<&CommandDef> {
        self.commands.iter().find(|c| c.name == name)
    }

    /// Command names in file order.
    pub fn command_names(&self) -> Vec<&str> {
        self.commands.iter().map(|c| c.name.as_str()).collect()
    }
}

/// Free-function form of [`Config::find_command`].
pub fn find_command<'a>(config: &'a Config, name: &str) -> Option<&'a CommandDef> {
    config.find_command(name)
}
