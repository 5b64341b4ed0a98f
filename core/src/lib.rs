//! Config parsing and remote plan assembly for `openwrt-connect`.
//!
//! This crate turns a `.conf` file into a command registry and a chosen
//! command into a remote execution [`Plan`]:
//!
//! - [`parse`] — single-pass section state machine producing a [`Config`].
//! - [`resolve_script_files`] — loads `script = ./file` bodies through a
//!   [`ScriptReader`].
//! - [`LoadedConfig`] — discovers the first `*.conf` file in a directory and
//!   runs both steps.
//! - [`Config::find_command`] — first-match lookup by name.
//! - [`PlanBuilder`] / [`build_plan`] — assembles the remote command string
//!   for a [`CommandDef`].
//! - [`validate_config`] — lints definitions that parse but are suspicious.
//!
//! Nothing here opens connections or spawns processes.
//!
//! # Example
//!
//! ```
//! use openwrt_connect_core::*;
//!
//! let config = parse(
//!     "[general]\n\
//!      ssh_user = admin\n\
//!      [command.setup]\n\
//!      cmd = opkg update\n",
//! );
//!
//! let setup = config.find_command("setup").unwrap();
//! let plan = build_plan(setup, "192.168.1.1", &config.remote_user, None);
//! assert_eq!(plan.remote_command(), Some("opkg update"));
//! assert_eq!(plan.target().to_string(), "admin@192.168.1.1");
//! ```

mod error;
mod loader;
mod parser;
mod plan;
mod resolve;
mod types;
mod validate;

pub use error::{ConfigError, Result};
pub use loader::{CONFIG_EXTENSION, LoadedConfig, find_config_file, parse_config};
pub use parser::{ends_multiline_script, parse};
pub use plan::{FETCH_DIR, Plan, PlanBuilder, Target, build_plan};
pub use resolve::{FsScriptReader, ScriptReader, resolve_script_files, script_path};
pub use types::*;
pub use validate::{ValidationError, validate_config};
