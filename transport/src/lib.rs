//! External collaborators of `openwrt-connect`.
//!
//! Everything that touches the host lives here, behind narrow functions that
//! the CLI calls in sequence:
//!
//! - [`detect_router_address`] — private default gateway from the routing
//!   table.
//! - [`KeyPaths`] / [`KeyManager`] — per-router RSA key generation, probe and
//!   registration via `ssh-keygen` and `ssh`.
//! - [`SshInvocation`] — the `ssh` argument vector for a
//!   [`Plan`](openwrt_connect_core::Plan), runnable or printable.
//!
//! # Example
//!
//! ```
//! use openwrt_connect_core::{CommandDef, CommandKind, PlanBuilder};
//! use openwrt_connect_transport::SshInvocation;
//!
//! let cmd = CommandDef::new("setup").with_kind(CommandKind::DirectCommand {
//!     command_line: "opkg update".into(),
//! });
//! let plan = PlanBuilder::new("192.168.1.1", "root").build(&cmd);
//! let ssh = SshInvocation::from_plan(&plan);
//! assert!(ssh.to_string().ends_with("-tt root@192.168.1.1 'opkg update'"));
//! ```

mod error;
mod keys;
mod network;
mod ssh;

pub use error::{Result, TransportError};
pub use keys::{
    KEYGEN_PROGRAM, KeyManager, KeyPaths, PROBE_CONNECT_TIMEOUT_SECS, REGISTER_KEY_SCRIPT,
    key_file_name,
};
pub use network::{
    ROUTE_TABLE_PATH, Route, detect_router_address, is_private_address, parse_route_table,
    private_default_gateway,
};
pub use ssh::{SSH_PROGRAM, SshInvocation, host_key_options};
