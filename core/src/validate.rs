//! Config linting.
//!
//! The parser accepts anything; this module points out definitions that
//! parse but probably do not do what the author meant, such as a second
//! `[command.x]` that lookup can never reach or a section mixing `script`
//! and `url`.
//!
//! # Examples
//!
//! ```
//! use openwrt_connect_core::{ValidationError, parse, validate_config};
//!
//! let config = parse("[command.x]\ncmd = uptime\n");
//! assert!(validate_config(&config).is_empty());
//!
//! let config = parse("[command.x]\nscript = echo a\nurl = https://e/x.sh\n");
//! assert!(matches!(
//!     validate_config(&config).as_slice(),
//!     [ValidationError::ShadowedContentKey { .. }]
//! ));
//! ```

use std::collections::HashSet;
use std::net::Ipv4Addr;

use thiserror::Error;

use crate::types::{CommandKind, Config, ContentKey};

/// Lint findings for a parsed [`Config`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// `default_ip` is not an IPv4 dotted quad.
    #[error("default_ip is not an IPv4 address: {0}")]
    InvalidDefaultAddress(String),
    /// A later section reuses a command name and is never selected.
    #[error("duplicate command '{0}': only the first definition is used")]
    DuplicateCommand(String),
    /// More than one content key in one section.
    #[error("command '{command}' also defines '{key}', which is ignored")]
    ShadowedContentKey { command: String, key: ContentKey },
    /// A script command with nothing to run.
    #[error("command '{0}' has an empty script")]
    EmptyScript(String),
    /// A fetch URL without an http(s) scheme.
    #[error("command '{command}' has an invalid url: {url}")]
    InvalidUrl { command: String, url: String },
}

/// Lints a parsed config. Findings are returned in file order.
pub fn validate_config(config: &Config) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if config.default_address.parse::<Ipv4Addr>().is_err() {
        errors.push(ValidationError::InvalidDefaultAddress(
            config.default_address.clone(),
        ));
    }

    let mut seen: HashSet<&str> = HashSet::new();
    for command in &config.commands {
        if !seen.insert(command.name.as_str()) {
            errors.push(ValidationError::DuplicateCommand(command.name.clone()));
        }

        errors.extend(
            command
                .shadowed
                .iter()
                .map(|key| ValidationError::ShadowedContentKey {
                    command: command.name.clone(),
                    key: *key,
                }),
        );

        match &command.kind {
            CommandKind::Script { body, .. } if body.trim().is_empty() => {
                errors.push(ValidationError::EmptyScript(command.name.clone()));
            }
            CommandKind::RemoteFetch { url }
                if !(url.starts_with("http://") || url.starts_with("https://")) =>
            {
                errors.push(ValidationError::InvalidUrl {
                    command: command.name.clone(),
                    url: url.clone(),
                });
            }
            _ => {}
        }
    }

    errors
}
