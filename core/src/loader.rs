//! Config discovery and loading.
//!
//! At most one config file is read: the first `*.conf` file, in file-name
//! order, of the config directory. A missing or unreadable file is not an
//! error; the built-in defaults are used and a warning is reported.
//!
//! ```no_run
//! use openwrt_connect_core::LoadedConfig;
//!
//! let loaded = LoadedConfig::from_dir("/opt/openwrt-connect");
//! for warning in &loaded.warnings {
//!     eprintln!("warning: {warning}");
//! }
//! println!("{} command(s)", loaded.config.commands.len());
//! ```

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::error::{ConfigError, Result};
use crate::parser::parse;
use crate::resolve::{FsScriptReader, ScriptReader, resolve_script_files};
use crate::types::Config;

/// File extension of config files.
pub const CONFIG_EXTENSION: &str = "conf";

/// A config together with where it came from and non-fatal problems.
#[derive(Debug)]
pub struct LoadedConfig {
    pub config: Config,
    /// File the config was read from; `None` when defaults are used.
    pub source: Option<PathBuf>,
    /// [`ConfigError::NotFound`], [`ConfigError::Io`] and
    /// [`ConfigError::ScriptFileMissing`] entries collected while loading.
    pub warnings: Vec<ConfigError>,
}

impl LoadedConfig {
    /// Discovers and loads the config in `dir`.
    ///
    /// Never fails: a missing file, an unreadable directory or an unreadable
    /// config file yields the built-in defaults plus a warning.
    pub fn from_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        let Some(path) = find_config_file(dir) else {
            warn!(dir = %dir.display(), "no .conf file found; using built-in defaults");
            return Self::defaults(ConfigError::NotFound(dir.to_path_buf()));
        };
        Self::from_file_or_defaults(path)
    }

    /// Loads `path`, falling back to the built-in defaults when the file
    /// cannot be read. The read error is kept as a warning.
    pub fn from_file_or_defaults(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match Self::from_file(path) {
            Ok(loaded) => loaded,
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "cannot read config file; using built-in defaults"
                );
                Self::defaults(err)
            }
        }
    }

    fn defaults(warning: ConfigError) -> Self {
        Self {
            config: Config::default(),
            source: None,
            warnings: vec![warning],
        }
    }

    /// Loads a specific config file, resolving scripts next to it.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_file_with(path, &FsScriptReader)
    }

    /// Like [`from_file`](Self::from_file) with a custom script reader.
    pub fn from_file_with(path: impl AsRef<Path>, reader: &impl ScriptReader) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));

        let (config, warnings) =
            parse_config_with(&String::from_utf8_lossy(&bytes), base_dir, reader);
        info!(
            path = %path.display(),
            commands = ?config.command_names(),
            "loaded config"
        );

        Ok(Self {
            config,
            source: Some(path.to_path_buf()),
            warnings,
        })
    }
}

/// Parses config text and resolves script files relative to `base_dir`.
///
/// Unreadable script files leave their bodies empty and are returned as
/// [`ConfigError::ScriptFileMissing`] warnings.
pub fn parse_config(input: &str, base_dir: &Path) -> (Config, Vec<ConfigError>) {
    parse_config_with(input, base_dir, &FsScriptReader)
}

fn parse_config_with(
    input: &str,
    base_dir: &Path,
    reader: &impl ScriptReader,
) -> (Config, Vec<ConfigError>) {
    let mut config = parse(input);
    let warnings = resolve_script_files(&mut config, base_dir, reader);
    (config, warnings)
}

/// Returns the first `*.conf` regular file in `dir`, by file name.
pub fn find_config_file(dir: &Path) -> Option<PathBuf> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) => {
            warn!(dir = %dir.display(), error = %err, "cannot list config directory");
            return None;
        }
    };

    entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file()
                && path.extension().and_then(|e| e.to_str()) == Some(CONFIG_EXTENSION)
        })
        .min_by(|a, b| a.file_name().cmp(&b.file_name()))
}
