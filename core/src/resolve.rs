//! Script file resolution.
//!
//! `script = ./path` values are stored as references by the parser. This
//! module reads them, relative to the directory holding the config file, and
//! stores the file contents as the script body.

use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::ConfigError;
use crate::types::{CommandKind, Config};

/// Source of script file contents.
pub trait ScriptReader {
    fn read_script(&self, path: &Path) -> io::Result<String>;
}

/// Reads script files from the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsScriptReader;

impl ScriptReader for FsScriptReader {
    fn read_script(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }
}

impl<F> ScriptReader for F
where
    F: Fn(&Path) -> io::Result<String>,
{
    fn read_script(&self, path: &Path) -> io::Result<String> {
        self(path)
    }
}

/// Path of a script reference relative to `base_dir`.
pub fn script_path(base_dir: &Path, reference: &str) -> PathBuf {
    base_dir.join(reference.strip_prefix("./").unwrap_or(reference))
}

/// Loads every file-referenced script body.
///
/// A file that cannot be read leaves the body empty. Each such failure is
/// logged and returned as [`ConfigError::ScriptFileMissing`]; the remaining
/// commands are still resolved.
///
/// # Examples
///
/// ```
/// use std::io;
/// use std::path::Path;
/// use openwrt_connect_core::{CommandKind, parse, resolve_script_files};
///
/// let mut config = parse("[command.setup]\nscript = ./setup.sh\n");
/// let reader = |path: &Path| -> io::Result<String> {
///     assert_eq!(path, Path::new("/etc/owrt/setup.sh"));
///     Ok("opkg update\n".to_string())
/// };
/// let warnings = resolve_script_files(&mut config, Path::new("/etc/owrt"), &reader);
/// assert!(warnings.is_empty());
///
/// let CommandKind::Script { body, .. } = &config.commands[0].kind else { unreachable!() };
/// assert_eq!(body, "opkg update\n");
/// ```
pub fn resolve_script_files(
    config: &mut Config,
    base_dir: &Path,
    reader: &impl ScriptReader,
) -> Vec<ConfigError> {
    let mut warnings = Vec::new();

    for command in &mut config.commands {
        let CommandKind::Script {
            body,
            file: Some(reference),
        } = &mut command.kind
        else {
            continue;
        };

        let path = script_path(base_dir, reference);
        match reader.read_script(&path) {
            Ok(contents) => {
                debug!(
                    command = %command.name,
                    path = %path.display(),
                    bytes = contents.len(),
                    "loaded script file"
                );
                *body = contents;
            }
            Err(source) => {
                warn!(
                    command = %command.name,
                    path = %path.display(),
                    error = %source,
                    "script file could not be read; leaving script empty"
                );
                body.clear();
                warnings.push(ConfigError::ScriptFileMissing { path, source });
            }
        }
    }

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn body_of(config: &Config, name: &str) -> String {
        match &config.find_command(name).unwrap().kind {
            CommandKind::Script { body, .. } => body.clone(),
            other => panic!("expected script, got {other:?}"),
        }
    }

    #[test]
    fn test_script_path_strips_dot_slash() {
        assert_eq!(
            script_path(Path::new("/opt/conf"), "./scripts/a.sh"),
            PathBuf::from("/opt/conf/scripts/a.sh")
        );
        assert_eq!(
            script_path(Path::new("/opt/conf"), "../shared/a.sh"),
            PathBuf::from("/opt/conf/../shared/a.sh")
        );
    }

    #[test]
    fn test_missing_file_leaves_body_empty_and_continues() {
        let mut config = parse(
            "[command.gone]\nscript = ./missing.sh\n[command.ok]\nscript = ./ok.sh\n",
        );
        let reader = |path: &Path| -> io::Result<String> {
            if path.ends_with("ok.sh") {
                Ok("echo ok\n".into())
            } else {
                Err(io::Error::new(io::ErrorKind::NotFound, "missing"))
            }
        };

        let warnings = resolve_script_files(&mut config, Path::new("/base"), &reader);

        assert_eq!(warnings.len(), 1);
        assert!(matches!(
            &warnings[0],
            ConfigError::ScriptFileMissing { path, .. } if path == Path::new("/base/missing.sh")
        ));
        assert_eq!(body_of(&config, "gone"), "");
        assert_eq!(body_of(&config, "ok"), "echo ok\n");
        assert!(config.find_command("ok").unwrap().kind.is_file_ref());
    }

    #[test]
    fn test_inline_scripts_are_not_read() {
        let mut config = parse("[command.a]\nscript = echo a\n[command.b]\ncmd = uptime\n");
        let reader = |_: &Path| -> io::Result<String> { panic!("no file should be read") };
        let warnings = resolve_script_files(&mut config, Path::new("."), &reader);
        assert!(warnings.is_empty());
        assert_eq!(body_of(&config, "a"), "echo a");
    }

    #[test]
    fn test_fs_reader_reads_relative_to_base_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("scripts")).unwrap();
        std::fs::write(dir.path().join("scripts/setup.sh"), "#!/bin/sh\necho setup\n").unwrap();

        let mut config = parse("[command.setup]\nscript = ./scripts/setup.sh\n");
        let warnings = resolve_script_files(&mut config, dir.path(), &FsScriptReader);

        assert!(warnings.is_empty());
        assert_eq!(body_of(&config, "setup"), "#!/bin/sh\necho setup\n");
    }
}
