//! Per-router SSH key management.
//!
//! Each router address gets its own RSA key pair under `~/.ssh`, named
//! `<prefix>_<address with dots replaced>_rsa`. The first connection
//! generates the key, checks whether the router already accepts it, and if
//! not copies the public key over a password-authenticated session.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;

use openwrt_connect_core::Target;
use tracing::{debug, info, warn};
use wait_timeout::ChildExt;

use crate::error::{Result, TransportError};
use crate::ssh::SshInvocation;

/// Default `ssh-keygen` program, looked up on `PATH`.
pub const KEYGEN_PROGRAM: &str = "ssh-keygen";

/// Server-side `ConnectTimeout` for the key probe, in seconds.
pub const PROBE_CONNECT_TIMEOUT_SECS: u32 = 5;

/// Hard limit for the whole key probe.
const PROBE_WALL_TIMEOUT: Duration = Duration::from_secs(15);

/// Remote script that installs a public key read from stdin.
///
/// Refuses to touch hosts that are not OpenWrt, then appends the key to the
/// dropbear and OpenSSH authorized key files that exist.
pub const REGISTER_KEY_SCRIPT: &str = "\
[ -f /etc/openwrt_release ] || { echo 'ERROR: not an OpenWrt device, aborting.'; exit 1; }; \
KEY=/tmp/.owrt_connect_pubkey; cat > \"$KEY\"; \
if [ -d /etc/dropbear ]; then cat \"$KEY\" >> /etc/dropbear/authorized_keys && chmod 600 /etc/dropbear/authorized_keys; fi; \
if [ -d /root/.ssh ]; then cat \"$KEY\" >> /root/.ssh/authorized_keys && chmod 600 /root/.ssh/authorized_keys; fi; \
rm -f \"$KEY\"";

/// Locations of the key pair for one router.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPaths {
    pub ssh_dir: PathBuf,
    pub private_key: PathBuf,
    pub public_key: PathBuf,
}

impl KeyPaths {
    /// Key paths under `<home>/.ssh`.
    pub fn new(home: &Path, prefix: &str, address: &str) -> Self {
        let ssh_dir = home.join(".ssh");
        let name = key_file_name(prefix, address);
        Self {
            private_key: ssh_dir.join(&name),
            public_key: ssh_dir.join(format!("{name}.pub")),
            ssh_dir,
        }
    }

    /// Key paths under the current user's home directory.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::MissingHome`] when neither `HOME` nor
    /// `USERPROFILE` is set.
    pub fn for_current_user(prefix: &str, address: &str) -> Result<Self> {
        let home = home_dir().ok_or(TransportError::MissingHome)?;
        Ok(Self::new(&home, prefix, address))
    }

    pub fn exists(&self) -> bool {
        self.private_key.is_file()
    }
}

/// `<prefix>_<address>_rsa` with `.` replaced by `_`.
pub fn key_file_name(prefix: &str, address: &str) -> String {
    format!("{prefix}_{}_rsa", address.replace('.', "_"))
}

fn home_dir() -> Option<PathBuf> {
    ["HOME", "USERPROFILE"]
        .into_iter()
        .filter_map(std::env::var_os)
        .find(|value| !value.is_empty())
        .map(PathBuf::from)
}

/// Runs `ssh`-family programs for key setup.
#[derive(Debug, Clone)]
pub struct KeyManager {
    keygen_program: String,
    ssh_program: String,
}

impl Default for KeyManager {
    fn default() -> Self {
        Self {
            keygen_program: KEYGEN_PROGRAM.to_string(),
            ssh_program: crate::ssh::SSH_PROGRAM.to_string(),
        }
    }
}

impl KeyManager {
    pub fn new(keygen_program: impl Into<String>, ssh_program: impl Into<String>) -> Self {
        Self {
            keygen_program: keygen_program.into(),
            ssh_program: ssh_program.into(),
        }
    }

    /// Generates the key pair unless the private key already exists.
    ///
    /// Returns `true` when a new key was generated.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Spawn`] if `ssh-keygen` cannot be started and
    /// [`TransportError::KeyGeneration`] if it fails.
    pub fn ensure_key(&self, paths: &KeyPaths) -> Result<bool> {
        if paths.exists() {
            debug!(key = %paths.private_key.display(), "using existing key");
            return Ok(false);
        }

        std::fs::create_dir_all(&paths.ssh_dir)?;
        info!(key = %paths.private_key.display(), "generating SSH key");

        let status = Command::new(&self.keygen_program)
            .args(["-q", "-t", "rsa", "-N", "", "-f"])
            .arg(&paths.private_key)
            .stdin(Stdio::null())
            .status()
            .map_err(|source| TransportError::Spawn {
                program: self.keygen_program.clone(),
                source,
            })?;

        if !status.success() {
            return Err(TransportError::KeyGeneration(status));
        }
        Ok(true)
    }

    /// Returns `true` if the router accepts the key without a password.
    ///
    /// Spawn failures and timeouts count as "not accepted".
    pub fn test_key_auth(&self, paths: &KeyPaths, target: &Target) -> bool {
        let mut ssh = self.invocation(target);
        ssh.identity(&paths.private_key)
            .batch_mode(true)
            .connect_timeout(PROBE_CONNECT_TIMEOUT_SECS)
            .remote_command("exit");

        let mut child = match ssh
            .command()
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                debug!(error = %e, "failed to spawn ssh for key probe");
                return false;
            }
        };

        match child.wait_timeout(PROBE_WALL_TIMEOUT) {
            Ok(Some(status)) => {
                debug!(%target, accepted = status.success(), "key probe finished");
                status.success()
            }
            Ok(None) => {
                debug!(%target, timeout_secs = PROBE_WALL_TIMEOUT.as_secs(), "key probe timed out, killing ssh");
                let _ = child.kill();
                let _ = child.wait();
                false
            }
            Err(e) => {
                debug!(error = %e, "failed to wait on key probe");
                let _ = child.kill();
                let _ = child.wait();
                false
            }
        }
    }

    /// Copies the public key to the router. Prompts for the password once.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Io`] if the public key cannot be read,
    /// [`TransportError::Spawn`] if `ssh` cannot be started and
    /// [`TransportError::KeyRegistration`] if the remote side fails.
    pub fn send_public_key(&self, paths: &KeyPaths, target: &Target) -> Result<()> {
        let public_key = std::fs::read(&paths.public_key)?;

        let mut ssh = self.invocation(target);
        ssh.remote_command(REGISTER_KEY_SCRIPT);

        let mut child = ssh
            .command()
            .stdin(Stdio::piped())
            .spawn()
            .map_err(|source| ssh.spawn_error(source))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(&public_key)?;
        }
        let status = child.wait()?;

        if !status.success() {
            return Err(TransportError::KeyRegistration(status));
        }
        info!(%target, "public key registered");
        Ok(())
    }

    /// Prepares key authentication for `target`.
    ///
    /// Returns the private key to use, or `None` when no key could be
    /// generated and the session should fall back to password login.
    ///
    /// # Errors
    ///
    /// Fails when a key exists but could not be registered on the router.
    pub fn authorize(&self, paths: &KeyPaths, target: &Target) -> Result<Option<PathBuf>> {
        if let Err(err) = self.ensure_key(paths) {
            warn!(error = %err, "continuing with password authentication");
            return Ok(None);
        }
        if self.test_key_auth(paths, target) {
            return Ok(Some(paths.private_key.clone()));
        }
        self.send_public_key(paths, target)?;
        Ok(Some(paths.private_key.clone()))
    }

    fn invocation(&self, target: &Target) -> SshInvocation {
        let mut ssh = SshInvocation::new(target);
        ssh.program(&self.ssh_program);
        ssh
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_file_name() {
        assert_eq!(
            key_file_name("owrt-connect", "192.168.1.1"),
            "owrt-connect_192_168_1_1_rsa"
        );
    }

    #[test]
    fn test_key_paths_layout() {
        let paths = KeyPaths::new(Path::new("/home/u"), "travel", "10.0.0.1");
        assert_eq!(paths.ssh_dir, PathBuf::from("/home/u/.ssh"));
        assert_eq!(
            paths.private_key,
            PathBuf::from("/home/u/.ssh/travel_10_0_0_1_rsa")
        );
        assert_eq!(
            paths.public_key,
            PathBuf::from("/home/u/.ssh/travel_10_0_0_1_rsa.pub")
        );
    }

    #[test]
    fn test_ensure_key_keeps_existing_key() {
        let home = tempfile::tempdir().unwrap();
        let paths = KeyPaths::new(home.path(), "p", "10.0.0.1");
        std::fs::create_dir_all(&paths.ssh_dir).unwrap();
        std::fs::write(&paths.private_key, "existing").unwrap();

        let manager = KeyManager::new("/nonexistent/ssh-keygen", "/nonexistent/ssh");
        assert!(!manager.ensure_key(&paths).unwrap());
    }

    #[test]
    fn test_ensure_key_reports_missing_keygen() {
        let home = tempfile::tempdir().unwrap();
        let paths = KeyPaths::new(home.path(), "p", "10.0.0.1");

        let manager = KeyManager::new("/nonexistent/ssh-keygen", "/nonexistent/ssh");
        let err = manager.ensure_key(&paths).unwrap_err();
        assert!(matches!(err, TransportError::Spawn { .. }));
        assert!(paths.ssh_dir.is_dir());
    }

    #[test]
    fn test_probe_with_missing_ssh_is_rejected() {
        let home = tempfile::tempdir().unwrap();
        let paths = KeyPaths::new(home.path(), "p", "10.0.0.1");
        let manager = KeyManager::new("/nonexistent/ssh-keygen", "/nonexistent/ssh");
        assert!(!manager.test_key_auth(&paths, &Target::new("root", "10.0.0.1")));
    }

    #[test]
    fn test_authorize_falls_back_to_password_without_keygen() {
        let home = tempfile::tempdir().unwrap();
        let paths = KeyPaths::new(home.path(), "p", "10.0.0.1");
        let manager = KeyManager::new("/nonexistent/ssh-keygen", "/nonexistent/ssh");
        let key = manager
            .authorize(&paths, &Target::new("root", "10.0.0.1"))
            .unwrap();
        assert!(key.is_none());
    }

    #[test]
    fn test_register_script_guards_non_openwrt_hosts() {
        assert!(REGISTER_KEY_SCRIPT.starts_with("[ -f /etc/openwrt_release ] ||"));
        assert!(REGISTER_KEY_SCRIPT.contains("/etc/dropbear/authorized_keys"));
        assert!(REGISTER_KEY_SCRIPT.ends_with("rm -f \"$KEY\""));
    }
}
