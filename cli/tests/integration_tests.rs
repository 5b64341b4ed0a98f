use std::path::Path;
use std::process::{Command, Output};

const SAMPLE_CONF: &str = "\
[general]
product_name = Test Router
ssh_user = admin
ssh_key_prefix = test

[command.shell]
label = Plain shell

[command.setup]
label = Refresh package lists
cmd = opkg update

[command.luci]
script =
  opkg update
  opkg install luci

[command.tool]
url = https://example.com/tool.sh
";

/// Runs the binary with an isolated home directory so no real keys are used.
fn run_cli(home: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_openwrt-connect"))
        .args(args)
        .env("HOME", home)
        .env("USERPROFILE", home)
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to run openwrt-connect")
}

fn write_conf(dir: &Path, contents: &str) {
    std::fs::write(dir.join("router.conf"), contents).expect("failed to write conf");
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

// ---------------------------------------------------------------------------
// --list
// ---------------------------------------------------------------------------

#[test]
fn list_shows_commands_in_file_order() {
    let dir = tempfile::tempdir().unwrap();
    write_conf(dir.path(), SAMPLE_CONF);
    let conf_dir = dir.path().to_str().unwrap();

    let output = run_cli(dir.path(), &["--config-dir", conf_dir, "--list"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let out = stdout(&output);
    assert!(out.starts_with("Available commands (router.conf):"));
    let positions: Vec<usize> = ["shell", "setup", "luci", "tool"]
        .iter()
        .map(|name| out.find(&format!("  {name} ")).expect(name))
        .collect();
    assert!(positions.windows(2).all(|w| w[0] < w[1]));
    assert!(out.contains("(SSH only)"));
    assert!(out.contains("cmd: opkg update"));
    assert!(out.contains("script: opkg update (+1 lines)"));
    assert!(out.contains("url: https://example.com/tool.sh"));
}

#[test]
fn list_json_is_machine_readable() {
    let dir = tempfile::tempdir().unwrap();
    write_conf(dir.path(), SAMPLE_CONF);
    let conf_dir = dir.path().to_str().unwrap();

    let output = run_cli(
        dir.path(),
        &["--config-dir", conf_dir, "--list", "--format", "json"],
    );
    assert!(output.status.success());

    let commands: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let commands = commands.as_array().unwrap();
    assert_eq!(commands.len(), 4);
    assert_eq!(commands[1]["name"], "setup");
    assert_eq!(commands[1]["type"], "direct_command");
    assert_eq!(commands[1]["command_line"], "opkg update");
    assert_eq!(commands[3]["type"], "remote_fetch");
}

#[test]
fn list_without_config_uses_defaults_and_warns() {
    let dir = tempfile::tempdir().unwrap();
    let conf_dir = dir.path().to_str().unwrap();

    let output = run_cli(dir.path(), &["--config-dir", conf_dir, "--list"]);
    assert!(output.status.success());
    assert!(stdout(&output).starts_with("Available commands (built-in defaults):"));
    assert!(stderr(&output).contains("no .conf file found"));
}

// ---------------------------------------------------------------------------
// Command resolution
// ---------------------------------------------------------------------------

#[test]
fn unknown_command_exits_with_one() {
    let dir = tempfile::tempdir().unwrap();
    write_conf(dir.path(), SAMPLE_CONF);
    let conf_dir = dir.path().to_str().unwrap();

    let output = run_cli(
        dir.path(),
        &["--config-dir", conf_dir, "--ip", "10.0.0.1", "--dry-run", "nope"],
    );
    assert_eq!(output.status.code(), Some(1));
    let err = stderr(&output);
    assert!(err.contains("error: unknown command: nope"));
    assert!(err.contains("  setup - Refresh package lists"));
}

#[test]
fn dry_run_direct_command_is_literal() {
    let dir = tempfile::tempdir().unwrap();
    write_conf(dir.path(), SAMPLE_CONF);
    let conf_dir = dir.path().to_str().unwrap();

    let output = run_cli(
        dir.path(),
        &["--config-dir", conf_dir, "--ip", "192.168.1.1", "--dry-run", "setup"],
    );
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let line = stdout(&output);
    assert!(line.starts_with("ssh -o StrictHostKeyChecking=no"));
    assert!(line.trim_end().ends_with("-tt admin@192.168.1.1 'opkg update'"));
    assert!(!line.contains("command -v"));
    assert!(!line.contains(" -i "));
}

#[test]
fn dry_run_script_command_is_gated() {
    let dir = tempfile::tempdir().unwrap();
    write_conf(dir.path(), SAMPLE_CONF);
    let conf_dir = dir.path().to_str().unwrap();

    let output = run_cli(
        dir.path(),
        &["--config-dir", conf_dir, "--ip", "192.168.1.1", "--dry-run", "luci"],
    );
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let out = stdout(&output);
    assert!(out.contains("'command -v luci >/dev/null 2>&1 || {\nopkg update\nopkg install luci\n}; luci'"));
}

#[test]
fn dry_run_interactive_uses_existing_key() {
    let dir = tempfile::tempdir().unwrap();
    write_conf(dir.path(), SAMPLE_CONF);
    let conf_dir = dir.path().to_str().unwrap();
    let ssh_dir = dir.path().join(".ssh");
    std::fs::create_dir_all(&ssh_dir).unwrap();
    std::fs::write(ssh_dir.join("test_10_0_0_1_rsa"), "key").unwrap();

    let output = run_cli(
        dir.path(),
        &["--config-dir", conf_dir, "--ip", "10.0.0.1", "--dry-run"],
    );
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let line = stdout(&output);
    assert!(line.contains(" -i "));
    assert!(line.contains("test_10_0_0_1_rsa"));
    assert!(line.trim_end().ends_with("-tt admin@10.0.0.1"));
}

// ---------------------------------------------------------------------------
// --check
// ---------------------------------------------------------------------------

#[test]
fn check_passes_clean_config() {
    let dir = tempfile::tempdir().unwrap();
    write_conf(dir.path(), SAMPLE_CONF);
    let conf_dir = dir.path().to_str().unwrap();

    let output = run_cli(dir.path(), &["--config-dir", conf_dir, "--check"]);
    assert!(output.status.success(), "stdout: {}", stdout(&output));
    assert!(stdout(&output).contains("Config OK: 4 command(s)."));
}

#[test]
fn check_reports_shadowed_keys() {
    let dir = tempfile::tempdir().unwrap();
    write_conf(
        dir.path(),
        "[command.x]\nscript = echo x\nurl = https://example.com/x.sh\n",
    );
    let conf_dir = dir.path().to_str().unwrap();

    let output = run_cli(dir.path(), &["--config-dir", conf_dir, "--check"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stdout(&output).contains("command 'x' also defines 'url', which is ignored"));
    assert!(stderr(&output).contains("1 config issue(s) found"));
}
