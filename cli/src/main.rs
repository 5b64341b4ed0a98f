use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use clap::{ArgAction, Parser};
use openwrt_connect_core::{
    CommandDef, CommandKind, Config, ConfigError, LoadedConfig, PlanBuilder, Target,
    validate_config,
};
use openwrt_connect_transport::{KeyManager, KeyPaths, SshInvocation, detect_router_address};
use tracing::warn;
use tracing_subscriber::EnvFilter;

const BANNER_RULE: &str = "========================================";

/// Output format for `--list`.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum ListFormat {
    Text,
    Json,
    Yaml,
}

#[derive(Debug, Parser)]
#[command(name = "openwrt-connect", version)]
#[command(about = "Connect to an OpenWrt router and run commands defined in a .conf file")]
struct Cli {
    /// Command defined as [command.<name>] in the config. Omit for an interactive session.
    command: Option<String>,
    /// List available commands.
    #[arg(long, conflicts_with = "command")]
    list: bool,
    /// Output format for --list.
    #[arg(long, default_value = "text")]
    format: ListFormat,
    /// Lint the config and exit non-zero on findings.
    #[arg(long, conflicts_with_all = ["command", "list"])]
    check: bool,
    /// Router address; skips gateway detection and the address prompt.
    #[arg(long)]
    ip: Option<String>,
    /// Print the ssh invocation instead of running it.
    #[arg(long)]
    dry_run: bool,
    /// Directory searched for the .conf file (default: the executable's directory).
    #[arg(long)]
    config_dir: Option<PathBuf>,
    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(err) = run(cli) {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn init_logging(verbosity: u8) {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = match verbosity {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        };
        EnvFilter::new(format!(
            "openwrt_connect={level},openwrt_connect_core={level},openwrt_connect_transport={level}"
        ))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: Cli) -> Result<(), String> {
    let config_dir = cli.config_dir.clone().unwrap_or_else(default_config_dir);
    let loaded = LoadedConfig::from_dir(&config_dir);

    if cli.list {
        return print_list(&loaded, cli.format);
    }
    if cli.check {
        return run_check(&loaded.config);
    }

    let config = &loaded.config;
    let command = match cli.command.as_deref() {
        Some(name) => Some(
            config
                .find_command(name)
                .ok_or_else(|| unknown_command_message(config, name))?,
        ),
        None => None,
    };

    if !cli.dry_run {
        print_banner(config, command);
    }

    let address = match cli.ip {
        Some(ip) => ip,
        None => prompt_address(config)?,
    };

    let identity = if cli.dry_run {
        existing_key(config, &address)
    } else {
        authorize_key(config, &address)?
    };

    let builder = PlanBuilder::new(address.as_str(), config.remote_user.as_str())
        .maybe_identity(identity.as_deref())
        .cache_token(chrono::Utc::now().timestamp().to_string());
    let plan = match command {
        Some(command) => builder.build(command),
        None => builder.interactive(),
    };
    let invocation = SshInvocation::from_plan(&plan);

    if cli.dry_run {
        println!("{invocation}");
        return Ok(());
    }

    println!();
    println!("Target: {}", plan.target());
    match command {
        Some(command) if !plan.is_interactive() => {
            println!("Command: {}", command.name);
            println!();
            println!("Connecting and executing command...");
        }
        _ => {
            println!();
            println!("Connecting...");
        }
    }
    println!();

    let status = invocation.run().map_err(|e| e.to_string())?;

    if plan.is_interactive() {
        return Ok(());
    }
    println!();
    println!("{BANNER_RULE}");
    if status.success() {
        println!("Completed successfully");
        println!("{BANNER_RULE}");
        Ok(())
    } else {
        println!("Failed - please check the error messages above");
        println!("{BANNER_RULE}");
        Err(format!("remote command failed ({status})"))
    }
}

fn default_config_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."))
}

fn unknown_command_message(config: &Config, name: &str) -> String {
    let mut message = ConfigError::UnknownCommand(name.to_string()).to_string();
    message.push_str("\n\nAvailable commands:\n");
    for command in &config.commands {
        match &command.label {
            Some(label) => message.push_str(&format!("  {} - {label}\n", command.name)),
            None => message.push_str(&format!("  {}\n", command.name)),
        }
    }
    message.push_str("\nUse --help for more information.");
    message
}

// ---------------------------------------------------------------------------
// --list / --check
// ---------------------------------------------------------------------------

fn print_list(loaded: &LoadedConfig, format: ListFormat) -> Result<(), String> {
    let commands = &loaded.config.commands;
    match format {
        ListFormat::Json => {
            let json = serde_json::to_string_pretty(commands)
                .map_err(|e| format!("Failed to serialize commands: {e}"))?;
            println!("{json}");
        }
        ListFormat::Yaml => {
            let yaml = serde_yaml::to_string(commands)
                .map_err(|e| format!("Failed to serialize commands: {e}"))?;
            print!("{yaml}");
        }
        ListFormat::Text => {
            let source = loaded
                .source
                .as_deref()
                .and_then(Path::file_name)
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| "built-in defaults".to_string());
            println!("Available commands ({source}):");
            println!();
            for command in commands {
                print!("{}", describe_command(command));
                println!();
            }
        }
    }
    Ok(())
}

fn describe_command(command: &CommandDef) -> String {
    let label = command.label.as_deref().unwrap_or("");
    let detail = match &command.kind {
        CommandKind::InteractiveSession => {
            return format!("  {:<12} {label} (SSH only)\n", command.name);
        }
        CommandKind::Script {
            file: Some(file), ..
        } => format!("script: {file}"),
        CommandKind::Script { body, .. } => {
            let mut lines = body.lines().filter(|l| !l.trim().is_empty());
            let first = lines.next().unwrap_or("");
            match lines.count() {
                0 => format!("script: {first}"),
                more => format!("script: {first} (+{more} lines)"),
            }
        }
        CommandKind::RemoteFetch { url } => format!("url: {url}"),
        CommandKind::DirectCommand { command_line } => format!("cmd: {command_line}"),
    };
    format!("  {:<12} {label}\n  {:12} {detail}\n", command.name, "")
}

fn run_check(config: &Config) -> Result<(), String> {
    let findings = validate_config(config);
    if findings.is_empty() {
        println!("Config OK: {} command(s).", config.commands.len());
        return Ok(());
    }
    for finding in &findings {
        println!("  {finding}");
    }
    Err(format!("{} config issue(s) found", findings.len()))
}

// ---------------------------------------------------------------------------
// Interactive setup
// ---------------------------------------------------------------------------

fn print_banner(config: &Config, command: Option<&CommandDef>) {
    let title = command.map_or("SSH Connection", CommandDef::display_name);
    println!("{BANNER_RULE}");
    println!("{} - {title}", config.product_name);
    println!("{BANNER_RULE}");
    println!();
}

fn prompt_address(config: &Config) -> Result<String, String> {
    let default = detect_router_address()
        .map(|ip| ip.to_string())
        .unwrap_or_else(|| config.default_address.clone());

    print!("Enter {} IP address [{default}]: ", config.product_name);
    std::io::stdout()
        .flush()
        .map_err(|e| format!("Failed to write prompt: {e}"))?;

    let mut input = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut input)
        .map_err(|e| format!("Failed to read address: {e}"))?;

    let input = input.trim();
    Ok(if input.is_empty() {
        default
    } else {
        input.to_string()
    })
}

fn existing_key(config: &Config, address: &str) -> Option<PathBuf> {
    KeyPaths::for_current_user(&config.key_prefix, address)
        .ok()
        .filter(KeyPaths::exists)
        .map(|paths| paths.private_key)
}

fn authorize_key(config: &Config, address: &str) -> Result<Option<PathBuf>, String> {
    let paths = match KeyPaths::for_current_user(&config.key_prefix, address) {
        Ok(paths) => paths,
        Err(err) => {
            warn!(error = %err, "skipping key authentication");
            return Ok(None);
        }
    };
    let target = Target::new(config.remote_user.as_str(), address);
    KeyManager::default()
        .authorize(&paths, &target)
        .map_err(|e| e.to_string())
}
