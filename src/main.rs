//! WakaTime Agent CLI
//!
//! Reads editor events as JSON lines on stdin and forwards them to the
//! wakatime reporter.

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use crossbeam_channel::{bounded, RecvTimeoutError};
use std::io::BufRead;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{info, warn};
use wakatime_agent::{
    config::Config,
    credentials::{EnvCredentialStore, MemoryCredentialStore, SharedCredentials, API_KEY_TOKEN},
    editor::{EditorEvent, HostInfo},
    install::{resolve_install_dir, BlockingReleaseClient, Platform, Provisioner, ReleaseConfig},
    logging::init_tracing,
    transparency::{create_shared_log_with_persistence, read_persisted},
    Agent, AgentOptions, VERSION,
};

#[derive(Parser)]
#[command(name = "wakatime-agent")]
#[command(author = "WakaTime")]
#[command(version = VERSION)]
#[command(about = "Editor activity telemetry for the wakatime reporter", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Provision the reporter and forward editor events read from stdin
    Run {
        /// API key (falls back to WAKATIME_API_KEY)
        #[arg(long)]
        api_key: Option<String>,

        /// Host editor name used in the plugin identity
        #[arg(long, default_value = "cli")]
        editor_name: String,

        /// Host editor version used in the plugin identity
        #[arg(long, default_value = VERSION)]
        editor_version: String,

        /// Seconds between dispatch cycles (overrides config)
        #[arg(long)]
        interval: Option<u64>,
    },

    /// Download and install the latest reporter
    Provision,

    /// Show the detected platform and install location
    Platform,

    /// Print the latest published reporter version
    Latest,

    /// Show activity counters from previous sessions
    Status,

    /// Show configuration
    Config,

    /// Change a setting
    Set {
        #[command(subcommand)]
        setting: SetCommand,
    },
}

#[derive(Subcommand)]
enum SetCommand {
    /// Proxy handed to the reporter; pass "" to clear
    Proxy { url: String },
    /// Verbose reporter runs and debug logging
    Debug {
        #[arg(action = ArgAction::Set)]
        enabled: bool,
    },
    /// Show activity in the editor status bar
    StatusBar {
        #[arg(action = ArgAction::Set)]
        enabled: bool,
    },
}

fn main() {
    let cli = Cli::parse();
    let config = Config::load().unwrap_or_else(|e| {
        eprintln!("Warning: could not load config, using defaults: {e}");
        Config::default()
    });
    init_tracing(config.debug);

    let result = match cli.command {
        Commands::Run {
            api_key,
            editor_name,
            editor_version,
            interval,
        } => cmd_run(config, api_key, editor_name, editor_version, interval),
        Commands::Provision => cmd_provision(&config),
        Commands::Platform => cmd_platform(),
        Commands::Latest => cmd_latest(&config),
        Commands::Status => cmd_status(&config),
        Commands::Config => cmd_config(&config),
        Commands::Set { setting } => cmd_set(config, setting),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn cmd_run(
    mut config: Config,
    api_key: Option<String>,
    editor_name: String,
    editor_version: String,
    interval: Option<u64>,
) -> Result<()> {
    if let Some(secs) = interval {
        if secs == 0 {
            bail!("interval must be at least one second");
        }
        config.dispatch_interval = Duration::from_secs(secs);
    }

    let credentials: SharedCredentials = match api_key {
        Some(key) => Arc::new(MemoryCredentialStore::with_token(API_KEY_TOKEN, key)),
        None => Arc::new(EnvCredentialStore),
    };

    let log = create_shared_log_with_persistence(config.activity_log_path());
    let options = AgentOptions::from_config(
        &config,
        HostInfo::new(editor_name, editor_version),
        credentials,
    )
    .with_log(log);

    println!("WakaTime Agent v{VERSION}");
    println!("  Platform: {}", options.platform);
    println!("  Install dir: {}", options.install_dir.display());
    println!("  Dispatch interval: {}s", config.dispatch_interval.as_secs());
    println!();

    let agent = Agent::activate(options).context("activation failed")?;
    println!("Reporter ready at {}", agent.installation().binary_path.display());
    println!("Reading editor events from stdin. Press Ctrl+C to stop.");

    let running = Arc::new(AtomicBool::new(true));
    ctrlc_handler(running.clone())?;

    let producer = agent.producer();
    let (done_tx, done_rx) = bounded::<()>(1);
    thread::Builder::new()
        .name("editor-events".to_string())
        .spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                let line = match line {
                    Ok(line) => line,
                    Err(e) => {
                        warn!(error = %e, "stdin closed");
                        break;
                    }
                };
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<EditorEvent>(&line) {
                    Ok(event) => {
                        if let Err(e) = producer.on_event(&event) {
                            warn!(error = %e, "event ignored");
                        }
                    }
                    Err(e) => warn!(error = %e, "malformed editor event"),
                }
            }
            let _ = done_tx.send(());
        })
        .context("could not start event reader")?;

    while running.load(Ordering::SeqCst) {
        match done_rx.recv_timeout(Duration::from_millis(200)) {
            Err(RecvTimeoutError::Timeout) => continue,
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                info!("end of editor events");
                break;
            }
        }
    }

    let log = agent.log();
    agent.deactivate();
    println!();
    println!("{}", log.summary());
    Ok(())
}

fn cmd_provision(config: &Config) -> Result<()> {
    let release = ReleaseConfig {
        proxy: config.proxy.clone(),
        ..ReleaseConfig::default()
    };
    let mut provisioner = Provisioner::new(release, resolve_install_dir(), Platform::current());
    let installation = provisioner.provision_blocking()?;

    println!("Installed reporter for {}", installation.platform);
    println!("  Binary: {}", installation.binary_path.display());
    Ok(())
}

fn cmd_platform() -> Result<()> {
    let platform = Platform::current();
    let install_dir = resolve_install_dir();
    let installation = wakatime_agent::Installation::new(install_dir, platform.clone());

    println!("Platform: {platform}");
    println!(
        "  Supported: {}",
        if platform.is_supported() { "yes" } else { "no" }
    );
    println!("  Install dir: {}", installation.install_dir.display());
    println!("  Binary: {}", installation.binary_path.display());
    println!(
        "  Installed: {}",
        if installation.binary_path.exists() { "yes" } else { "no" }
    );
    Ok(())
}

fn cmd_latest(config: &Config) -> Result<()> {
    let release = ReleaseConfig {
        proxy: config.proxy.clone(),
        ..ReleaseConfig::default()
    };
    let client = BlockingReleaseClient::new(release)?;
    let version = client.latest_version()?;
    println!("{version}");
    Ok(())
}

fn cmd_status(config: &Config) -> Result<()> {
    let path = config.activity_log_path();
    println!("WakaTime Agent Status");
    println!("=====================");
    println!();

    if !path.exists() {
        println!("No activity recorded yet.");
        return Ok(());
    }

    let stats = read_persisted(&path)
        .with_context(|| format!("could not read {}", path.display()))?;
    println!("Heartbeats captured:   {}", stats.heartbeats_captured);
    println!("Dispatch cycles:       {}", stats.dispatch_cycles);
    println!("Heartbeats dispatched: {}", stats.heartbeats_dispatched);
    println!("Heartbeats discarded:  {}", stats.heartbeats_discarded);
    println!("Dispatch failures:     {}", stats.dispatch_failures);
    println!(
        "Last updated:          {}",
        stats.last_updated.format("%Y-%m-%d %H:%M:%S UTC")
    );
    Ok(())
}

fn cmd_config(config: &Config) -> Result<()> {
    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {}", Config::config_path().display());
    println!();
    println!("{}", serde_json::to_string_pretty(config)?);
    Ok(())
}

fn cmd_set(mut config: Config, setting: SetCommand) -> Result<()> {
    match setting {
        SetCommand::Proxy { url } => config.proxy = url.trim().to_string(),
        SetCommand::Debug { enabled } => config.debug = enabled,
        SetCommand::StatusBar { enabled } => config.show_in_status_bar = enabled,
    }
    config.save().context("could not save config")?;
    println!("Saved {}", Config::config_path().display());
    Ok(())
}

fn ctrlc_handler(running: Arc<AtomicBool>) -> Result<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .context("could not set Ctrl+C handler")
}
