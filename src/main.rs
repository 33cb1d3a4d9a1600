//! launcher-host - inspect and manage launcher plugins from the terminal.
//!
//! Every command builds a plugin host from the configuration, loads the
//! plugins directory, acts, and shuts the host down again.

use std::io;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use launcher_host::core::LOCAL_CONFIG_FILE;
use launcher_host::plugin::REASON_MANUAL_DISABLE;
use launcher_host::{HostConfig, PluginHost, PluginInfo};

/// Plugin host for the game launcher
#[derive(Parser)]
#[command(name = "launcher-host")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file to use instead of the default locations
    #[arg(short, long, global = true, env = "LAUNCHER_HOST_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// List loaded plugins
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,

        /// Only show enabled plugins
        #[arg(short, long)]
        enabled: bool,
    },

    /// Show details and health of one plugin
    Status {
        /// Plugin id
        id: String,
    },

    /// Enable a plugin and remember the choice
    Enable {
        /// Plugin id
        id: String,
    },

    /// Disable a plugin and remember the choice
    Disable {
        /// Plugin id
        id: String,

        /// Reason recorded with the change
        #[arg(short, long, default_value = REASON_MANUAL_DISABLE)]
        reason: String,
    },

    /// Show the directories and files the host uses
    Paths,

    /// Show configuration
    Config {
        /// Show config file path
        #[arg(long)]
        path: bool,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => HostConfig::load_from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => HostConfig::load()?,
    };

    // Setup logging
    let filter =
        if cli.verbose { EnvFilter::new("debug") } else { EnvFilter::new(&config.log_level) };

    tracing_subscriber::registry().with(fmt::layer().with_target(false)).with(filter).init();

    match cli.command {
        Commands::List { json, enabled } => cmd_list(config, json, enabled)?,
        Commands::Status { id } => cmd_status(config, &id)?,
        Commands::Enable { id } => cmd_enable(config, &id)?,
        Commands::Disable { id, reason } => cmd_disable(config, &id, &reason)?,
        Commands::Paths => cmd_paths(&config),
        Commands::Config { path } => cmd_config(&config, cli.config.as_deref(), path)?,
        Commands::Completions { shell } => cmd_completions(shell),
    }

    Ok(())
}

/// Build a host, load every plugin, run `f`, and shut the host down.
fn with_host<T>(config: HostConfig, f: impl FnOnce(&PluginHost) -> Result<T>) -> Result<T> {
    let host = PluginHost::new(config)?;
    host.initialize(None);
    host.load_all()?;

    let result = f(&host);
    host.unload_all_plugins();
    result
}

/// List loaded plugins.
fn cmd_list(config: HostConfig, json: bool, enabled_only: bool) -> Result<()> {
    let plugins_dir = config.plugins_dir.clone();
    let plugins: Vec<PluginInfo> = with_host(config, |host| {
        Ok(host.all_plugins().into_iter().filter(|p| !enabled_only || p.is_enabled()).collect())
    })?;

    if json {
        println!("{}", serde_json::to_string_pretty(&plugins)?);
        return Ok(());
    }

    if plugins.is_empty() {
        println!("No plugins loaded.");
        println!("\nPlugin modules are loaded from:");
        println!("  {}", plugins_dir.display());
        return Ok(());
    }

    println!("Loaded plugins:\n");
    for plugin in &plugins {
        let d = &plugin.descriptor;
        println!("  {} {} v{} ({}) [{}]", plugin.state.icon(), d.name, d.version, d.id, plugin.state);
        if !d.description.is_empty() {
            println!("      {}", d.description);
        }
        if let Some(reason) = plugin.state.disabled_reason() {
            println!("      Reason: {}", reason);
        }
    }
    println!("\nTotal: {} plugin(s)", plugins.len());

    Ok(())
}

/// Show one plugin.
fn cmd_status(config: HostConfig, id: &str) -> Result<()> {
    with_host(config, |host| {
        let info = host
            .get_plugin(id)
            .ok_or_else(|| anyhow::anyhow!("Plugin '{}' is not loaded", id))?;
        let status = host.plugin_status(id)?;
        let d = &info.descriptor;

        println!("{} v{}", d.name, d.version);
        println!("  Id:           {}", d.id);
        println!("  Author:       {}", d.author);
        if !d.description.is_empty() {
            println!("  Description:  {}", d.description);
        }
        println!("  Requires:     host {}", d.required_host_version);
        if !d.dependencies.is_empty() {
            println!("  Dependencies: {}", d.dependencies.join(", "));
        }
        println!("  State:        {} {}", info.state.icon(), info.state);
        if let Some(reason) = info.state.disabled_reason() {
            println!("  Reason:       {}", reason);
        }
        if let Some(module) = &info.module {
            println!("  Module:       {}", module.display());
        }
        println!("  Health:       {}", if status.healthy { "healthy" } else { "unhealthy" });
        println!("  Status:       {}", status.message);
        for error in &status.errors {
            println!("    ✗ {}", error);
        }
        for warning in &status.warnings {
            println!("    ⚠ {}", warning);
        }

        Ok(())
    })
}

/// Enable a plugin.
fn cmd_enable(config: HostConfig, id: &str) -> Result<()> {
    with_host(config, |host| {
        host.enable_plugin(id)?;
        println!("✓ Enabled {}", id);
        Ok(())
    })
}

/// Disable a plugin.
fn cmd_disable(config: HostConfig, id: &str, reason: &str) -> Result<()> {
    with_host(config, |host| {
        host.disable_plugin(id, reason)?;
        println!("○ Disabled {}", id);
        Ok(())
    })
}

/// Show paths.
fn cmd_paths(config: &HostConfig) {
    if let Some(dir) = HostConfig::config_dir() {
        println!("Config:       {}", dir.join("config.toml").display());
    }
    println!("Data:         {}", config.data_dir.display());
    println!("Plugins:      {}", config.plugins_dir.display());
    println!("Plugin data:  {}", config.plugin_data_root().display());
    println!("Preferences:  {}", config.preferences_file.display());
    println!("Game:         {}", config.game_dir.display());
}

/// Show configuration.
fn cmd_config(config: &HostConfig, explicit: Option<&std::path::Path>, show_path: bool) -> Result<()> {
    if show_path {
        match explicit {
            Some(path) => println!("{}", path.display()),
            None if PathBuf::from(LOCAL_CONFIG_FILE).exists() => println!("{}", LOCAL_CONFIG_FILE),
            None => {
                if let Some(dir) = HostConfig::config_dir() {
                    println!("{}", dir.join("config.toml").display());
                }
            }
        }
        return Ok(());
    }

    let toml = toml::to_string_pretty(config)?;
    println!("{toml}");

    Ok(())
}

/// Generate shell completions.
fn cmd_completions(shell: Shell) {
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "launcher-host", &mut io::stdout());
}
