use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use switchplug::plugins::{CommandChannel, PluginRegistry, SessionHandle};
use switchplug::PluginConfig;

#[derive(Parser)]
#[command(name = "switchplug")]
#[command(about = "Load media-server plugins and route commands to them", long_about = None)]
struct Cli {
    /// Path to a JSON config file
    #[arg(short, long, global = true, default_value = "switchplug.json")]
    config: PathBuf,

    /// Plugin root directory (overrides the config file)
    #[arg(short, long, global = true)]
    dir: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Load every plugin and list what it provides
    Inspect {
        /// Print the listing as JSON
        #[arg(long)]
        json: bool,
    },
    /// Dispatch an API command
    Api {
        /// Command name followed by its arguments
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Dispatch a dial-plan application
    App {
        /// Application name followed by its arguments
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Show version information
    Version,
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    // Initialize logging
    if cli.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(EnvFilter::from_default_env())
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .init();
    }

    let mut config = PluginConfig::load(&cli.config)
        .with_context(|| format!("Failed to load config {}", cli.config.display()))?;
    config
        .apply_env_overrides()
        .context("Invalid environment override")?;
    if let Some(dir) = cli.dir {
        config.plugin_dir = dir;
        config.validate().context("Invalid --dir")?;
    }

    match cli.command.unwrap_or(Commands::Version) {
        Commands::Version => {
            println!("switchplug {}", env!("CARGO_PKG_VERSION"));
            Ok(ExitCode::SUCCESS)
        }
        Commands::Inspect { json } => {
            let plugins = load_registry(&config).list_plugins();
            if json {
                println!("{}", serde_json::to_string_pretty(&plugins)?);
            } else if plugins.is_empty() {
                println!("No plugins loaded from {}", config.plugin_dir.display());
            } else {
                for plugin in plugins {
                    println!("{}", plugin.path.display());
                    println!("  APIs:    {}", plugin.api_names.join(","));
                    println!("  DPApps:  {}", plugin.dial_plan_names.join(","));
                }
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Api { args } => Ok(run(&load_registry(&config), CommandChannel::Api, &args)),
        Commands::App { args } => Ok(run(
            &load_registry(&config),
            CommandChannel::DialPlan,
            &args,
        )),
    }
}

fn load_registry(config: &PluginConfig) -> PluginRegistry {
    let registry = PluginRegistry::from_config(config);
    if config.enabled {
        registry.load_plugins_from_subdirectories(&config.plugin_dir);
    }
    registry
}

fn run(registry: &PluginRegistry, channel: CommandChannel, args: &[String]) -> ExitCode {
    let line = args.join(" ");
    match registry.try_dispatch(channel, &line, SessionHandle::null()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("-ERR {}", e);
            ExitCode::FAILURE
        }
    }
}
