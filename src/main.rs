// Bobby's Workshop Authorization Triggers - Main Entry Point
//
// Command-line front end for the trigger executor:
// - list the trigger catalog
// - run one trigger or a whole platform against a device
// - show where a tool resolves
// - serve the HTTP API

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::json;
use std::path::PathBuf;
use tracing::{debug, info};
use workshop_triggers::config::Config;
use workshop_triggers::logging::LogSettings;
use workshop_triggers::server;
use workshop_triggers::tools::{env_var_for, ExecutionTimeout, ToolLocator, ToolResolver};
use workshop_triggers::triggers::{get_all_available_triggers, AuthorizationTriggers, TriggerId};

/// Device authorization triggers for Bobby's Workshop
#[derive(Parser, Debug)]
#[command(name = "workshop-triggers")]
#[command(version)]
#[command(about = "Trigger and verify device authorization prompts", long_about = None)]
struct Args {
    /// Path to a config file (default: platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List available triggers
    List {
        /// Platform to list (android, ios, fastboot, samsung, qualcomm, mediatek)
        #[arg(long, default_value = "all")]
        platform: String,
    },
    /// Run a single trigger against a device
    Run {
        /// Trigger id (e.g. adb_usb_debugging) or operation name
        trigger: String,
        /// Device serial or UDID
        device: String,
    },
    /// Run every trigger of a platform against a device
    Batch {
        platform: String,
        /// Device serial or UDID
        device: String,
    },
    /// Show where a tool resolves
    Resolve {
        /// Tool name (adb, fastboot, heimdall, ideviceinfo, ...)
        tool: String,
    },
    /// Serve the HTTP API
    Serve {
        /// Listen port (overrides config)
        #[arg(long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = match args.config {
        Some(ref path) => Config::load_from_path(path)
            .with_context(|| format!("Failed to load config from {:?}", path))?,
        None => Config::load().context("Failed to load config")?,
    };

    let mut logging = LogSettings::from_config(&config);
    if args.verbose {
        logging = logging.verbose();
    }
    logging.init().context("Failed to initialize logging")?;

    match args.command {
        Commands::List { platform } => {
            debug!("Listing triggers for {}", platform);
            print_json(&get_all_available_triggers(&platform))?;
        }
        Commands::Run { trigger, device } => {
            let trigger: TriggerId = trigger.parse()?;
            info!("Running {} on {}", trigger, device);
            let triggers = AuthorizationTriggers::from_config(&config);
            let result = triggers.run(trigger, &device).await?;
            print_json(&result)?;
        }
        Commands::Batch { platform, device } => {
            info!("Running all {} triggers on {}", platform, device);
            let triggers = AuthorizationTriggers::from_config(&config);
            let report = triggers
                .trigger_all_available_authorizations(&device, &platform)
                .await?;
            print_json(&report)?;
        }
        Commands::Resolve { tool } => {
            let mut resolver = ToolResolver::new().with_lookup_timeout(ExecutionTimeout::from_millis(
                config.execution.lookup_timeout_ms,
            ));
            if let Some(ref data_dir) = config.tools.data_dir {
                resolver = resolver.with_data_root(data_dir);
            }
            let path = resolver.resolve(&tool).await;
            print_json(&json!({
                "envVar": env_var_for(&tool),
                "tool": tool,
                "platformToolsDir": resolver.platform_tools_dir(),
                "found": path.is_some(),
                "path": path,
            }))?;
        }
        Commands::Serve { port } => {
            if let Some(port) = port {
                config.server.port = port;
            }
            server::serve(&config).await?;
        }
    }

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{}", text);
    Ok(())
}
