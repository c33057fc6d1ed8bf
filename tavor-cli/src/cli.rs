//! CLI definition and argument parsing for the `tavor` binary.
//! This module holds the top-level parser, the subcommand list and the
//! flag groups shared between subcommands.

use clap::{Args, Parser, Subcommand};
use std::time::Duration;
use tavor::{BoxConfig, ClientOptions, CommandOptions, TavorClient};

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "tavor", author, version, about = "Tavor sandbox CLI")]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalFlags,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
#[non_exhaustive]
pub enum Commands {
    /// Run a command in a fresh box, then stop the box
    Run(crate::commands::run::RunArgs),

    /// Run a command in an existing box
    Exec(crate::commands::exec::ExecArgs),

    /// Create a box and print its ID
    Create(crate::commands::create::CreateArgs),

    /// List boxes
    #[command(visible_alias = "ls", visible_alias = "ps")]
    List(crate::commands::list::ListArgs),

    /// Stop one or more boxes
    #[command(visible_alias = "rm")]
    Stop(crate::commands::stop::StopArgs),

    /// Pause one or more running boxes
    Pause(crate::commands::pause::PauseArgs),

    /// Resume one or more paused boxes
    Resume(crate::commands::pause::PauseArgs),

    /// Expose a port of a box on a random external port
    Expose(crate::commands::expose::ExposeArgs),

    /// Print the public URL for a port of a box
    Url(crate::commands::url::UrlArgs),
}

// ============================================================================
// GLOBAL FLAGS
// ============================================================================

#[derive(Args, Debug, Clone)]
pub struct GlobalFlags {
    /// Enable debug output
    #[arg(long, global = true)]
    pub debug: bool,

    /// API key (sk-tavor-...)
    #[arg(long, global = true, env = "TAVOR_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Service endpoint
    #[arg(long, global = true, env = "TAVOR_BASE_URL")]
    pub base_url: Option<String>,

    /// Timeout for individual API requests, in seconds
    #[arg(long, global = true, value_name = "SECS")]
    pub request_timeout: Option<u64>,
}

impl GlobalFlags {
    pub fn client_options(&self) -> ClientOptions {
        let mut options = ClientOptions::new();
        if let Some(api_key) = &self.api_key {
            options = options.api_key(api_key);
        }
        if let Some(base_url) = &self.base_url {
            options = options.base_url(base_url);
        }
        if let Some(secs) = self.request_timeout {
            options = options.timeout(Duration::from_secs(secs));
        }
        options
    }

    /// Client for this invocation. `TAVOR_BOX_*` defaults are read here too.
    pub fn create_client(&self) -> anyhow::Result<TavorClient> {
        TavorClient::new(self.client_options()).map_err(Into::into)
    }
}

// ============================================================================
// RESOURCE FLAGS
// ============================================================================

#[derive(Args, Debug, Clone, Default)]
pub struct ResourceFlags {
    /// Number of CPUs
    #[arg(long)]
    pub cpu: Option<u32>,

    /// Memory in MiB
    #[arg(short = 'm', long = "memory", value_name = "MIB")]
    pub mib_ram: Option<u64>,

    /// Seconds before the service terminates the box
    #[arg(long = "box-timeout", value_name = "SECS")]
    pub box_timeout: Option<u64>,

    /// Metadata attached to the box (KEY=VALUE)
    #[arg(long = "meta", value_name = "KEY=VALUE")]
    pub metadata: Vec<String>,
}

impl ResourceFlags {
    /// Box configuration from the flags. Unset fields fall back to the
    /// client's `TAVOR_BOX_*` defaults.
    pub fn to_config(&self) -> anyhow::Result<BoxConfig> {
        let mut config = BoxConfig::new();
        if let Some(cpu) = self.cpu {
            config = config.cpu(cpu);
        }
        if let Some(mib_ram) = self.mib_ram {
            config = config.mib_ram(mib_ram);
        }
        if let Some(secs) = self.box_timeout {
            config = config.timeout(secs);
        }
        for entry in &self.metadata {
            let Some((key, value)) = entry.split_once('=') else {
                anyhow::bail!("Invalid metadata '{}': expected KEY=VALUE", entry);
            };
            config = config.metadata(key, value);
        }
        Ok(config)
    }
}

// ============================================================================
// COMMAND FLAGS
// ============================================================================

#[derive(Args, Debug, Clone)]
pub struct CommandFlags {
    /// Give up on the command after this many seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Collect output and print it when the command finishes, instead of
    /// streaming it line by line
    #[arg(long)]
    pub no_stream: bool,

    /// Interval between status checks when not streaming, in milliseconds
    #[arg(long, value_name = "MS", default_value_t = 1000)]
    pub poll_interval: u64,
}

impl CommandFlags {
    /// Options without sinks; streaming mode adds them.
    pub fn base_options(&self) -> CommandOptions {
        let mut options =
            CommandOptions::new().poll_interval(Duration::from_millis(self.poll_interval));
        if let Some(secs) = self.timeout {
            options = options.timeout(Duration::from_secs(secs));
        }
        options
    }
}
