//! 命令行界面定义
//!
//! 定义了主程序的命令行参数和选项
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use turnprobe_common::config::SourceConfig;

#[derive(Parser, Debug)]
#[command(name = "turnprobe")]
#[command(version)]
#[command(about = "TURN/STUN reachability diagnostics: ICE gathering, relay allocation and STUN latency")]
pub(crate) struct Cli {
    #[command(subcommand)]
    pub(crate) command: Option<Commands>,

    /// Configuration file path (defaults to searching standard locations)
    #[arg(short, long, global = true)]
    pub(crate) config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Commands {
    /// Gather ICE candidates for each configuration variant (default)
    Run(RunArgs),

    /// Measure STUN server latency and pick the fastest servers
    Optimize {
        #[command(flatten)]
        source: SourceArgs,

        /// Number of servers to keep
        #[arg(long)]
        max_servers: Option<usize>,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Allocate a relay on every TURN URL in the configuration
    Allocate {
        #[command(flatten)]
        source: SourceArgs,

        /// Per-server allocation timeout in milliseconds
        #[arg(long, default_value_t = 5000)]
        timeout_ms: u64,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Encode a JSON ICE configuration file as a base64 environment value
    Convert {
        /// JSON file to convert
        #[arg(short, long, default_value = "xirsys-config.json")]
        input: PathBuf,

        /// Variable name in the printed assignment
        #[arg(long, default_value = "RTC_CONFIG")]
        env_var: String,
    },

    /// Serve /api/get-config and /health
    Serve {
        /// Bind address, overrides serve.ip/serve.port
        #[arg(long)]
        bind: Option<String>,
    },

    /// Test configuration file
    Check {
        /// Configuration file path (optional, defaults to --config or the standard locations)
        #[arg(index = 1)]
        config_file: Option<PathBuf>,
    },
}

#[derive(Args, Debug, Default, Clone)]
pub(crate) struct RunArgs {
    #[command(flatten)]
    pub(crate) source: SourceArgs,

    /// Variant to run (full, relay-forced, turn-only, stun-only); repeatable
    #[arg(long = "variant", value_name = "NAME")]
    pub(crate) variants: Vec<String>,

    /// Gathering timeout per variant in milliseconds
    #[arg(long)]
    pub(crate) timeout_ms: Option<u64>,

    /// Print JSON instead of text
    #[arg(long)]
    pub(crate) json: bool,

    /// Exit with a non-zero status when any variant fails
    #[arg(long)]
    pub(crate) strict: bool,
}

/// 覆盖配置文件中的 `[source]`
#[derive(Args, Debug, Default, Clone)]
pub(crate) struct SourceArgs {
    /// Fetch the ICE configuration from this URL
    #[arg(long)]
    pub(crate) source_url: Option<String>,

    /// Environment variable holding base64 JSON
    #[arg(long)]
    pub(crate) source_env: Option<String>,

    /// Local JSON configuration file
    #[arg(long)]
    pub(crate) source_file: Option<PathBuf>,

    /// Use public STUN servers when every source fails
    #[arg(long)]
    pub(crate) fallback: bool,
}

impl SourceArgs {
    pub(crate) fn apply(&self, config: &mut SourceConfig) {
        if let Some(url) = &self.source_url {
            config.url = Some(url.clone());
        }
        if let Some(var) = &self.source_env {
            config.env_var = var.clone();
        }
        if let Some(file) = &self.source_file {
            config.file = Some(file.clone());
        }
        if self.fallback {
            config.use_fallback = true;
        }
    }
}
