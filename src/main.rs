//! turnprobe 主程序
//!
//! 加载工具配置，初始化日志后分派到各子命令。报告写到 stdout，其余输出写到 stderr。

mod cli;

use clap::Parser;
use gather::{ProbeOptions, VariantKind, WebRtcSessionFactory, build_plan};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use turnprobe::observability::init_observability;
use turnprobe::optimize::StunOptimizer;
use turnprobe::{
    Error, ProbeConfig, ProbeRunner, Result, SourceLoader, Summary, allocate, convert, service,
};
use turnprobe_common::config::SourceConfig;

macro_rules! bootstrap_info {
    ($($arg:tt)*) => {
        eprintln!($($arg)*);
    };
}

macro_rules! bootstrap_error {
    ($($arg:tt)*) => {
        eprintln!($($arg)*);
    };
}

use cli::{Cli, Commands, RunArgs, SourceArgs};

const DEFAULT_CONFIG_PATHS: [&str; 2] = ["turnprobe.toml", "/etc/turnprobe/turnprobe.toml"];

/// Application launcher utilities
struct ApplicationLauncher;

fn main() -> ExitCode {
    match run(Cli::parse()) {
        Ok(code) => code,
        Err(e) => {
            bootstrap_error!("❌ {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    match cli.command {
        Some(Commands::Check { config_file }) => {
            let config_path = match config_file.or(cli.config) {
                Some(path) => path,
                None => ApplicationLauncher::find_config_file()?.ok_or_else(|| {
                    Error::custom(
                        "No configuration file found. Please create one or specify a path",
                    )
                })?,
            };
            ApplicationLauncher::test_config_file(&config_path)?;
            Ok(ExitCode::SUCCESS)
        }
        command => {
            let config = ApplicationLauncher::load_config(cli.config.as_deref())?;

            // Create Tokio runtime（before running the application）
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()?;

            runtime.block_on(async move {
                // 初始化可观测性系统（日志 + 追踪）
                let _observability_guard = init_observability(&config)?;
                ApplicationLauncher::dispatch(config, command).await
            })
        }
    }
}

impl ApplicationLauncher {
    /// 在默认位置查找配置文件，找不到时返回 None
    fn find_config_file() -> Result<Option<PathBuf>> {
        for path in DEFAULT_CONFIG_PATHS.iter().map(PathBuf::from) {
            if path.is_file() {
                bootstrap_info!("Found config file: {:?}", path);
                return Ok(Some(path));
            }
        }
        Ok(None)
    }

    /// 加载并验证配置；显式指定但不存在的路径是错误，否则缺省使用默认配置
    fn load_config(provided_path: Option<&Path>) -> Result<ProbeConfig> {
        let config_path = match provided_path {
            Some(path) if path.is_file() => Some(path.to_path_buf()),
            Some(path) => {
                bootstrap_error!("Provided config file not found: {:?}", path);
                return Err(Error::custom(format!("Config file not found: {path:?}")));
            }
            None => Self::find_config_file()?,
        };

        let config = match config_path {
            Some(path) => match ProbeConfig::from_file(&path) {
                Ok(config) => config,
                Err(e) => {
                    bootstrap_error!("❌ Failed to load config {:?}: {}", path, e);
                    return Err(e.into());
                }
            },
            None => ProbeConfig::default(),
        };

        if let Err(errors) = config.validate() {
            let mut has_critical_errors = false;
            for (i, err) in errors.iter().enumerate() {
                if err.starts_with("Warning:") {
                    bootstrap_info!("  {}. ⚠️  {}", i + 1, err);
                } else {
                    bootstrap_error!("  {}. ❌ {}", i + 1, err);
                    has_critical_errors = true;
                }
            }
            if has_critical_errors {
                return Err(Error::validation("fix the configuration errors above"));
            }
        }

        Ok(config)
    }

    /// 测试配置文件是否有效
    fn test_config_file(config_path: &Path) -> Result<()> {
        let config = match ProbeConfig::from_file(config_path) {
            Ok(config) => {
                bootstrap_info!("✅ Config parsed: {:?}", config_path);
                config
            }
            Err(e) => {
                bootstrap_error!("❌ Failed to parse config: {}", e);
                return Err(Error::validation(format!("config parse failed: {e}")));
            }
        };

        match config.validate() {
            Ok(()) => {
                bootstrap_info!("✅ Config validation passed");
                Ok(())
            }
            Err(errors) => {
                bootstrap_error!("Config validation found issues:");
                for (i, err) in errors.iter().enumerate() {
                    if err.starts_with("Warning:") {
                        bootstrap_info!("  {}. ⚠️  {}", i + 1, err);
                    } else {
                        bootstrap_error!("  {}. ❌ {}", i + 1, err);
                    }
                }
                if errors.iter().any(|e| !e.starts_with("Warning:")) {
                    return Err(Error::validation("config validation failed"));
                }
                bootstrap_info!("✅ Config validation passed with warnings");
                Ok(())
            }
        }
    }

    async fn dispatch(config: ProbeConfig, command: Option<Commands>) -> Result<ExitCode> {
        match command.unwrap_or_else(|| Commands::Run(RunArgs::default())) {
            Commands::Run(args) => Self::run_probes(config, args).await,
            Commands::Optimize {
                source,
                max_servers,
                json,
            } => Self::run_optimizer(config, source, max_servers, json).await,
            Commands::Allocate {
                source,
                timeout_ms,
                json,
            } => Self::run_allocation(config, source, timeout_ms, json).await,
            Commands::Serve { bind } => {
                let bind_addr = bind.unwrap_or_else(|| config.serve.bind_addr());
                service::serve(&config.serve, &bind_addr).await?;
                Ok(ExitCode::SUCCESS)
            }
            Commands::Convert { input, env_var } => {
                let conversion = convert::convert_file(&input)?;
                println!("{}", conversion.env_assignment(&env_var));
                Ok(ExitCode::SUCCESS)
            }
            Commands::Check { .. } => Err(Error::custom("check does not need the async runtime")),
        }
    }

    async fn load_document(
        config: &SourceConfig,
        overrides: &SourceArgs,
    ) -> Result<turnprobe::LoadedConfig> {
        let mut source = config.clone();
        overrides.apply(&mut source);
        SourceLoader::new(source)?.load().await
    }

    /// 执行候选收集测试并输出汇总
    async fn run_probes(config: ProbeConfig, args: RunArgs) -> Result<ExitCode> {
        let loaded = Self::load_document(&config.source, &args.source).await?;

        let names = if args.variants.is_empty() {
            &config.probe.variants
        } else {
            &args.variants
        };
        let kinds = VariantKind::parse_list(names)?;
        let plan = build_plan(&loaded.document, &kinds);
        if plan.is_empty() {
            warn!("No test variant applies to this configuration");
        }

        let mut options = ProbeOptions::from(&config.probe);
        if let Some(ms) = args.timeout_ms {
            options.gather_timeout = Duration::from_millis(ms);
        }

        info!("🚀 Running {} ICE gathering tests", plan.len());
        let runner = ProbeRunner::new(Arc::new(WebRtcSessionFactory::new()?), options);
        let reports = runner.run(&plan).await;
        let summary = Summary::from_reports(reports).with_source(&loaded.source);

        if args.json {
            println!("{}", summary.to_json()?);
        } else {
            println!("{}", summary.render_text());
        }

        let strict = args.strict || config.probe.strict;
        if strict && !summary.all_passed() {
            return Ok(ExitCode::FAILURE);
        }
        Ok(ExitCode::SUCCESS)
    }

    /// 测试 STUN 延迟并输出优选结果
    async fn run_optimizer(
        config: ProbeConfig,
        source: SourceArgs,
        max_servers: Option<usize>,
        json: bool,
    ) -> Result<ExitCode> {
        let loaded = Self::load_document(&config.source, &source).await?;

        let mut optimizer_config = config.optimizer.clone();
        if let Some(n) = max_servers {
            optimizer_config.max_servers = n;
        }

        let optimizer = StunOptimizer::new(optimizer_config)?;
        let (optimized, results) = optimizer.optimize(&loaded.document).await;

        if json {
            println!("{}", serde_json::to_string_pretty(&optimized)?);
        } else {
            println!("{}", optimized.render_text(&results));
        }
        Ok(ExitCode::SUCCESS)
    }

    /// 对每个 TURN URL 执行分配探测
    async fn run_allocation(
        config: ProbeConfig,
        source: SourceArgs,
        timeout_ms: u64,
        json: bool,
    ) -> Result<ExitCode> {
        let loaded = Self::load_document(&config.source, &source).await?;
        let results = allocate::check_all(&loaded.document, Duration::from_millis(timeout_ms)).await;

        if json {
            println!("{}", serde_json::to_string_pretty(&results)?);
        } else {
            println!("{}", allocate::render_text(&results));
        }

        if results.is_empty() || results.iter().any(|r| !r.success) {
            return Ok(ExitCode::FAILURE);
        }
        Ok(ExitCode::SUCCESS)
    }
}
