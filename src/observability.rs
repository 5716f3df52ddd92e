//! 日志与追踪初始化
//!
//! 控制台日志写到 stderr，stdout 只留给测试报告（便于 `--json` 管道处理）。

use std::fs;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};
use turnprobe_common::ProbeConfig;
use turnprobe_common::config::{LogConfig, ObservabilityConfig};

#[cfg(feature = "opentelemetry")]
use crate::error::Error;
use crate::error::Result;
#[cfg(feature = "opentelemetry")]
use opentelemetry::KeyValue;
#[cfg(feature = "opentelemetry")]
use opentelemetry_otlp::WithExportConfig;
#[cfg(feature = "opentelemetry")]
use opentelemetry_sdk::propagation::TraceContextPropagator;
#[cfg(feature = "opentelemetry")]
use opentelemetry_sdk::{Resource, trace::SdkTracerProvider};

const LOG_FILE_NAME: &str = "turnprobe.log";

/// 持有日志写线程与 tracer provider，drop 时刷新
#[derive(Default)]
pub struct ObservabilityGuard {
    #[cfg(feature = "opentelemetry")]
    tracer_provider: Option<SdkTracerProvider>,
    log_guard: Option<WorkerGuard>,
}

impl Drop for ObservabilityGuard {
    fn drop(&mut self) {
        #[cfg(feature = "opentelemetry")]
        if let Some(provider) = self.tracer_provider.take()
            && let Err(e) = provider.shutdown()
        {
            eprintln!("Failed to shutdown tracer provider: {e:?}");
        }
        drop(self.log_guard.take());
    }
}

/// 按配置初始化日志（及可选的 OTLP 追踪）
pub fn init_observability(config: &ProbeConfig) -> Result<ObservabilityGuard> {
    let mut guard = ObservabilityGuard::default();
    let observability = config.observability_config();

    match observability.log.output.as_str() {
        "file" => {
            fs::create_dir_all(&observability.log.path)?;
            let (writer, worker_guard) = build_file_writer(&observability.log)?;
            guard.log_guard = Some(worker_guard);
            init_subscriber_with_writer(writer, false, &mut guard, config)?;
        }
        _ => {
            init_subscriber_with_writer(std::io::stderr, true, &mut guard, config)?;
        }
    }

    Ok(guard)
}

/// RUST_LOG 优先于配置文件中的 filter_level
fn create_env_filter(config: &ObservabilityConfig) -> EnvFilter {
    let directive = std::env::var("RUST_LOG")
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| config.filter_level.clone());

    EnvFilter::try_new(&directive).unwrap_or_else(|_| {
        eprintln!("Failed to parse filter directive: {directive}. Falling back to: info");
        EnvFilter::new("info")
    })
}

fn init_subscriber_with_writer<W>(
    writer: W,
    use_ansi: bool,
    #[cfg_attr(not(feature = "opentelemetry"), allow(unused_variables))]
    guard: &mut ObservabilityGuard,
    config: &ProbeConfig,
) -> Result<()>
where
    W: for<'a> fmt::MakeWriter<'a> + Send + Sync + 'static,
{
    let fmt_layer = fmt::layer()
        .with_target(true)
        .with_level(true)
        .with_ansi(use_ansi)
        .with_writer(writer);

    let observability = config.observability_config();

    #[cfg(feature = "opentelemetry")]
    {
        if let Some(provider) = build_tracing_provider(config)? {
            use opentelemetry::trace::TracerProvider as _;
            let tracer = provider.tracer(observability.tracing.service_name().to_string());
            guard.tracer_provider = Some(provider);

            tracing_subscriber::registry()
                .with(create_env_filter(observability))
                .with(fmt_layer)
                .with(tracing_opentelemetry::layer().with_tracer(tracer))
                .try_init()
                .ok();
            return Ok(());
        }
    }

    tracing_subscriber::registry()
        .with(create_env_filter(observability))
        .with(fmt_layer)
        .try_init()
        .ok();

    Ok(())
}

fn build_file_writer(log_config: &LogConfig) -> Result<(NonBlocking, WorkerGuard)> {
    if log_config.rotate {
        let appender = tracing_appender::rolling::daily(&log_config.path, LOG_FILE_NAME);
        Ok(tracing_appender::non_blocking(appender))
    } else {
        let file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(std::path::Path::new(&log_config.path).join(LOG_FILE_NAME))?;
        Ok(tracing_appender::non_blocking(file))
    }
}

#[cfg(feature = "opentelemetry")]
fn build_tracing_provider(config: &ProbeConfig) -> Result<Option<SdkTracerProvider>> {
    let tracing_cfg = config.tracing_config();
    if !tracing_cfg.is_enabled() {
        return Ok(None);
    }
    tracing_cfg.validate().map_err(Error::custom)?;

    eprintln!(
        "📊 OpenTelemetry tracing: service_name={}, endpoint={}",
        tracing_cfg.service_name(),
        tracing_cfg.endpoint()
    );

    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(tracing_cfg.endpoint())
        .build()
        .map_err(|e| Error::custom(format!("Failed to build OTLP exporter: {e}")))?;

    let resource = Resource::builder()
        .with_service_name(tracing_cfg.service_name().to_string())
        .with_attributes([KeyValue::new("service.instance.id", config.name.clone())])
        .build();

    let tracer_provider = SdkTracerProvider::builder()
        .with_resource(resource)
        .with_batch_exporter(exporter)
        .build();

    opentelemetry::global::set_tracer_provider(tracer_provider.clone());
    opentelemetry::global::set_text_map_propagator(TraceContextPropagator::new());

    Ok(Some(tracer_provider))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_output_creates_log_directory() {
        let dir = tempfile::tempdir().unwrap();
        let log_dir = dir.path().join("nested/logs");

        let mut config = ProbeConfig::default();
        config.observability.log.output = "file".to_string();
        config.observability.log.path = log_dir.display().to_string();

        let guard = init_observability(&config).unwrap();
        tracing::info!("written to file");
        drop(guard);

        assert!(log_dir.join(LOG_FILE_NAME).exists());
    }

    #[test]
    fn test_invalid_filter_falls_back() {
        let mut config = ObservabilityConfig::default();
        config.filter_level = "info,[[bad".to_string();
        // 不 panic 即可
        let _ = create_env_filter(&config);
    }
}
