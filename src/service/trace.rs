//! HTTP 请求追踪层
//!
//! 每个请求一个 `http.request` span；启用 `opentelemetry` feature 时
//! 从 W3C traceparent 头中恢复上游上下文。

use axum::http::{Request, header::ORIGIN};
use tower_http::{
    classify::{ServerErrorsAsFailures, SharedClassifier},
    trace::{MakeSpan, TraceLayer},
};
use tracing::{Span, info_span};

#[cfg(feature = "opentelemetry")]
use opentelemetry::{Context, propagation::Extractor, trace::TraceContextExt};
#[cfg(feature = "opentelemetry")]
use tracing_opentelemetry::OpenTelemetrySpanExt;

pub type ConfigApiTraceLayer = TraceLayer<SharedClassifier<ServerErrorsAsFailures>, RequestSpan>;

pub fn http_trace_layer() -> ConfigApiTraceLayer {
    TraceLayer::new_for_http().make_span_with(RequestSpan)
}

#[derive(Clone, Debug, Default)]
pub struct RequestSpan;

impl<B> MakeSpan<B> for RequestSpan {
    fn make_span(&mut self, request: &Request<B>) -> Span {
        let origin = request
            .headers()
            .get(ORIGIN)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("-");

        let span = info_span!(
            "http.request",
            method = %request.method(),
            path = %request.uri().path(),
            origin = %origin
        );

        #[cfg(feature = "opentelemetry")]
        if let Some(context) = remote_context(request.headers()) {
            span.set_parent(context);
        }

        span
    }
}

#[cfg(feature = "opentelemetry")]
fn remote_context(headers: &axum::http::HeaderMap) -> Option<Context> {
    struct Headers<'a>(&'a axum::http::HeaderMap);

    impl Extractor for Headers<'_> {
        fn get(&self, key: &str) -> Option<&str> {
            self.0.get(key).and_then(|value| value.to_str().ok())
        }

        fn keys(&self) -> Vec<&str> {
            self.0.keys().map(|name| name.as_str()).collect()
        }
    }

    let context = opentelemetry::global::get_text_map_propagator(|p| p.extract(&Headers(headers)));
    context
        .span()
        .span_context()
        .is_valid()
        .then_some(context.clone())
}
