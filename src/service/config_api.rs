//! `/api/get-config` 配置下发接口
//!
//! 从 base64 编码的 RTCConfiguration 中取出第一个 TURN 服务器返回给浏览器端。
//! 配置缺失或不合法时返回兜底服务器；没有兜底时返回 503。

use crate::service::trace::http_trace_layer;
use crate::source::decode_env_value;
use axum::{
    Json, Router,
    extract::State,
    http::{
        HeaderMap, HeaderValue, StatusCode,
        header::{
            ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
            ACCESS_CONTROL_ALLOW_ORIGIN, ORIGIN,
        },
    },
    response::{IntoResponse, Response},
    routing::get,
};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info, warn};
use turnprobe_common::config::ServeConfig;
use turnprobe_common::{IceServer, RtcConfigDocument};

#[derive(Clone)]
pub struct ConfigApiState {
    inner: Arc<Inner>,
}

struct Inner {
    env_var: String,
    /// 启动时读取的环境变量原始值
    raw_config: Option<String>,
    allowed_origins: Vec<String>,
    cors_allow_all: bool,
    fallback: Option<IceServer>,
}

impl ConfigApiState {
    pub fn new(config: &ServeConfig, raw_config: Option<String>) -> Self {
        Self {
            inner: Arc::new(Inner {
                env_var: config.env_var.clone(),
                raw_config,
                allowed_origins: config.allowed_origins.clone(),
                cors_allow_all: config.cors_allow_all,
                fallback: config.fallback_server.clone(),
            }),
        }
    }

    pub fn from_env(config: &ServeConfig) -> Self {
        Self::new(config, std::env::var(&config.env_var).ok())
    }

    /// 按请求来源计算 Allow-Origin
    pub fn allow_origin(&self, request_origin: Option<&str>) -> Option<String> {
        if self.inner.cors_allow_all {
            return Some("*".to_string());
        }
        if let Some(origin) = request_origin
            && self.inner.allowed_origins.iter().any(|o| o == origin)
        {
            return Some(origin.to_string());
        }
        self.inner.allowed_origins.first().cloned()
    }

    fn cors_headers(&self, request_origin: Option<&str>) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(ACCESS_CONTROL_ALLOW_METHODS, HeaderValue::from_static("GET"));
        headers.insert(
            ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static("Content-Type"),
        );
        if let Some(origin) = self.allow_origin(request_origin)
            && let Ok(value) = HeaderValue::from_str(&origin)
        {
            headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, value);
        }
        headers
    }

    pub fn turn_server(&self) -> Result<IceServer, String> {
        extract_turn_server(&self.inner.env_var, self.inner.raw_config.as_deref())
    }
}

/// 解码并校验配置，返回第一个 TURN 服务器
///
/// 这里比探测时的校验更严格：所有 URL 都必须是 turn: / turns:。
pub fn extract_turn_server(env_var: &str, raw: Option<&str>) -> Result<IceServer, String> {
    let raw = raw.ok_or_else(|| format!("{env_var} environment variable is not set"))?;
    let decoded = decode_env_value(env_var, raw).map_err(|e| e.to_string())?;

    let document: RtcConfigDocument = serde_json::from_str(&decoded)
        .map_err(|e| format!("Failed to parse {env_var} as JSON: {e}"))?;

    if document.ice_servers.is_empty() {
        return Err("RTC configuration has empty iceServers array".to_string());
    }
    for server in &document.ice_servers {
        if server.urls.is_empty() {
            return Err("Ice server missing urls property".to_string());
        }
        if let Some(url) = server
            .urls
            .iter()
            .find(|u| !u.starts_with("turn:") && !u.starts_with("turns:"))
        {
            return Err(format!("Invalid ice server URL: {url}"));
        }
    }

    document
        .first_turn_server()
        .cloned()
        .ok_or_else(|| "No TURN server found in RTC configuration".to_string())
}

pub fn router(state: ConfigApiState) -> Router {
    Router::new()
        .route("/api/get-config", get(get_config))
        .route("/health", get(health))
        .layer(http_trace_layer())
        .with_state(state)
}

async fn get_config(State(state): State<ConfigApiState>, headers: HeaderMap) -> Response {
    info!("API handler called for TURN configuration");

    let origin = headers.get(ORIGIN).and_then(|v| v.to_str().ok());
    let cors = state.cors_headers(origin);

    match state.turn_server() {
        Ok(server) => {
            info!("Successfully loaded TURN server configuration from environment");
            (StatusCode::OK, cors, Json(server)).into_response()
        }
        Err(reason) => match &state.inner.fallback {
            Some(fallback) => {
                warn!("{}. Using fallback TURN server.", reason);
                (StatusCode::OK, cors, Json(fallback.clone())).into_response()
            }
            None => {
                error!("{}. No fallback TURN server configured.", reason);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    cors,
                    Json(json!({ "error": reason })),
                )
                    .into_response()
            }
        },
    }
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}
