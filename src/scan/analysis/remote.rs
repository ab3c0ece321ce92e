//! # 远程分析服务
//!
//! ## 实现思路
//!
//! - 请求：`POST {endpoint}`，JSON 体携带原图 data URL 与类型。
//! - 响应：`{ prediction, confidence, guidance }`。
//! - 4xx 输入类状态码 → `InvalidInput`（优先使用响应体中的 `error` 字段）。
//! - 网络错误、超时、5xx、响应体不合法 → `Transient`。
//! - 不重试；超时由调用方叠加。

use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose};
use serde::{Deserialize, Serialize};

use super::AnalysisService;
use crate::scan::source::{AnalysisResult, LoadedImage};
use crate::scan::{ScanConfig, ScanError, ServiceError};

#[derive(Debug, Serialize)]
struct AnalyzeRequest<'a> {
    image: String,
    mime_type: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    file_name: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct AnalyzeResponse {
    prediction: String,
    confidence: f64,
    guidance: String,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: String,
}

pub struct HttpAnalysisService {
    client: reqwest::Client,
    endpoint: reqwest::Url,
    max_response_bytes: u64,
}

impl HttpAnalysisService {
    pub fn new(endpoint: &str, config: &ScanConfig) -> Result<Self, ScanError> {
        let endpoint = reqwest::Url::parse(endpoint)
            .map_err(|e| ScanError::Config(format!("endpoint 格式错误：{}", e)))?;

        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout))
            .timeout(Duration::from_secs(config.request_timeout))
            .build()
            .map_err(|e| ScanError::Config(format!("HTTP 客户端初始化失败：{}", e)))?;

        Ok(Self {
            client,
            endpoint,
            max_response_bytes: config.max_response_bytes,
        })
    }

    /// 去掉 query 与 fragment，避免日志泄露令牌。
    fn redact_url_for_log(url: &reqwest::Url) -> String {
        let mut redacted = url.clone();
        redacted.set_query(None);
        redacted.set_fragment(None);
        redacted.to_string()
    }

    fn status_message(code: u16) -> &'static str {
        match code {
            404 => "not found",
            403 => "forbidden",
            429 => "too many requests",
            500..=599 => "server error",
            _ => "request failed",
        }
    }

    fn is_input_rejection(status: reqwest::StatusCode) -> bool {
        matches!(status.as_u16(), 400 | 413 | 415 | 422)
    }

    /// 分块读取响应体，超过上限立即放弃。
    async fn read_capped_body(
        mut response: reqwest::Response,
        limit: u64,
    ) -> Result<Vec<u8>, ServiceError> {
        if let Some(size) = response.content_length() {
            if size > limit {
                log::warn!("⚠️ 远程响应过大：{}B（限制：{}B）", size, limit);
                return Err(ServiceError::Transient("response too large".to_string()));
            }
        }

        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(Self::map_send_error)? {
            if body.len() as u64 + chunk.len() as u64 > limit {
                log::warn!("⚠️ 远程响应读取中超过上限：{}B", limit);
                return Err(ServiceError::Transient("response too large".to_string()));
            }
            body.extend_from_slice(&chunk);
        }

        Ok(body)
    }

    fn map_send_error(err: reqwest::Error) -> ServiceError {
        if err.is_timeout() {
            return ServiceError::Transient("timeout".to_string());
        }
        if err.is_connect() {
            return ServiceError::Transient("service unreachable".to_string());
        }
        ServiceError::Transient(format!("network error: {}", err.without_url()))
    }
}

#[async_trait]
impl AnalysisService for HttpAnalysisService {
    async fn analyze(&self, image: &LoadedImage) -> Result<AnalysisResult, ServiceError> {
        let start = Instant::now();
        let source = image.source();
        let request = AnalyzeRequest {
            image: format!(
                "data:{};base64,{}",
                source.mime_type(),
                general_purpose::STANDARD.encode(source.bytes())
            ),
            mime_type: source.mime_type(),
            file_name: source.name(),
        };

        log::info!(
            "🌐 请求远程分析 - URL: {} 体积: {}B",
            Self::redact_url_for_log(&self.endpoint),
            source.size_bytes()
        );

        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&request)
            .send()
            .await
            .map_err(Self::map_send_error)?;

        let status = response.status();
        let body = Self::read_capped_body(response, self.max_response_bytes).await?;

        if Self::is_input_rejection(status) {
            let reason = serde_json::from_slice::<ErrorResponse>(&body)
                .map(|e| e.error)
                .unwrap_or_else(|_| format!("image rejected (HTTP {})", status.as_u16()));
            log::warn!("⚠️ 远程服务拒绝输入 - HTTP {}: {}", status.as_u16(), reason);
            return Err(ServiceError::InvalidInput(reason));
        }

        if !status.is_success() {
            return Err(ServiceError::Transient(format!(
                "HTTP {}: {}",
                status.as_u16(),
                Self::status_message(status.as_u16())
            )));
        }

        let parsed: AnalyzeResponse = serde_json::from_slice(&body).map_err(|e| {
            log::warn!("⚠️ 远程响应解析失败：{}", e);
            ServiceError::Transient("malformed response".to_string())
        })?;

        log::info!(
            "✅ 远程分析完成 - {} ({:.1}) analyze={}ms",
            parsed.prediction,
            parsed.confidence,
            start.elapsed().as_millis()
        );

        AnalysisResult::new(parsed.prediction, parsed.confidence, parsed.guidance)
    }
}
