//! # 配置模块
//!
//! ## 设计思路
//!
//! 将所有“可调策略”集中到 `ScanConfig`，保证运行时行为可观测、可调整、可测试。
//! 分析后端（remote / catalog）作为高层语义，由 `AnalysisBackend` 负责字符串解析与反向输出。
//!
//! ## 实现思路
//!
//! - `Default` 提供生产可用配置（体积上限与校验器一致：10 MiB）。
//! - `ScanSettings` 是可从 JSON 反序列化的“部分覆盖”，字段缺省即保持原值。
//! - `apply_settings` 在写入前做范围校验，非法值整体拒绝，不做部分写入。

use image::imageops::FilterType;
use serde::Deserialize;

use super::validator::MAX_IMAGE_BYTES;
use super::ScanError;

/// 扫描链路配置。
///
/// 字段覆盖了校验、预览加载、分析调用三个阶段。
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// 允许的最大文件体积（字节）。
    pub max_file_size: u64,
    /// 预览图宽/高单边最大值。
    pub preview_max_dimension: u32,
    /// 解码后的像素上限（`width * height`）。
    pub max_decoded_pixels: u64,
    /// 预览降采样滤镜。
    pub preview_filter: FilterType,
    /// 分析后端。
    pub backend: AnalysisBackend,
    /// 远程分析服务地址。
    pub endpoint: Option<String>,
    /// 建立连接超时时间（秒）。
    pub connect_timeout: u64,
    /// 单次请求总超时时间（秒）。
    pub request_timeout: u64,
    /// 远程响应体上限（字节）。
    pub max_response_bytes: u64,
    /// 调用方叠加的分析超时（毫秒），`None` 表示不限时。
    pub analysis_timeout_ms: Option<u64>,
    /// 内置样例后端的模拟延迟（毫秒）。
    pub catalog_delay_ms: u64,
    /// 内置样例后端的随机种子，`None` 表示取系统熵。
    pub catalog_seed: Option<u64>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            max_file_size: MAX_IMAGE_BYTES,
            preview_max_dimension: 1024,
            max_decoded_pixels: 40_000_000,
            preview_filter: FilterType::Triangle,
            backend: AnalysisBackend::Catalog,
            endpoint: None,
            connect_timeout: 8,
            request_timeout: 60,
            max_response_bytes: 1024 * 1024,
            analysis_timeout_ms: None,
            catalog_delay_ms: 2_500,
            catalog_seed: None,
        }
    }
}

/// 分析后端类型。
///
/// - `Remote`：HTTP 调用远程模型
/// - `Catalog`：内置样例结果（离线演示与确定性测试）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisBackend {
    Remote,
    Catalog,
}

impl AnalysisBackend {
    /// 从外部字符串解析后端。
    ///
    /// # 示例
    /// ```rust
    /// use skinscan::scan::AnalysisBackend;
    ///
    /// let backend = AnalysisBackend::parse(" Remote ")?;
    /// assert_eq!(backend.as_str(), "remote");
    /// # Ok::<(), skinscan::scan::ScanError>(())
    /// ```
    pub fn parse(backend: &str) -> Result<Self, ScanError> {
        match backend.trim().to_lowercase().as_str() {
            "remote" => Ok(Self::Remote),
            "catalog" => Ok(Self::Catalog),
            other => Err(ScanError::Config(format!(
                "未知分析后端：{}（可选：remote / catalog）",
                other
            ))),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Remote => "remote",
            Self::Catalog => "catalog",
        }
    }
}

/// 设置文件中的部分覆盖项。
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ScanSettings {
    pub backend: Option<String>,
    pub endpoint: Option<String>,
    pub preview_max_dimension: Option<u32>,
    pub connect_timeout: Option<u64>,
    pub request_timeout: Option<u64>,
    pub analysis_timeout_ms: Option<u64>,
    pub catalog_delay_ms: Option<u64>,
    pub catalog_seed: Option<u64>,
}

impl ScanConfig {
    /// 校验并应用设置覆盖。
    pub fn apply_settings(&mut self, settings: ScanSettings) -> Result<(), ScanError> {
        let backend = settings
            .backend
            .as_deref()
            .map(AnalysisBackend::parse)
            .transpose()?;

        if let Some(dim) = settings.preview_max_dimension {
            if !(64..=8192).contains(&dim) {
                return Err(ScanError::Config(
                    "preview_max_dimension 必须在 64~8192 之间".to_string(),
                ));
            }
        }
        if let Some(secs) = settings.connect_timeout {
            if !(1..=120).contains(&secs) {
                return Err(ScanError::Config("connect_timeout 必须在 1~120 秒之间".to_string()));
            }
        }
        if let Some(secs) = settings.request_timeout {
            if !(1..=600).contains(&secs) {
                return Err(ScanError::Config("request_timeout 必须在 1~600 秒之间".to_string()));
            }
        }
        if let Some(ms) = settings.analysis_timeout_ms {
            if !(100..=600_000).contains(&ms) {
                return Err(ScanError::Config(
                    "analysis_timeout_ms 必须在 100~600000 毫秒之间".to_string(),
                ));
            }
        }
        if let Some(ms) = settings.catalog_delay_ms {
            if ms > 60_000 {
                return Err(ScanError::Config("catalog_delay_ms 不能超过 60000 毫秒".to_string()));
            }
        }
        if let Some(endpoint) = settings.endpoint.as_deref() {
            if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
                return Err(ScanError::Config(format!("endpoint 必须是 http(s) 地址：{}", endpoint)));
            }
        }

        if let Some(backend) = backend {
            self.backend = backend;
        }
        if settings.endpoint.is_some() {
            self.endpoint = settings.endpoint;
        }
        if let Some(dim) = settings.preview_max_dimension {
            self.preview_max_dimension = dim;
        }
        if let Some(secs) = settings.connect_timeout {
            self.connect_timeout = secs;
        }
        if let Some(secs) = settings.request_timeout {
            self.request_timeout = secs;
        }
        if settings.analysis_timeout_ms.is_some() {
            self.analysis_timeout_ms = settings.analysis_timeout_ms;
        }
        if let Some(ms) = settings.catalog_delay_ms {
            self.catalog_delay_ms = ms;
        }
        if settings.catalog_seed.is_some() {
            self.catalog_seed = settings.catalog_seed;
        }

        Ok(())
    }
}
