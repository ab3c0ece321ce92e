//! # 数据源与中间模型
//!
//! ## 设计思路
//!
//! 将“用户输入”和“流水线中间结果”解耦：
//! - `ImageCandidate` 表示刚被选中、尚未加载的文件
//! - `LoadedImage` 表示已加载、可展示的图片（保留来源文件）
//! - `AnalysisResult` 表示一次成功分析的不可变结果

use std::path::Path;

use bytes::Bytes;
use serde::Serialize;
use tokio::io::AsyncReadExt;

use super::validator::FileMetadata;
use super::{ScanError, ServiceError};

/// 超限文件只读取的签名片段长度（足够 `infer` 识别常见图片格式）。
const SNIFF_PREFIX_BYTES: u64 = 8 * 1024;

/// 用户选择（或拖入）的单个文件。
#[derive(Debug, Clone)]
pub struct ImageCandidate {
    name: Option<String>,
    mime_type: String,
    size_bytes: u64,
    bytes: Bytes,
}

impl ImageCandidate {
    /// 按上报的元数据构造候选文件。
    ///
    /// `size_bytes` 是入口上报的体积，校验只看它，不看实际字节。
    pub fn new(mime_type: impl Into<String>, size_bytes: u64, bytes: impl Into<Bytes>) -> Self {
        Self {
            name: None,
            mime_type: mime_type.into(),
            size_bytes,
            bytes: bytes.into(),
        }
    }

    /// 以字节长度作为体积构造候选文件。
    pub fn from_bytes(mime_type: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        let bytes = bytes.into();
        Self::new(mime_type, bytes.len() as u64, bytes)
    }

    /// 从本地路径读取文件。
    ///
    /// 先读取文件元数据：体积超过 `max_size_bytes` 时只读取开头的签名片段，
    /// 体积照实上报，由校验器拒绝为 `"too large"`。
    ///
    /// `mime_override` 为空时通过文件签名推断类型，无法识别则记为
    /// `application/octet-stream`（随后会被校验器拒绝）。
    pub async fn from_path(
        path: &Path,
        mime_override: Option<&str>,
        max_size_bytes: u64,
    ) -> Result<Self, ScanError> {
        log::info!("📁 开始读取本地图片 - 路径: {}", path.display());

        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|e| ScanError::load(format!("无法读取图片文件信息：{}", e)))?;
        if !metadata.is_file() {
            return Err(ScanError::load(format!("不是普通文件：{}", path.display())));
        }

        let declared_size = metadata.len();
        let oversized = declared_size > max_size_bytes;
        let read_limit = if oversized {
            log::warn!(
                "⚠️ 文件体积超过限制 - {}B（限制：{}B），只读取签名片段",
                declared_size,
                max_size_bytes
            );
            SNIFF_PREFIX_BYTES
        } else {
            max_size_bytes.saturating_add(1)
        };

        let file = tokio::fs::File::open(path)
            .await
            .map_err(|e| ScanError::load(format!("无法读取图片文件：{}", e)))?;
        let mut bytes = Vec::new();
        file.take(read_limit)
            .read_to_end(&mut bytes)
            .await
            .map_err(|e| ScanError::load(format!("无法读取图片文件：{}", e)))?;

        let mime_type = match mime_override {
            Some(mime) => mime.trim().to_string(),
            None => infer::get(&bytes)
                .map(|kind| kind.mime_type().to_string())
                .unwrap_or_else(|| "application/octet-stream".to_string()),
        };

        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned());

        // 读取期间文件可能变大，取两者较大值。
        let size_bytes = if oversized {
            declared_size
        } else {
            declared_size.max(bytes.len() as u64)
        };

        Ok(Self::new(mime_type, size_bytes, bytes).with_name(name))
    }

    pub fn with_name(mut self, name: Option<String>) -> Self {
        self.name = name;
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    pub fn metadata(&self) -> FileMetadata<'_> {
        FileMetadata {
            mime_type: &self.mime_type,
            size_bytes: self.size_bytes,
        }
    }
}

/// 可直接展示的预览数据。
#[derive(Debug, Clone)]
pub struct DisplayImage {
    /// `data:image/png;base64,...`
    pub data_url: String,
    /// 预览宽度（像素）。
    pub width: u32,
    /// 预览高度（像素）。
    pub height: u32,
    /// 原图宽度（像素）。
    pub source_width: u32,
    /// 原图高度（像素）。
    pub source_height: u32,
}

/// 加载阶段输出：可展示数据与来源文件。
///
/// 创建后不可变，交接时以 `Arc` 引用，不做拷贝。
#[derive(Debug)]
pub struct LoadedImage {
    display: DisplayImage,
    source: ImageCandidate,
}

impl LoadedImage {
    pub fn new(display: DisplayImage, source: ImageCandidate) -> Self {
        Self { display, source }
    }

    pub fn display(&self) -> &DisplayImage {
        &self.display
    }

    pub fn source(&self) -> &ImageCandidate {
        &self.source
    }
}

/// 一次成功分析的结果。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisResult {
    prediction: String,
    confidence: f64,
    guidance: String,
}

impl AnalysisResult {
    /// 构造分析结果，置信度必须落在 `[0, 100]`。
    ///
    /// 超出范围视为服务端返回异常，按可重试错误处理。
    pub fn new(
        prediction: impl Into<String>,
        confidence: f64,
        guidance: impl Into<String>,
    ) -> Result<Self, ServiceError> {
        if !(0.0..=100.0).contains(&confidence) {
            return Err(ServiceError::Transient(format!(
                "malformed response: confidence {} out of range",
                confidence
            )));
        }

        Ok(Self {
            prediction: prediction.into(),
            confidence,
            guidance: guidance.into(),
        })
    }

    pub fn prediction(&self) -> &str {
        &self.prediction
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn guidance(&self) -> &str {
        &self.guidance
    }
}
