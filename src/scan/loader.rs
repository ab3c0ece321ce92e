//! # 加载模块
//!
//! ## 设计思路
//!
//! `ImageLoader` 把已通过校验的候选文件变成可展示的 `LoadedImage`。
//! 单次尝试、不重试、不支持取消；过期结果由工作流按运行编号丢弃。
//!
//! 默认实现 `PreviewLoader` 把解码放到阻塞线程池，避免占用事件处理。

use std::time::Instant;

use async_trait::async_trait;

use super::pipeline::{self, PreviewLimits};
use super::source::{ImageCandidate, LoadedImage};
use super::{ScanConfig, ScanError};

/// 图片加载接口。
#[async_trait]
pub trait ImageLoader: Send + Sync {
    async fn load(&self, candidate: ImageCandidate) -> Result<LoadedImage, ScanError>;
}

/// 解码并生成预览 data URL 的加载器。
#[derive(Debug, Clone, Copy)]
pub struct PreviewLoader {
    limits: PreviewLimits,
}

impl PreviewLoader {
    pub fn new(config: &ScanConfig) -> Self {
        Self {
            limits: PreviewLimits::from(config),
        }
    }
}

impl Default for PreviewLoader {
    fn default() -> Self {
        Self::new(&ScanConfig::default())
    }
}

#[async_trait]
impl ImageLoader for PreviewLoader {
    async fn load(&self, candidate: ImageCandidate) -> Result<LoadedImage, ScanError> {
        let start = Instant::now();
        let limits = self.limits;
        let bytes = candidate.bytes().clone();

        let display = tokio::task::spawn_blocking(move || pipeline::decode_for_display(&bytes, limits))
            .await
            .map_err(|e| ScanError::load(format!("解码任务异常退出：{}", e)))??;

        log::info!(
            "✅ 图片加载完成 - 类型: {} 体积: {}B load={}ms",
            candidate.mime_type(),
            candidate.size_bytes(),
            start.elapsed().as_millis()
        );

        Ok(LoadedImage::new(display, candidate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan::pipeline::tests::create_png_bytes;

    #[tokio::test]
    async fn preview_loader_keeps_source_candidate() {
        let png = create_png_bytes(48, 32);
        let candidate = ImageCandidate::from_bytes("image/png", png.clone());

        let loaded = PreviewLoader::default()
            .load(candidate)
            .await
            .expect("load should succeed");

        assert_eq!(loaded.source().bytes().as_ref(), png.as_slice());
        assert_eq!(loaded.display().width, 48);
        assert_eq!(loaded.display().height, 32);
    }

    #[tokio::test]
    async fn preview_loader_reports_corrupt_bytes_as_load_error() {
        let candidate = ImageCandidate::from_bytes("image/png", b"definitely not a png".to_vec());

        let result = PreviewLoader::default().load(candidate).await;

        let err = result.expect_err("corrupt bytes must fail");
        assert_eq!(err.reason(), "load error");
    }
}
