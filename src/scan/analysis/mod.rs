//! # 分析服务模块
//!
//! ## 设计思路
//!
//! `AnalysisService` 是工作流与外部分类服务之间唯一的边界：
//! 单次调用、单个结果、可能任意延迟、可能失败。接口内不做重试也不做超时，
//! 超时由调用方（工作流）按配置叠加。
//!
//! - `remote`：HTTP JSON 调用远程模型
//! - `catalog`：内置样例结果，可指定随机种子
//! - `FixedAnalysisService`：固定输出，测试用替身

mod catalog;
mod remote;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use super::source::{AnalysisResult, LoadedImage};
use super::{AnalysisBackend, ScanConfig, ScanError, ServiceError};

pub use catalog::CatalogAnalysisService;
pub use remote::HttpAnalysisService;

/// 图片分类服务接口。
#[async_trait]
pub trait AnalysisService: Send + Sync {
    async fn analyze(&self, image: &LoadedImage) -> Result<AnalysisResult, ServiceError>;
}

/// 按配置构建分析服务。
pub fn build_service(config: &ScanConfig) -> Result<Arc<dyn AnalysisService>, ScanError> {
    match config.backend {
        AnalysisBackend::Remote => {
            let endpoint = config
                .endpoint
                .as_deref()
                .ok_or_else(|| ScanError::Config("remote 后端需要配置 endpoint".to_string()))?;
            Ok(Arc::new(HttpAnalysisService::new(endpoint, config)?))
        }
        AnalysisBackend::Catalog => Ok(Arc::new(CatalogAnalysisService::new(
            Duration::from_millis(config.catalog_delay_ms),
            config.catalog_seed,
        ))),
    }
}

/// 固定输出的分析服务。
///
/// 每次调用都返回同一个结果（或同一个错误），并记录调用次数。
#[derive(Debug)]
pub struct FixedAnalysisService {
    outcome: Result<AnalysisResult, ServiceError>,
    delay: Duration,
    calls: AtomicUsize,
}

impl FixedAnalysisService {
    pub fn succeed(result: AnalysisResult) -> Self {
        Self::with_outcome(Ok(result))
    }

    pub fn fail(error: ServiceError) -> Self {
        Self::with_outcome(Err(error))
    }

    fn with_outcome(outcome: Result<AnalysisResult, ServiceError>) -> Self {
        Self {
            outcome,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AnalysisService for FixedAnalysisService {
    async fn analyze(&self, _image: &LoadedImage) -> Result<AnalysisResult, ServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.outcome.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_backend_requires_endpoint() {
        let config = ScanConfig {
            backend: AnalysisBackend::Remote,
            endpoint: None,
            ..ScanConfig::default()
        };

        assert!(matches!(build_service(&config), Err(ScanError::Config(_))));
    }

    #[test]
    fn catalog_backend_builds_without_endpoint() {
        assert!(build_service(&ScanConfig::default()).is_ok());
    }
}
