//! # 错误模型模块
//!
//! ## 设计思路
//!
//! 使用单一错误枚举承载上传→分析链路中的所有失败来源，避免字符串拼接式错误处理。
//! 通过 `thiserror` 保持人类可读错误，同时让调用侧可按分支匹配。
//!
//! - `reason()`：面向用户的失败原因（进入 `Failed(reason)` 的文案）
//! - `code()` / `stage()`：稳定标识，便于日志检索与前端分支处理
//! - `detail`：仅用于诊断的底层原因，不直接展示

use super::validator::Rejection;

/// 分析服务失败类型。
///
/// 两类失败在界面文案上不做区分，但原因字符串会被完整保留。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServiceError {
    /// 网络或服务端错误，可由用户重新提交。
    #[error("{0}")]
    Transient(String),

    /// 服务端拒绝了该图片输入。
    #[error("{0}")]
    InvalidInput(String),
}

impl ServiceError {
    /// 失败原因原文。
    pub fn reason(&self) -> &str {
        match self {
            Self::Transient(reason) | Self::InvalidInput(reason) => reason,
        }
    }

    /// 是否可由用户手动重试。
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// 扫描链路统一错误类型。
///
/// 该类型会被上转为 `AppError`，最终由 CLI 输出。
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScanError {
    #[error("{0}")]
    Rejected(Rejection),

    #[error("load error: {detail}")]
    Load { detail: String },

    #[error("{0}")]
    Service(#[from] ServiceError),

    #[error("配置错误：{0}")]
    Config(String),
}

impl ScanError {
    pub(crate) fn load(detail: impl Into<String>) -> Self {
        Self::Load {
            detail: detail.into(),
        }
    }

    /// 面向用户的失败原因。
    ///
    /// 加载失败统一为 `"load error"`，细节保留在 `detail` 中。
    pub fn reason(&self) -> &str {
        match self {
            Self::Rejected(rejection) => rejection.reason(),
            Self::Load { .. } => "load error",
            Self::Service(err) => err.reason(),
            Self::Config(msg) => msg,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Rejected(Rejection::NotAnImage) => "E_NOT_IMAGE",
            Self::Rejected(Rejection::TooLarge) => "E_TOO_LARGE",
            Self::Load { .. } => "E_LOAD",
            Self::Service(ServiceError::Transient(_)) => "E_SERVICE_TRANSIENT",
            Self::Service(ServiceError::InvalidInput(_)) => "E_SERVICE_INPUT",
            Self::Config(_) => "E_CONFIG",
        }
    }

    pub fn stage(&self) -> &'static str {
        match self {
            Self::Rejected(_) => "validate",
            Self::Load { .. } => "load",
            Self::Service(_) => "analyze",
            Self::Config(_) => "config",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_error_reason_hides_detail() {
        let err = ScanError::load("png 解码失败：unexpected EOF");

        assert_eq!(err.reason(), "load error");
        assert_eq!(err.code(), "E_LOAD");
        assert!(err.to_string().contains("unexpected EOF"));
    }

    #[test]
    fn service_error_keeps_reason_string() {
        let err = ScanError::from(ServiceError::Transient("timeout".to_string()));

        assert_eq!(err.reason(), "timeout");
        assert_eq!(err.stage(), "analyze");
        assert_eq!(err.to_string(), "timeout");
    }
}
