//! 设置文件读取。
//!
//! 设置文件是 `ScanSettings` 的 JSON 形式，缺省字段保持默认值。

use std::fs;
use std::path::Path;

use crate::error::AppError;
use crate::scan::{ScanConfig, ScanSettings};

pub fn read_settings(path: &Path) -> Result<ScanSettings, AppError> {
    let content = fs::read_to_string(path)?;
    serde_json::from_str::<ScanSettings>(&content)
        .map_err(|e| AppError::Settings(format!("解析设置文件失败: {}", e)))
}

/// 以默认配置为基础应用设置文件；未提供路径时直接返回默认配置。
pub fn load_config(path: Option<&Path>) -> Result<ScanConfig, AppError> {
    let mut config = ScanConfig::default();

    if let Some(path) = path {
        let settings = read_settings(path)?;
        config.apply_settings(settings)?;
        log::info!("⚙️ 已加载设置文件：{}", path.display());
    }

    Ok(config)
}
