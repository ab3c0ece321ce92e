//! # 结果页入口
//!
//! 结果页进入时从交接对象取一次结果：
//! - 有结果：构建展示模型（置信度保留一位小数）
//! - 无结果：返回 `Redirect`，由调用方回到上传页，而不是带着空数据渲染

use std::sync::Arc;

use serde::Serialize;

use super::handoff::{HandoffPayload, ResultHandoff};
use super::source::LoadedImage;

/// 高置信度阈值（含）。
pub const HIGH_CONFIDENCE_THRESHOLD: f64 = 75.0;

pub const MEDICAL_DISCLAIMER: &str = "This is an AI-powered analysis tool and should not replace professional medical advice. Please consult a dermatologist for accurate diagnosis and treatment.";

const HIGH_CONFIDENCE_NOTE: &str = "High confidence - Results are reliable";
const MODERATE_CONFIDENCE_NOTE: &str = "Moderate confidence - Consider professional consultation";

/// 结果页进入结果。
#[derive(Debug)]
pub enum StageEntry {
    Render(ResultView),
    Redirect,
}

/// 进入结果页。
pub fn enter(handoff: &ResultHandoff) -> StageEntry {
    match handoff.consume() {
        Some(payload) => StageEntry::Render(ResultView::from_payload(payload)),
        None => {
            log::info!("↩️ 没有可展示的结果，重定向到上传页");
            StageEntry::Redirect
        }
    }
}

/// 结果页展示模型。
#[derive(Debug, Clone, Serialize)]
pub struct ResultView {
    pub prediction: String,
    pub confidence: f64,
    /// 例如 `"92.5%"`。
    pub confidence_display: String,
    pub high_confidence: bool,
    pub confidence_note: &'static str,
    pub guidance: String,
    pub file_name: Option<String>,
    pub preview_width: u32,
    pub preview_height: u32,
    pub analyzed_at: String,
    #[serde(skip)]
    image: Arc<LoadedImage>,
}

impl ResultView {
    pub fn from_payload(payload: HandoffPayload) -> Self {
        let confidence = payload.confidence();
        let high_confidence = confidence >= HIGH_CONFIDENCE_THRESHOLD;
        let image = Arc::clone(payload.image());
        let display = image.display();

        Self {
            prediction: payload.prediction().to_string(),
            confidence,
            confidence_display: format!("{:.1}%", confidence),
            high_confidence,
            confidence_note: if high_confidence {
                HIGH_CONFIDENCE_NOTE
            } else {
                MODERATE_CONFIDENCE_NOTE
            },
            guidance: payload.guidance().to_string(),
            file_name: image.source().name().map(str::to_string),
            preview_width: display.width,
            preview_height: display.height,
            analyzed_at: payload.completed_at().format("%Y-%m-%d %H:%M:%S").to_string(),
            image,
        }
    }

    pub fn image(&self) -> &Arc<LoadedImage> {
        &self.image
    }

    /// 纯文本渲染（终端展示）。
    pub fn render_text(&self) -> String {
        let marker = if self.high_confidence { "✔" } else { "!" };
        let mut out = String::new();

        out.push_str("Analysis Complete\n\n");
        if let Some(name) = &self.file_name {
            out.push_str(&format!("Image:                {} ({}x{} preview)\n", name, self.preview_width, self.preview_height));
        }
        out.push_str(&format!("{} Predicted Condition: {}\n", marker, self.prediction));
        out.push_str(&format!("Confidence Level:     {}\n", self.confidence_display));
        out.push_str(&format!("                      {}\n\n", self.confidence_note));
        out.push_str("Recovery Guidance\n");
        out.push_str(&format!("  {}\n\n", self.guidance));
        out.push_str("Medical Disclaimer\n");
        out.push_str(&format!("  {}\n", MEDICAL_DISCLAIMER));
        out.push_str(&format!("\nAnalyzed at {}\n", self.analyzed_at));
        out
    }
}
