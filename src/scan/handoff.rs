//! # 结果交接模块
//!
//! ## 设计思路
//!
//! 单槽位（不是队列）：工作流在进入 `Complete` 时 `publish` 一次，
//! 结果页在进入时 `consume` 一次，取走即清空。
//! 没有发布就进入结果页是合法情况，由结果页重定向回上传页处理。

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Local};

use super::source::{AnalysisResult, LoadedImage};
use super::workflow::RunId;

/// 交给结果页的数据。
///
/// 图片以 `Arc` 引用工作流持有的 `LoadedImage`，不做拷贝。
#[derive(Debug, Clone)]
pub struct HandoffPayload {
    run: RunId,
    prediction: String,
    confidence: f64,
    guidance: String,
    image: Arc<LoadedImage>,
    completed_at: DateTime<Local>,
}

impl HandoffPayload {
    pub(crate) fn new(run: RunId, result: &AnalysisResult, image: Arc<LoadedImage>) -> Self {
        Self {
            run,
            prediction: result.prediction().to_string(),
            confidence: result.confidence(),
            guidance: result.guidance().to_string(),
            image,
            completed_at: Local::now(),
        }
    }

    pub fn run(&self) -> RunId {
        self.run
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

    pub fn image(&self) -> &Arc<LoadedImage> {
        &self.image
    }

    pub fn completed_at(&self) -> DateTime<Local> {
        self.completed_at
    }
}

/// 单槽位交接对象。
#[derive(Debug, Default)]
pub struct ResultHandoff {
    slot: Mutex<Option<HandoffPayload>>,
}

impl ResultHandoff {
    pub fn new() -> Self {
        Self::default()
    }

    /// 槽位里只有普通数据，锁中毒时沿用内部值即可。
    fn slot(&self) -> MutexGuard<'_, Option<HandoffPayload>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 发布本次运行的结果。
    ///
    /// 若上一次结果尚未被取走，则被新结果替换。
    pub fn publish(&self, payload: HandoffPayload) {
        let mut slot = self.slot();
        if let Some(previous) = slot.as_ref() {
            log::warn!(
                "⚠️ 运行 {} 的结果未被取走，已被运行 {} 替换",
                previous.run(),
                payload.run()
            );
        }
        log::debug!("📦 发布交接结果 - 运行 {}", payload.run());
        *slot = Some(payload);
    }

    /// 取走结果；第二次调用返回 `None`。
    pub fn consume(&self) -> Option<HandoffPayload> {
        self.slot().take()
    }

    /// 清空槽位，返回被丢弃的结果。新一轮开始时调用，旧结果不再对应当前运行。
    pub fn clear(&self) -> Option<HandoffPayload> {
        self.slot().take()
    }

    pub fn is_pending(&self) -> bool {
        self.slot().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan::source::{DisplayImage, ImageCandidate};

    fn payload(run: u64, prediction: &str) -> HandoffPayload {
        let image = Arc::new(LoadedImage::new(
            DisplayImage {
                data_url: "data:image/png;base64,".to_string(),
                width: 1,
                height: 1,
                source_width: 1,
                source_height: 1,
            },
            ImageCandidate::from_bytes("image/png", vec![0u8; 4]),
        ));
        let result = AnalysisResult::new(prediction, 80.0, "rest").expect("valid result");
        HandoffPayload::new(RunId::new(run), &result, image)
    }

    #[test]
    fn consume_returns_payload_exactly_once() {
        let handoff = ResultHandoff::new();
        handoff.publish(payload(1, "Acne"));

        let first = handoff.consume().expect("first consume yields payload");
        assert_eq!(first.prediction(), "Acne");
        assert!(handoff.consume().is_none());
        assert!(!handoff.is_pending());
    }

    #[test]
    fn consume_without_publish_is_absent() {
        assert!(ResultHandoff::new().consume().is_none());
    }

    #[test]
    fn newer_publish_replaces_unconsumed_payload() {
        let handoff = ResultHandoff::new();
        handoff.publish(payload(1, "Acne"));
        handoff.publish(payload(2, "Eczema"));

        let only = handoff.consume().expect("slot holds latest payload");
        assert_eq!(only.run(), RunId::new(2));
        assert!(handoff.consume().is_none());
    }

    #[test]
    fn clear_discards_unconsumed_payload() {
        let handoff = ResultHandoff::new();
        handoff.publish(payload(4, "Psoriasis"));

        let dropped = handoff.clear().expect("slot held a payload");
        assert_eq!(dropped.run(), RunId::new(4));
        assert!(handoff.consume().is_none());
        assert!(handoff.clear().is_none());
    }

    #[test]
    fn payload_references_image_without_copy() {
        let p = payload(3, "Rosacea");
        let clone = p.clone();

        assert!(Arc::ptr_eq(p.image(), clone.image()));
    }
}
