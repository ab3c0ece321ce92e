//! 内置样例分类结果。
//!
//! 模拟远程模型：固定延迟后从样例表中随机挑一条。指定种子时输出序列可复现。

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::AnalysisService;
use crate::scan::ServiceError;
use crate::scan::source::{AnalysisResult, LoadedImage};

/// (诊断, 置信度, 护理建议)
const CATALOG: [(&str, f64, &str); 5] = [
    (
        "Acne",
        92.5,
        "Cleanse gently twice daily, avoid oily products, use mild topical treatments containing benzoyl peroxide or salicylic acid. Maintain a consistent skincare routine and avoid touching your face.",
    ),
    (
        "Eczema",
        87.3,
        "Keep skin moisturized with fragrance-free creams, avoid harsh soaps and hot water. Use prescribed corticosteroid creams as directed. Identify and avoid triggers like certain fabrics or stress.",
    ),
    (
        "Rosacea",
        79.8,
        "Protect from sun exposure, avoid spicy foods and alcohol, use gentle skincare products. Consider prescription treatments like metronidazole gel. Keep a diary to identify personal triggers.",
    ),
    (
        "Psoriasis",
        84.6,
        "Apply moisturizers frequently, use medicated creams as prescribed, consider phototherapy. Manage stress levels and maintain a healthy lifestyle. Avoid skin injuries that may trigger flare-ups.",
    ),
    (
        "Melanoma (Early Stage)",
        71.2,
        "URGENT: Schedule an immediate appointment with a dermatologist for professional evaluation. Early detection is crucial. Avoid sun exposure and monitor any changes in size, shape, or color.",
    ),
];

pub struct CatalogAnalysisService {
    delay: Duration,
    rng: Mutex<StdRng>,
}

impl CatalogAnalysisService {
    pub fn new(delay: Duration, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Self {
            delay,
            rng: Mutex::new(rng),
        }
    }

    fn pick(&self) -> Result<usize, ServiceError> {
        let mut rng = self
            .rng
            .lock()
            .map_err(|_| ServiceError::Transient("样例后端随机数锁已中毒".to_string()))?;
        Ok(rng.gen_range(0..CATALOG.len()))
    }
}

#[async_trait]
impl AnalysisService for CatalogAnalysisService {
    async fn analyze(&self, image: &LoadedImage) -> Result<AnalysisResult, ServiceError> {
        let index = self.pick()?;

        log::debug!(
            "🧪 样例后端分析 - 预览: {}x{} 延迟: {}ms",
            image.display().width,
            image.display().height,
            self.delay.as_millis()
        );

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let (prediction, confidence, guidance) = CATALOG[index];
        AnalysisResult::new(prediction, confidence, guidance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan::source::{DisplayImage, ImageCandidate};

    fn loaded() -> LoadedImage {
        LoadedImage::new(
            DisplayImage {
                data_url: "data:image/png;base64,".to_string(),
                width: 1,
                height: 1,
                source_width: 1,
                source_height: 1,
            },
            ImageCandidate::from_bytes("image/png", vec![0u8; 4]),
        )
    }

    #[tokio::test]
    async fn same_seed_gives_same_sequence() {
        let image = loaded();
        let first = CatalogAnalysisService::new(Duration::ZERO, Some(7));
        let second = CatalogAnalysisService::new(Duration::ZERO, Some(7));

        for _ in 0..10 {
            let a = first.analyze(&image).await.expect("catalog never fails");
            let b = second.analyze(&image).await.expect("catalog never fails");
            assert_eq!(a, b);
        }
    }

    #[tokio::test]
    async fn results_come_from_catalog() {
        let image = loaded();
        let service = CatalogAnalysisService::new(Duration::ZERO, Some(42));

        for _ in 0..20 {
            let result = service.analyze(&image).await.expect("catalog never fails");
            assert!(CATALOG.iter().any(|(label, confidence, _)| {
                *label == result.prediction() && *confidence == result.confidence()
            }));
        }
    }
}
