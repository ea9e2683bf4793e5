//! 合成霉斑降级检测器
//!
//! 仅在调用方显式开启离线/演示模式时参与。每帧从有界随机分布里
//! 生成 0-2 个貌似合理的检测，全部带 synthetic 标记，下游永远不会
//! 把它们与真实检测混淆。

use rand::Rng;

use crate::core::detect::{DefectDetector, DefectKind, PixelBox, RawFinding};
use crate::core::error::DetectorFailure;
use crate::core::video::frame::Frame;

const MAX_PER_FRAME: u32 = 2;
const CONFIDENCE_RANGE: (f32, f32) = (0.6, 0.9);
/// 相对面积范围（检测框面积 / 整帧面积）
const AREA_RANGE: (f32, f32) = (0.01, 0.06);

pub struct SyntheticMoldDetector;

impl SyntheticMoldDetector {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SyntheticMoldDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl DefectDetector for SyntheticMoldDetector {
    fn name(&self) -> &'static str {
        "mold_synthetic"
    }

    fn detect(&self, frame: &Frame) -> Result<Vec<RawFinding>, DetectorFailure> {
        let mut rng = rand::thread_rng();
        let count = rng.gen_range(0..=MAX_PER_FRAME);

        let frame_w = frame.width as f32;
        let frame_h = frame.height as f32;

        let findings = (0..count)
            .map(|_| {
                let area = rng.gen_range(AREA_RANGE.0..AREA_RANGE.1) * frame.area();
                // 随机宽高比，保持块状
                let aspect = rng.gen_range(0.6..1.6);
                let width = (area * aspect).sqrt().min(frame_w);
                let height = (area / aspect).sqrt().min(frame_h);

                let x = rng.gen_range(0.0..(frame_w - width).max(f32::MIN_POSITIVE));
                let y = rng.gen_range(0.0..(frame_h - height).max(f32::MIN_POSITIVE));

                RawFinding {
                    kind: DefectKind::Mold,
                    label: None,
                    confidence: rng.gen_range(CONFIDENCE_RANGE.0..CONFIDENCE_RANGE.1),
                    bbox: PixelBox {
                        x,
                        y,
                        width,
                        height,
                    },
                    synthetic: true,
                }
            })
            .collect();

        Ok(findings)
    }
}
