//! 水渍检测
//!
//! 颜色空间分析：逐像素判定是否落在水渍色域（偏黄褐的污渍色带），
//! 按格子统计覆盖率后合并成区域，置信度随面积增长。

use crate::core::detect::regions::{GridMask, CELL};
use crate::core::detect::{DefectDetector, DefectKind, RawFinding};
use crate::core::error::DetectorFailure;
use crate::core::video::frame::Frame;

pub struct WaterStainDetector {
    /// 色相区间（度），黄褐色污渍
    hue_range: (f32, f32),
    min_saturation: f32,
    /// 明度区间：太暗是阴影，太亮是反光
    value_range: (f32, f32),
    /// 格子内污渍像素覆盖率阈值
    min_cell_coverage: f32,
    /// 过小区域忽略（像素）
    min_area: f32,
    min_confidence: f32,
}

impl WaterStainDetector {
    pub fn new() -> Self {
        Self {
            hue_range: (20.0, 60.0),
            min_saturation: 0.2,
            value_range: (0.2, 0.8),
            min_cell_coverage: 0.5,
            min_area: 500.0,
            min_confidence: 0.3,
        }
    }

    fn is_stain_pixel(&self, r: u8, g: u8, b: u8) -> bool {
        let (h, s, v) = rgb_to_hsv(r, g, b);
        h >= self.hue_range.0
            && h <= self.hue_range.1
            && s >= self.min_saturation
            && v >= self.value_range.0
            && v <= self.value_range.1
    }

    /// 格子内污渍像素覆盖率
    fn cell_coverage(&self, frame: &Frame, cx: usize, cy: usize) -> f32 {
        let w = frame.width as usize;
        let h = frame.height as usize;
        let mut hits = 0u32;
        let mut total = 0u32;

        let y_end = ((cy + 1) * CELL).min(h);
        let x_end = ((cx + 1) * CELL).min(w);
        for y in (cy * CELL)..y_end {
            let row = y * w;
            for x in (cx * CELL)..x_end {
                let idx = (row + x) * 4;
                if self.is_stain_pixel(frame.data[idx], frame.data[idx + 1], frame.data[idx + 2]) {
                    hits += 1;
                }
                total += 1;
            }
        }

        if total == 0 {
            0.0
        } else {
            hits as f32 / total as f32
        }
    }
}

impl Default for WaterStainDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl DefectDetector for WaterStainDetector {
    fn name(&self) -> &'static str {
        "water_stain"
    }

    fn detect(&self, frame: &Frame) -> Result<Vec<RawFinding>, DetectorFailure> {
        if frame.data.len() != frame.pixel_count() * 4 {
            return Err(DetectorFailure::MalformedFrame(format!(
                "RGBA 数据长度 {} 与 {}x{} 不符",
                frame.data.len(),
                frame.width,
                frame.height
            )));
        }

        let mut mask = GridMask::for_frame(frame.width, frame.height);
        for cy in 0..mask.rows() {
            for cx in 0..mask.cols() {
                if self.cell_coverage(frame, cx, cy) > self.min_cell_coverage {
                    mask.mark(cx, cy);
                }
            }
        }

        let mut findings = Vec::new();
        for region in mask.regions() {
            let area = region.pixel_area();
            if area < self.min_area {
                continue;
            }

            let confidence = (area / 5000.0).min(0.7);
            if confidence > self.min_confidence {
                findings.push(RawFinding {
                    kind: DefectKind::WaterDamage,
                    label: None,
                    confidence,
                    bbox: region.to_pixel_box(),
                    synthetic: false,
                });
            }
        }

        Ok(findings)
    }
}

/// RGB 转 HSV，h 单位为度 [0, 360)，s/v 为 [0, 1]
fn rgb_to_hsv(r: u8, g: u8, b: u8) -> (f32, f32, f32) {
    let r = r as f32 / 255.0;
    let g = g as f32 / 255.0;
    let b = b as f32 / 255.0;

    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let h = if delta == 0.0 {
        0.0
    } else if max == r {
        60.0 * (((g - b) / delta).rem_euclid(6.0))
    } else if max == g {
        60.0 * ((b - r) / delta + 2.0)
    } else {
        60.0 * ((r - g) / delta + 4.0)
    };

    let s = if max == 0.0 { 0.0 } else { delta / max };

    (h, s, max)
}
