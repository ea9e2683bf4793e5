//! 裂缝检测
//!
//! 梯度/边缘分析：按格子统计边缘密度，连通区域里外接矩形细长的
//! 视为候选裂缝，置信度随区域面积增长。

use crate::core::detect::regions::{GridMask, CELL};
use crate::core::detect::{DefectDetector, DefectKind, RawFinding};
use crate::core::error::DetectorFailure;
use crate::core::video::frame::Frame;

pub struct CrackDetector {
    /// 中心差分梯度阈值（0-255 灰度）
    gradient_threshold: i32,
    /// 格子内边缘像素占比阈值
    min_cell_density: f32,
    /// 过小区域直接忽略（像素）
    min_area: f32,
    /// 细长判定：宽高比超出该范围才算线状特征
    elongation: f32,
    /// 产出候选的最低置信度
    min_confidence: f32,
}

impl CrackDetector {
    pub fn new() -> Self {
        Self {
            gradient_threshold: 40,
            min_cell_density: 0.18,
            min_area: 100.0,
            elongation: 3.0,
            min_confidence: 0.4,
        }
    }

    /// 格子内边缘像素占比（整数中心差分，避免浮点开销）
    fn cell_edge_density(&self, gray: &[u8], w: usize, h: usize, cx: usize, cy: usize) -> f32 {
        let threshold_sq = self.gradient_threshold * self.gradient_threshold;
        let mut edge_count = 0u32;
        let mut total = 0u32;

        let y_start = (cy * CELL).max(1);
        let y_end = ((cy + 1) * CELL).min(h - 1);
        let x_start = (cx * CELL).max(1);
        let x_end = ((cx + 1) * CELL).min(w - 1);

        for y in y_start..y_end {
            let row = y * w;
            for x in x_start..x_end {
                let idx = row + x;
                let gx = gray[idx + 1] as i32 - gray[idx - 1] as i32;
                let gy = gray[idx + w] as i32 - gray[idx - w] as i32;
                if gx * gx + gy * gy > threshold_sq {
                    edge_count += 1;
                }
                total += 1;
            }
        }

        if total == 0 {
            0.0
        } else {
            edge_count as f32 / total as f32
        }
    }
}

impl Default for CrackDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl DefectDetector for CrackDetector {
    fn name(&self) -> &'static str {
        "crack"
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
        if frame.width < 3 || frame.height < 3 {
            return Ok(Vec::new());
        }

        let gray = frame.to_gray();
        let w = frame.width as usize;
        let h = frame.height as usize;

        let mut mask = GridMask::for_frame(frame.width, frame.height);
        for cy in 0..mask.rows() {
            for cx in 0..mask.cols() {
                if self.cell_edge_density(&gray, w, h, cx, cy) > self.min_cell_density {
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

            // 只保留线状特征
            let aspect = region.aspect_ratio();
            if aspect < self.elongation && aspect > 1.0 / self.elongation {
                continue;
            }

            let confidence = (area / 1000.0).min(0.9);
            if confidence > self.min_confidence {
                findings.push(RawFinding {
                    kind: DefectKind::Crack,
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
