//! 漆面缺陷检测
//!
//! 纹理分析：起皮/剥落的漆面在灰度上呈高局部对比，同时色度很低
//! （露底的墙面基本无彩色）。按格子统计灰度标准差和平均饱和度，
//! 低饱和高对比的格子合并成候选区域。

use crate::core::detect::regions::{GridMask, CELL};
use crate::core::detect::{DefectDetector, DefectKind, RawFinding};
use crate::core::error::DetectorFailure;
use crate::core::video::frame::Frame;

pub struct PaintDefectDetector {
    /// 格子灰度标准差阈值
    min_stddev: f32,
    /// 格子平均饱和度上限
    max_saturation: f32,
    /// 过小区域忽略（像素）
    min_area: f32,
    min_confidence: f32,
}

struct CellStats {
    stddev: f32,
    saturation: f32,
}

impl PaintDefectDetector {
    pub fn new() -> Self {
        Self {
            min_stddev: 28.0,
            max_saturation: 0.25,
            min_area: 400.0,
            min_confidence: 0.35,
        }
    }

    fn cell_stats(frame: &Frame, cx: usize, cy: usize) -> CellStats {
        let w = frame.width as usize;
        let h = frame.height as usize;

        let mut sum = 0u64;
        let mut sum_sq = 0u64;
        let mut sat_sum = 0.0f32;
        let mut count = 0u32;

        let y_end = ((cy + 1) * CELL).min(h);
        let x_end = ((cx + 1) * CELL).min(w);
        for y in (cy * CELL)..y_end {
            let row = y * w;
            for x in (cx * CELL)..x_end {
                let idx = (row + x) * 4;
                let r = frame.data[idx] as u32;
                let g = frame.data[idx + 1] as u32;
                let b = frame.data[idx + 2] as u32;

                let gray = (r * 299 + g * 587 + b * 114) / 1000;
                sum += gray as u64;
                sum_sq += (gray * gray) as u64;

                let max = r.max(g).max(b);
                let min = r.min(g).min(b);
                if max > 0 {
                    sat_sum += (max - min) as f32 / max as f32;
                }
                count += 1;
            }
        }

        if count == 0 {
            return CellStats {
                stddev: 0.0,
                saturation: 0.0,
            };
        }

        let n = count as f64;
        let mean = sum as f64 / n;
        let variance = (sum_sq as f64 / n - mean * mean).max(0.0);

        CellStats {
            stddev: variance.sqrt() as f32,
            saturation: sat_sum / count as f32,
        }
    }
}

impl Default for PaintDefectDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl DefectDetector for PaintDefectDetector {
    fn name(&self) -> &'static str {
        "paint_defect"
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
        let cols = mask.cols();
        let mut cell_stddev = vec![0.0f32; cols * mask.rows()];

        for cy in 0..mask.rows() {
            for cx in 0..cols {
                let stats = Self::cell_stats(frame, cx, cy);
                cell_stddev[cy * cols + cx] = stats.stddev;
                if stats.stddev > self.min_stddev && stats.saturation < self.max_saturation {
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

            // 区域内平均对比度决定置信度
            let mean_stddev: f32 = region
                .members
                .iter()
                .map(|&(cx, cy)| cell_stddev[cy * cols + cx])
                .sum::<f32>()
                / region.members.len() as f32;
            let confidence = (mean_stddev / 80.0).min(0.75);

            if confidence > self.min_confidence {
                findings.push(RawFinding {
                    kind: DefectKind::PaintIssue,
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
