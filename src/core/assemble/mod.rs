//! 检测装配
//!
//! 按帧序消费检测器产出的候选结果：置信度门控、坐标归一化、
//! 跨帧去重合并、严重度定级、文案与缩略图生成，最终产出
//! 发出后不再变更的 [`Detection`] 序列。

pub mod templates;
pub mod thumbnail;

use std::time::Duration;

use serde::Serialize;

use crate::core::config::AnalysisConfig;
use crate::core::detect::{DefectKind, PixelBox, RawFinding};
use crate::core::severity::{severity, Severity};
use crate::core::video::frame::Frame;

use self::thumbnail::ThumbnailStore;

/// 归一化坐标框，各分量保证落在 [0, 1]，且 x + width <= 1、y + height <= 1
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NormBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl NormBox {
    /// 像素框归一化，越出帧边的部分裁掉
    pub fn from_pixel(bbox: &PixelBox, frame_width: u32, frame_height: u32) -> Self {
        let fw = frame_width as f32;
        let fh = frame_height as f32;
        let x = (bbox.x / fw).clamp(0.0, 1.0);
        let y = (bbox.y / fh).clamp(0.0, 1.0);
        let width = (((bbox.x + bbox.width) / fw).clamp(0.0, 1.0) - x).max(0.0);
        let height = (((bbox.y + bbox.height) / fh).clamp(0.0, 1.0) - y).max(0.0);
        NormBox {
            x,
            y,
            width,
            height,
        }
    }

    /// 相对面积（相对整帧）
    pub fn area(&self) -> f32 {
        self.width * self.height
    }

    /// 交并比
    pub fn iou(&self, other: &NormBox) -> f32 {
        let ix1 = self.x.max(other.x);
        let iy1 = self.y.max(other.y);
        let ix2 = (self.x + self.width).min(other.x + other.width);
        let iy2 = (self.y + self.height).min(other.y + other.height);
        let inter = (ix2 - ix1).max(0.0) * (iy2 - iy1).max(0.0);
        let union = self.area() + other.area() - inter;
        if union <= 0.0 {
            0.0
        } else {
            inter / union
        }
    }
}

/// 最终检测记录，装配完成后不可变
#[derive(Debug, Clone, Serialize)]
pub struct Detection {
    /// 会话内唯一 id："{缺陷族}_{帧号}_{序号}"
    pub id: String,
    #[serde(rename = "type")]
    pub kind: DefectKind,
    pub severity: Severity,
    pub confidence: f32,
    pub frame_number: u64,
    /// 最早一次出现的时间点（秒）
    pub timestamp: f64,
    pub location: NormBox,
    pub description: String,
    pub recommendations: Vec<String>,
    /// 缩略图的不透明引用，低置信度检测没有缩略图
    pub thumbnail: Option<String>,
    /// 合成数据标记（离线回退产生的结果）
    pub synthetic: bool,
}

/// 尚未定稿的检测，跨帧合并期间可变
struct PendingDetection {
    kind: DefectKind,
    label: Option<String>,
    confidence: f32,
    frame_number: u64,
    timestamp: Duration,
    location: NormBox,
    synthetic: bool,
    thumbnail_jpeg: Option<Vec<u8>>,
    last_seen_frame: u64,
}

/// 逐帧装配器
///
/// 去重规则：同一缺陷族、帧号差不超过一个采样步长、IoU 达到阈值的
/// 候选并为一条记录。合并保留置信度最高实例的属性，时间戳保持最早。
pub struct DetectionAssembler {
    session_id: String,
    confidence_threshold: f32,
    dedup_iou: f32,
    max_merge_gap: u64,
    thumbnail_min_confidence: f32,
    pending: Vec<PendingDetection>,
}

impl DetectionAssembler {
    pub fn new(session_id: String, config: &AnalysisConfig) -> Self {
        DetectionAssembler {
            session_id,
            confidence_threshold: config.confidence_threshold,
            dedup_iou: config.dedup_iou,
            max_merge_gap: config.frame_skip_ratio,
            thumbnail_min_confidence: config.thumbnail_min_confidence,
            pending: Vec::new(),
        }
    }

    /// 消费一帧的候选检测，帧必须按帧号升序送入
    pub fn ingest(&mut self, frame: &Frame, findings: Vec<RawFinding>) {
        for finding in findings {
            if finding.confidence < self.confidence_threshold {
                continue;
            }

            let location = NormBox::from_pixel(&finding.bbox, frame.width, frame.height);
            if location.area() <= 0.0 {
                continue;
            }

            let merged = self.try_merge(frame, &finding, &location);
            if merged {
                continue;
            }

            let thumbnail_jpeg = if finding.confidence > self.thumbnail_min_confidence {
                thumbnail::render_thumbnail(frame, &finding.bbox)
            } else {
                None
            };

            self.pending.push(PendingDetection {
                kind: finding.kind,
                label: finding.label,
                confidence: finding.confidence,
                frame_number: frame.index,
                timestamp: frame.timestamp,
                location,
                synthetic: finding.synthetic,
                thumbnail_jpeg,
                last_seen_frame: frame.index,
            });
        }
    }

    fn try_merge(&mut self, frame: &Frame, finding: &RawFinding, location: &NormBox) -> bool {
        let dedup_iou = self.dedup_iou;
        let max_gap = self.max_merge_gap;
        let existing = self.pending.iter_mut().find(|p| {
            p.kind == finding.kind
                && frame.index - p.last_seen_frame <= max_gap
                && p.location.iou(location) >= dedup_iou
        });

        let Some(existing) = existing else {
            return false;
        };

        existing.last_seen_frame = frame.index;
        if finding.confidence > existing.confidence {
            existing.confidence = finding.confidence;
            existing.location = *location;
            existing.label = finding.label.clone();
            existing.synthetic = finding.synthetic;
            existing.frame_number = frame.index;
            if finding.confidence > self.thumbnail_min_confidence {
                if let Some(jpeg) = thumbnail::render_thumbnail(frame, &finding.bbox) {
                    existing.thumbnail_jpeg = Some(jpeg);
                }
            }
        }
        true
    }

    /// 收尾：定级、编号、生成文案，缩略图落入存储
    pub fn finish(self, store: &ThumbnailStore) -> Vec<Detection> {
        let DetectionAssembler {
            session_id, pending, ..
        } = self;

        pending
            .into_iter()
            .enumerate()
            .map(|(seq, p)| {
                let sev = severity(p.confidence, p.location.area());
                let id = format!("{}_{}_{}", p.kind.as_str(), p.frame_number, seq);
                let thumbnail = p.thumbnail_jpeg.map(|jpeg| {
                    let key = thumbnail::thumbnail_key(&session_id, &id);
                    store.insert(key.clone(), jpeg);
                    key
                });
                Detection {
                    id,
                    kind: p.kind,
                    severity: sev,
                    confidence: p.confidence,
                    frame_number: p.frame_number,
                    timestamp: p.timestamp.as_secs_f64(),
                    location: p.location,
                    description: templates::description(p.kind, p.label.as_deref(), p.confidence),
                    recommendations: templates::recommendations(p.kind, sev),
                    thumbnail,
                    synthetic: p.synthetic,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_frame(index: u64, width: u32, height: u32) -> Frame {
        Frame {
            index,
            timestamp: Duration::from_secs_f64(index as f64 / 30.0),
            width,
            height,
            data: vec![100u8; (width * height * 4) as usize],
        }
    }

    fn finding(kind: DefectKind, confidence: f32, x: f32, y: f32, w: f32, h: f32) -> RawFinding {
        RawFinding {
            kind,
            label: None,
            confidence,
            bbox: PixelBox {
                x,
                y,
                width: w,
                height: h,
            },
            synthetic: false,
        }
    }

    fn default_assembler() -> DetectionAssembler {
        let config = AnalysisConfig::default();
        DetectionAssembler::new("test-session".to_string(), &config)
    }

    #[test]
    fn test_norm_box_clamps_out_of_frame_coordinates() {
        // 远端服务给出的中心点换算可能越出左边界
        let bbox = PixelBox {
            x: -10.0,
            y: 5.0,
            width: 50.0,
            height: 200.0,
        };
        let norm = NormBox::from_pixel(&bbox, 100, 100);
        assert!(norm.x >= 0.0);
        assert!(norm.x + norm.width <= 1.0 + f32::EPSILON);
        assert!(norm.y + norm.height <= 1.0 + f32::EPSILON);
    }

    #[test]
    fn test_iou_identical_and_disjoint() {
        let a = NormBox {
            x: 0.1,
            y: 0.1,
            width: 0.3,
            height: 0.3,
        };
        let b = NormBox {
            x: 0.6,
            y: 0.6,
            width: 0.2,
            height: 0.2,
        };
        assert!((a.iou(&a) - 1.0).abs() < 1e-6);
        assert_eq!(a.iou(&b), 0.0);
    }

    #[test]
    fn test_low_confidence_findings_dropped() {
        let mut asm = default_assembler();
        let frame = test_frame(0, 100, 100);
        asm.ingest(
            &frame,
            vec![finding(DefectKind::Crack, 0.49, 10.0, 10.0, 40.0, 40.0)],
        );
        let store = ThumbnailStore::new();
        assert!(asm.finish(&store).is_empty());
    }

    #[test]
    fn test_overlapping_adjacent_frames_merge_to_one() {
        let mut asm = default_assembler();
        let store = ThumbnailStore::new();

        // 默认采样步长 10，帧 0 和帧 10 相邻
        asm.ingest(
            &test_frame(0, 100, 100),
            vec![finding(DefectKind::Crack, 0.6, 10.0, 10.0, 40.0, 40.0)],
        );
        asm.ingest(
            &test_frame(10, 100, 100),
            vec![finding(DefectKind::Crack, 0.65, 12.0, 10.0, 40.0, 40.0)],
        );

        let detections = asm.finish(&store);
        assert_eq!(detections.len(), 1);
        // 属性取最高置信度实例，时间戳保持最早
        assert_eq!(detections[0].confidence, 0.65);
        assert_eq!(detections[0].timestamp, 0.0);
    }

    #[test]
    fn test_different_kinds_never_merge() {
        let mut asm = default_assembler();
        let store = ThumbnailStore::new();

        asm.ingest(
            &test_frame(0, 100, 100),
            vec![
                finding(DefectKind::Crack, 0.6, 10.0, 10.0, 40.0, 40.0),
                finding(DefectKind::WaterDamage, 0.6, 10.0, 10.0, 40.0, 40.0),
            ],
        );

        assert_eq!(asm.finish(&store).len(), 2);
    }

    #[test]
    fn test_distant_frames_stay_separate() {
        let mut asm = default_assembler();
        let store = ThumbnailStore::new();

        asm.ingest(
            &test_frame(0, 100, 100),
            vec![finding(DefectKind::Crack, 0.6, 10.0, 10.0, 40.0, 40.0)],
        );
        // 帧号差 30 超过采样步长 10
        asm.ingest(
            &test_frame(30, 100, 100),
            vec![finding(DefectKind::Crack, 0.6, 10.0, 10.0, 40.0, 40.0)],
        );

        assert_eq!(asm.finish(&store).len(), 2);
    }

    #[test]
    fn test_detection_ids_unique_and_structured() {
        let mut asm = default_assembler();
        let store = ThumbnailStore::new();

        asm.ingest(
            &test_frame(5, 100, 100),
            vec![
                finding(DefectKind::Crack, 0.6, 0.0, 0.0, 30.0, 30.0),
                finding(DefectKind::Crack, 0.6, 60.0, 60.0, 30.0, 30.0),
            ],
        );

        let detections = asm.finish(&store);
        assert_eq!(detections.len(), 2);
        assert_eq!(detections[0].id, "crack_5_0");
        assert_eq!(detections[1].id, "crack_5_1");
    }

    #[test]
    fn test_timestamps_non_decreasing() {
        let mut asm = default_assembler();
        let store = ThumbnailStore::new();

        for i in [0u64, 10, 20] {
            asm.ingest(
                &test_frame(i, 100, 100),
                vec![finding(
                    DefectKind::Crack,
                    0.6,
                    (i as f32) * 3.0,
                    80.0,
                    15.0,
                    15.0,
                )],
            );
        }

        let detections = asm.finish(&store);
        for pair in detections.windows(2) {
            assert!(pair[0].timestamp <= pair[1].timestamp);
        }
    }

    #[test]
    fn test_thumbnail_only_above_threshold() {
        let mut asm = default_assembler();
        let store = ThumbnailStore::new();

        asm.ingest(
            &test_frame(0, 100, 100),
            vec![
                finding(DefectKind::Crack, 0.6, 0.0, 0.0, 30.0, 30.0),
                finding(DefectKind::WaterDamage, 0.71, 60.0, 60.0, 30.0, 30.0),
            ],
        );

        let detections = asm.finish(&store);
        let crack = detections.iter().find(|d| d.kind == DefectKind::Crack).unwrap();
        let water = detections
            .iter()
            .find(|d| d.kind == DefectKind::WaterDamage)
            .unwrap();

        assert!(crack.thumbnail.is_none());
        let key = water.thumbnail.as_ref().unwrap();
        assert!(store.get(key).is_some());
    }
}
