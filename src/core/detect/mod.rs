//! 缺陷检测器集合
//!
//! 每个缺陷族一个检测器策略，统一实现 [`DefectDetector`]。检测器之间
//! 互不共享可变状态，单帧上由 [`DetectorSet`] 并行扇出；单个检测器的
//! 失败只影响它自己在该帧的输出，计数后继续。

pub mod crack;
pub mod paint;
pub mod regions;
pub mod remote;
pub mod synthetic;
pub mod water;

use std::sync::atomic::{AtomicU64, Ordering};

use log::{info, warn};
use rayon::prelude::*;
use serde::Serialize;

use crate::core::config::AnalysisConfig;
use crate::core::error::{AnalysisError, DetectorFailure};
use crate::core::video::frame::Frame;

pub use crack::CrackDetector;
pub use paint::PaintDefectDetector;
pub use remote::RemoteMoldDetector;
pub use synthetic::SyntheticMoldDetector;
pub use water::WaterStainDetector;

/// 缺陷族
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DefectKind {
    Mold,
    Crack,
    WaterDamage,
    PaintIssue,
}

impl DefectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DefectKind::Mold => "mold",
            DefectKind::Crack => "crack",
            DefectKind::WaterDamage => "water_damage",
            DefectKind::PaintIssue => "paint_issue",
        }
    }
}

/// 相对源帧的像素坐标框（左上角 + 宽高）
#[derive(Debug, Clone, Copy)]
pub struct PixelBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl PixelBox {
    pub fn area(&self) -> f32 {
        self.width * self.height
    }
}

/// 单个检测器在单帧上产出的候选检测
#[derive(Debug, Clone)]
pub struct RawFinding {
    pub kind: DefectKind,
    /// 外部服务返回的原始类别标签，启发式检测器为 None
    pub label: Option<String>,
    pub confidence: f32,
    pub bbox: PixelBox,
    /// 合成数据标记：离线降级产生的检测永远为 true，下游不会与真实检测混淆
    pub synthetic: bool,
}

/// 检测器策略：消费一帧，产出零或多个候选检测
pub trait DefectDetector: Send + Sync {
    fn name(&self) -> &'static str;

    fn detect(&self, frame: &Frame) -> Result<Vec<RawFinding>, DetectorFailure>;
}

/// 固定顺序的检测器集合
pub struct DetectorSet {
    detectors: Vec<Box<dyn DefectDetector>>,
    has_model_detector: bool,
    failures: AtomicU64,
}

impl DetectorSet {
    /// 按配置组装检测器
    ///
    /// 霉斑族三选一：离线模式用合成降级；配置了外部服务用远程模型；
    /// 否则严格模式下整体省略。启发式检测器始终参与。
    pub fn from_config(config: &AnalysisConfig) -> Result<Self, AnalysisError> {
        let mut detectors: Vec<Box<dyn DefectDetector>> = Vec::new();
        let mut has_model_detector = false;

        if config.offline_mode {
            info!("离线模式：启用合成霉斑检测器");
            detectors.push(Box::new(SyntheticMoldDetector::new()));
        } else if let Some(service) = &config.service {
            detectors.push(Box::new(RemoteMoldDetector::new(
                service,
                config.request_timeout,
            )?));
            has_model_detector = true;
        } else {
            info!("未配置外部分类服务，霉斑检测器省略");
        }

        detectors.push(Box::new(CrackDetector::new()));
        detectors.push(Box::new(WaterStainDetector::new()));
        detectors.push(Box::new(PaintDefectDetector::new()));

        Ok(Self {
            detectors,
            has_model_detector,
            failures: AtomicU64::new(0),
        })
    }

    #[cfg(test)]
    fn from_detectors(detectors: Vec<Box<dyn DefectDetector>>) -> Self {
        Self {
            detectors,
            has_model_detector: false,
            failures: AtomicU64::new(0),
        }
    }

    /// 单帧扇出：并行运行所有检测器，按固定检测器顺序合并输出
    pub fn run(&self, frame: &Frame) -> Vec<RawFinding> {
        let mut results: Vec<(usize, Vec<RawFinding>)> = self
            .detectors
            .par_iter()
            .enumerate()
            .map(|(i, detector)| match detector.detect(frame) {
                Ok(findings) => (i, findings),
                Err(e) => {
                    self.failures.fetch_add(1, Ordering::Relaxed);
                    warn!("检测器 {} 在帧 {} 上失败: {}", detector.name(), frame.index, e);
                    (i, Vec::new())
                }
            })
            .collect();

        results.sort_by_key(|(i, _)| *i);
        results.into_iter().flat_map(|(_, f)| f).collect()
    }

    /// 被吸收的检测器失败总数
    pub fn failure_count(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    /// 是否包含真实模型检测器（合成降级不算）
    pub fn has_model_detector(&self) -> bool {
        self.has_model_detector
    }

    pub fn len(&self) -> usize {
        self.detectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.detectors.is_empty()
    }
}
