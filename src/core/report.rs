//! 分析报告与风险评分

use serde::Serialize;

use crate::core::assemble::Detection;
use crate::core::severity::Severity;

/// 报告汇总块
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisSummary {
    pub total_defects: usize,
    pub critical_defects: usize,
    pub high_defects: usize,
    /// 0-100 的整体风险分
    pub risk_score: u32,
}

/// 单次分析的完整产物
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub session_id: String,
    /// 视频时长（秒），由总帧数和帧率推得
    pub duration_secs: f64,
    pub total_frames: u64,
    pub analyzed_frames: u64,
    pub detections: Vec<Detection>,
    pub summary: AnalysisSummary,
}

/// 风险评分：严重度权重乘以置信度求和，按「全部 critical 且满置信」
/// 归一化到 0-100。没有检测时风险为 0。
pub fn risk_score(detections: &[Detection]) -> u32 {
    if detections.is_empty() {
        return 0;
    }
    let total: f32 = detections
        .iter()
        .map(|d| d.severity.weight() as f32 * d.confidence)
        .sum();
    let max_possible = detections.len() as f32 * Severity::Critical.weight() as f32;
    ((total / max_possible) * 100.0).min(100.0).round() as u32
}

pub fn compile(
    session_id: &str,
    detections: Vec<Detection>,
    total_frames: u64,
    analyzed_frames: u64,
    fps: f64,
) -> AnalysisReport {
    let duration_secs = if fps > 0.0 {
        total_frames as f64 / fps
    } else {
        0.0
    };

    let summary = AnalysisSummary {
        total_defects: detections.len(),
        critical_defects: detections
            .iter()
            .filter(|d| d.severity == Severity::Critical)
            .count(),
        high_defects: detections
            .iter()
            .filter(|d| d.severity == Severity::High)
            .count(),
        risk_score: risk_score(&detections),
    };

    AnalysisReport {
        session_id: session_id.to_string(),
        duration_secs,
        total_frames,
        analyzed_frames,
        detections,
        summary,
    }
}
