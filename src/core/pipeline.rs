//! 分析流水线
//!
//! 串起单个任务的完整链路：采样 → 检测器扇出 → 装配，
//! 逐帧推进并回写会话进度，帧边界检查取消标志。
//! 取消即丢弃全部部分结果。

use std::sync::atomic::{AtomicBool, Ordering};

use log::info;

use crate::core::assemble::thumbnail::ThumbnailStore;
use crate::core::assemble::DetectionAssembler;
use crate::core::config::AnalysisConfig;
use crate::core::detect::DetectorSet;
use crate::core::error::AnalysisError;
use crate::core::report::{self, AnalysisReport};
use crate::core::session::JobRegistry;
use crate::core::video::sampler::FrameSampler;
use crate::core::video::source::VideoSource;

/// 驱动一个会话从头跑到尾。出错或取消时不产出任何检测。
pub fn run_job<S: VideoSource>(
    session_id: &str,
    source: S,
    config: &AnalysisConfig,
    registry: &JobRegistry,
    thumbnails: &ThumbnailStore,
    cancel: &AtomicBool,
) -> Result<AnalysisReport, AnalysisError> {
    config.validate()?;
    let detectors = DetectorSet::from_config(config)?;

    let mut sampler = FrameSampler::new(source, config.frame_skip_ratio);
    let total_hint = sampler.frame_count_hint();
    let fps = sampler.fps();

    registry.start_processing(session_id);
    info!(
        "会话 {}: 开始分析，检测器 {} 个，采样步长 {}",
        session_id,
        detectors.len(),
        config.frame_skip_ratio
    );

    let mut assembler = DetectionAssembler::new(session_id.to_string(), config);
    let mut analyzed_frames = 0u64;
    let mut last_index = 0u64;

    while let Some(frame) = sampler.next_sampled()? {
        if cancel.load(Ordering::Relaxed) {
            info!(
                "会话 {}: 已取消，丢弃 {} 帧的部分结果",
                session_id, analyzed_frames
            );
            return Err(AnalysisError::Cancelled);
        }

        let findings = detectors.run(&frame);
        assembler.ingest(&frame, findings);

        analyzed_frames += 1;
        last_index = frame.index;

        if let Some(total) = total_hint {
            if total > 0 {
                let percent = (frame.index + 1) as f32 / total as f32 * 100.0;
                registry.set_progress(session_id, percent);
            }
        }
    }

    let detections = assembler.finish(thumbnails);
    let total_frames = total_hint.unwrap_or(last_index + 1);
    let report = report::compile(session_id, detections, total_frames, analyzed_frames, fps);

    if detectors.failure_count() > 0 {
        info!(
            "会话 {}: 吸收了 {} 次检测器失败",
            session_id,
            detectors.failure_count()
        );
    }
    info!(
        "会话 {}: 分析完成，{} 帧采样，{} 条检测，风险分 {}",
        session_id,
        analyzed_frames,
        report.detections.len(),
        report.summary.risk_score
    );

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::core::detect::DefectKind;
    use crate::core::session::JobStatus;
    use crate::core::severity::Severity;
    use crate::core::video::source::{FrameSequence, SourceFrame};

    const W: u32 = 96;
    const H: u32 = 96;

    fn uniform_frame() -> SourceFrame {
        SourceFrame {
            width: W,
            height: H,
            data: vec![120u8; (W * H * 4) as usize],
        }
    }

    /// 在均匀帧上叠加一条高对比竖条纹带：行 40..56 内 2 像素宽的
    /// 红黑相间条纹。饱和红色避开水渍的色相窗口和涂料检测的
    /// 低饱和度门槛，只有裂缝检测会命中。
    fn striped_frame() -> SourceFrame {
        let mut data = vec![0u8; (W * H * 4) as usize];
        for y in 0..H as usize {
            for x in 0..W as usize {
                let i = (y * W as usize + x) * 4;
                let in_band = (40..56).contains(&y);
                let (r, g, b) = if in_band && (x / 2) % 2 == 0 {
                    (255u8, 0u8, 0u8)
                } else if in_band {
                    (10u8, 0u8, 0u8)
                } else {
                    (120u8, 120u8, 120u8)
                };
                data[i] = r;
                data[i + 1] = g;
                data[i + 2] = b;
                data[i + 3] = 255;
            }
        }
        SourceFrame {
            width: W,
            height: H,
            data,
        }
    }

    fn offline_config(stride: u64) -> AnalysisConfig {
        AnalysisConfig {
            frame_skip_ratio: stride,
            service: None,
            offline_mode: false,
            ..AnalysisConfig::default()
        }
    }

    #[test]
    fn test_end_to_end_single_merged_detection() {
        // 50 帧，帧 20..=25 带缺陷条纹带；步长 5 采样到帧 20 和 25
        let frames: Vec<SourceFrame> = (0..50)
            .map(|i| {
                if (20..=25).contains(&i) {
                    striped_frame()
                } else {
                    uniform_frame()
                }
            })
            .collect();
        let source = FrameSequence::new(frames, 30.0);
        let config = offline_config(5);
        let registry = JobRegistry::new();
        let store = ThumbnailStore::new();
        let cancel = AtomicBool::new(false);
        registry.create("e2e");

        let report = run_job("e2e", source, &config, &registry, &store, &cancel).unwrap();

        // 两帧各命中一次，去重并成一条
        assert_eq!(report.detections.len(), 1);
        let det = &report.detections[0];
        assert_eq!(det.kind, DefectKind::Crack);
        assert_eq!(det.severity, Severity::Critical);
        assert!((det.timestamp - 20.0 / 30.0).abs() < 1e-6);
        assert!(det.thumbnail.is_some());
        assert_eq!(report.analyzed_frames, 10);
        assert_eq!(report.total_frames, 50);
        assert_eq!(report.summary.critical_defects, 1);
        assert!(report.summary.risk_score > 0);

        let view = registry.progress("e2e").unwrap();
        assert_eq!(view.status, JobStatus::Processing);
        assert!(view.percent_complete > 0.0);
    }

    #[test]
    fn test_clean_video_empty_report() {
        let frames = vec![uniform_frame(); 30];
        let source = FrameSequence::new(frames, 30.0);
        let config = offline_config(10);
        let registry = JobRegistry::new();
        let store = ThumbnailStore::new();
        let cancel = AtomicBool::new(false);
        registry.create("clean");

        let report = run_job("clean", source, &config, &registry, &store, &cancel).unwrap();

        assert!(report.detections.is_empty());
        assert_eq!(report.summary.risk_score, 0);
        assert!(store.is_empty());
    }

    #[test]
    fn test_empty_source_is_an_error() {
        let source = FrameSequence::new(Vec::new(), 30.0);
        let config = offline_config(10);
        let registry = JobRegistry::new();
        let store = ThumbnailStore::new();
        let cancel = AtomicBool::new(false);
        registry.create("empty");

        let err = run_job("empty", source, &config, &registry, &store, &cancel).unwrap_err();
        assert!(matches!(err, AnalysisError::EmptySource));
    }

    /// 产出第 4 帧前自行翻转取消标志的帧源
    struct SelfCancellingSource {
        inner: FrameSequence,
        yielded: u64,
        cancel: Arc<AtomicBool>,
    }

    impl VideoSource for SelfCancellingSource {
        fn next_frame(&mut self) -> Result<Option<SourceFrame>, AnalysisError> {
            if self.yielded == 3 {
                self.cancel.store(true, Ordering::Relaxed);
            }
            self.yielded += 1;
            self.inner.next_frame()
        }

        fn fps(&self) -> Option<f64> {
            self.inner.fps()
        }

        fn frame_count_hint(&self) -> Option<u64> {
            self.inner.frame_count_hint()
        }
    }

    #[test]
    fn test_cancellation_discards_partial_results() {
        let frames = vec![striped_frame(); 10];
        let cancel = Arc::new(AtomicBool::new(false));
        let source = SelfCancellingSource {
            inner: FrameSequence::new(frames, 30.0),
            yielded: 0,
            cancel: Arc::clone(&cancel),
        };
        let config = offline_config(1);
        let registry = JobRegistry::new();
        let store = ThumbnailStore::new();
        registry.create("cancelled");

        let err = run_job("cancelled", source, &config, &registry, &store, &cancel).unwrap_err();

        assert!(matches!(err, AnalysisError::Cancelled));
        // 前 3 帧已产生候选，但全部被丢弃
        assert!(store.is_empty());
    }
}
