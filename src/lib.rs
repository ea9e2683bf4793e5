//! 房屋巡检视频缺陷分析库
//!
//! 从巡检视频帧流里找出霉斑、裂缝、水渍、涂料劣化四类缺陷，
//! 定级、去重后产出带风险评分的分析报告。入口是
//! [`AnalysisManager`]：提交帧源，轮询进度，取回报告和缩略图。

pub mod core;

pub use crate::core::assemble::{Detection, NormBox};
pub use crate::core::config::{AnalysisConfig, ServiceConfig};
pub use crate::core::detect::{DefectDetector, DefectKind, RawFinding};
pub use crate::core::error::{AnalysisError, DetectorFailure};
pub use crate::core::manager::{AnalysisManager, HealthStatus};
pub use crate::core::report::{AnalysisReport, AnalysisSummary};
pub use crate::core::session::{JobStatus, ProgressView};
pub use crate::core::severity::Severity;
pub use crate::core::video::source::{FrameSequence, ImageSequenceSource, SourceFrame, VideoSource};

/// 初始化日志输出（RUST_LOG 控制级别）。嵌入方自带日志后端时不需要调用。
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init();
}
