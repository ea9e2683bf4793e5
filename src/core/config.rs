//! 分析配置

use std::time::Duration;

use crate::core::error::AnalysisError;

/// 单个分析任务的配置
#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    /// 采样密度：每 N 帧取一帧
    pub frame_skip_ratio: u64,
    /// 最低置信度，低于该值的候选检测直接丢弃
    pub confidence_threshold: f32,
    /// 离线模式：外部分类服务不可用时启用合成降级检测器
    pub offline_mode: bool,
    /// 跨帧去重的 IoU 阈值
    pub dedup_iou: f32,
    /// 生成缩略图的最低置信度
    pub thumbnail_min_confidence: f32,
    /// 外部分类服务单次请求超时
    pub request_timeout: Duration,
    /// 外部分类服务配置，缺失时严格模式下霉斑检测器整体省略
    pub service: Option<ServiceConfig>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            frame_skip_ratio: 10,
            confidence_threshold: 0.5,
            offline_mode: false,
            dedup_iou: 0.5,
            thumbnail_min_confidence: 0.7,
            request_timeout: Duration::from_secs(4),
            service: ServiceConfig::from_env(),
        }
    }
}

impl AnalysisConfig {
    /// 任务启动前校验一次，非法配置在任务开始前就失败
    pub fn validate(&self) -> Result<(), AnalysisError> {
        if self.frame_skip_ratio == 0 {
            return Err(AnalysisError::InvalidConfig(
                "frame_skip_ratio 必须为正整数".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.confidence_threshold) || self.confidence_threshold.is_nan() {
            return Err(AnalysisError::InvalidConfig(format!(
                "confidence_threshold 必须在 [0,1] 内: {}",
                self.confidence_threshold
            )));
        }
        if !(0.0..=1.0).contains(&self.dedup_iou) || self.dedup_iou.is_nan() {
            return Err(AnalysisError::InvalidConfig(format!(
                "dedup_iou 必须在 [0,1] 内: {}",
                self.dedup_iou
            )));
        }
        Ok(())
    }
}

/// 外部分类服务的连接信息
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub endpoint: String,
    pub api_key: String,
}

impl ServiceConfig {
    /// 从环境变量读取，缺任意一项即视为未配置
    pub fn from_env() -> Option<Self> {
        let endpoint = std::env::var("INSPECT_SERVICE_URL").ok()?;
        let api_key = std::env::var("INSPECT_SERVICE_KEY").ok()?;
        Some(Self { endpoint, api_key })
    }
}
