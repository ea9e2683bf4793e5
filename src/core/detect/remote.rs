//! 外部霉斑分类服务客户端
//!
//! 把单帧 JPEG 发给外部分类服务，响应里的预测映射为候选检测。
//! 服务不可用或超时都是可恢复条件：该帧该检测器输出为空，任务继续。

use std::time::Duration;

use log::debug;
use serde::Deserialize;

use crate::core::config::ServiceConfig;
use crate::core::detect::{DefectDetector, DefectKind, PixelBox, RawFinding};
use crate::core::error::{AnalysisError, DetectorFailure};
use crate::core::video::frame::Frame;

/// 服务返回的单条预测，坐标为检测框中心点（像素）
#[derive(Debug, Clone, Deserialize)]
pub struct ServicePrediction {
    pub class: String,
    pub confidence: f32,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Deserialize)]
struct ServiceResponse {
    predictions: Vec<ServicePrediction>,
}

pub struct RemoteMoldDetector {
    client: reqwest::blocking::Client,
    endpoint: String,
    api_key: String,
}

impl RemoteMoldDetector {
    pub fn new(service: &ServiceConfig, timeout: Duration) -> Result<Self, AnalysisError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AnalysisError::InvalidConfig(format!("HTTP 客户端构建失败: {}", e)))?;

        Ok(Self {
            client,
            endpoint: service.endpoint.clone(),
            api_key: service.api_key.clone(),
        })
    }

    /// 健康探测：端点是否可达
    pub fn probe(service: &ServiceConfig, timeout: Duration) -> bool {
        reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map(|client| {
                client
                    .get(&service.endpoint)
                    .query(&[("api_key", service.api_key.as_str())])
                    .send()
                    .is_ok()
            })
            .unwrap_or(false)
    }

    /// 中心点坐标转左上角像素框；越界部分由装配阶段统一裁剪
    fn map_predictions(predictions: Vec<ServicePrediction>) -> Vec<RawFinding> {
        predictions
            .into_iter()
            .map(|p| RawFinding {
                kind: DefectKind::Mold,
                confidence: p.confidence,
                bbox: PixelBox {
                    x: p.x - p.width / 2.0,
                    y: p.y - p.height / 2.0,
                    width: p.width,
                    height: p.height,
                },
                label: Some(p.class),
                synthetic: false,
            })
            .collect()
    }
}

impl DefectDetector for RemoteMoldDetector {
    fn name(&self) -> &'static str {
        "mold_remote"
    }

    fn detect(&self, frame: &Frame) -> Result<Vec<RawFinding>, DetectorFailure> {
        let jpeg = frame
            .encode_jpeg(85)
            .ok_or_else(|| DetectorFailure::MalformedFrame("RGBA 数据长度不符".to_string()))?;

        let response = self
            .client
            .post(&self.endpoint)
            .query(&[("api_key", self.api_key.as_str())])
            .header("Content-Type", "image/jpeg")
            .body(jpeg)
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    DetectorFailure::ServiceTimeout
                } else {
                    DetectorFailure::ServiceUnavailable(e.to_string())
                }
            })?;

        let parsed: ServiceResponse = response
            .json()
            .map_err(|e| DetectorFailure::ServiceUnavailable(format!("响应解析失败: {}", e)))?;

        debug!("帧 {}: 外部服务返回 {} 条预测", frame.index, parsed.predictions.len());
        Ok(Self::map_predictions(parsed.predictions))
    }
}
