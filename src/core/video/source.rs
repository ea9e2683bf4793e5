//! 视频源抽象
//!
//! 只要求前向顺序解码，不要求随机访问。原生解码层（或测试）把解出的
//! RGBA 帧按顺序喂给采样器即可。

use std::path::{Path, PathBuf};

use log::warn;

use crate::core::error::AnalysisError;

/// 源解出的一帧原始数据，帧号由采样器统一编号
#[derive(Debug, Clone)]
pub struct SourceFrame {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>, // RGBA 格式
}

/// 前向顺序视频源
pub trait VideoSource: Send {
    /// 解码下一帧，None 表示源结束
    fn next_frame(&mut self) -> Result<Option<SourceFrame>, AnalysisError>;

    /// 源帧率，无法获知时返回 None（采样器会退回默认值）
    fn fps(&self) -> Option<f64>;

    /// 总帧数估计，用于进度计算
    fn frame_count_hint(&self) -> Option<u64>;
}

/// 内存帧序列源
///
/// 原生层解码后直接投喂，也是测试里构造合成视频的入口。
pub struct FrameSequence {
    frames: std::vec::IntoIter<SourceFrame>,
    total: u64,
    fps: f64,
}

impl FrameSequence {
    pub fn new(frames: Vec<SourceFrame>, fps: f64) -> Self {
        let total = frames.len() as u64;
        Self {
            frames: frames.into_iter(),
            total,
            fps,
        }
    }
}

impl VideoSource for FrameSequence {
    fn next_frame(&mut self) -> Result<Option<SourceFrame>, AnalysisError> {
        Ok(self.frames.next())
    }

    fn fps(&self) -> Option<f64> {
        Some(self.fps)
    }

    fn frame_count_hint(&self) -> Option<u64> {
        Some(self.total)
    }
}

/// 图片序列源：按文件名排序逐张解码目录下的图片
///
/// 无法解码的单张图片跳过并告警，不中止任务。
pub struct ImageSequenceSource {
    files: std::vec::IntoIter<PathBuf>,
    total: u64,
    fps: f64,
}

impl ImageSequenceSource {
    pub fn open(dir: &Path, fps: f64) -> Result<Self, AnalysisError> {
        let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
            .map_err(|e| AnalysisError::Decode(format!("无法打开目录 {}: {}", dir.display(), e)))?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|p| p.is_file())
            .collect();
        files.sort();

        let total = files.len() as u64;
        Ok(Self {
            files: files.into_iter(),
            total,
            fps,
        })
    }
}

impl VideoSource for ImageSequenceSource {
    fn next_frame(&mut self) -> Result<Option<SourceFrame>, AnalysisError> {
        for path in self.files.by_ref() {
            match image::open(&path) {
                Ok(img) => {
                    let rgba = img.to_rgba8();
                    return Ok(Some(SourceFrame {
                        width: rgba.width(),
                        height: rgba.height(),
                        data: rgba.into_raw(),
                    }));
                }
                Err(e) => {
                    warn!("跳过无法解码的帧文件 {}: {}", path.display(), e);
                }
            }
        }
        Ok(None)
    }

    fn fps(&self) -> Option<f64> {
        Some(self.fps)
    }

    fn frame_count_hint(&self) -> Option<u64> {
        Some(self.total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uniform_frames(count: usize, fill: u8) -> Vec<SourceFrame> {
        (0..count)
            .map(|_| SourceFrame {
                width: 8,
                height: 8,
                data: vec![fill; 8 * 8 * 4],
            })
            .collect()
    }

    #[test]
    fn test_frame_sequence_is_sequential() {
        let mut source = FrameSequence::new(uniform_frames(3, 128), 30.0);
        assert_eq!(source.frame_count_hint(), Some(3));

        let mut seen = 0;
        while let Some(frame) = source.next_frame().unwrap() {
            assert_eq!(frame.width, 8);
            seen += 1;
        }
        assert_eq!(seen, 3);
        assert!(source.next_frame().unwrap().is_none());
    }

    #[test]
    fn test_image_sequence_missing_dir() {
        let result = ImageSequenceSource::open(Path::new("/nonexistent/frames"), 30.0);
        assert!(matches!(result, Err(AnalysisError::Decode(_))));
    }
}
