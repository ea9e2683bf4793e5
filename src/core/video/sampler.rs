//! 帧采样器
//!
//! 每 N 个可解码帧取一帧（帧号 0, N, 2N, ...），惰性流式产出，
//! 一次只持有一帧。源一帧都解不出来时报 EmptySource。

use std::time::Duration;

use crate::core::error::AnalysisError;
use crate::core::video::frame::Frame;
use crate::core::video::source::VideoSource;

/// 帧率未知时的退回值
pub const DEFAULT_FPS: f64 = 30.0;

pub struct FrameSampler<S: VideoSource> {
    source: S,
    stride: u64,
    fps: f64,
    /// 下一个可解码帧的序号
    next_index: u64,
    finished: bool,
}

impl<S: VideoSource> FrameSampler<S> {
    pub fn new(source: S, stride: u64) -> Self {
        debug_assert!(stride > 0);
        let fps = source.fps().unwrap_or(DEFAULT_FPS);
        Self {
            source,
            stride,
            fps,
            next_index: 0,
            finished: false,
        }
    }

    pub fn fps(&self) -> f64 {
        self.fps
    }

    /// 源的总帧数估计（原始帧，非采样后）
    pub fn frame_count_hint(&self) -> Option<u64> {
        self.source.frame_count_hint()
    }

    /// 帧号到时间戳的固定换算：index / fps
    fn timestamp_of(&self, index: u64) -> Duration {
        Duration::from_secs_f64(index as f64 / self.fps)
    }

    /// 下一个采样帧；源耗尽返回 Ok(None)
    pub fn next_sampled(&mut self) -> Result<Option<Frame>, AnalysisError> {
        if self.finished {
            return Ok(None);
        }

        loop {
            match self.source.next_frame()? {
                Some(raw) => {
                    let index = self.next_index;
                    self.next_index += 1;

                    if index % self.stride == 0 {
                        return Ok(Some(Frame::new(
                            index,
                            self.timestamp_of(index),
                            raw.width,
                            raw.height,
                            raw.data,
                        )));
                    }
                    // 非采样帧直接丢弃，保持流式
                }
                None => {
                    self.finished = true;
                    if self.next_index == 0 {
                        return Err(AnalysisError::EmptySource);
                    }
                    return Ok(None);
                }
            }
        }
    }
}

impl<S: VideoSource> Iterator for FrameSampler<S> {
    type Item = Result<Frame, AnalysisError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_sampled().transpose()
    }
}
