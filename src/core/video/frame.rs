use std::io::Cursor;
use std::time::Duration;

use image::{ImageOutputFormat, RgbaImage};

/// 采样后的视频帧
#[derive(Debug, Clone)]
pub struct Frame {
    /// 原始帧号（源视频中的单调序号）
    pub index: u64,
    /// 由帧号和帧率推导的时间戳
    pub timestamp: Duration,
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>, // RGBA 格式
}

impl Frame {
    pub fn new(index: u64, timestamp: Duration, width: u32, height: u32, data: Vec<u8>) -> Self {
        Self {
            index,
            timestamp,
            width,
            height,
            data,
        }
    }

    pub fn pixel_count(&self) -> usize {
        (self.width as usize) * (self.height as usize)
    }

    /// 整帧像素面积，相对面积计算的分母
    pub fn area(&self) -> f32 {
        self.pixel_count() as f32
    }

    /// RGBA 转灰度（整数运算）
    pub fn to_gray(&self) -> Vec<u8> {
        self.data
            .chunks_exact(4)
            .map(|rgba| {
                let r = rgba[0] as u32;
                let g = rgba[1] as u32;
                let b = rgba[2] as u32;
                ((r * 299 + g * 587 + b * 114) / 1000) as u8
            })
            .collect()
    }

    /// 转为 image 缓冲区，数据长度不符时返回 None
    pub fn to_image(&self) -> Option<RgbaImage> {
        RgbaImage::from_raw(self.width, self.height, self.data.clone())
    }

    /// JPEG 压缩整帧（丢弃 alpha），数据非法时返回 None
    pub fn encode_jpeg(&self, quality: u8) -> Option<Vec<u8>> {
        let img = self.to_image()?;
        let rgb = image::DynamicImage::ImageRgba8(img).to_rgb8();
        let mut buffer = Cursor::new(Vec::new());
        rgb.write_to(&mut buffer, ImageOutputFormat::Jpeg(quality))
            .ok()?;
        Some(buffer.into_inner())
    }
}
