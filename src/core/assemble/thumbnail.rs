//! 缩略图裁剪与内存存储
//!
//! 从原始帧裁出检测区域（带固定外边距），重采样到固定尺寸后
//! 编码为 JPEG。成品以不透明键存放在会话级存储里，检测记录只
//! 携带键，不内嵌图像字节。

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::Mutex;

use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageOutputFormat};

use crate::core::detect::PixelBox;
use crate::core::video::frame::Frame;

/// 缩略图边长（像素）
pub const THUMBNAIL_SIZE: u32 = 150;
/// 裁剪时向四周扩展的外边距
const PADDING: i64 = 20;
const JPEG_QUALITY: u8 = 70;

/// 裁剪检测区域生成缩略图 JPEG，裁剪范围越界时贴帧边收拢。
/// 区域完全落在帧外时返回 None。
pub fn render_thumbnail(frame: &Frame, bbox: &PixelBox) -> Option<Vec<u8>> {
    let img = frame.to_image()?;

    let x1 = (bbox.x as i64 - PADDING).max(0) as u32;
    let y1 = (bbox.y as i64 - PADDING).max(0) as u32;
    let x2 = ((bbox.x + bbox.width) as i64 + PADDING).min(frame.width as i64) as u32;
    let y2 = ((bbox.y + bbox.height) as i64 + PADDING).min(frame.height as i64) as u32;
    if x2 <= x1 || y2 <= y1 {
        return None;
    }

    let roi = imageops::crop_imm(&img, x1, y1, x2 - x1, y2 - y1).to_image();
    let scaled = imageops::resize(&roi, THUMBNAIL_SIZE, THUMBNAIL_SIZE, FilterType::Triangle);

    let rgb = DynamicImage::ImageRgba8(scaled).to_rgb8();
    let mut buffer = Cursor::new(Vec::new());
    rgb.write_to(&mut buffer, ImageOutputFormat::Jpeg(JPEG_QUALITY))
        .ok()?;
    Some(buffer.into_inner())
}

/// 缩略图键："{会话 id}_{检测 id}.jpg"
pub fn thumbnail_key(session_id: &str, detection_id: &str) -> String {
    format!("{}_{}.jpg", session_id, detection_id)
}

/// 会话级缩略图存储，键即检测记录里携带的不透明引用
pub struct ThumbnailStore {
    inner: Mutex<HashMap<String, Vec<u8>>>,
}

impl ThumbnailStore {
    pub fn new() -> Self {
        ThumbnailStore {
            inner: Mutex::new(HashMap::new()),
        }
    }

    pub fn insert(&self, key: String, jpeg: Vec<u8>) {
        self.inner.lock().unwrap().insert(key, jpeg);
    }

    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.inner.lock().unwrap().get(key).cloned()
    }

    /// 移除某个会话名下的全部缩略图，返回移除条数
    pub fn remove_session(&self, session_id: &str) -> usize {
        let prefix = format!("{}_", session_id);
        let mut map = self.inner.lock().unwrap();
        let before = map.len();
        map.retain(|key, _| !key.starts_with(&prefix));
        before - map.len()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ThumbnailStore {
    fn default() -> Self {
        Self::new()
    }
}
