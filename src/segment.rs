use std::path::Path;

use image::RgbaImage;
use thiserror::Error;

/// 单个 RGBA 像素
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Pixel {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Pixel {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// 不透明度是否达到一半，低于一半的像素视为不存在
    pub fn is_visible(&self) -> bool {
        self.a >= 128
    }
}

impl From<[u8; 4]> for Pixel {
    fn from([r, g, b, a]: [u8; 4]) -> Self {
        Self { r, g, b, a }
    }
}

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("像素数量 {len} 与尺寸 {width}x{height} 不符")]
    SizeMismatch { width: u32, height: u32, len: usize },
    #[error(transparent)]
    Decode(#[from] image::ImageError),
}

/// 一帧图像，像素按行优先存储
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    width: u32,
    height: u32,
    pixels: Vec<Pixel>,
}

impl Frame {
    pub fn new(width: u32, height: u32, pixels: Vec<Pixel>) -> Result<Self, FrameError> {
        if pixels.len() != width as usize * height as usize {
            return Err(FrameError::SizeMismatch { width, height, len: pixels.len() });
        }
        Ok(Self { width, height, pixels })
    }

    /// 从 RGBA8 原始字节构建帧
    pub fn from_rgba8(width: u32, height: u32, bytes: &[u8]) -> Result<Self, FrameError> {
        if bytes.len() != width as usize * height as usize * 4 {
            return Err(FrameError::SizeMismatch { width, height, len: bytes.len() / 4 });
        }
        let pixels = bytes.chunks_exact(4).map(|p| Pixel::new(p[0], p[1], p[2], p[3])).collect();
        Ok(Self { width, height, pixels })
    }

    /// 解码内存中的图片
    pub fn decode(bytes: &[u8]) -> Result<Self, FrameError> {
        let image = image::load_from_memory(bytes)?;
        Ok(Self::from(image.to_rgba8()))
    }

    /// 读取并解码图片文件
    pub fn open(path: impl AsRef<Path>) -> Result<Self, FrameError> {
        let image = image::open(path)?;
        Ok(Self::from(image.to_rgba8()))
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[Pixel] {
        &self.pixels
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<&Pixel> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.pixels.get((y * self.width + x) as usize)
    }
}

impl From<RgbaImage> for Frame {
    fn from(image: RgbaImage) -> Self {
        let (width, height) = image.dimensions();
        let pixels = image.pixels().map(|p| Pixel::from(p.0)).collect();
        Self { width, height, pixels }
    }
}

/// 多媒体对象中的一个片段（例如视频的一个镜头），包含零或多帧
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    id: String,
    frames: Vec<Frame>,
}

impl Segment {
    pub fn new(id: impl Into<String>, frames: Vec<Frame>) -> Self {
        Self { id: id.into(), frames }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// 按顺序读取一组图片文件作为片段的帧
    pub fn open<P: AsRef<Path>>(id: impl Into<String>, paths: &[P]) -> Result<Self, FrameError> {
        let frames = paths.iter().map(Frame::open).collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(id, frames))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_size_mismatch() {
        let err = Frame::new(2, 2, vec![Pixel::default(); 3]).unwrap_err();
        assert!(matches!(err, FrameError::SizeMismatch { width: 2, height: 2, len: 3 }));
    }

    #[test]
    fn test_frame_from_rgba8() {
        let frame = Frame::from_rgba8(2, 1, &[1, 2, 3, 4, 5, 6, 7, 8]).unwrap();
        assert_eq!(frame.pixel(0, 0), Some(&Pixel::new(1, 2, 3, 4)));
        assert_eq!(frame.pixel(1, 0), Some(&Pixel::new(5, 6, 7, 8)));
        assert_eq!(frame.pixel(2, 0), None);
    }

    #[test]
    fn test_frame_from_image() {
        let mut image = RgbaImage::new(3, 2);
        image.put_pixel(2, 1, image::Rgba([200, 50, 50, 255]));
        let frame = Frame::from(image);
        assert_eq!(frame.width(), 3);
        assert_eq!(frame.height(), 2);
        assert_eq!(frame.pixel(2, 1), Some(&Pixel::new(200, 50, 50, 255)));
    }

    #[test]
    fn test_pixel_visibility() {
        assert!(Pixel::new(0, 0, 0, 128).is_visible());
        assert!(!Pixel::new(0, 0, 0, 127).is_visible());
    }
}
