//! # 像素缓冲模块
//!
//! ## 设计思路
//!
//! `PixelBuffer` 是解码与编码之间唯一的交接形态：RGBA8、行优先、自上而下、非预乘 alpha。
//! 构造时校验尺寸与长度，之后只读；任何变换（如背景合成）都产出新缓冲。
//!
//! ## 实现思路
//!
//! - `new` 拒绝零尺寸与长度不一致的数据，保证 `len == width * height * 4`。
//! - 背景合成是纯函数，按 source-over 规则逐像素计算，不依赖任何绘图上下文。

use image::{DynamicImage, RgbaImage};

use super::ConvertError;

/// 规范 RGBA8 图像缓冲。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl PixelBuffer {
    /// 以 RGBA8 数据创建缓冲。
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self, ConvertError> {
        if width == 0 || height == 0 {
            return Err(ConvertError::InvalidImage(format!(
                "图片尺寸无效：{}x{}",
                width, height
            )));
        }

        let expected_len = rgba_len(width, height)?;
        if pixels.len() != expected_len {
            return Err(ConvertError::InvalidImage(format!(
                "像素数据长度异常：{}（期望 {}）",
                pixels.len(),
                expected_len
            )));
        }

        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// 从 `image` 解码结果创建缓冲（统一转换为 RGBA8）。
    pub fn from_dynamic(image: DynamicImage) -> Result<Self, ConvertError> {
        let rgba = image.into_rgba8();
        let (width, height) = rgba.dimensions();
        Self::new(width, height, rgba.into_raw())
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// 读取 `(x, y)` 处的 RGBA 像素。
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = (y as usize * self.width as usize + x as usize) * 4;
        let px = &self.pixels[offset..offset + 4];
        Some([px[0], px[1], px[2], px[3]])
    }

    /// 是否存在非完全不透明的像素。
    pub fn has_transparency(&self) -> bool {
        self.pixels.chunks_exact(4).any(|px| px[3] != u8::MAX)
    }

    pub fn into_dynamic(self) -> Result<DynamicImage, ConvertError> {
        let (width, height) = (self.width, self.height);
        RgbaImage::from_raw(width, height, self.pixels)
            .map(DynamicImage::ImageRgba8)
            .ok_or_else(|| ConvertError::InvalidImage("构建 RGBA 图像缓冲失败".to_string()))
    }

    /// 将图像按 source-over 合成到纯色背景上，结果完全不透明。
    ///
    /// 逐通道：`out = src * a + bg * (1 - a)`，按 255 定点取整。
    pub fn composite_on_background(&self, background: [u8; 3]) -> PixelBuffer {
        let mut out = Vec::with_capacity(self.pixels.len());

        for px in self.pixels.chunks_exact(4) {
            let alpha = px[3] as u32;
            let inverse = 255 - alpha;
            for channel in 0..3 {
                let blended = px[channel] as u32 * alpha + background[channel] as u32 * inverse;
                out.push(((blended + 127) / 255) as u8);
            }
            out.push(u8::MAX);
        }

        PixelBuffer {
            width: self.width,
            height: self.height,
            pixels: out,
        }
    }
}

/// `width * height * 4`，溢出时视为资源超限。
pub(crate) fn rgba_len(width: u32, height: u32) -> Result<usize, ConvertError> {
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|pixels| pixels.checked_mul(4))
        .ok_or_else(|| ConvertError::SizeExceeded("图片尺寸导致内存溢出风险".to_string()))
}
