//! # 预览降采样模块
//!
//! ## 设计思路
//!
//! 预览只用于展示，超大图片按配置降采样后再编码为 PNG Data URL，
//! 降低前端渲染与传输开销；上报给调用方的宽高始终是源图尺寸。
//!
//! ## 实现思路
//!
//! 1. 同时受单边最大值与总像素上限约束，取两者较小的缩放比例
//! 2. 优先使用 `fast_image_resize`（SIMD），失败时回退 `image::resize_exact`

use fast_image_resize as fr;
use image::imageops::FilterType;
use image::{DynamicImage, ImageBuffer, Rgba};

use super::{ConvertConfig, ConvertError, PixelBuffer};

/// 计算预览目标尺寸；无需缩放时返回 `None`。
pub fn preview_dimensions(width: u32, height: u32, config: &ConvertConfig) -> Option<(u32, u32)> {
    if !config.preview_enabled || width == 0 || height == 0 {
        return None;
    }

    let source_pixels = width as u64 * height as u64;
    let over_dimension =
        width > config.preview_max_dimension || height > config.preview_max_dimension;
    let over_pixels = source_pixels > config.preview_target_pixels;

    if !over_dimension && !over_pixels {
        return None;
    }

    let dimension_scale = (config.preview_max_dimension as f64 / width as f64)
        .min(config.preview_max_dimension as f64 / height as f64);
    let pixel_scale = (config.preview_target_pixels as f64 / source_pixels as f64).sqrt();
    let scale = dimension_scale.min(pixel_scale).min(1.0);

    let target_width = ((width as f64 * scale).floor() as u32).max(1);
    let target_height = ((height as f64 * scale).floor() as u32).max(1);
    Some((target_width, target_height))
}

/// 按配置生成预览缓冲；无需缩放时原样返回。
pub fn downscale_for_preview(
    buffer: PixelBuffer,
    config: &ConvertConfig,
) -> Result<PixelBuffer, ConvertError> {
    let (width, height) = buffer.dimensions();
    let Some((target_width, target_height)) = preview_dimensions(width, height, config) else {
        return Ok(buffer);
    };

    log::info!(
        "🧩 预览降采样：{}x{} -> {}x{}（filter={:?}）",
        width,
        height,
        target_width,
        target_height,
        config.resize_filter
    );

    match resize_with_fast_image_resize(&buffer, target_width, target_height, config.resize_filter)
    {
        Ok(resized) => Ok(resized),
        Err(err) => {
            log::warn!(
                "⚠️ fast_image_resize 降采样失败，回退 image::resize_exact：{}",
                err
            );
            let resized = buffer
                .into_dynamic()?
                .resize_exact(target_width, target_height, config.resize_filter);
            PixelBuffer::from_dynamic(resized)
        }
    }
}

fn resize_with_fast_image_resize(
    buffer: &PixelBuffer,
    target_width: u32,
    target_height: u32,
    filter: FilterType,
) -> Result<PixelBuffer, ConvertError> {
    let src_image = fr::images::Image::from_vec_u8(
        buffer.width(),
        buffer.height(),
        buffer.pixels().to_vec(),
        fr::PixelType::U8x4,
    )
    .map_err(|e| ConvertError::Decode(format!("构建源图像缓冲失败：{}", e)))?;

    let mut dst_image = fr::images::Image::new(target_width, target_height, fr::PixelType::U8x4);

    let mut resizer = fr::Resizer::new();
    let options =
        fr::ResizeOptions::new().resize_alg(fr::ResizeAlg::Convolution(to_fast_filter(filter)));

    resizer
        .resize(&src_image, &mut dst_image, Some(&options))
        .map_err(|e| ConvertError::Decode(format!("fast_image_resize 执行失败：{}", e)))?;

    let rgba = ImageBuffer::<Rgba<u8>, Vec<u8>>::from_raw(
        target_width,
        target_height,
        dst_image.into_vec(),
    )
    .ok_or_else(|| ConvertError::Decode("fast_image_resize 输出缓冲长度异常".to_string()))?;

    PixelBuffer::from_dynamic(DynamicImage::ImageRgba8(rgba))
}

fn to_fast_filter(filter: FilterType) -> fr::FilterType {
    match filter {
        FilterType::Nearest => fr::FilterType::Box,
        FilterType::Triangle => fr::FilterType::Bilinear,
        FilterType::CatmullRom => fr::FilterType::CatmullRom,
        FilterType::Gaussian => fr::FilterType::Mitchell,
        FilterType::Lanczos3 => fr::FilterType::Lanczos3,
    }
}
