//! # libheif 编解码（`heif` feature）
//!
//! 同时实现 `Decoder`（HEIC / AVIF）与 `Encoder`（HEIC），输出统一为 RGBA8 交错平面。
//! 依赖系统 libheif，默认构建不启用。

use libheif_rs::{
    Channel, ColorSpace, CompressionFormat, EncoderQuality, HeifContext, Image, LibHeif, RgbChroma,
};

use super::decoder::Decoder;
use super::encoder::Encoder;
use super::{ConvertError, PixelBuffer};

#[derive(Debug, Default, Clone, Copy)]
pub struct HeifCodec;

impl Decoder for HeifCodec {
    fn name(&self) -> &'static str {
        "libheif"
    }

    fn try_decode(&self, bytes: &[u8]) -> Result<PixelBuffer, ConvertError> {
        let lib = LibHeif::new();
        let ctx = HeifContext::read_from_bytes(bytes)
            .map_err(|e| ConvertError::Decode(format!("HEIF 容器解析失败：{}", e)))?;
        let handle = ctx
            .primary_image_handle()
            .map_err(|e| ConvertError::Decode(format!("HEIF 主图读取失败：{}", e)))?;

        let image = lib
            .decode(&handle, ColorSpace::Rgb(RgbChroma::Rgba), None)
            .map_err(|e| ConvertError::Decode(format!("HEIF 解码失败：{}", e)))?;

        let width = handle.width();
        let height = handle.height();
        let planes = image.planes();
        let plane = planes
            .interleaved
            .ok_or_else(|| ConvertError::Decode("HEIF 解码结果缺少交错平面".to_string()))?;

        let row_len = width as usize * 4;
        let mut pixels = Vec::with_capacity(row_len * height as usize);
        for row in plane.data.chunks(plane.stride).take(height as usize) {
            let row = row
                .get(..row_len)
                .ok_or_else(|| ConvertError::Decode("HEIF 平面行长度异常".to_string()))?;
            pixels.extend_from_slice(row);
        }

        PixelBuffer::new(width, height, pixels)
    }
}

impl Encoder for HeifCodec {
    fn name(&self) -> &'static str {
        "libheif"
    }

    fn encode(&self, buffer: &PixelBuffer, quality: u8) -> Result<Vec<u8>, ConvertError> {
        let (width, height) = buffer.dimensions();
        let encode_err = |e: libheif_rs::HeifError| ConvertError::Encode(format!("HEIC 编码失败：{}", e));

        let mut image =
            Image::new(width, height, ColorSpace::Rgb(RgbChroma::Rgba)).map_err(encode_err)?;
        image
            .create_plane(Channel::Interleaved, width, height, 8)
            .map_err(encode_err)?;

        {
            let planes = image.planes_mut();
            let mut plane = planes
                .interleaved
                .ok_or_else(|| ConvertError::Encode("HEIC 交错平面创建失败".to_string()))?;
            let stride = plane.stride;
            let row_len = width as usize * 4;
            for (dst, src) in plane
                .data
                .chunks_mut(stride)
                .zip(buffer.pixels().chunks_exact(row_len))
            {
                dst[..row_len].copy_from_slice(src);
            }
        }

        let lib = LibHeif::new();
        let mut ctx = HeifContext::new().map_err(encode_err)?;
        let mut encoder = lib
            .encoder_for_format(CompressionFormat::Hevc)
            .map_err(encode_err)?;
        encoder
            .set_quality(EncoderQuality::Lossy(quality.min(100)))
            .map_err(encode_err)?;
        ctx.encode_image(&image, &mut encoder, None)
            .map_err(encode_err)?;
        ctx.write_to_bytes().map_err(encode_err)
    }
}
