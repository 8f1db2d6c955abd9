//! # 编码分发模块
//!
//! ## 设计思路
//!
//! 目标格式归一化为 `FormatKey` 后穷尽匹配：
//! - `bmp` 走手写编码器（见 `bmp`）
//! - `webp` 走 libwebp 有损编码，质量生效
//! - 其余格式委托 `image` crate 的各格式编码器
//! - `heic` 依赖可注入的 `Encoder`，缺失时报告 `EncoderUnavailable`
//!
//! ## 实现思路
//!
//! 1. 编码前检查 RGBA 中间缓冲体积上限
//! 2. 不支持 alpha 的格式（JPEG、BMP）先合成到背景色
//! 3. 质量：支持质量的格式缺省使用配置默认值（90），无损格式忽略质量
//! 4. 异步入口通过 `spawn_blocking` 执行，调用方只拿到完整字节或错误

use image::ImageEncoder;
use image::codecs::avif::AvifEncoder;
use image::codecs::gif::GifEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::codecs::tiff::TiffEncoder;
use image::ExtendedColorType;
use std::io::Cursor;
use std::sync::Arc;

use super::bmp::encode_bmp;
use super::data_url::to_data_url;
use super::{ConvertConfig, ConvertError, FormatKey, PixelBuffer, normalize_format};

/// 可注入的编码能力（目前用于 HEIC）。
pub trait Encoder: Send + Sync {
    fn name(&self) -> &'static str;

    fn encode(&self, buffer: &PixelBuffer, quality: u8) -> Result<Vec<u8>, ConvertError>;
}

/// 待编码的来源：已解码像素，或需先经通用解码器还原的已编码字节。
#[derive(Debug, Clone)]
pub enum EncodeSource {
    Pixels(PixelBuffer),
    Encoded(Vec<u8>),
}

/// 编码分发器。
#[derive(Clone)]
pub struct EncodeDispatcher {
    heic: Option<Arc<dyn Encoder>>,
}

impl Default for EncodeDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl EncodeDispatcher {
    pub fn new() -> Self {
        Self {
            heic: default_heic_encoder(),
        }
    }

    pub fn with_heic_encoder(mut self, encoder: Option<Arc<dyn Encoder>>) -> Self {
        self.heic = encoder;
        self
    }

    /// 解析目标格式标记：缺省为 `MissingFormat`，无法识别为 `UnsupportedFormat`。
    pub fn resolve_target(token: Option<&str>) -> Result<FormatKey, ConvertError> {
        let token = token
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(ConvertError::MissingFormat)?;

        normalize_format(Some(token))
            .ok_or_else(|| ConvertError::UnsupportedFormat(format!("未知目标格式：{}", token)))
    }

    /// 计算实际生效的质量；无损格式返回 `None`。
    pub fn effective_quality(
        format: FormatKey,
        quality: Option<u8>,
        config: &ConvertConfig,
    ) -> Option<u8> {
        format
            .descriptor()
            .supports_quality
            .then(|| quality.unwrap_or(config.default_quality).clamp(1, 100))
    }

    /// 异步编码入口。
    pub async fn encode(
        &self,
        source: EncodeSource,
        format: FormatKey,
        quality: Option<u8>,
        config: &ConvertConfig,
    ) -> Result<Vec<u8>, ConvertError> {
        let dispatcher = self.clone();
        let config = config.clone();
        tokio::task::spawn_blocking(move || {
            dispatcher.encode_blocking(source, format, quality, &config)
        })
        .await?
    }

    /// 同步编码。
    pub fn encode_blocking(
        &self,
        source: EncodeSource,
        format: FormatKey,
        quality: Option<u8>,
        config: &ConvertConfig,
    ) -> Result<Vec<u8>, ConvertError> {
        let buffer = match source {
            EncodeSource::Pixels(buffer) => buffer,
            EncodeSource::Encoded(bytes) => {
                if bytes.len() as u64 > config.max_input_bytes {
                    return Err(ConvertError::SizeExceeded(format!(
                        "待编码数据过大：{} 字节",
                        bytes.len()
                    )));
                }
                let decoded = image::load_from_memory(&bytes)
                    .map_err(|e| ConvertError::Decode(format!("编码前解码失败：{}", e)))?;
                PixelBuffer::from_dynamic(decoded)?
            }
        };

        let raw_len = buffer.pixels().len() as u64;
        if raw_len > config.max_input_bytes {
            return Err(ConvertError::SizeExceeded(format!(
                "待编码像素数据过大：{:.2} MB（限制：{:.2} MB）",
                raw_len as f64 / 1024.0 / 1024.0,
                config.max_input_bytes as f64 / 1024.0 / 1024.0
            )));
        }

        let descriptor = format.descriptor();
        let buffer = if !descriptor.supports_alpha && buffer.has_transparency() {
            buffer.composite_on_background(config.background)
        } else {
            buffer
        };

        let quality = Self::effective_quality(format, quality, config);
        log::debug!(
            "🎨 编码分发 - format={} quality={:?} {}x{}",
            format.as_str(),
            quality,
            buffer.width(),
            buffer.height()
        );

        let default_quality = config.default_quality;
        match format {
            FormatKey::Bmp => Ok(encode_bmp(&buffer)),
            FormatKey::Jpeg => encode_jpeg(&buffer, quality.unwrap_or(default_quality)),
            FormatKey::Png => encode_png(&buffer),
            FormatKey::Webp => encode_webp(&buffer, quality.unwrap_or(default_quality)),
            FormatKey::Avif => {
                encode_avif(&buffer, quality.unwrap_or(default_quality), config.avif_speed)
            }
            FormatKey::Heic => {
                let encoder = self.heic.as_ref().ok_or_else(|| {
                    ConvertError::EncoderUnavailable("HEIC 编码器未初始化".to_string())
                })?;
                log::debug!("🎨 HEIC 交由 {} 编码器处理", encoder.name());
                encoder.encode(&buffer, quality.unwrap_or(default_quality))
            }
            FormatKey::Gif => encode_gif(&buffer),
            FormatKey::Tiff => encode_tiff(&buffer),
        }
    }

    /// 将像素编码为目标格式并包装为 Data URL。
    pub fn encode_to_data_url(
        &self,
        buffer: &PixelBuffer,
        format: FormatKey,
        quality: Option<u8>,
        config: &ConvertConfig,
    ) -> Result<String, ConvertError> {
        let bytes =
            self.encode_blocking(EncodeSource::Pixels(buffer.clone()), format, quality, config)?;
        Ok(to_data_url(&bytes, format.mime()))
    }
}

#[cfg(feature = "heif")]
fn default_heic_encoder() -> Option<Arc<dyn Encoder>> {
    Some(Arc::new(super::heif::HeifCodec))
}

#[cfg(not(feature = "heif"))]
fn default_heic_encoder() -> Option<Arc<dyn Encoder>> {
    None
}

fn encode_error(format: &str, err: image::ImageError) -> ConvertError {
    ConvertError::Encode(format!("{} 编码失败：{}", format, err))
}

fn strip_alpha(buffer: &PixelBuffer) -> Vec<u8> {
    buffer
        .pixels()
        .chunks_exact(4)
        .flat_map(|px| [px[0], px[1], px[2]])
        .collect()
}

fn encode_jpeg(buffer: &PixelBuffer, quality: u8) -> Result<Vec<u8>, ConvertError> {
    let rgb = strip_alpha(buffer);
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, quality)
        .write_image(&rgb, buffer.width(), buffer.height(), ExtendedColorType::Rgb8)
        .map_err(|e| encode_error("JPEG", e))?;
    Ok(out)
}

fn encode_png(buffer: &PixelBuffer) -> Result<Vec<u8>, ConvertError> {
    let mut out = Vec::new();
    PngEncoder::new(&mut out)
        .write_image(
            buffer.pixels(),
            buffer.width(),
            buffer.height(),
            ExtendedColorType::Rgba8,
        )
        .map_err(|e| encode_error("PNG", e))?;
    Ok(out)
}

/// WebP：libwebp 有损编码，质量直接映射为 `WebPConfig.quality`。
fn encode_webp(buffer: &PixelBuffer, quality: u8) -> Result<Vec<u8>, ConvertError> {
    let mut config = webp::WebPConfig::new()
        .map_err(|_| ConvertError::Encode("WebP 编码配置初始化失败".to_string()))?;
    config.lossless = 0;
    config.quality = quality.clamp(1, 100) as f32;
    config.method = 4;
    config.autofilter = 1;

    let encoder = webp::Encoder::from_rgba(buffer.pixels(), buffer.width(), buffer.height());
    let encoded = encoder
        .encode_advanced(&config)
        .map_err(|e| ConvertError::Encode(format!("WebP 编码失败：{:?}", e)))?;
    Ok(encoded.to_vec())
}

fn encode_avif(buffer: &PixelBuffer, quality: u8, speed: u8) -> Result<Vec<u8>, ConvertError> {
    let mut out = Vec::new();
    AvifEncoder::new_with_speed_quality(&mut out, speed.clamp(1, 10), quality)
        .write_image(
            buffer.pixels(),
            buffer.width(),
            buffer.height(),
            ExtendedColorType::Rgba8,
        )
        .map_err(|e| encode_error("AVIF", e))?;
    Ok(out)
}

fn encode_gif(buffer: &PixelBuffer) -> Result<Vec<u8>, ConvertError> {
    let mut out = Vec::new();
    {
        let mut encoder = GifEncoder::new(&mut out);
        encoder
            .encode(
                buffer.pixels(),
                buffer.width(),
                buffer.height(),
                ExtendedColorType::Rgba8,
            )
            .map_err(|e| encode_error("GIF", e))?;
    }
    Ok(out)
}

fn encode_tiff(buffer: &PixelBuffer) -> Result<Vec<u8>, ConvertError> {
    let mut out = Vec::new();
    TiffEncoder::new(Cursor::new(&mut out))
        .write_image(
            buffer.pixels(),
            buffer.width(),
            buffer.height(),
            ExtendedColorType::Rgba8,
        )
        .map_err(|e| encode_error("TIFF", e))?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, ImageFormat};

    fn checker(width: u32, height: u32, alpha: u8) -> PixelBuffer {
        let mut pixels = Vec::with_capacity((width * height * 4) as usize);
        for y in 0..height {
            for x in 0..width {
                let on = (x + y) % 2 == 0;
                pixels.extend_from_slice(&[if on { 250 } else { 10 }, 40, 90, alpha]);
            }
        }
        PixelBuffer::new(width, height, pixels).expect("valid buffer")
    }

    fn encode(format: FormatKey, buffer: &PixelBuffer) -> Vec<u8> {
        EncodeDispatcher::new()
            .with_heic_encoder(None)
            .encode_blocking(
                EncodeSource::Pixels(buffer.clone()),
                format,
                None,
                &ConvertConfig::default(),
            )
            .expect("encode should succeed")
    }

    #[test]
    fn resolve_target_distinguishes_missing_and_unknown() {
        assert!(matches!(
            EncodeDispatcher::resolve_target(None),
            Err(ConvertError::MissingFormat)
        ));
        assert!(matches!(
            EncodeDispatcher::resolve_target(Some("  ")),
            Err(ConvertError::MissingFormat)
        ));
        assert!(matches!(
            EncodeDispatcher::resolve_target(Some("psd")),
            Err(ConvertError::UnsupportedFormat(_))
        ));
        assert_eq!(
            EncodeDispatcher::resolve_target(Some("JPG")).expect("jpg resolves"),
            FormatKey::Jpeg
        );
    }

    #[test]
    fn effective_quality_defaults_to_90_for_lossy() {
        let config = ConvertConfig::default();
        assert_eq!(EncodeDispatcher::effective_quality(FormatKey::Jpeg, None, &config), Some(90));
        assert_eq!(EncodeDispatcher::effective_quality(FormatKey::Webp, Some(40), &config), Some(40));
        assert_eq!(EncodeDispatcher::effective_quality(FormatKey::Png, Some(40), &config), None);
        assert_eq!(EncodeDispatcher::effective_quality(FormatKey::Tiff, None, &config), None);
    }

    #[test]
    fn outputs_carry_expected_signatures() {
        let buffer = checker(6, 5, 255);
        let cases = [
            (FormatKey::Jpeg, ImageFormat::Jpeg),
            (FormatKey::Png, ImageFormat::Png),
            (FormatKey::Webp, ImageFormat::WebP),
            (FormatKey::Gif, ImageFormat::Gif),
            (FormatKey::Bmp, ImageFormat::Bmp),
            (FormatKey::Tiff, ImageFormat::Tiff),
        ];

        for (key, expected) in cases {
            let bytes = encode(key, &buffer);
            assert_eq!(image::guess_format(&bytes).ok(), Some(expected), "{key:?}");
            let decoded = image::load_from_memory(&bytes).expect("output should decode");
            assert_eq!(decoded.dimensions(), (6, 5), "{key:?}");
        }
    }

    #[test]
    fn avif_output_is_produced() {
        let bytes = encode(FormatKey::Avif, &checker(8, 8, 255));
        assert!(bytes.len() > 12);
        assert_eq!(&bytes[4..8], b"ftyp");
    }

    #[test]
    fn lossless_formats_are_bit_identical() {
        let buffer = checker(7, 3, 255);
        for key in [FormatKey::Png, FormatKey::Tiff, FormatKey::Bmp] {
            let bytes = encode(key, &buffer);
            let decoded = image::load_from_memory(&bytes)
                .expect("output should decode")
                .into_rgba8();
            assert_eq!(decoded.as_raw().as_slice(), buffer.pixels(), "{key:?}");
        }
    }

    #[test]
    fn jpeg_composites_transparent_pixels_on_white() {
        let transparent = PixelBuffer::new(8, 8, [0, 0, 0, 0].repeat(64)).expect("valid buffer");
        let bytes = encode(FormatKey::Jpeg, &transparent);
        let decoded = image::load_from_memory(&bytes).expect("jpeg decodes").into_rgb8();
        assert!(decoded.pixels().all(|px| px.0.iter().all(|c| *c > 240)));
    }

    #[test]
    fn heic_without_encoder_is_unavailable() {
        let result = EncodeDispatcher::new().with_heic_encoder(None).encode_blocking(
            EncodeSource::Pixels(checker(2, 2, 255)),
            FormatKey::Heic,
            None,
            &ConvertConfig::default(),
        );
        assert!(matches!(result, Err(ConvertError::EncoderUnavailable(_))));
    }

    #[test]
    fn encoded_source_is_decoded_first() {
        let png = encode(FormatKey::Png, &checker(4, 4, 255));
        let bmp = EncodeDispatcher::new()
            .encode_blocking(
                EncodeSource::Encoded(png),
                FormatKey::Bmp,
                None,
                &ConvertConfig::default(),
            )
            .expect("png -> bmp");
        assert_eq!(bmp.len(), super::super::bmp::encoded_len(4, 4));
    }

    #[test]
    fn pre_encode_size_bound_is_enforced() {
        let mut config = ConvertConfig::default();
        config.max_input_bytes = 16;
        let result = EncodeDispatcher::new().encode_blocking(
            EncodeSource::Pixels(checker(4, 4, 255)),
            FormatKey::Png,
            None,
            &config,
        );
        assert!(matches!(result, Err(ConvertError::SizeExceeded(_))));
    }

    /// 在 RIFF 容器中查找指定 FourCC 的块。
    fn has_riff_chunk(bytes: &[u8], fourcc: &[u8; 4]) -> bool {
        let mut offset = 12;
        while offset + 8 <= bytes.len() {
            if &bytes[offset..offset + 4] == fourcc {
                return true;
            }
            let size = u32::from_le_bytes([
                bytes[offset + 4],
                bytes[offset + 5],
                bytes[offset + 6],
                bytes[offset + 7],
            ]) as usize;
            offset += 8 + size + (size & 1);
        }
        false
    }

    #[test]
    fn webp_quality_selects_lossy_bitstream() {
        let buffer = checker(128, 128, 255);
        let mut sizes = Vec::new();
        for quality in [90u8, 50, 10] {
            let bytes = EncodeDispatcher::new()
                .encode_blocking(
                    EncodeSource::Pixels(buffer.clone()),
                    FormatKey::Webp,
                    Some(quality),
                    &ConvertConfig::default(),
                )
                .expect("webp encode");
            assert_eq!(&bytes[0..4], b"RIFF");
            assert_eq!(&bytes[8..12], b"WEBP");
            assert!(has_riff_chunk(&bytes, b"VP8 "), "q={quality}");
            assert!(!has_riff_chunk(&bytes, b"VP8L"), "q={quality}");
            sizes.push(bytes.len());
        }
        assert!(sizes[0] > sizes[2], "{sizes:?}");
    }

    #[test]
    fn lossy_webp_keeps_alpha() {
        let bytes = encode(FormatKey::Webp, &checker(16, 16, 128));
        assert!(has_riff_chunk(&bytes, b"VP8 "));
        let decoded = image::load_from_memory(&bytes).expect("webp decodes").into_rgba8();
        assert_eq!(decoded.dimensions(), (16, 16));
        assert!(decoded.pixels().all(|px| px.0[3] < 255));
    }

    #[test]
    fn data_url_uses_format_mime() {
        let url = EncodeDispatcher::new()
            .encode_to_data_url(&checker(2, 2, 255), FormatKey::Png, None, &ConvertConfig::default())
            .expect("data url");
        assert!(url.starts_with("data:image/png;base64,"));
    }
}
