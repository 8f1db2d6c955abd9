//! # 解码分发模块
//!
//! ## 设计思路
//!
//! 每种解码能力抽象为 `Decoder` trait，分发器以可选依赖持有：
//! - `native`：`image` crate 常规位图解码（始终存在；`avif-native` feature 下经 dav1d 支持 AVIF）
//! - `heif`：HEIF/AVIF 解码器（可选，缺失时报告 `DecoderUnavailable`）
//! - `tiff`：TIFF 解码，先转为无损 PNG 中间产物再回到像素管线（可选）
//!
//! 分发按 `SourceKind` 穷尽匹配；唯一的自动重试是 AVIF：主解码器失败后尝试一次原生解码。
//! HEIC 不做对称回退，原生位图解码器没有可靠的 HEVC 路径。
//!
//! ## 实现思路
//!
//! 1. 对可读取头部的格式先检查尺寸，按中间 RGBA 体积上限快速拒绝
//! 2. 调用对应解码器，统一产出 `PixelBuffer`（构造时校验尺寸 > 0）
//! 3. 解码属于 CPU 密集操作，异步入口通过 `spawn_blocking` 执行，不阻塞其他请求

use image::{GenericImageView, ImageFormat, ImageReader};
use std::io::Cursor;
use std::sync::Arc;

use super::{ConvertError, PixelBuffer, SourceKind};

/// 可注入的解码能力。
pub trait Decoder: Send + Sync {
    /// 解码器名称（用于日志与错误信息）。
    fn name(&self) -> &'static str;

    /// 尝试将完整字节解码为 RGBA 缓冲。
    fn try_decode(&self, bytes: &[u8]) -> Result<PixelBuffer, ConvertError>;
}

/// 基于 `image` crate 的常规位图解码器（按魔数猜测格式）。
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeRasterDecoder;

impl Decoder for NativeRasterDecoder {
    fn name(&self) -> &'static str {
        "native"
    }

    fn try_decode(&self, bytes: &[u8]) -> Result<PixelBuffer, ConvertError> {
        if bytes.is_empty() {
            return Err(ConvertError::Io("图片内容为空".to_string()));
        }

        let decoded = image::load_from_memory(bytes)
            .map_err(|e| ConvertError::Decode(format!("图片解码失败：{}", e)))?;

        let (width, height) = decoded.dimensions();
        if width == 0 || height == 0 {
            return Err(ConvertError::InvalidImage(format!(
                "解码后尺寸无效：{}x{}",
                width, height
            )));
        }

        PixelBuffer::from_dynamic(decoded)
    }
}

/// TIFF 解码的 PNG 中间产物。
#[derive(Debug, Clone)]
pub(crate) struct TiffIntermediate {
    pub(crate) png: Vec<u8>,
    pub(crate) width: u32,
    pub(crate) height: u32,
}

/// TIFF 解码器：先转为 PNG 中间产物，再经由像素管线得到 RGBA。
///
/// TIFF 的像素布局依赖解码库（位深、平面配置各异），PNG 可无损往返，
/// 因此对外只暴露统一的中间编码。
#[derive(Debug, Default, Clone, Copy)]
pub struct TiffDecoder;

impl TiffDecoder {
    /// 解码 TIFF 并重新编码为 PNG。
    pub(crate) fn decode_to_png(&self, bytes: &[u8]) -> Result<TiffIntermediate, ConvertError> {
        let decoded = image::load_from_memory_with_format(bytes, ImageFormat::Tiff)
            .map_err(|e| ConvertError::Decode(format!("TIFF 解码失败：{}", e)))?;

        let (width, height) = decoded.dimensions();
        if width == 0 || height == 0 {
            return Err(ConvertError::InvalidImage(format!(
                "TIFF 尺寸无效：{}x{}",
                width, height
            )));
        }

        let mut png = Vec::new();
        decoded
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .map_err(|e| ConvertError::Decode(format!("TIFF 转 PNG 中间产物失败：{}", e)))?;

        log::debug!("🧾 TIFF 中间产物 - {}x{} png={}KB", width, height, png.len() / 1024);

        Ok(TiffIntermediate { png, width, height })
    }
}

impl Decoder for TiffDecoder {
    fn name(&self) -> &'static str {
        "tiff"
    }

    fn try_decode(&self, bytes: &[u8]) -> Result<PixelBuffer, ConvertError> {
        let intermediate = self.decode_to_png(bytes)?;
        let decoded = image::load_from_memory_with_format(&intermediate.png, ImageFormat::Png)
            .map_err(|e| ConvertError::Decode(format!("PNG 中间产物解码失败：{}", e)))?;

        if decoded.dimensions() != (intermediate.width, intermediate.height) {
            return Err(ConvertError::InvalidImage(
                "PNG 中间产物尺寸与 TIFF 报告尺寸不一致".to_string(),
            ));
        }

        PixelBuffer::from_dynamic(decoded)
    }
}

/// 解码分发器。
///
/// 所有字段均为 `Arc`，克隆开销极小，可直接移入后台任务。
#[derive(Clone)]
pub struct DecodeDispatcher {
    native: Arc<dyn Decoder>,
    heif: Option<Arc<dyn Decoder>>,
    tiff: Option<Arc<dyn Decoder>>,
}

impl Default for DecodeDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl DecodeDispatcher {
    /// 默认装配：原生位图 + TIFF；启用 `heif` feature 时额外装配 libheif。
    pub fn new() -> Self {
        Self {
            native: Arc::new(NativeRasterDecoder),
            heif: default_heif_decoder(),
            tiff: Some(Arc::new(TiffDecoder)),
        }
    }

    pub fn with_native_decoder(mut self, decoder: Arc<dyn Decoder>) -> Self {
        self.native = decoder;
        self
    }

    pub fn with_heif_decoder(mut self, decoder: Option<Arc<dyn Decoder>>) -> Self {
        self.heif = decoder;
        self
    }

    pub fn with_tiff_decoder(mut self, decoder: Option<Arc<dyn Decoder>>) -> Self {
        self.tiff = decoder;
        self
    }

    /// 异步解码入口：在阻塞线程池中执行，调用方挂起但不阻塞运行时。
    pub async fn decode(
        &self,
        kind: SourceKind,
        bytes: Vec<u8>,
        max_decoded_bytes: u64,
    ) -> Result<PixelBuffer, ConvertError> {
        let dispatcher = self.clone();
        tokio::task::spawn_blocking(move || {
            dispatcher.decode_blocking(kind, &bytes, max_decoded_bytes)
        })
        .await?
    }

    /// 同步解码，按类别路由到对应解码器。
    pub fn decode_blocking(
        &self,
        kind: SourceKind,
        bytes: &[u8],
        max_decoded_bytes: u64,
    ) -> Result<PixelBuffer, ConvertError> {
        if bytes.is_empty() {
            return Err(ConvertError::Io("图片内容为空".to_string()));
        }

        log::debug!("🔍 解码分发 - kind={} bytes={}", kind.as_str(), bytes.len());

        let buffer = match kind {
            SourceKind::NativeRaster => {
                validate_header_dimensions(bytes, max_decoded_bytes)?;
                self.native.try_decode(bytes)?
            }
            SourceKind::Tiff => {
                let decoder = self.tiff.as_ref().ok_or_else(|| {
                    ConvertError::DecoderUnavailable("TIFF 解码器未初始化".to_string())
                })?;
                validate_header_dimensions(bytes, max_decoded_bytes)?;
                log::debug!("🧾 TIFF 交由 {} 解码器处理", decoder.name());
                decoder.try_decode(bytes)?
            }
            SourceKind::Heic => {
                let decoder = self.heif.as_ref().ok_or_else(|| {
                    ConvertError::DecoderUnavailable("HEIF 解码器未初始化".to_string())
                })?;
                decoder.try_decode(bytes)?
            }
            SourceKind::Avif => self.decode_avif_with_fallback(bytes)?,
            SourceKind::Unsupported => {
                return Err(ConvertError::UnsupportedFormat(
                    "无法识别的图片类型".to_string(),
                ));
            }
        };

        ensure_decoded_within_limit(&buffer, max_decoded_bytes)?;
        Ok(buffer)
    }

    /// AVIF：主解码器失败后尝试一次原生解码，两者都失败时合并原因。
    fn decode_avif_with_fallback(&self, bytes: &[u8]) -> Result<PixelBuffer, ConvertError> {
        let primary = match &self.heif {
            Some(decoder) => decoder.try_decode(bytes),
            None => Err(ConvertError::DecoderUnavailable(
                "HEIF/AVIF 解码器未初始化".to_string(),
            )),
        };

        let primary_err = match primary {
            Ok(buffer) => return Ok(buffer),
            Err(err) => err,
        };

        log::warn!(
            "⚠️ AVIF 主解码失败，尝试 {} 解码回退：{}",
            self.native.name(),
            primary_err
        );

        self.native.try_decode(bytes).map_err(|fallback_err| {
            ConvertError::Decode(format!(
                "AVIF 主解码失败（{}）；原生回退解码失败（{}）",
                primary_err, fallback_err
            ))
        })
    }
}

#[cfg(feature = "heif")]
fn default_heif_decoder() -> Option<Arc<dyn Decoder>> {
    Some(Arc::new(super::heif::HeifCodec))
}

#[cfg(not(feature = "heif"))]
fn default_heif_decoder() -> Option<Arc<dyn Decoder>> {
    None
}

/// 仅通过内存中的图片头信息读取宽高；无法识别时返回 `None`，交给解码器报告具体错误。
pub(crate) fn inspect_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .ok()?
        .into_dimensions()
        .ok()
}

fn validate_header_dimensions(bytes: &[u8], max_decoded_bytes: u64) -> Result<(), ConvertError> {
    let Some((width, height)) = inspect_dimensions(bytes) else {
        return Ok(());
    };

    let estimated = (width as u64)
        .checked_mul(height as u64)
        .and_then(|pixels| pixels.checked_mul(4))
        .ok_or_else(|| ConvertError::SizeExceeded("图片解码内存估算溢出".to_string()))?;

    if estimated > max_decoded_bytes {
        return Err(ConvertError::SizeExceeded(format!(
            "图片解码预计内存过大：{:.2} MB（限制：{:.2} MB）",
            estimated as f64 / 1024.0 / 1024.0,
            max_decoded_bytes as f64 / 1024.0 / 1024.0
        )));
    }

    Ok(())
}

fn ensure_decoded_within_limit(
    buffer: &PixelBuffer,
    max_decoded_bytes: u64,
) -> Result<(), ConvertError> {
    let len = buffer.pixels().len() as u64;
    if len > max_decoded_bytes {
        return Err(ConvertError::SizeExceeded(format!(
            "解码后像素数据过大：{:.2} MB（限制：{:.2} MB）",
            len as f64 / 1024.0 / 1024.0,
            max_decoded_bytes as f64 / 1024.0 / 1024.0
        )));
    }
    Ok(())
}
