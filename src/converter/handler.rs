//! # 核心编排模块
//!
//! ## 设计思路
//!
//! `ConvertHandler` 只负责流程编排与配置管理，不关心调用方是 CLI 还是 IPC。
//! 两条处理链路：
//! - `decode_image`：加载 → 分类 → 解码 → 预览降采样 → PNG Data URL
//! - `convert`：体积校验 → 目标格式解析 → 分类 → 解码 → 编码
//! - `encode`：严格目标格式（缺失即 `MissingFormat`）→ 编码像素或已编码字节
//!
//! ## 实现思路
//!
//! - 配置通过 `Arc<RwLock<ConvertConfig>>` 支持运行时动态切档。
//! - 单次请求内使用“同一配置快照”，避免处理中途配置漂移。
//! - 记录各阶段耗时，便于性能诊断。

use std::sync::{Arc, RwLock};
use std::time::Instant;

use super::classify::{classify, classify_bytes};
use super::decoder::DecodeDispatcher;
use super::encoder::{EncodeDispatcher, EncodeSource};
use super::preview::downscale_for_preview;
use super::source::{
    ConversionOutput, ConversionRequest, DecodeInput, DecodedImage, output_file_name,
};
use super::{ConvertConfig, ConvertError, FormatKey, PreviewProfile, SourceKind, normalize_format};

/// 转换处理器。
///
/// 封装配置状态与编解码分发器，并编排各子模块实现完整流程。
pub struct ConvertHandler {
    pub(super) config: Arc<RwLock<ConvertConfig>>,
    pub(super) decoders: DecodeDispatcher,
    pub(super) encoder: EncodeDispatcher,
}

impl ConvertHandler {
    /// 使用默认编解码装配创建处理器。
    ///
    /// # 示例
    /// ```rust,ignore
    /// use image_converter::converter::{ConvertConfig, ConvertHandler};
    ///
    /// let handler = ConvertHandler::new(ConvertConfig::default());
    /// ```
    pub fn new(config: ConvertConfig) -> Self {
        Self::with_codecs(config, DecodeDispatcher::new(), EncodeDispatcher::new())
    }

    /// 注入自定义编解码器（测试或替换 HEIF 后端时使用）。
    pub fn with_codecs(
        config: ConvertConfig,
        decoders: DecodeDispatcher,
        encoder: EncodeDispatcher,
    ) -> Self {
        Self {
            config: Arc::new(RwLock::new(config)),
            decoders,
            encoder,
        }
    }

    /// 获取配置快照。
    ///
    /// 作用：保证单次请求链路使用一致参数。
    pub(super) fn config_snapshot(&self) -> Result<ConvertConfig, ConvertError> {
        self.config
            .read()
            .map(|cfg| cfg.clone())
            .map_err(|_| ConvertError::InvalidConfig("配置读取锁已中毒".to_string()))
    }

    /// 整体替换配置（先校验）。
    pub fn set_config(&self, config: ConvertConfig) -> Result<(), ConvertError> {
        config.validate()?;
        let mut guard = self
            .config
            .write()
            .map_err(|_| ConvertError::InvalidConfig("配置写入锁已中毒".to_string()))?;
        *guard = config;
        Ok(())
    }

    /// 设置预览档位。
    pub fn set_preview_profile(&self, profile: PreviewProfile) -> Result<(), ConvertError> {
        let mut config = self
            .config
            .write()
            .map_err(|_| ConvertError::InvalidConfig("配置写入锁已中毒".to_string()))?;
        config.apply_preview_profile(profile);

        log::info!(
            "⚙️ 已切换预览档位：{:?}（preview={}, target_pixels={}, max_dim={}, filter={:?}）",
            profile,
            config.preview_enabled,
            config.preview_target_pixels,
            config.preview_max_dimension,
            config.resize_filter
        );

        Ok(())
    }

    /// 获取当前生效档位。
    pub fn get_preview_profile(&self) -> Result<PreviewProfile, ConvertError> {
        Ok(self.config_snapshot()?.infer_preview_profile())
    }

    /// 解码入口：加载任意来源并生成预览 Data URL，宽高为源图尺寸。
    pub async fn decode_image(&self, input: DecodeInput) -> Result<DecodedImage, ConvertError> {
        let config = self.config_snapshot()?;
        let total_start = Instant::now();

        let load_start = Instant::now();
        let raw = self.load_source(input, &config).await?;
        let load_elapsed = load_start.elapsed();

        let kind = resolve_kind(
            raw.name.as_deref(),
            raw.declared_type.as_deref(),
            &raw.bytes,
        )?;
        let source_hint = raw.source_hint;

        let decode_start = Instant::now();
        let buffer = self
            .decoders
            .decode(kind, raw.bytes, config.max_input_bytes)
            .await?;
        let (width, height) = buffer.dimensions();
        let decode_elapsed = decode_start.elapsed();

        let preview_start = Instant::now();
        let encoder = self.encoder.clone();
        let preview_config = config.clone();
        let data_url = tokio::task::spawn_blocking(move || {
            let preview = downscale_for_preview(buffer, &preview_config)?;
            encoder.encode_to_data_url(&preview, FormatKey::Png, None, &preview_config)
        })
        .await??;
        let preview_elapsed = preview_start.elapsed();

        log::info!(
            "✅ 图片解码完成 - 来源: {} 类别: {} 尺寸: {}x{} load={}ms decode={}ms preview={}ms total={}ms",
            source_hint,
            kind.as_str(),
            width,
            height,
            load_elapsed.as_millis(),
            decode_elapsed.as_millis(),
            preview_elapsed.as_millis(),
            total_start.elapsed().as_millis()
        );

        Ok(DecodedImage {
            data_url,
            width,
            height,
            kind,
        })
    }

    /// 转换入口：解码源字节并编码为目标格式。
    ///
    /// 目标格式按“显式标记 → 建议文件名扩展名”解析，均无法识别时原样返回源字节。
    pub async fn convert(
        &self,
        request: ConversionRequest,
    ) -> Result<ConversionOutput, ConvertError> {
        let config = self.config_snapshot()?;
        let total_start = Instant::now();

        Self::ensure_within_limit(request.bytes.len() as u64, &config, "输入数据")?;
        if request.bytes.is_empty() {
            return Err(ConvertError::MissingData("缺少待转换的图片数据".to_string()));
        }

        let Some(format) = resolve_target_format(
            request.target_format.as_deref(),
            request.suggested_name.as_deref(),
        ) else {
            log::info!(
                "📦 未识别目标格式，原样保存 {} 字节",
                request.bytes.len()
            );
            let file_name = output_file_name(request.suggested_name.as_deref(), None);
            return Ok(ConversionOutput {
                bytes: request.bytes,
                format: None,
                file_name,
            });
        };

        let kind = resolve_kind(None, request.declared_type.as_deref(), &request.bytes)?;

        let decode_start = Instant::now();
        let buffer = self
            .decoders
            .decode(kind, request.bytes, config.max_input_bytes)
            .await?;
        let decode_elapsed = decode_start.elapsed();

        let encode_start = Instant::now();
        let bytes = self
            .encoder
            .encode(EncodeSource::Pixels(buffer), format, request.quality, &config)
            .await?;
        let encode_elapsed = encode_start.elapsed();

        log::info!(
            "✅ 图片转换完成 - {} -> {} 输出: {} 字节 decode={}ms encode={}ms total={}ms",
            kind.as_str(),
            format.as_str(),
            bytes.len(),
            decode_elapsed.as_millis(),
            encode_elapsed.as_millis(),
            total_start.elapsed().as_millis()
        );

        Ok(ConversionOutput {
            bytes,
            format: Some(format),
            file_name: output_file_name(request.suggested_name.as_deref(), Some(format)),
        })
    }

    /// 编码入口：目标格式必须显式给出，不做扩展名推断或原样保存。
    pub async fn encode(
        &self,
        source: EncodeSource,
        target_format: Option<&str>,
        quality: Option<u8>,
    ) -> Result<Vec<u8>, ConvertError> {
        let config = self.config_snapshot()?;
        let format = EncodeDispatcher::resolve_target(target_format)?;

        let encode_start = Instant::now();
        let bytes = self.encoder.encode(source, format, quality, &config).await?;

        log::info!(
            "✅ 图片编码完成 - {} 输出: {} 字节 encode={}ms",
            format.as_str(),
            bytes.len(),
            encode_start.elapsed().as_millis()
        );
        Ok(bytes)
    }
}

/// 显式标记优先；否则取建议文件名的扩展名。
fn resolve_target_format(token: Option<&str>, suggested_name: Option<&str>) -> Option<FormatKey> {
    normalize_format(token).or_else(|| {
        suggested_name
            .and_then(|name| std::path::Path::new(name.trim()).extension())
            .and_then(|ext| ext.to_str())
            .and_then(FormatKey::from_extension)
    })
}

/// 名称/声明类型无法判定时回退到文件签名嗅探。
fn resolve_kind(
    name: Option<&str>,
    declared_type: Option<&str>,
    bytes: &[u8],
) -> Result<SourceKind, ConvertError> {
    let kind = match classify(name, declared_type) {
        SourceKind::Unsupported => classify_bytes(bytes),
        kind => kind,
    };

    if kind == SourceKind::Unsupported {
        return Err(ConvertError::UnsupportedFormat(format!(
            "不支持的图片来源：{}",
            name.or(declared_type).unwrap_or("未知类型")
        )));
    }
    Ok(kind)
}
