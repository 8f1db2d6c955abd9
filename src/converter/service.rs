//! # 服务层（可注入状态）
//!
//! ## 设计思路
//!
//! 使用 `ConverterService` 作为调用方持有的状态，替代全局单例函数。
//! 生命周期由入口（CLI / IPC 宿主）统一管理，测试可创建独立实例。
//!
//! ## 实现思路
//!
//! 对外仅暴露少量稳定 API：
//! - `decode_image` / `convert`：执行完整处理链路
//! - `encode`：按显式目标格式编码像素或已编码字节
//! - `set_config` / `config`：整体替换或读取配置
//! - `set_preview_profile` / `get_preview_profile`：切换预览档位

use super::decoder::DecodeDispatcher;
use super::encoder::{EncodeDispatcher, EncodeSource};
use super::source::{ConversionOutput, ConversionRequest, DecodeInput, DecodedImage};
use super::{ConvertConfig, ConvertError, ConvertHandler, PreviewProfile};

/// 图片转换服务状态，内部持有 `ConvertHandler`。
pub struct ConverterService {
    handler: ConvertHandler,
}

impl ConverterService {
    /// 使用默认配置创建服务。
    ///
    /// # 示例
    /// ```rust,no_run
    /// use image_converter::converter::ConverterService;
    ///
    /// let service = ConverterService::new()?;
    /// # Ok::<(), image_converter::converter::ConvertError>(())
    /// ```
    pub fn new() -> Result<Self, ConvertError> {
        Self::with_config(ConvertConfig::default())
    }

    /// 使用自定义配置创建服务（先校验）。
    ///
    /// # 示例
    /// ```rust,no_run
    /// use image_converter::converter::{ConvertConfig, ConverterService};
    ///
    /// let mut config = ConvertConfig::default();
    /// config.default_quality = 75;
    /// let service = ConverterService::with_config(config)?;
    /// # Ok::<(), image_converter::converter::ConvertError>(())
    /// ```
    pub fn with_config(config: ConvertConfig) -> Result<Self, ConvertError> {
        config.validate()?;
        Ok(Self {
            handler: ConvertHandler::new(config),
        })
    }

    /// 使用自定义编解码器创建服务。
    pub fn with_codecs(
        config: ConvertConfig,
        decoders: DecodeDispatcher,
        encoder: EncodeDispatcher,
    ) -> Result<Self, ConvertError> {
        config.validate()?;
        Ok(Self {
            handler: ConvertHandler::with_codecs(config, decoders, encoder),
        })
    }

    /// 解码任意来源并生成预览。
    ///
    /// # 示例
    /// ```rust,no_run
    /// use image_converter::converter::{ConverterService, DecodeInput};
    ///
    /// # async fn demo() -> Result<(), image_converter::converter::ConvertError> {
    /// let service = ConverterService::new()?;
    /// let decoded = service
    ///     .decode_image(DecodeInput::FilePath("/tmp/photo.heic".into()))
    ///     .await?;
    /// println!("{}x{}", decoded.width, decoded.height);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn decode_image(&self, input: DecodeInput) -> Result<DecodedImage, ConvertError> {
        self.handler.decode_image(input).await
    }

    /// 执行一次转换。
    pub async fn convert(
        &self,
        request: ConversionRequest,
    ) -> Result<ConversionOutput, ConvertError> {
        self.handler.convert(request).await
    }

    /// 按显式目标格式编码。
    pub async fn encode(
        &self,
        source: EncodeSource,
        target_format: Option<&str>,
        quality: Option<u8>,
    ) -> Result<Vec<u8>, ConvertError> {
        self.handler.encode(source, target_format, quality).await
    }

    pub fn set_config(&self, config: ConvertConfig) -> Result<(), ConvertError> {
        self.handler.set_config(config)
    }

    /// 当前配置快照。
    pub fn config(&self) -> Result<ConvertConfig, ConvertError> {
        self.handler.config_snapshot()
    }

    /// 设置预览档位。
    ///
    /// # 示例
    /// ```rust,no_run
    /// use image_converter::converter::ConverterService;
    ///
    /// let service = ConverterService::new()?;
    /// service.set_preview_profile("speed")?;
    /// # Ok::<(), image_converter::converter::ConvertError>(())
    /// ```
    pub fn set_preview_profile(&self, profile: &str) -> Result<(), ConvertError> {
        let profile = PreviewProfile::from_str(profile)?;
        self.handler.set_preview_profile(profile)
    }

    /// 获取当前生效预览档位（字符串）。
    pub fn get_preview_profile(&self) -> Result<String, ConvertError> {
        let profile = self.handler.get_preview_profile()?;
        Ok(profile.as_str().to_string())
    }
}
