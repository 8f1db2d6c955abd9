//! # 图片转换模块（converter）
//!
//! ## 设计思路
//!
//! 该模块将“来源加载 → 类别判定 → 解码 → 像素处理 → 编码”按职责拆分为多个子模块，
//! 避免单文件膨胀与耦合。
//!
//! - `commands`：仅做边界入参/出参适配（薄封装）
//! - `service`：承载可注入状态（`ConverterService`）
//! - `handler`：编排整条处理流水线
//! - `loader`：负责文件/字节/Data URL 加载与体积校验
//! - `classify`：按文件名、声明类型、文件签名判定 `SourceKind`
//! - `decoder` / `encoder`：可注入编解码能力与格式分发
//! - `bmp`：手写 24 位 BMP 编码
//! - `preview`：预览降采样
//! - `config/error/format/pixel/data_url/source`：配置、错误、格式注册表与中间数据模型
//!
//! ## 实现思路
//!
//! 对外仅暴露必要类型与命令函数，流程内部细节保持 `mod` 私有。
//!
//! ## 新同事快速上手
//!
//! ```text
//! 调用方（CLI / IPC）
//!    ↓
//! commands.rs（参数适配，错误折叠为 errorCode）
//!    ↓
//! service.rs（状态持有、服务入口）
//!    ↓
//! handler.rs（统一编排 + 阶段耗时日志）
//!    ├─ loader.rs（来源加载 + 体积上限）
//!    ├─ classify.rs（heic / avif / tiff / nativeRaster / unsupported）
//!    ├─ decoder.rs（分发 + AVIF 回退）
//!    ├─ preview.rs（预览降采样）
//!    └─ encoder.rs（分发 + 背景合成 → bmp.rs / image / HEIC 编码器）
//! ```
//!
//! ## 分层职责建议
//!
//! - 新增格式：扩展 `FormatKey` / `FORMATS`，再补 `encoder` 与 `classify` 的匹配分支
//! - 配置与策略变更优先改 `config.rs`
//! - 业务流程顺序变更优先改 `handler.rs`

pub mod bmp;
pub mod classify;
pub mod commands;
mod config;
pub mod data_url;
pub mod decoder;
pub mod encoder;
mod error;
mod format;
mod handler;
#[cfg(feature = "heif")]
pub mod heif;
mod loader;
mod pixel;
pub mod preview;
mod service;
mod source;

pub use classify::{SourceKind, classify, classify_bytes};
pub use commands::{
    CommandError, ConvertRequest, ConvertResponse, DecodeImageRequest, DecodeImageResponse,
    build_save_filters, convert, decode_image,
};
pub use config::{ConvertConfig, DEFAULT_MAX_INPUT_BYTES, DEFAULT_QUALITY, PreviewProfile};
pub use data_url::{DataUrl, from_data_url, parse_data_url, to_data_url};
pub use decoder::{DecodeDispatcher, Decoder, NativeRasterDecoder, TiffDecoder};
pub use encoder::{EncodeDispatcher, EncodeSource, Encoder};
pub use error::ConvertError;
pub use format::{
    ALL_IMAGES_LABEL, FORMATS, FormatDescriptor, FormatKey, OutputFilter, build_output_filters,
    clamp_quality, normalize_format, normalize_quality, normalize_quality_value,
};
pub use handler::ConvertHandler;
pub use pixel::PixelBuffer;
pub use service::ConverterService;
pub use source::{ConversionOutput, ConversionRequest, DecodeInput, DecodedImage, output_file_name};
