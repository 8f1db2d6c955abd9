//! # 来源分类模块
//!
//! ## 设计思路
//!
//! 拖放或剪贴板来源有时只带文件名、有时只带 MIME 类型，因此两者都要检查。
//! 分类结果是封闭枚举 `SourceKind`，由解码分发器穷尽匹配；新增格式只需扩展枚举与一个分支。
//!
//! ## 实现思路
//!
//! 判定顺序固定：HEIC/HEIF → AVIF → TIFF → 常规位图 → 不支持。
//! 分类永不失败，只返回类别；无法通过名称/类型判断时可用 `classify_bytes` 按魔数嗅探。

use serde::Serialize;
use std::path::Path;

/// 解码策略类别。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SourceKind {
    NativeRaster,
    Heic,
    Avif,
    Tiff,
    Unsupported,
}

const RASTER_EXTENSIONS: [&str; 8] = ["jpg", "jpeg", "png", "webp", "gif", "bmp", "tif", "tiff"];
const HEIC_TYPES: [&str; 4] = [
    "image/heic",
    "image/heif",
    "image/heic-sequence",
    "image/heif-sequence",
];

impl SourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NativeRaster => "nativeRaster",
            Self::Heic => "heic",
            Self::Avif => "avif",
            Self::Tiff => "tiff",
            Self::Unsupported => "unsupported",
        }
    }
}

/// 根据文件名与声明类型判定解码策略。
///
/// # 示例
/// ```rust
/// use image_converter::converter::{classify, SourceKind};
///
/// assert_eq!(classify(Some("IMG_0001.AVIF"), None), SourceKind::Avif);
/// assert_eq!(classify(None, Some("image/png")), SourceKind::NativeRaster);
/// assert_eq!(classify(Some("notes.txt"), None), SourceKind::Unsupported);
/// ```
pub fn classify(name: Option<&str>, declared_type: Option<&str>) -> SourceKind {
    let ext = name.and_then(extension_of);
    let ext = ext.as_deref();
    let mime = declared_type.map(mime_essence);
    let mime = mime.as_deref().filter(|m| !m.is_empty());

    if matches!(ext, Some("heic" | "heif")) || mime.is_some_and(|m| HEIC_TYPES.contains(&m)) {
        return SourceKind::Heic;
    }

    if ext == Some("avif") || mime == Some("image/avif") {
        return SourceKind::Avif;
    }

    if matches!(ext, Some("tif" | "tiff")) || mime == Some("image/tiff") {
        return SourceKind::Tiff;
    }

    if mime.is_some_and(|m| m.starts_with("image/"))
        || ext.is_some_and(|e| RASTER_EXTENSIONS.contains(&e))
    {
        return SourceKind::NativeRaster;
    }

    SourceKind::Unsupported
}

/// 通过文件签名（magic bytes）嗅探类别。
pub fn classify_bytes(bytes: &[u8]) -> SourceKind {
    match sniff_mime(bytes) {
        Some(mime) => classify(None, Some(mime)),
        None => SourceKind::Unsupported,
    }
}

/// 嗅探图片 MIME；非图片签名返回 `None`。
pub fn sniff_mime(bytes: &[u8]) -> Option<&'static str> {
    let kind = infer::get(bytes)?;
    (kind.matcher_type() == infer::MatcherType::Image).then(|| kind.mime_type())
}

fn extension_of(name: &str) -> Option<String> {
    Path::new(name.trim())
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
}

fn mime_essence(declared: &str) -> String {
    declared
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}
