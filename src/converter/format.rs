//! # 格式注册表与归一化模块
//!
//! ## 设计思路
//!
//! 所有可输出格式在编译期以静态表定义，运行期只读，天然线程安全。
//! 外部传入的格式标记（用户选择、扩展名）统一先归一化为 `FormatKey`，
//! 再进入编码分发，避免散落的字符串比较。
//!
//! ## 实现思路
//!
//! - `FORMATS` 按固定顺序（jpeg, png, webp, avif, heic, gif, bmp, tiff）排列，
//!   该顺序同时决定保存对话框过滤器的排列。
//! - 扩展名索引通过 `Lazy<HashMap>` 首次访问时构建。
//! - 质量参数按整数解析（兼容 "85px" 这类前缀数字写法），再夹取到 `[1, 100]`。

use std::collections::HashMap;

use once_cell::sync::Lazy;
use serde::Serialize;

/// 规范格式键。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatKey {
    Jpeg,
    Png,
    Webp,
    Avif,
    Heic,
    Gif,
    Bmp,
    Tiff,
}

/// 单个输出格式的静态描述。
#[derive(Debug)]
pub struct FormatDescriptor {
    pub key: FormatKey,
    pub label: &'static str,
    /// 合法扩展名，首个为规范扩展名。
    pub extensions: &'static [&'static str],
    pub mime: &'static str,
    pub supports_quality: bool,
    /// 为 `false` 时编码前需要先合成到背景色。
    pub supports_alpha: bool,
}

pub const FORMATS: [FormatDescriptor; 8] = [
    FormatDescriptor {
        key: FormatKey::Jpeg,
        label: "JPEG",
        extensions: &["jpg", "jpeg"],
        mime: "image/jpeg",
        supports_quality: true,
        supports_alpha: false,
    },
    FormatDescriptor {
        key: FormatKey::Png,
        label: "PNG",
        extensions: &["png"],
        mime: "image/png",
        supports_quality: false,
        supports_alpha: true,
    },
    FormatDescriptor {
        key: FormatKey::Webp,
        label: "WebP",
        extensions: &["webp"],
        mime: "image/webp",
        supports_quality: true,
        supports_alpha: true,
    },
    FormatDescriptor {
        key: FormatKey::Avif,
        label: "AVIF",
        extensions: &["avif"],
        mime: "image/avif",
        supports_quality: true,
        supports_alpha: true,
    },
    FormatDescriptor {
        key: FormatKey::Heic,
        label: "HEIC",
        extensions: &["heic", "heif"],
        mime: "image/heic",
        supports_quality: true,
        supports_alpha: true,
    },
    FormatDescriptor {
        key: FormatKey::Gif,
        label: "GIF",
        extensions: &["gif"],
        mime: "image/gif",
        supports_quality: false,
        supports_alpha: true,
    },
    FormatDescriptor {
        key: FormatKey::Bmp,
        label: "BMP",
        extensions: &["bmp"],
        mime: "image/bmp",
        supports_quality: false,
        supports_alpha: false,
    },
    FormatDescriptor {
        key: FormatKey::Tiff,
        label: "TIFF",
        extensions: &["tif", "tiff"],
        mime: "image/tiff",
        supports_quality: false,
        supports_alpha: true,
    },
];

pub const ALL_IMAGES_LABEL: &str = "All Images";

static EXTENSION_INDEX: Lazy<HashMap<&'static str, FormatKey>> = Lazy::new(|| {
    FORMATS
        .iter()
        .flat_map(|desc| desc.extensions.iter().map(move |ext| (*ext, desc.key)))
        .collect()
});

impl FormatKey {
    pub const ALL: [FormatKey; 8] = [
        Self::Jpeg,
        Self::Png,
        Self::Webp,
        Self::Avif,
        Self::Heic,
        Self::Gif,
        Self::Bmp,
        Self::Tiff,
    ];

    pub fn descriptor(self) -> &'static FormatDescriptor {
        &FORMATS[self as usize]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Jpeg => "jpeg",
            Self::Png => "png",
            Self::Webp => "webp",
            Self::Avif => "avif",
            Self::Heic => "heic",
            Self::Gif => "gif",
            Self::Bmp => "bmp",
            Self::Tiff => "tiff",
        }
    }

    pub fn mime(self) -> &'static str {
        self.descriptor().mime
    }

    pub fn canonical_extension(self) -> &'static str {
        self.descriptor().extensions[0]
    }

    /// 通过扩展名查找格式（大小写不敏感，可带前导点）。
    pub fn from_extension(ext: &str) -> Option<Self> {
        let ext = ext.trim().trim_start_matches('.').to_ascii_lowercase();
        EXTENSION_INDEX.get(ext.as_str()).copied()
    }

    /// 通过 MIME 类型查找格式（忽略参数部分）。
    pub fn from_mime(mime: &str) -> Option<Self> {
        let essence = mime.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();
        match essence.as_str() {
            "image/jpeg" | "image/jpg" | "image/pjpeg" => Some(Self::Jpeg),
            "image/png" => Some(Self::Png),
            "image/webp" => Some(Self::Webp),
            "image/avif" => Some(Self::Avif),
            "image/heic" | "image/heif" | "image/heic-sequence" | "image/heif-sequence" => {
                Some(Self::Heic)
            }
            "image/gif" => Some(Self::Gif),
            "image/bmp" | "image/x-ms-bmp" => Some(Self::Bmp),
            "image/tiff" => Some(Self::Tiff),
            _ => None,
        }
    }
}

/// 将外部格式标记归一化为规范键。
///
/// 大小写不敏感；`jpg→jpeg`、`heif→heic`、`tif→tiff`。
/// 空值或无法识别时返回 `None`，由调用方回退到扩展名推断或原样保存。
///
/// # 示例
/// ```rust
/// use image_converter::converter::{normalize_format, FormatKey};
///
/// assert_eq!(normalize_format(Some("JPG")), Some(FormatKey::Jpeg));
/// assert_eq!(normalize_format(Some("")), None);
/// assert_eq!(normalize_format(None), None);
/// ```
pub fn normalize_format(token: Option<&str>) -> Option<FormatKey> {
    let token = token?.trim();
    if token.is_empty() {
        return None;
    }
    FormatKey::from_extension(token)
}

/// 将整数质量夹取到 `[1, 100]`。
pub fn clamp_quality(value: i64) -> u8 {
    value.clamp(1, 100) as u8
}

/// 解析质量字符串。
///
/// 只取前导整数部分（可带符号），没有数字时返回 `None`。
pub fn normalize_quality(token: &str) -> Option<u8> {
    let trimmed = token.trim();
    let (negative, digits) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };

    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    if end == 0 {
        return None;
    }

    // 超长数字直接视为溢出并夹取
    let magnitude = digits[..end].parse::<i64>().unwrap_or(i64::MAX);
    Some(clamp_quality(if negative { -magnitude } else { magnitude }))
}

/// 解析来自 IPC 的质量值（数字或字符串）。
pub fn normalize_quality_value(value: &serde_json::Value) -> Option<u8> {
    match value {
        serde_json::Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64))
            .map(clamp_quality),
        serde_json::Value::String(s) => normalize_quality(s),
        _ => None,
    }
}

/// 保存对话框过滤器分组。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputFilter {
    pub label: String,
    pub extensions: Vec<&'static str>,
}

/// 构建保存对话框过滤器。
///
/// 目标格式（若有）排在首位，其余格式按规范顺序排列，最后是覆盖全部扩展名的 "All Images"。
pub fn build_output_filters(target: Option<FormatKey>) -> Vec<OutputFilter> {
    let mut filters = Vec::with_capacity(FORMATS.len() + 1);

    let to_filter = |desc: &FormatDescriptor| OutputFilter {
        label: desc.label.to_string(),
        extensions: desc.extensions.to_vec(),
    };

    if let Some(target) = target {
        filters.push(to_filter(target.descriptor()));
    }

    filters.extend(
        FORMATS
            .iter()
            .filter(|desc| Some(desc.key) != target)
            .map(to_filter),
    );

    filters.push(OutputFilter {
        label: ALL_IMAGES_LABEL.to_string(),
        extensions: FORMATS
            .iter()
            .flat_map(|desc| desc.extensions.iter().copied())
            .collect(),
    });

    filters
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn registry_order_matches_key_discriminants() {
        for (index, key) in FormatKey::ALL.iter().enumerate() {
            assert_eq!(FORMATS[index].key, *key);
            assert!(!key.descriptor().extensions.is_empty());
        }
    }

    #[test]
    fn normalize_format_handles_aliases() {
        assert_eq!(normalize_format(Some("JPG")), Some(FormatKey::Jpeg));
        assert_eq!(normalize_format(Some("HEIF")), Some(FormatKey::Heic));
        assert_eq!(normalize_format(Some("tif")), Some(FormatKey::Tiff));
        assert_eq!(normalize_format(Some(" webp ")), Some(FormatKey::Webp));
        assert_eq!(normalize_format(Some("")), None);
        assert_eq!(normalize_format(Some("psd")), None);
        assert_eq!(normalize_format(None), None);
    }

    #[test]
    fn normalize_quality_clamps_and_rejects() {
        assert_eq!(normalize_quality("150"), Some(100));
        assert_eq!(normalize_quality("0"), Some(1));
        assert_eq!(normalize_quality("-20"), Some(1));
        assert_eq!(normalize_quality("85px"), Some(85));
        assert_eq!(normalize_quality("abc"), None);
        assert_eq!(normalize_quality(""), None);
    }

    #[test]
    fn normalize_quality_value_accepts_numbers_and_strings() {
        assert_eq!(normalize_quality_value(&serde_json::json!(150)), Some(100));
        assert_eq!(normalize_quality_value(&serde_json::json!(0)), Some(1));
        assert_eq!(normalize_quality_value(&serde_json::json!(72.9)), Some(72));
        assert_eq!(normalize_quality_value(&serde_json::json!("abc")), None);
        assert_eq!(normalize_quality_value(&serde_json::json!(null)), None);
    }

    #[test]
    fn filters_put_target_first_then_canonical_order() {
        let filters = build_output_filters(Some(FormatKey::Bmp));
        let labels: Vec<&str> = filters.iter().map(|f| f.label.as_str()).collect();

        assert_eq!(
            labels,
            vec!["BMP", "JPEG", "PNG", "WebP", "AVIF", "HEIC", "GIF", "TIFF", "All Images"]
        );
        assert_eq!(filters.last().map(|f| f.extensions.len()), Some(11));
    }

    #[test]
    fn filters_without_target_use_canonical_order() {
        let filters = build_output_filters(None);
        assert_eq!(filters.len(), 9);
        assert_eq!(filters[0].extensions, vec!["jpg", "jpeg"]);
        assert_eq!(filters[8].label, ALL_IMAGES_LABEL);
    }

    proptest! {
        #[test]
        fn clamp_quality_always_in_range(value in any::<i64>()) {
            let q = clamp_quality(value);
            prop_assert!((1..=100).contains(&q));
        }

        #[test]
        fn normalize_quality_matches_clamp(value in -1000i64..1000) {
            prop_assert_eq!(normalize_quality(&value.to_string()), Some(clamp_quality(value)));
        }
    }
}
