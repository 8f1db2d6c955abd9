//! # 数据源与中间模型
//!
//! ## 设计思路
//!
//! 将“外部输入类型”和“流水线中间结果”解耦：
//! - `DecodeInput` 表示外部来源语义（路径 / 字节 / Data URL，三选一）
//! - `RawImageData` 表示已加载但未解码的字节及其分类线索
//! - `ConversionRequest` / `ConversionOutput` 表示单次转换的入参与产物

use std::path::PathBuf;

use super::{FormatKey, SourceKind};

/// 解码输入来源。
#[derive(Debug, Clone)]
pub enum DecodeInput {
    /// 本地文件路径。
    FilePath(PathBuf),
    /// 内存字节，可附带文件名与声明类型（拖放来源常只带其一）。
    Bytes {
        bytes: Vec<u8>,
        name: Option<String>,
        declared_type: Option<String>,
    },
    /// `data:<mime>;base64,<payload>`。
    DataUrl(String),
}

impl DecodeInput {
    pub fn bytes(bytes: Vec<u8>) -> Self {
        Self::Bytes {
            bytes,
            name: None,
            declared_type: None,
        }
    }
}

/// 加载阶段输出：原始字节与分类线索。
#[derive(Debug)]
pub(crate) struct RawImageData {
    pub(crate) bytes: Vec<u8>,
    pub(crate) name: Option<String>,
    pub(crate) declared_type: Option<String>,
    /// 来源提示（用于日志与诊断）。
    pub(crate) source_hint: &'static str,
}

/// 解码结果：预览 Data URL 与源图尺寸。
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pub data_url: String,
    /// 源图宽度（不受预览降采样影响）。
    pub width: u32,
    pub height: u32,
    pub kind: SourceKind,
}

/// 单次转换请求。
#[derive(Debug, Clone, Default)]
pub struct ConversionRequest {
    pub bytes: Vec<u8>,
    /// 目标格式标记；缺省或无法识别时按建议文件名推断，仍失败则原样保存。
    pub target_format: Option<String>,
    /// 已归一化的质量（`[1, 100]`）。
    pub quality: Option<u8>,
    pub suggested_name: Option<String>,
    /// 源声明类型（可选，辅助分类）。
    pub declared_type: Option<String>,
}

/// 单次转换产物。
#[derive(Debug, Clone)]
pub struct ConversionOutput {
    pub bytes: Vec<u8>,
    /// `None` 表示未重新编码、原样输出。
    pub format: Option<FormatKey>,
    /// 已带规范扩展名的输出文件名。
    pub file_name: String,
}

impl ConversionOutput {
    pub fn size(&self) -> usize {
        self.bytes.len()
    }
}

const DEFAULT_STEM: &str = "converted";

/// 生成输出文件名：替换或追加目标格式的规范扩展名。
///
/// 已有扩展名属于目标格式时保留原样（如 `a.jpeg` 不会改成 `a.jpg`）。
pub fn output_file_name(suggested: Option<&str>, format: Option<FormatKey>) -> String {
    let suggested = suggested
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .unwrap_or(DEFAULT_STEM);

    let path = std::path::Path::new(suggested);
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(DEFAULT_STEM);

    let Some(format) = format else {
        return file_name.to_string();
    };

    let (stem, ext) = match file_name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
        _ => (file_name, None),
    };

    if ext.and_then(FormatKey::from_extension) == Some(format) {
        return file_name.to_string();
    }

    format!("{}.{}", stem, format.canonical_extension())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_name_replaces_extension() {
        assert_eq!(output_file_name(Some("photo.heic"), Some(FormatKey::Jpeg)), "photo.jpg");
        assert_eq!(output_file_name(Some("photo.JPEG"), Some(FormatKey::Jpeg)), "photo.JPEG");
        assert_eq!(output_file_name(Some("archive.v2"), Some(FormatKey::Png)), "archive.png");
        assert_eq!(output_file_name(Some(".hidden"), Some(FormatKey::Bmp)), ".hidden.bmp");
        assert_eq!(output_file_name(Some("/a/b/scan"), Some(FormatKey::Tiff)), "scan.tif");
    }

    #[test]
    fn output_name_defaults() {
        assert_eq!(output_file_name(None, Some(FormatKey::Webp)), "converted.webp");
        assert_eq!(output_file_name(Some("  "), None), "converted");
        assert_eq!(output_file_name(Some("keep.raw"), None), "keep.raw");
    }
}
