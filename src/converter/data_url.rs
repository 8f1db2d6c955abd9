//! # Data URL 传输编解码模块
//!
//! ## 设计思路
//!
//! 预览层与持久化层之间通过 `data:<mime>;base64,<payload>` 文本传递图片字节。
//! 解析阶段“尽可能早”地失败：先校验结构，再按 Base64 长度估算解码体积，最后才真正解码。
//!
//! ## 实现思路
//!
//! - 头部位于 `data:` 与第一个逗号之间，以 `;` 分段：首段为 MIME，末段必须为 `base64`。
//! - MIME 必须属于 `image/*` 且子类型非空。
//! - 体积估算使用 `ceil(len / 4) * 3` 作为解码上限，超限直接返回 `SizeExceeded`。

use base64::{Engine as _, engine::general_purpose};

use super::ConvertError;

const DATA_SCHEME: &str = "data:";
const BASE64_MARKER: &str = "base64";

/// 解析后的 Data URL。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUrl {
    pub mime: String,
    pub bytes: Vec<u8>,
}

/// 将字节编码为 `data:<mime>;base64,<payload>`。
pub fn to_data_url(bytes: &[u8], mime: &str) -> String {
    format!(
        "{}{};{},{}",
        DATA_SCHEME,
        mime,
        BASE64_MARKER,
        general_purpose::STANDARD.encode(bytes)
    )
}

/// 解析 Data URL 并返回原始字节（不限制体积）。
pub fn from_data_url(url: &str) -> Result<Vec<u8>, ConvertError> {
    parse_data_url(url, u64::MAX).map(|parsed| parsed.bytes)
}

/// 解析 Data URL，解码前按估算体积执行上限检查。
pub fn parse_data_url(url: &str, max_bytes: u64) -> Result<DataUrl, ConvertError> {
    let normalized = url.trim();

    let scheme = normalized.get(..DATA_SCHEME.len()).unwrap_or_default();
    if !scheme.eq_ignore_ascii_case(DATA_SCHEME) {
        return Err(ConvertError::MalformedDataUrl("缺少 data: 前缀".to_string()));
    }

    let rest = &normalized[DATA_SCHEME.len()..];
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| ConvertError::MalformedDataUrl("缺少逗号分隔的数据段".to_string()))?;

    let mut segments = header.split(';');
    let mime = segments.next().unwrap_or_default().trim().to_ascii_lowercase();
    let is_base64 = header
        .rsplit(';')
        .next()
        .is_some_and(|last| last.trim().eq_ignore_ascii_case(BASE64_MARKER));

    match mime.split_once('/') {
        Some(("image", subtype)) if !subtype.is_empty() => {}
        _ => {
            return Err(ConvertError::MalformedDataUrl(format!(
                "MIME 类型不是图片：{}",
                if mime.is_empty() { "(空)" } else { mime.as_str() }
            )));
        }
    }

    if !is_base64 {
        return Err(ConvertError::MalformedDataUrl("缺少 base64 标记".to_string()));
    }

    let payload = payload.trim();
    if payload.is_empty() {
        return Err(ConvertError::MalformedDataUrl("Base64 数据为空".to_string()));
    }

    let estimated_len = estimate_base64_decoded_upper_bound_len(payload)?;
    if estimated_len > max_bytes {
        return Err(ConvertError::SizeExceeded(format!(
            "Base64 预计解码体积过大：{:.2} MB（限制：{:.2} MB）",
            estimated_len as f64 / 1024.0 / 1024.0,
            max_bytes as f64 / 1024.0 / 1024.0
        )));
    }

    let bytes = general_purpose::STANDARD
        .decode(payload)
        .map_err(|e| ConvertError::MalformedDataUrl(format!("Base64 解码失败：{}", e)))?;

    if bytes.is_empty() {
        return Err(ConvertError::MalformedDataUrl("Base64 数据为空".to_string()));
    }

    Ok(DataUrl { mime, bytes })
}

fn estimate_base64_decoded_upper_bound_len(base64_data: &str) -> Result<u64, ConvertError> {
    let len = base64_data.len() as u64;
    let groups = len
        .checked_add(3)
        .ok_or_else(|| ConvertError::SizeExceeded("Base64 输入长度溢出".to_string()))?
        / 4;

    groups
        .checked_mul(3)
        .ok_or_else(|| ConvertError::SizeExceeded("Base64 解码体积估算溢出".to_string()))
}
