//! # 错误模型模块
//!
//! ## 设计思路
//!
//! 使用单一错误枚举承载转换链路中的所有错误来源，避免字符串拼接式错误处理。
//! 通过 `thiserror` 保持人类可读错误，同时让调用侧可按分支匹配。
//!
//! ## 实现思路
//!
//! - 每个分支附带稳定的错误码（`code`），供边界层序列化给前端。
//! - `stage` 标记失败发生在哪个阶段，便于状态栏展示与日志诊断。
//! - 底层库错误一律在各模块边界转换为本枚举，不直接外泄。

/// 转换链路统一错误类型。
///
/// 该类型会在命令层被展开为 `{ success: false, error, errorCode }`。
#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    #[error("文件错误：{0}")]
    Io(String),

    #[error("不支持的格式：{0}")]
    UnsupportedFormat(String),

    #[error("无效图片：{0}")]
    InvalidImage(String),

    #[error("解码错误：{0}")]
    Decode(String),

    #[error("解码器不可用：{0}")]
    DecoderUnavailable(String),

    #[error("编码器不可用：{0}")]
    EncoderUnavailable(String),

    #[error("编码错误：{0}")]
    Encode(String),

    #[error("Data URL 格式错误：{0}")]
    MalformedDataUrl(String),

    #[error("资源限制：{0}")]
    SizeExceeded(String),

    #[error("缺少目标格式")]
    MissingFormat,

    #[error("缺少输入数据：{0}")]
    MissingData(String),

    #[error("配置错误：{0}")]
    InvalidConfig(String),

    #[error("后台任务异常：{0}")]
    TaskFailed(String),
}

impl ConvertError {
    /// 稳定错误码，供前端按码分支处理。
    pub fn code(&self) -> &'static str {
        match self {
            Self::Io(_) => "E_IO",
            Self::UnsupportedFormat(_) => "E_UNSUPPORTED_FORMAT",
            Self::InvalidImage(_) => "E_INVALID_IMAGE",
            Self::Decode(_) => "E_DECODE",
            Self::DecoderUnavailable(_) => "E_DECODER_UNAVAILABLE",
            Self::EncoderUnavailable(_) => "E_ENCODER_UNAVAILABLE",
            Self::Encode(_) => "E_ENCODE",
            Self::MalformedDataUrl(_) => "E_MALFORMED_DATA_URL",
            Self::SizeExceeded(_) => "E_SIZE_EXCEEDED",
            Self::MissingFormat => "E_MISSING_FORMAT",
            Self::MissingData(_) => "E_MISSING_DATA",
            Self::InvalidConfig(_) => "E_INVALID_CONFIG",
            Self::TaskFailed(_) => "E_TASK_FAILED",
        }
    }

    /// 失败所处阶段。
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Io(_) | Self::MissingData(_) | Self::SizeExceeded(_) => "load",
            Self::UnsupportedFormat(_) => "classify",
            Self::InvalidImage(_) | Self::Decode(_) | Self::DecoderUnavailable(_) => "decode",
            Self::EncoderUnavailable(_) | Self::Encode(_) | Self::MissingFormat => "encode",
            Self::MalformedDataUrl(_) => "transport",
            Self::InvalidConfig(_) => "config",
            Self::TaskFailed(_) => "worker",
        }
    }
}

impl From<ConvertError> for String {
    /// 兼容部分仍使用字符串错误的调用点。
    fn from(error: ConvertError) -> Self {
        error.to_string()
    }
}

impl From<tokio::task::JoinError> for ConvertError {
    fn from(error: tokio::task::JoinError) -> Self {
        Self::TaskFailed(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(ConvertError::MissingFormat.code(), "E_MISSING_FORMAT");
        assert_eq!(ConvertError::SizeExceeded("x".into()).code(), "E_SIZE_EXCEEDED");
        assert_eq!(ConvertError::MalformedDataUrl("x".into()).stage(), "transport");
    }

    #[test]
    fn display_keeps_inner_message() {
        let err = ConvertError::Decode("主解码器失败；回退解码器失败".to_string());
        let text: String = err.into();
        assert!(text.contains("主解码器失败"));
        assert!(text.contains("回退解码器失败"));
    }
}
