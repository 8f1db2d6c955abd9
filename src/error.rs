//! 统一错误类型模块
//!
//! # 设计思路
//!
//! 定义应用级统一的 `AppError` 枚举，作为 CLI 与存储协作方的返回类型，
//! 核心转换错误经 `From` 直接提升，无需手动 map。
//!
//! # 实现思路
//!
//! - 使用 `thiserror` 派生可读错误消息。
//! - 为 `ConvertError` 与 `std::io::Error` 提供 `From` 转换。
//! - 实现 `Serialize` 将错误序列化为字符串，便于跨进程边界传递。

use serde::Serialize;

use crate::converter::ConvertError;

/// 应用级统一错误类型
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// 转换流水线错误（加载 / 解码 / 编码）
    #[error("{0}")]
    Convert(#[from] ConvertError),

    /// 文件系统 I/O 错误
    #[error("文件系统错误: {0}")]
    Io(#[from] std::io::Error),

    /// 输出写入失败（已翻译为可读信息）
    #[error("保存失败: {0}")]
    Storage(String),
}

impl AppError {
    /// 错误码：转换错误沿用其稳定码。
    pub fn code(&self) -> &'static str {
        match self {
            Self::Convert(err) => err.code(),
            Self::Io(_) => "E_IO",
            Self::Storage(_) => "E_STORAGE",
        }
    }
}

/// 将错误序列化为人类可读的字符串。
impl Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn convert_error_keeps_message_and_code() {
        let err: AppError = ConvertError::MissingFormat.into();
        assert_eq!(err.code(), "E_MISSING_FORMAT");
        assert_eq!(err.to_string(), ConvertError::MissingFormat.to_string());
    }

    #[test]
    fn serializes_as_plain_string() {
        let err = AppError::Storage("磁盘已满".to_string());
        let json = serde_json::to_string(&err).expect("serialize");
        assert_eq!(json, "\"保存失败: 磁盘已满\"");
    }
}
