//! # 加载与校验模块
//!
//! ## 设计思路
//!
//! 统一处理不同来源（本地文件 / 内存字节 / Data URL）的原始字节加载，
//! 并在“尽可能早”的阶段执行体积校验，目标是尽快失败，减少不必要的内存与 CPU 消耗。
//!
//! ## 实现思路
//!
//! - 文件：metadata 体积限制 → 异步读取 → 空文件拒绝。
//! - 字节：长度限制 → 空输入拒绝。
//! - Data URL：结构解析 + 解码前体积估算（见 `data_url`）。

use std::path::Path;

use super::data_url::parse_data_url;
use super::source::{DecodeInput, RawImageData};
use super::{ConvertConfig, ConvertError, ConvertHandler};

impl ConvertHandler {
    /// 按来源加载原始字节。
    pub(super) async fn load_source(
        &self,
        input: DecodeInput,
        config: &ConvertConfig,
    ) -> Result<RawImageData, ConvertError> {
        match input {
            DecodeInput::FilePath(path) => Self::load_from_file(&path, config).await,
            DecodeInput::Bytes {
                bytes,
                name,
                declared_type,
            } => {
                Self::ensure_within_limit(bytes.len() as u64, config, "输入数据")?;
                if bytes.is_empty() {
                    return Err(ConvertError::Io("输入数据为空".to_string()));
                }
                Ok(RawImageData {
                    bytes,
                    name,
                    declared_type,
                    source_hint: "bytes",
                })
            }
            DecodeInput::DataUrl(url) => {
                log::info!("📝 开始解析 Data URL（{} 字符）", url.len());
                let parsed = parse_data_url(&url, config.max_input_bytes)?;
                Ok(RawImageData {
                    bytes: parsed.bytes,
                    name: None,
                    declared_type: Some(parsed.mime),
                    source_hint: "data-url",
                })
            }
        }
    }

    /// 从本地路径加载图片原始字节。
    pub(super) async fn load_from_file(
        path: &Path,
        config: &ConvertConfig,
    ) -> Result<RawImageData, ConvertError> {
        log::info!("📁 开始读取本地图片 - 路径: {}", path.display());

        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|e| ConvertError::Io(format!("无法读取文件信息 {}：{}", path.display(), e)))?;

        if !metadata.is_file() {
            return Err(ConvertError::Io(format!("不是普通文件：{}", path.display())));
        }
        Self::ensure_within_limit(metadata.len(), config, "文件")?;

        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| ConvertError::Io(format!("无法读取图片文件：{}", e)))?;

        if bytes.is_empty() {
            return Err(ConvertError::Io(format!("图片文件为空：{}", path.display())));
        }
        // 读取期间文件可能被追加写入
        Self::ensure_within_limit(bytes.len() as u64, config, "文件")?;

        Ok(RawImageData {
            bytes,
            name: path.file_name().and_then(|n| n.to_str()).map(str::to_string),
            declared_type: None,
            source_hint: "file",
        })
    }

    /// 字节数超过配置上限时返回 `SizeExceeded`。
    pub(super) fn ensure_within_limit(
        len: u64,
        config: &ConvertConfig,
        what: &str,
    ) -> Result<(), ConvertError> {
        if len > config.max_input_bytes {
            return Err(ConvertError::SizeExceeded(format!(
                "{}过大：{:.2} MB（限制：{:.2} MB）",
                what,
                len as f64 / 1024.0 / 1024.0,
                config.max_input_bytes as f64 / 1024.0 / 1024.0
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("image-converter-loader-{}-{}", std::process::id(), name))
    }

    #[tokio::test]
    async fn missing_file_is_io_error() {
        let handler = ConvertHandler::new(ConvertConfig::default());
        let result = handler
            .load_source(
                DecodeInput::FilePath(temp_path("does-not-exist.png")),
                &ConvertConfig::default(),
            )
            .await;

        assert!(matches!(result, Err(ConvertError::Io(_))));
    }

    #[tokio::test]
    async fn empty_file_is_io_error() {
        let path = temp_path("empty.png");
        std::fs::write(&path, b"").expect("write temp file");

        let result = ConvertHandler::load_from_file(&path, &ConvertConfig::default()).await;
        let _ = std::fs::remove_file(&path);

        assert!(matches!(result, Err(ConvertError::Io(_))));
    }

    #[tokio::test]
    async fn file_keeps_name_for_classification() {
        let path = temp_path("photo.heic");
        std::fs::write(&path, b"not really heic").expect("write temp file");

        let raw = ConvertHandler::load_from_file(&path, &ConvertConfig::default())
            .await
            .expect("load should succeed");
        let _ = std::fs::remove_file(&path);

        assert_eq!(raw.source_hint, "file");
        assert!(raw.name.as_deref().is_some_and(|n| n.ends_with("photo.heic")));
    }

    #[tokio::test]
    async fn oversized_bytes_are_rejected() {
        let handler = ConvertHandler::new(ConvertConfig::default());
        let mut config = ConvertConfig::default();
        config.max_input_bytes = 8;

        let result = handler
            .load_source(DecodeInput::bytes(vec![0u8; 9]), &config)
            .await;

        assert!(matches!(result, Err(ConvertError::SizeExceeded(_))));
    }

    #[tokio::test]
    async fn data_url_carries_declared_type() {
        let handler = ConvertHandler::new(ConvertConfig::default());
        let raw = handler
            .load_source(
                DecodeInput::DataUrl("data:image/avif;base64,AQID".to_string()),
                &ConvertConfig::default(),
            )
            .await
            .expect("data url should load");

        assert_eq!(raw.declared_type.as_deref(), Some("image/avif"));
        assert_eq!(raw.bytes, vec![1, 2, 3]);
    }
}
