//! # 配置模块
//!
//! ## 设计思路
//!
//! 将所有“可调策略”集中到 `ConvertConfig`，保证运行时行为可观测、可调整、可测试。
//! 其中预览档位（quality / balanced / speed）作为高层语义，映射到底层参数组合。
//!
//! ## 实现思路
//!
//! - `Default` 提供与参考行为一致的配置（100 MiB 上限、默认质量 90、白色背景）。
//! - 支持通过 `serde_json` 从 JSON 文件加载，缺失字段回退默认值。
//! - `PreviewProfile` 负责档位字符串解析与反向输出。
//! - `apply_preview_profile` 将档位转换为具体阈值，`infer_preview_profile` 反推当前档位。

use image::imageops::FilterType;
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::ConvertError;

/// 参考行为下的输入/中间数据上限：100 MiB。
pub const DEFAULT_MAX_INPUT_BYTES: u64 = 100 * 1024 * 1024;
pub const DEFAULT_QUALITY: u8 = 90;

/// 转换链路配置。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvertConfig {
    /// 解码与编码前允许的最大字节数（输入字节或 RGBA 中间缓冲）。
    pub max_input_bytes: u64,
    /// 未指定质量且格式支持质量参数时使用的默认值。
    pub default_quality: u8,
    /// 不支持 alpha 的格式（JPEG、BMP）编码前合成的背景色。
    pub background: [u8; 3],
    /// AVIF 编码速度（1 最慢最好，10 最快）。
    pub avif_speed: u8,
    /// 是否为预览执行自适应降采样。
    pub preview_enabled: bool,
    /// 预览像素上限（`width * height`）。
    pub preview_target_pixels: u64,
    /// 预览宽/高单边最大值。
    pub preview_max_dimension: u32,
    /// 预览降采样滤镜，由档位决定，不参与序列化。
    #[serde(skip, default = "default_resize_filter")]
    pub resize_filter: FilterType,
}

fn default_resize_filter() -> FilterType {
    FilterType::Triangle
}

impl Default for ConvertConfig {
    fn default() -> Self {
        Self {
            max_input_bytes: DEFAULT_MAX_INPUT_BYTES,
            default_quality: DEFAULT_QUALITY,
            background: [255, 255, 255],
            avif_speed: 6,
            preview_enabled: true,
            preview_target_pixels: 4_000_000,
            preview_max_dimension: 2048,
            resize_filter: default_resize_filter(),
        }
    }
}

/// 预览档位（面向产品/用户语义）。
///
/// - `Quality`：原尺寸预览
/// - `Balanced`：质量与速度平衡
/// - `Speed`：优先响应速度
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreviewProfile {
    Quality,
    Balanced,
    Speed,
}

impl PreviewProfile {
    /// 从外部字符串解析档位。
    pub fn from_str(profile: &str) -> Result<Self, ConvertError> {
        match profile.trim().to_lowercase().as_str() {
            "quality" => Ok(Self::Quality),
            "balanced" => Ok(Self::Balanced),
            "speed" => Ok(Self::Speed),
            other => Err(ConvertError::InvalidConfig(format!(
                "未知预览档位：{}（可选：quality / balanced / speed）",
                other
            ))),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Quality => "quality",
            Self::Balanced => "balanced",
            Self::Speed => "speed",
        }
    }
}

impl ConvertConfig {
    /// 从 JSON 文件加载配置，并执行范围校验。
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConvertError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConvertError::Io(format!("无法读取配置文件 {}：{}", path.display(), e)))?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| ConvertError::InvalidConfig(format!("解析配置文件失败：{}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// 校验配置取值范围。
    pub fn validate(&self) -> Result<(), ConvertError> {
        if !(1024 * 1024..=4 * 1024 * 1024 * 1024).contains(&self.max_input_bytes) {
            return Err(ConvertError::InvalidConfig(
                "max_input_bytes 必须在 1MB~4GB 之间".to_string(),
            ));
        }
        if !(1..=100).contains(&self.default_quality) {
            return Err(ConvertError::InvalidConfig(
                "default_quality 必须在 1~100 之间".to_string(),
            ));
        }
        if !(1..=10).contains(&self.avif_speed) {
            return Err(ConvertError::InvalidConfig("avif_speed 必须在 1~10 之间".to_string()));
        }
        if self.preview_max_dimension == 0 || self.preview_target_pixels == 0 {
            return Err(ConvertError::InvalidConfig("预览尺寸上限不能为 0".to_string()));
        }
        Ok(())
    }

    /// 基于当前参数反推预览档位。
    pub fn infer_preview_profile(&self) -> PreviewProfile {
        if !self.preview_enabled {
            return PreviewProfile::Quality;
        }

        if self.preview_target_pixels <= 1_000_000 || self.preview_max_dimension <= 1024 {
            return PreviewProfile::Speed;
        }

        PreviewProfile::Balanced
    }

    /// 应用指定预览档位到实际参数。
    pub fn apply_preview_profile(&mut self, profile: PreviewProfile) {
        match profile {
            PreviewProfile::Quality => {
                self.preview_enabled = false;
                self.resize_filter = FilterType::CatmullRom;
            }
            PreviewProfile::Balanced => {
                self.preview_enabled = true;
                self.preview_target_pixels = 4_000_000;
                self.preview_max_dimension = 2048;
                self.resize_filter = FilterType::Triangle;
            }
            PreviewProfile::Speed => {
                self.preview_enabled = true;
                self.preview_target_pixels = 1_000_000;
                self.preview_max_dimension = 1024;
                self.resize_filter = FilterType::Nearest;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = ConvertConfig::default();
        config.validate().expect("default config should be valid");
        assert_eq!(config.max_input_bytes, 100 * 1024 * 1024);
        assert_eq!(config.default_quality, 90);
        assert_eq!(config.infer_preview_profile(), PreviewProfile::Balanced);
    }

    #[test]
    fn profile_roundtrip() {
        let mut config = ConvertConfig::default();
        for profile in [PreviewProfile::Quality, PreviewProfile::Speed, PreviewProfile::Balanced] {
            config.apply_preview_profile(profile);
            assert_eq!(config.infer_preview_profile(), profile);
            assert_eq!(PreviewProfile::from_str(profile.as_str()).expect("known profile"), profile);
        }
    }

    #[test]
    fn rejects_unknown_profile() {
        assert!(matches!(
            PreviewProfile::from_str("ultra"),
            Err(ConvertError::InvalidConfig(_))
        ));
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config: ConvertConfig =
            serde_json::from_str(r#"{ "default_quality": 75, "background": [0, 0, 0] }"#)
                .expect("partial config should parse");
        assert_eq!(config.default_quality, 75);
        assert_eq!(config.background, [0, 0, 0]);
        assert_eq!(config.max_input_bytes, DEFAULT_MAX_INPUT_BYTES);
    }

    #[test]
    fn validate_rejects_out_of_range_values() {
        let mut config = ConvertConfig::default();
        config.default_quality = 0;
        assert!(matches!(config.validate(), Err(ConvertError::InvalidConfig(_))));

        let mut config = ConvertConfig::default();
        config.avif_speed = 11;
        assert!(matches!(config.validate(), Err(ConvertError::InvalidConfig(_))));

        let mut config = ConvertConfig::default();
        config.max_input_bytes = 10;
        assert!(matches!(config.validate(), Err(ConvertError::InvalidConfig(_))));
    }
}
