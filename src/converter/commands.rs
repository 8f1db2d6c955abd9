//! # 命令层
//!
//! ## 设计思路
//!
//! 命令层仅做边界参数接收与结果返回，不承载业务逻辑。
//! 入参/出参均为 camelCase 的 serde 结构，可直接跨 IPC 或序列化为 JSON；
//! 失败不会以 `Err` 形式越过边界，而是折叠为 `success: false` + `error` + `errorCode`。

use serde::{Deserialize, Serialize};

use super::source::{ConversionRequest, DecodeInput};
use super::{
    ConvertError, ConverterService, FormatKey, OutputFilter, build_output_filters,
    normalize_format, normalize_quality_value,
};

#[derive(Debug, Clone, Serialize)]
pub struct CommandError {
    pub code: &'static str,
    pub stage: &'static str,
    pub message: String,
}

impl From<ConvertError> for CommandError {
    fn from(error: ConvertError) -> Self {
        Self {
            code: error.code(),
            stage: error.stage(),
            message: error.to_string(),
        }
    }
}

/// 解码请求：`filePath` / `bytes` / `dataUrl` 必须且只能提供一个。
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DecodeImageRequest {
    pub file_path: Option<String>,
    pub bytes: Option<Vec<u8>>,
    pub data_url: Option<String>,
    /// 原始文件名（拖放来源），辅助分类。
    pub name: Option<String>,
    /// 声明的 MIME 类型，辅助分类。
    #[serde(alias = "type")]
    pub declared_type: Option<String>,
}

impl DecodeImageRequest {
    fn into_input(self) -> Result<DecodeInput, ConvertError> {
        let supplied = [
            self.file_path.is_some(),
            self.bytes.is_some(),
            self.data_url.is_some(),
        ]
        .into_iter()
        .filter(|present| *present)
        .count();

        if supplied != 1 {
            return Err(ConvertError::MissingData(format!(
                "filePath / bytes / dataUrl 必须且只能提供一个（实际提供 {} 个）",
                supplied
            )));
        }

        if let Some(path) = self.file_path {
            return Ok(DecodeInput::FilePath(path.into()));
        }
        if let Some(url) = self.data_url {
            return Ok(DecodeInput::DataUrl(url));
        }
        match self.bytes {
            Some(bytes) => Ok(DecodeInput::Bytes {
                bytes,
                name: self.name,
                declared_type: self.declared_type,
            }),
            None => Err(ConvertError::MissingData("缺少图片数据".to_string())),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DecodeImageResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<&'static str>,
}

impl DecodeImageResponse {
    fn failure(error: CommandError) -> Self {
        Self {
            success: false,
            error: Some(error.message),
            error_code: Some(error.code),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConvertRequest {
    pub bytes: Vec<u8>,
    pub target_format: Option<String>,
    /// 数字或字符串均可，非数字视为未提供。
    pub quality: Option<serde_json::Value>,
    pub suggested_name: Option<String>,
    #[serde(alias = "type")]
    pub declared_type: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConvertResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_bytes: Option<Vec<u8>>,
    /// `None` 表示原样保存。
    pub resolved_format: Option<FormatKey>,
    pub size: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<&'static str>,
}

impl ConvertResponse {
    fn failure(error: CommandError) -> Self {
        Self {
            success: false,
            error: Some(error.message),
            error_code: Some(error.code),
            ..Default::default()
        }
    }
}

/// 解码任意来源并返回预览 Data URL 与源图尺寸。
pub async fn decode_image(
    service: &ConverterService,
    request: DecodeImageRequest,
) -> DecodeImageResponse {
    let input = match request.into_input() {
        Ok(input) => input,
        Err(err) => return DecodeImageResponse::failure(err.into()),
    };

    match service.decode_image(input).await {
        Ok(decoded) => DecodeImageResponse {
            success: true,
            data_url: Some(decoded.data_url),
            width: Some(decoded.width),
            height: Some(decoded.height),
            ..Default::default()
        },
        Err(err) => {
            log::error!("❌ 图片解码失败 [{}]：{}", err.code(), err);
            DecodeImageResponse::failure(err.into())
        }
    }
}

/// 执行一次转换。
pub async fn convert(service: &ConverterService, request: ConvertRequest) -> ConvertResponse {
    let quality = request.quality.as_ref().and_then(normalize_quality_value);
    let conversion = ConversionRequest {
        bytes: request.bytes,
        target_format: request.target_format,
        quality,
        suggested_name: request.suggested_name,
        declared_type: request.declared_type,
    };

    match service.convert(conversion).await {
        Ok(output) => ConvertResponse {
            success: true,
            resolved_format: output.format,
            size: output.size(),
            file_name: Some(output.file_name),
            output_bytes: Some(output.bytes),
            ..Default::default()
        },
        Err(err) => {
            log::error!("❌ 图片转换失败 [{}]：{}", err.code(), err);
            ConvertResponse::failure(err.into())
        }
    }
}

/// 保存对话框过滤器：目标格式在前，其余按规范顺序，最后是 “All Images”。
pub fn build_save_filters(target_format: Option<&str>) -> Vec<OutputFilter> {
    build_output_filters(normalize_format(target_format))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn png_bytes() -> Vec<u8> {
        let img = image::RgbaImage::from_pixel(4, 3, image::Rgba([1, 2, 3, 255]));
        let mut cursor = std::io::Cursor::new(Vec::new());
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut cursor, image::ImageFormat::Png)
            .expect("failed to encode test image");
        cursor.into_inner()
    }

    #[tokio::test]
    async fn decode_requires_exactly_one_input() {
        let service = ConverterService::new().expect("service init failed");

        let none = decode_image(&service, DecodeImageRequest::default()).await;
        assert!(!none.success);
        assert_eq!(none.error_code, Some("E_MISSING_DATA"));

        let both = decode_image(
            &service,
            DecodeImageRequest {
                bytes: Some(png_bytes()),
                data_url: Some("data:image/png;base64,AAAA".to_string()),
                ..Default::default()
            },
        )
        .await;
        assert_eq!(both.error_code, Some("E_MISSING_DATA"));
    }

    #[tokio::test]
    async fn decode_bytes_succeeds() {
        let service = ConverterService::new().expect("service init failed");
        let response = decode_image(
            &service,
            DecodeImageRequest {
                bytes: Some(png_bytes()),
                name: Some("pasted.png".to_string()),
                ..Default::default()
            },
        )
        .await;

        assert!(response.success);
        assert_eq!((response.width, response.height), (Some(4), Some(3)));
        let json = serde_json::to_value(&response).expect("serialize");
        assert!(json.get("dataUrl").is_some());
        assert!(json.get("error").is_none());
    }

    #[tokio::test]
    async fn convert_accepts_string_quality_and_reports_format() {
        let service = ConverterService::new().expect("service init failed");
        let request: ConvertRequest = serde_json::from_value(json!({
            "bytes": png_bytes(),
            "targetFormat": "JPG",
            "quality": "150",
            "suggestedName": "shot.png"
        }))
        .expect("request deserializes");

        let response = convert(&service, request).await;
        assert!(response.success);
        assert_eq!(response.resolved_format, Some(FormatKey::Jpeg));
        assert_eq!(response.file_name.as_deref(), Some("shot.jpg"));
        assert_eq!(
            response.size,
            response.output_bytes.as_ref().map(Vec::len).unwrap_or_default()
        );

        let json = serde_json::to_value(&response).expect("serialize");
        assert_eq!(json["resolvedFormat"], "jpeg");
    }

    #[tokio::test]
    async fn convert_failure_carries_error_code() {
        let service = ConverterService::new().expect("service init failed");
        let response = convert(
            &service,
            ConvertRequest {
                bytes: png_bytes(),
                target_format: Some("heic".to_string()),
                ..Default::default()
            },
        )
        .await;

        if cfg!(feature = "heif") {
            assert!(response.success);
        } else {
            assert!(!response.success);
            assert_eq!(response.error_code, Some("E_ENCODER_UNAVAILABLE"));
            assert!(response.output_bytes.is_none());
        }
    }

    #[test]
    fn save_filters_put_target_first() {
        let filters = build_save_filters(Some("tif"));
        assert_eq!(filters[0].label, "TIFF");
        assert_eq!(filters[0].extensions, vec!["tif", "tiff"]);
        assert_eq!(filters.last().map(|f| f.label.as_str()), Some("All Images"));
        assert_eq!(filters.len(), 9);

        let unknown = build_save_filters(Some("psd"));
        assert_eq!(unknown[0].label, "JPEG");
        assert_eq!(unknown.len(), 9);
    }
}
