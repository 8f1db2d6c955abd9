//! # 图片格式转换工具：命令行入口
//!
//! 本文件仅负责参数解析、服务初始化与结果输出（JSON）。
//! 业务逻辑分布在各子模块中，详见 `lib.rs` 架构文档。

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use argh::FromArgs;
use serde::Serialize;

use image_converter::converter::{
    self, ConversionRequest, ConvertConfig, ConverterService, DecodeImageRequest, FormatKey,
    normalize_quality,
};
use image_converter::error::AppError;
use image_converter::storage;

#[derive(FromArgs, Debug)]
/// Convert images between jpeg, png, webp, avif, heic, gif, bmp and tiff
struct Cli {
    /// input image path
    #[argh(positional)]
    input: Option<PathBuf>,

    /// target format (jpeg, jpg, png, webp, avif, heic, heif, gif, bmp, tif, tiff)
    #[argh(option)]
    to: Option<String>,

    /// quality 1-100 for lossy formats [default: 90]
    #[argh(option)]
    quality: Option<String>,

    /// output file or directory [default: next to the input]
    #[argh(option, short = 'o')]
    output: Option<PathBuf>,

    /// JSON config file
    #[argh(option)]
    config: Option<PathBuf>,

    /// decode only and print a preview data URL with the source dimensions
    #[argh(switch)]
    preview: bool,

    /// print save-dialog filters for --to and exit
    #[argh(switch)]
    filters: bool,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
struct ConvertReport {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    resolved_format: Option<FormatKey>,
    #[serde(skip_serializing_if = "Option::is_none")]
    size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_code: Option<&'static str>,
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli: Cli = argh::from_env();

    if cli.filters {
        let filters = converter::build_save_filters(cli.to.as_deref());
        return print_json(&filters, true);
    }

    let Some(input) = cli.input.clone() else {
        eprintln!("缺少输入文件，使用 --help 查看用法");
        return ExitCode::from(2);
    };

    let service = match load_service(cli.config.as_deref()) {
        Ok(service) => service,
        Err(err) => {
            log::error!("❌ 服务初始化失败：{}", err);
            return print_json(&failure_report(&err), false);
        }
    };

    if cli.preview {
        let response = converter::decode_image(
            &service,
            DecodeImageRequest {
                file_path: Some(input.to_string_lossy().into_owned()),
                ..Default::default()
            },
        )
        .await;
        let success = response.success;
        return print_json(&response, success);
    }

    match run_convert(&service, &cli, &input).await {
        Ok(report) => print_json(&report, true),
        Err(err) => {
            log::error!("❌ 转换失败 [{}]：{}", err.code(), err);
            print_json(&failure_report(&err), false)
        }
    }
}

fn load_service(config_path: Option<&Path>) -> Result<ConverterService, AppError> {
    let config = match config_path {
        Some(path) => ConvertConfig::from_json_file(path)?,
        None => ConvertConfig::default(),
    };
    Ok(ConverterService::with_config(config)?)
}

async fn run_convert(
    service: &ConverterService,
    cli: &Cli,
    input: &Path,
) -> Result<ConvertReport, AppError> {
    let bytes = tokio::fs::read(input)
        .await
        .map_err(|e| storage::translate_io_error(input, &e))?;

    let input_name = input.file_name().and_then(|n| n.to_str());
    // 指定输出文件时以其文件名推断目标格式
    let suggested_name = cli
        .output
        .as_deref()
        .filter(|p| !p.is_dir())
        .and_then(|p| p.file_name())
        .and_then(|n| n.to_str())
        .or(input_name)
        .map(str::to_string);

    let declared_type = input
        .extension()
        .and_then(|ext| ext.to_str())
        .and_then(FormatKey::from_extension)
        .map(|key| key.mime().to_string());

    let output = service
        .convert(ConversionRequest {
            bytes,
            target_format: cli.to.clone(),
            quality: cli.quality.as_deref().and_then(normalize_quality),
            suggested_name,
            declared_type,
        })
        .await?;

    let path = storage::resolve_output_path(input, cli.output.as_deref(), &output.file_name);
    if path == input {
        return Err(AppError::Storage(format!(
            "输出路径与输入文件相同，拒绝覆盖：'{}'",
            path.display()
        )));
    }
    let written = storage::write_output(&path, &output.bytes)?;

    Ok(ConvertReport {
        success: true,
        resolved_format: output.format,
        size: Some(written),
        path: Some(path.to_string_lossy().into_owned()),
        ..Default::default()
    })
}

fn failure_report(err: &AppError) -> ConvertReport {
    ConvertReport {
        success: false,
        error: Some(err.to_string()),
        error_code: Some(err.code()),
        ..Default::default()
    }
}

fn print_json<T: Serialize>(value: &T, success: bool) -> ExitCode {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(err) => {
            log::error!("❌ 结果序列化失败：{}", err);
            return ExitCode::FAILURE;
        }
    }

    if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
