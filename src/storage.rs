//! 输出持久化模块
//!
//! # 设计思路
//!
//! 转换核心只产出字节，不做任何文件写入；落盘、写后校验与系统错误翻译
//! 统一由本模块负责，失败信息原样交还调用方展示。
//!
//! # 实现思路
//!
//! - 未指定输出路径时，输出文件与输入文件同目录，文件名由转换结果给出。
//! - 写入前 `create_dir_all` 父目录（已存在时为空操作），避免上层判断。
//! - 写入后回读文件大小，与字节长度不一致视为失败。
//! - 常见系统错误（权限、磁盘已满、文件占用、路径不存在）翻译为可读信息。

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::AppError;

/// 解析输出路径。
///
/// # 参数
/// * `input` - 源文件路径（决定默认输出目录）
/// * `output` - 用户指定的输出路径；为目录时在其中使用 `file_name`
/// * `file_name` - 转换结果给出的文件名
pub fn resolve_output_path(input: &Path, output: Option<&Path>, file_name: &str) -> PathBuf {
    match output {
        Some(path) if path.is_dir() => path.join(file_name),
        Some(path) => path.to_path_buf(),
        None => input
            .parent()
            .map(|dir| dir.join(file_name))
            .unwrap_or_else(|| PathBuf::from(file_name)),
    }
}

/// 写入输出字节并校验落盘大小。
///
/// # 返回
/// - `Ok(u64)`：实际写入的字节数
/// - `Err(AppError::Storage)`：已翻译的写入失败原因
pub fn write_output(path: &Path, bytes: &[u8]) -> Result<u64, AppError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| translate_io_error(parent, &e))?;
    }

    fs::write(path, bytes).map_err(|e| translate_io_error(path, &e))?;

    let written = fs::metadata(path)
        .map_err(|e| translate_io_error(path, &e))?
        .len();

    if written != bytes.len() as u64 {
        return Err(AppError::Storage(format!(
            "写入校验失败 '{}'：期望 {} 字节，实际 {} 字节",
            path.display(),
            bytes.len(),
            written
        )));
    }

    log::info!("💾 已保存 {}（{} 字节）", path.display(), written);
    Ok(written)
}

/// 将系统错误翻译为面向用户的存储错误。
pub fn translate_io_error(path: &Path, err: &io::Error) -> AppError {
    let reason = match err.kind() {
        io::ErrorKind::PermissionDenied | io::ErrorKind::ReadOnlyFilesystem => "没有写入权限",
        io::ErrorKind::StorageFull => "磁盘空间不足",
        io::ErrorKind::ResourceBusy => "文件被其他程序占用",
        io::ErrorKind::NotFound => "路径不存在",
        io::ErrorKind::IsADirectory => "目标是一个目录",
        _ => {
            return AppError::Storage(format!("写入 '{}' 失败: {}", path.display(), err));
        }
    };
    AppError::Storage(format!("{}: '{}'", reason, path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("image-converter-storage-{}-{}", std::process::id(), name))
    }

    #[test]
    fn default_output_sits_next_to_input() {
        let path = resolve_output_path(Path::new("/photos/a.heic"), None, "a.jpg");
        assert_eq!(path, PathBuf::from("/photos/a.jpg"));

        let explicit = resolve_output_path(
            Path::new("/photos/a.heic"),
            Some(Path::new("/tmp/out-file.png")),
            "a.jpg",
        );
        assert_eq!(explicit, PathBuf::from("/tmp/out-file.png"));
    }

    #[test]
    fn writes_and_verifies_size() {
        let dir = temp_dir("write");
        let path = dir.join("nested").join("out.bmp");

        let written = write_output(&path, &[1, 2, 3, 4]).expect("write should succeed");
        assert_eq!(written, 4);
        assert_eq!(fs::read(&path).expect("read back"), vec![1, 2, 3, 4]);

        // 目录已存在时再次写入同样成功
        let rewritten = write_output(&path, &[9, 9]).expect("rewrite should succeed");
        assert_eq!(rewritten, 2);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn translates_known_error_kinds() {
        let path = Path::new("/x/y.png");
        let denied = translate_io_error(path, &io::Error::from(io::ErrorKind::PermissionDenied));
        assert!(denied.to_string().contains("没有写入权限"));

        let full = translate_io_error(path, &io::Error::from(io::ErrorKind::StorageFull));
        assert!(full.to_string().contains("磁盘空间不足"));

        let busy = translate_io_error(path, &io::Error::from(io::ErrorKind::ResourceBusy));
        assert!(busy.to_string().contains("占用"));

        let other = translate_io_error(path, &io::Error::other("boom"));
        assert!(matches!(other, AppError::Storage(msg) if msg.contains("boom")));
    }
}
