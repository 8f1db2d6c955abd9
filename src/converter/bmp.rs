//! # BMP 编码模块
//!
//! 手写 24 位未压缩 Windows 位图：BITMAPFILEHEADER + BITMAPINFOHEADER，
//! 无调色板、BI_RGB、正高度 + 自下而上行序、每行 4 字节对齐、BGR 通道顺序。
//! alpha 直接丢弃；需要透明背景的调用方应先合成（见 `PixelBuffer::composite_on_background`）。

use super::PixelBuffer;

pub const FILE_HEADER_LEN: usize = 14;
pub const INFO_HEADER_LEN: usize = 40;
pub const PIXEL_DATA_OFFSET: usize = FILE_HEADER_LEN + INFO_HEADER_LEN;
/// 2835 像素/米（约 72 DPI）。
const PIXELS_PER_METER: i32 = 2835;
const BYTES_PER_PIXEL: usize = 3;

/// 每行字节数，向上取整到 4 的倍数。
pub fn row_stride(width: u32) -> usize {
    (width as usize * BYTES_PER_PIXEL).div_ceil(4) * 4
}

/// 给定尺寸下的完整文件长度。
pub fn encoded_len(width: u32, height: u32) -> usize {
    PIXEL_DATA_OFFSET + row_stride(width) * height as usize
}

/// 将 RGBA8 缓冲编码为 BMP 文件字节。
///
/// 零尺寸由 `PixelBuffer` 构造阶段拒绝，这里不再检查。
pub fn encode_bmp(buffer: &PixelBuffer) -> Vec<u8> {
    let (width, height) = buffer.dimensions();
    let w = width as usize;
    let h = height as usize;
    let stride = row_stride(width);
    let image_size = stride * h;
    let file_size = PIXEL_DATA_OFFSET + image_size;

    // 零初始化，行尾填充字节保持为 0
    let mut out = vec![0u8; file_size];

    // File header
    out[0..2].copy_from_slice(b"BM");
    out[2..6].copy_from_slice(&(file_size as u32).to_le_bytes());
    // 6..10 reserved
    out[10..14].copy_from_slice(&(PIXEL_DATA_OFFSET as u32).to_le_bytes());

    // DIB header (BITMAPINFOHEADER)
    let dib = &mut out[FILE_HEADER_LEN..PIXEL_DATA_OFFSET];
    dib[0..4].copy_from_slice(&(INFO_HEADER_LEN as u32).to_le_bytes());
    dib[4..8].copy_from_slice(&(width as i32).to_le_bytes());
    dib[8..12].copy_from_slice(&(height as i32).to_le_bytes());
    dib[12..14].copy_from_slice(&1u16.to_le_bytes()); // planes
    dib[14..16].copy_from_slice(&24u16.to_le_bytes()); // bits per pixel
    dib[16..20].copy_from_slice(&0u32.to_le_bytes()); // BI_RGB
    dib[20..24].copy_from_slice(&(image_size as u32).to_le_bytes());
    dib[24..28].copy_from_slice(&PIXELS_PER_METER.to_le_bytes());
    dib[28..32].copy_from_slice(&PIXELS_PER_METER.to_le_bytes());
    // 32..40: colors used / important colors = 0

    let src = buffer.pixels();
    let data = &mut out[PIXEL_DATA_OFFSET..];
    for (y, row) in data.chunks_exact_mut(stride).enumerate() {
        let source_row = h - 1 - y;
        let src_row = &src[source_row * w * 4..(source_row + 1) * w * 4];
        for (dst, px) in row[..w * BYTES_PER_PIXEL]
            .chunks_exact_mut(BYTES_PER_PIXEL)
            .zip(src_row.chunks_exact(4))
        {
            dst[0] = px[2];
            dst[1] = px[1];
            dst[2] = px[0];
        }
    }

    out
}
