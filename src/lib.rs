//! # 图片格式转换工具：库入口
//!
//! ## 架构总览
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │          调用方（CLI main.rs / 宿主 IPC 层）              │
//! └───────┬──────────────────────────────────────────────────┘
//!         ↕ decode_image / convert / build_save_filters
//! ┌───────┼──────────────────────────────────────────────────┐
//! │       ↕            核心 (converter)                       │
//! │                                                          │
//! │  ├─ commands ──── camelCase 请求/响应，错误折叠为 errorCode │
//! │  ├─ service ───── ConverterService（配置热切换）           │
//! │  ├─ handler ───── 流水线编排 + 阶段耗时                   │
//! │  │   ├─ classify   heic / avif / tiff / nativeRaster      │
//! │  │   ├─ decoder    Decoder trait + AVIF 回退              │
//! │  │   ├─ encoder    Encoder trait + 8 种目标格式           │
//! │  │   └─ bmp        手写 24 位 BMP                         │
//! │  └─ format ────── 格式注册表 / 质量归一化 / 保存过滤器     │
//! └───────┬──────────────────────────────────────────────────┘
//!         ↕ 输出字节
//! ┌───────┼──────────────────────────────────────────────────┐
//! │  storage ── 写盘 + 写后校验 + 系统错误翻译                │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## 模块职责
//!
//! | 模块 | 职责 |
//! |------|------|
//! | [`error`] | 应用级错误 `AppError`，包装转换错误、I/O 与存储错误 |
//! | [`converter`] | 格式识别、解码、编码、Data URL 传输与边界命令 |
//! | [`storage`] | 输出路径解析与字节落盘（核心本身不做文件写入） |

pub mod converter;
pub mod error;
pub mod storage;
