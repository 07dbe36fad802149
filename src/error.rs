//! 错误类型
//!
//! 区块级错误只影响单个区块，文件级错误只影响单个区域文件。

use std::io;
use thiserror::Error;

/// NBT 字节流不符合标签树语法
#[derive(Debug, Error)]
pub enum MalformedTag {
    #[error("未知的标签类型 {0}")]
    UnknownType(u8),
    #[error("读取 {0} 时数据提前结束")]
    Truncated(&'static str),
    #[error("{kind} 长度为负数: {length}")]
    NegativeLength { kind: &'static str, length: i32 },
    #[error("{kind} 长度 {length} 超出剩余的 {remaining} 字节")]
    LengthOutOfBounds {
        kind: &'static str,
        length: usize,
        remaining: usize,
    },
    #[error("嵌套深度超过 {0}")]
    TooDeep(usize),
    #[error("End 类型的列表长度不为 0: {0}")]
    NonEmptyEndList(i32),
}

/// 单个区块读取失败，计入所在区域文件的错误数
#[derive(Debug, Error)]
pub enum ChunkError {
    #[error("区块起点 {offset} 超出文件长度 {file_len}")]
    HeaderOutOfBounds { offset: usize, file_len: usize },
    #[error("区块长度 {length} 无效（预留 {reserved} 字节）")]
    TooLarge { length: u32, reserved: usize },
    #[error("区块数据超出文件末尾（需要 {needed} 字节，文件 {file_len} 字节）")]
    Truncated { needed: usize, file_len: usize },
    #[error("不支持的压缩类型 {0}")]
    UnsupportedCompression(u8),
    #[error("解压失败: {0}")]
    Decompression(#[source] io::Error),
    #[error("NBT 解析失败: {0}")]
    Malformed(#[from] MalformedTag),
    #[error("根标签不是 Compound")]
    RootNotCompound,
    #[error("区块坐标 ({x}, {z}) 超出方块坐标范围")]
    PositionOutOfRange { x: i64, z: i64 },
    #[error("写出方块行失败: {0}")]
    Sink(#[source] io::Error),
}

impl ChunkError {
    /// 输出失败无法在同一文件内恢复，其余错误只跳过当前区块
    pub fn is_fatal(&self) -> bool {
        matches!(self, ChunkError::Sink(_))
    }
}

/// 整个区域文件无法处理
#[derive(Debug, Error)]
pub enum RegionError {
    #[error("MCA 文件过小: {0} 字节")]
    TooSmall(usize),
    #[error(transparent)]
    Io(#[from] io::Error),
}
