//! MCA 区域文件解析
//!
//! 文件头是两张 4096 字节的表（位置表、时间戳表），每个区块槽位 4 字节。
//! 区块数据按扇区对齐：4 字节大端长度、1 字节压缩类型、`长度 - 1` 字节数据。

use crate::error::{ChunkError, RegionError};
use crate::nbt::{self, Compound};
use once_cell::sync::Lazy;
use regex::Regex;
use std::borrow::Cow;
use std::fs;
use std::io::Read;
use std::path::Path;

/// 扇区大小（字节）
pub const SECTOR_SIZE: usize = 4096;

/// 文件头大小：位置表 + 时间戳表
pub const HEADER_SIZE: usize = SECTOR_SIZE * 2;

/// 每个区域文件的区块槽位数（32 x 32）
pub const CHUNKS_PER_REGION: usize = 1024;

/// 位置表中的一项
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocationEntry {
    /// 起始扇区（低 24 位有效）
    pub sector_offset: u32,
    pub sector_count: u8,
}

impl LocationEntry {
    pub fn from_be_bytes(bytes: [u8; 4]) -> Self {
        Self {
            sector_offset: u32::from_be_bytes([0, bytes[0], bytes[1], bytes[2]]),
            sector_count: bytes[3],
        }
    }

    /// 偏移或扇区数为 0 的槽位没有区块
    pub fn is_empty(self) -> bool {
        self.sector_offset == 0 || self.sector_count == 0
    }

    pub fn byte_offset(self) -> usize {
        self.sector_offset as usize * SECTOR_SIZE
    }

    /// 为该区块预留的字节数
    pub fn reserved_bytes(self) -> usize {
        usize::from(self.sector_count) * SECTOR_SIZE
    }
}

/// 区块在区域文件内的槽位坐标，范围 0..32
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkSlot {
    pub x: i32,
    pub z: i32,
}

impl ChunkSlot {
    pub fn from_index(index: usize) -> Self {
        Self {
            x: (index % 32) as i32,
            z: (index / 32) as i32,
        }
    }

    pub fn index(self) -> usize {
        (self.x + self.z * 32) as usize
    }
}

/// 区块压缩方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    Gzip,
    Zlib,
    Uncompressed,
}

impl Compression {
    pub fn from_id(id: u8) -> Result<Self, ChunkError> {
        match id {
            1 => Ok(Compression::Gzip),
            2 => Ok(Compression::Zlib),
            3 => Ok(Compression::Uncompressed),
            other => Err(ChunkError::UnsupportedCompression(other)),
        }
    }

    pub fn decompress(self, data: &[u8]) -> Result<Cow<'_, [u8]>, ChunkError> {
        let mut decompressed = Vec::new();
        match self {
            Compression::Gzip => {
                flate2::read::GzDecoder::new(data)
                    .read_to_end(&mut decompressed)
                    .map_err(ChunkError::Decompression)?;
            }
            Compression::Zlib => {
                flate2::read::ZlibDecoder::new(data)
                    .read_to_end(&mut decompressed)
                    .map_err(ChunkError::Decompression)?;
            }
            Compression::Uncompressed => return Ok(Cow::Borrowed(data)),
        }
        Ok(Cow::Owned(decompressed))
    }
}

/// 整个区域文件的内容
#[derive(Debug)]
pub struct Region {
    data: Vec<u8>,
}

impl Region {
    /// 读取 MCA 文件
    pub fn open(path: &Path) -> Result<Self, RegionError> {
        Self::from_bytes(fs::read(path)?)
    }

    pub fn from_bytes(data: Vec<u8>) -> Result<Self, RegionError> {
        if data.len() < HEADER_SIZE {
            return Err(RegionError::TooSmall(data.len()));
        }
        Ok(Self { data })
    }

    pub fn location(&self, slot: ChunkSlot) -> LocationEntry {
        let i = slot.index() * 4;
        LocationEntry::from_be_bytes([
            self.data[i],
            self.data[i + 1],
            self.data[i + 2],
            self.data[i + 3],
        ])
    }

    /// 所有非空槽位，按 z 优先、x 次之的顺序
    pub fn occupied_slots(&self) -> impl Iterator<Item = (ChunkSlot, LocationEntry)> + '_ {
        (0..CHUNKS_PER_REGION)
            .map(ChunkSlot::from_index)
            .map(|slot| (slot, self.location(slot)))
            .filter(|(_, entry)| !entry.is_empty())
    }

    /// 读取并解压一个区块的数据
    pub fn read_chunk(&self, entry: LocationEntry) -> Result<Cow<'_, [u8]>, ChunkError> {
        let start = entry.byte_offset();
        if start + 5 > self.data.len() {
            return Err(ChunkError::HeaderOutOfBounds {
                offset: start,
                file_len: self.data.len(),
            });
        }

        let length = u32::from_be_bytes([
            self.data[start],
            self.data[start + 1],
            self.data[start + 2],
            self.data[start + 3],
        ]);
        if length <= 1 || length as usize > entry.reserved_bytes() {
            return Err(ChunkError::TooLarge {
                length,
                reserved: entry.reserved_bytes(),
            });
        }

        let compression = Compression::from_id(self.data[start + 4])?;
        let end = start + 4 + length as usize;
        if end > self.data.len() {
            return Err(ChunkError::Truncated {
                needed: end,
                file_len: self.data.len(),
            });
        }

        compression.decompress(&self.data[start + 5..end])
    }

    /// 读取区块并解析根 Compound
    pub fn read_chunk_nbt(&self, entry: LocationEntry) -> Result<Compound, ChunkError> {
        let bytes = self.read_chunk(entry)?;
        nbt::from_bytes(&bytes)?
            .into_compound()
            .ok_or(ChunkError::RootNotCompound)
    }
}

static MCA_FILENAME: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"(?i)^r\.(-?\d+)\.(-?\d+)\.mca$").ok());

/// 解析 MCA 文件名，返回 (rx, rz)
pub fn parse_mca_filename(filename: &str) -> Option<(i32, i32)> {
    let caps = MCA_FILENAME.as_ref()?.captures(filename)?;
    let rx = caps.get(1)?.as_str().parse().ok()?;
    let rz = caps.get(2)?.as_str().parse().ok()?;
    Some((rx, rz))
}
