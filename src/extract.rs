//! 从 MCA 文件提取方块行
//!
//! 每个区域文件独立处理：单个区块出错只计数，不影响同文件的其他区块；
//! 单个文件出错只计数，不影响其他文件。

use crate::error::ChunkError;
use crate::mapper::{base_block_id, BlockCounts};
use crate::mca::{parse_mca_filename, ChunkSlot, LocationEntry, Region};
use crate::section::{decode_chunk, SectionStats, AIR_ID};
use crate::tables::CsvRowWriter;
use anyhow::{Context, Result};
use log::{debug, info, warn};
use rayon::prelude::*;
use std::fs::{self, File};
use std::io::{self, BufWriter};
use std::iter::Sum;
use std::ops::{Add, AddAssign};
use std::path::{Path, PathBuf};

/// 提取选项
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractOptions {
    /// 跳过空气方块
    pub skip_air: bool,
    /// 调色板格式下视为空气的方块 ID
    pub air_id: String,
    /// 最低 Y（含）
    pub y_min: i32,
    /// 最高 Y（含）
    pub y_max: i32,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            skip_air: true,
            air_id: AIR_ID.to_string(),
            y_min: 0,
            y_max: 319,
        }
    }
}

/// 一个方块的世界坐标与方块 ID
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedVoxel {
    pub x: i32,
    pub y: i32,
    pub z: i32,
    pub block_id: String,
}

impl ExtractedVoxel {
    pub fn new(x: i32, y: i32, z: i32, block_id: &str) -> Self {
        Self {
            x,
            y,
            z,
            block_id: block_id.to_string(),
        }
    }
}

/// 方块行的接收端，按产生顺序逐行写入
pub trait RowSink {
    fn write_row(&mut self, x: i32, y: i32, z: i32, block_id: &str) -> io::Result<()>;
}

impl<S: RowSink + ?Sized> RowSink for &mut S {
    fn write_row(&mut self, x: i32, y: i32, z: i32, block_id: &str) -> io::Result<()> {
        (**self).write_row(x, y, z, block_id)
    }
}

impl RowSink for Vec<ExtractedVoxel> {
    fn write_row(&mut self, x: i32, y: i32, z: i32, block_id: &str) -> io::Result<()> {
        self.push(ExtractedVoxel::new(x, y, z, block_id));
        Ok(())
    }
}

/// 只统计每种方块（去掉属性后）出现的次数
#[derive(Debug, Default)]
pub struct BlockCounter {
    counts: BlockCounts,
}

impl BlockCounter {
    pub fn into_counts(self) -> BlockCounts {
        self.counts
    }
}

impl RowSink for BlockCounter {
    fn write_row(&mut self, _x: i32, _y: i32, _z: i32, block_id: &str) -> io::Result<()> {
        let base = base_block_id(block_id);
        if !base.is_empty() {
            *self.counts.entry(base).or_insert(0) += 1;
        }
        Ok(())
    }
}

/// 提取统计，多个文件的结果按字段相加
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ExtractSummary {
    pub files: u64,
    pub chunks: u64,
    pub blocks: u64,
    pub errors: u64,
    pub dropped_indices: u64,
}

impl ExtractSummary {
    /// 整个文件无法处理
    pub fn file_error() -> Self {
        Self {
            errors: 1,
            ..Self::default()
        }
    }
}

impl Add for ExtractSummary {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            files: self.files + rhs.files,
            chunks: self.chunks + rhs.chunks,
            blocks: self.blocks + rhs.blocks,
            errors: self.errors + rhs.errors,
            dropped_indices: self.dropped_indices + rhs.dropped_indices,
        }
    }
}

impl AddAssign for ExtractSummary {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl Sum for ExtractSummary {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

/// 提取一个区域文件的所有区块
///
/// `region_pos` 是区域坐标，用于推算缺少 `xPos`/`zPos` 的区块位置。
/// 只有写出失败会中止整个文件。
pub fn extract_region<S: RowSink + ?Sized>(
    region: &Region,
    region_pos: (i32, i32),
    options: &ExtractOptions,
    sink: &mut S,
) -> Result<ExtractSummary, ChunkError> {
    let mut summary = ExtractSummary {
        files: 1,
        ..ExtractSummary::default()
    };

    for (slot, entry) in region.occupied_slots() {
        let result = slot_chunk_pos(region_pos, slot)
            .and_then(|chunk_pos| extract_chunk(region, entry, chunk_pos, options, sink));
        match result {
            Ok(Some(stats)) => {
                summary.chunks += 1;
                summary.blocks += stats.blocks;
                summary.dropped_indices += stats.dropped_indices;
            }
            Ok(None) => debug!("区块 ({}, {}) 没有 section 列表，跳过", slot.x, slot.z),
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                summary.errors += 1;
                debug!("无法读取区块 ({}, {}): {}", slot.x, slot.z, e);
            }
        }
    }

    Ok(summary)
}

/// 槽位对应的区块坐标，区域坐标来自文件名，可能大得离谱
fn slot_chunk_pos(region_pos: (i32, i32), slot: ChunkSlot) -> Result<(i32, i32), ChunkError> {
    let x = i64::from(region_pos.0) * 32 + i64::from(slot.x);
    let z = i64::from(region_pos.1) * 32 + i64::from(slot.z);
    match (i32::try_from(x), i32::try_from(z)) {
        (Ok(x), Ok(z)) => Ok((x, z)),
        _ => Err(ChunkError::PositionOutOfRange { x, z }),
    }
}

fn extract_chunk<S: RowSink + ?Sized>(
    region: &Region,
    entry: LocationEntry,
    chunk_pos: (i32, i32),
    options: &ExtractOptions,
    sink: &mut S,
) -> Result<Option<SectionStats>, ChunkError> {
    let root = region.read_chunk_nbt(entry)?;
    decode_chunk(&root, chunk_pos, options, sink)
}

/// 提取单个 MCA 文件到 CSV，失败时记为一个文件错误
pub fn extract_region_file(
    mca_path: &Path,
    output_path: &Path,
    options: &ExtractOptions,
) -> ExtractSummary {
    match try_extract_region_file(mca_path, output_path, options) {
        Ok(summary) => {
            info!(
                "完成 {:?}: 区块 {} 方块 {} 错误 {}",
                output_path.file_name().unwrap_or_default(),
                summary.chunks,
                summary.blocks,
                summary.errors
            );
            summary
        }
        Err(e) => {
            warn!("失败 {:?}: {:#}", mca_path.file_name().unwrap_or_default(), e);
            ExtractSummary::file_error()
        }
    }
}

fn try_extract_region_file(
    mca_path: &Path,
    output_path: &Path,
    options: &ExtractOptions,
) -> Result<ExtractSummary> {
    let region = Region::open(mca_path).with_context(|| format!("无法读取 {:?}", mca_path))?;

    let filename = mca_path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    let region_pos = parse_mca_filename(filename).unwrap_or_else(|| {
        debug!("无法从文件名 {filename} 解析区域坐标，按 (0, 0) 处理");
        (0, 0)
    });

    write_or_remove(output_path, |file| {
        let mut writer = CsvRowWriter::new(BufWriter::new(file))?;
        let summary = extract_region(&region, region_pos, options, &mut writer)?;
        writer.finish()?;
        Ok(summary)
    })
}

/// 创建输出文件并交给 `write`，失败时删除写了一半的文件
///
/// 输出目录里残留的 CSV 会被之后的方块计数读入。
fn write_or_remove<T>(output_path: &Path, write: impl FnOnce(File) -> Result<T>) -> Result<T> {
    let file = File::create(output_path)
        .with_context(|| format!("无法创建 {:?}", output_path))?;
    let result = write(file);
    if result.is_err() {
        if let Err(e) = fs::remove_file(output_path) {
            debug!("无法删除不完整的输出 {:?}: {}", output_path, e);
        }
    }
    result
}

/// 列出目录下的 MCA 文件，按文件名排序；目录不存在时为空
pub fn list_region_files(dir: &Path) -> io::Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .filter(|p| {
            p.extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("mca"))
        })
        .collect();
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

/// 提取目录下所有 MCA 文件，每个文件输出一个同名 CSV
///
/// 文件之间并行处理，结果相加。没有输入文件时返回全 0 统计。
pub fn extract_all(mca_dir: &Path, output_dir: &Path, options: &ExtractOptions) -> ExtractSummary {
    let mca_files = match list_region_files(mca_dir) {
        Ok(files) => files,
        Err(e) => {
            warn!("无法列出 {:?} 中的 MCA 文件: {}", mca_dir, e);
            return ExtractSummary::default();
        }
    };
    if mca_files.is_empty() {
        return ExtractSummary::default();
    }

    if let Err(e) = fs::create_dir_all(output_dir) {
        warn!("无法创建输出目录 {:?}: {}", output_dir, e);
    }

    info!("提取 {} 个 region 文件 (并行处理)", mca_files.len());

    mca_files
        .par_iter()
        .map(|mca_path| {
            let csv_name = mca_path.with_extension("csv");
            let output_path = output_dir.join(csv_name.file_name().unwrap_or_default());
            extract_region_file(mca_path, &output_path, options)
        })
        .sum()
}
