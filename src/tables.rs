//! 表格文件读写
//!
//! 区域 CSV（`x,y,z,block`）、方块覆盖表、目标方块 ID 列表、映射表与未匹配表。
//! 含逗号或引号的字段按 CSV 规则加引号。

use crate::extract::RowSink;
use crate::mapper::{base_block_id, BlockCounts, MappingEntry, MappingSource, Overrides};
use anyhow::{Context, Result};
use log::{info, warn};
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// 区域 CSV 的表头
pub const REGION_CSV_HEADER: &str = "x,y,z,block";

/// 映射表的表头
pub const MAPPING_CSV_HEADER: &str = "source_block,target_block,score,source";

/// 未匹配表的表头
pub const UNMATCHED_CSV_HEADER: &str = "source_block";

/// 把方块行写成 CSV
pub struct CsvRowWriter<W: Write> {
    inner: W,
}

impl<W: Write> CsvRowWriter<W> {
    /// 创建时立即写出表头
    pub fn new(mut inner: W) -> io::Result<Self> {
        writeln!(inner, "{REGION_CSV_HEADER}")?;
        Ok(Self { inner })
    }

    pub fn finish(mut self) -> io::Result<W> {
        self.inner.flush()?;
        Ok(self.inner)
    }
}

impl<W: Write> RowSink for CsvRowWriter<W> {
    fn write_row(&mut self, x: i32, y: i32, z: i32, block_id: &str) -> io::Result<()> {
        writeln!(self.inner, "{x},{y},{z},{}", quote_field(block_id))
    }
}

/// 需要时给字段加引号
pub fn quote_field(field: &str) -> std::borrow::Cow<'_, str> {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\"")).into()
    } else {
        field.into()
    }
}

/// 拆分一行 CSV，支持带引号的字段
pub fn split_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    current.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            }
            '"' if current.is_empty() => in_quotes = true,
            ',' if !in_quotes => fields.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    fields.push(current);
    fields
}

/// 列出目录下的 CSV 文件，按文件名排序
fn list_csv_files(dir: &Path) -> io::Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .filter(|p| {
            p.extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
        })
        .collect();
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

/// 统计目录下所有区域 CSV 中每种方块的出现次数
///
/// 单个文件读取失败只记录警告。
pub fn load_block_counts(dir: &Path) -> BlockCounts {
    let mut counts = BlockCounts::new();
    let files = match list_csv_files(dir) {
        Ok(files) => files,
        Err(e) => {
            warn!("无法列出 {:?} 中的 CSV 文件: {}", dir, e);
            return counts;
        }
    };

    for csv in &files {
        if let Err(e) = count_blocks_in_csv(csv, &mut counts) {
            warn!("无法读取 {:?}: {:#}", csv.file_name().unwrap_or_default(), e);
        }
    }
    counts
}

fn count_blocks_in_csv(path: &Path, counts: &mut BlockCounts) -> Result<()> {
    let reader = BufReader::new(File::open(path)?);
    let mut lines = reader.lines();

    let Some(header) = lines.next().transpose()? else {
        return Ok(());
    };
    let header = split_line(&header);
    let block_idx = match header
        .iter()
        .position(|h| h.trim().eq_ignore_ascii_case("block"))
    {
        Some(idx) => idx,
        None => {
            // 没有表头时第一行也是数据，方块在第 4 列
            if let Some(first) = header.get(3) {
                add_count(counts, first);
            }
            3
        }
    };

    for line in lines {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        if let Some(block) = split_line(&line).get(block_idx) {
            add_count(counts, block);
        }
    }
    Ok(())
}

fn add_count(counts: &mut BlockCounts, raw: &str) {
    let block = base_block_id(raw);
    if !block.is_empty() {
        *counts.entry(block).or_insert(0) += 1;
    }
}

/// 读取方块覆盖表（`source,target`，第一行为表头）
///
/// 目标为空表示强制不匹配。文件不存在时返回空表。
pub fn load_overrides(path: &Path) -> Result<Overrides> {
    let mut overrides = Overrides::new();
    if !path.exists() {
        info!("覆盖表不存在: {:?}", path);
        return Ok(overrides);
    }

    let reader = BufReader::new(
        File::open(path).with_context(|| format!("无法打开覆盖表 {:?}", path))?,
    );
    for line in reader.lines().skip(1) {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let parts = split_line(&line);
        if parts.len() < 2 {
            continue;
        }
        let source = parts[0].trim();
        if !source.is_empty() {
            overrides.insert(source.to_string(), parts[1].trim().to_string());
        }
    }
    Ok(overrides)
}

/// 读取目标方块 ID 列表，每行一个
///
/// 文件不存在时返回空列表。
pub fn load_block_ids(path: &Path) -> Result<Vec<String>> {
    if !path.exists() {
        warn!("方块 ID 文件不存在: {:?}", path);
        return Ok(Vec::new());
    }
    let content =
        fs::read_to_string(path).with_context(|| format!("无法读取方块 ID 文件 {:?}", path))?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect())
}

fn create_with_parent(path: &Path) -> Result<BufWriter<File>> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = File::create(path).with_context(|| format!("无法创建 {:?}", path))?;
    Ok(BufWriter::new(file))
}

/// 写出映射表
pub fn write_mapping(path: &Path, entries: &[MappingEntry]) -> Result<()> {
    let mut writer = create_with_parent(path)?;
    writeln!(writer, "{MAPPING_CSV_HEADER}")?;
    for entry in entries {
        writeln!(
            writer,
            "{},{},{:.3},{}",
            quote_field(&entry.source_id),
            quote_field(entry.target_id.as_deref().unwrap_or_default()),
            entry.score,
            entry.source
        )?;
    }
    writer.flush()?;
    Ok(())
}

/// 读取映射表
pub fn load_mapping(path: &Path) -> Result<Vec<MappingEntry>> {
    let reader = BufReader::new(
        File::open(path).with_context(|| format!("无法打开映射表 {:?}", path))?,
    );
    let mut entries = Vec::new();
    for (line_no, line) in reader.lines().enumerate().skip(1) {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let parts = split_line(&line);
        let [source_id, target_id, score, source] = parts.as_slice() else {
            anyhow::bail!("映射表第 {} 行应有 4 列: {}", line_no + 1, line);
        };
        let source: MappingSource = source
            .parse()
            .with_context(|| format!("映射表第 {} 行", line_no + 1))?;
        let score: f64 = score
            .trim()
            .parse()
            .with_context(|| format!("映射表第 {} 行的分数无效", line_no + 1))?;
        let target_id = target_id.trim();
        entries.push(MappingEntry {
            source_id: source_id.trim().to_string(),
            target_id: (!target_id.is_empty()).then(|| target_id.to_string()),
            score,
            source,
        });
    }
    Ok(entries)
}

/// 写出未匹配的方块列表
pub fn write_unmatched(path: &Path, unmatched: &[String]) -> Result<()> {
    let mut writer = create_with_parent(path)?;
    writeln!(writer, "{UNMATCHED_CSV_HEADER}")?;
    for block in unmatched {
        writeln!(writer, "{}", quote_field(block))?;
    }
    writer.flush()?;
    Ok(())
}
