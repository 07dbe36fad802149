//! 区块 section 方块解码
//!
//! 两种互斥的格式：
//! - 旧版：`Blocks` 字节数组 + `Data` 半字节数组（可选 `Add` 扩展高 4 位）
//! - 调色板：`palette` + 按位打包在 long 数组里的调色板索引

use crate::error::ChunkError;
use crate::extract::{ExtractOptions, RowSink};
use crate::nbt::{Compound, CompoundExt, Tag, TagList};
use std::collections::BTreeMap;
use std::io;

/// 从 20w17a（DataVersion 2529）起，调色板索引不再跨越两个 long
pub const ALIGNED_PACKING_VERSION: i32 = 2529;

/// 每个 section 16 x 16 x 16 个方块
pub const SECTION_VOLUME: usize = 4096;

/// 调色板条目无法识别时使用的方块
pub const AIR_ID: &str = "minecraft:air";

/// 调色板索引的打包方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Packing {
    /// 索引可以跨越两个相邻的 long
    Stretching,
    /// 索引从不跨越 long，每个 long 末尾可能有空闲位
    Aligned,
}

impl Packing {
    pub fn for_data_version(data_version: i32) -> Self {
        if data_version < ALIGNED_PACKING_VERSION {
            Packing::Stretching
        } else {
            Packing::Aligned
        }
    }
}

/// 单个区块的解码统计
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SectionStats {
    /// 写出的方块数
    pub blocks: u64,
    /// 超出调色板或 long 数组范围而被丢弃的索引数
    pub dropped_indices: u64,
}

impl std::ops::AddAssign for SectionStats {
    fn add_assign(&mut self, rhs: Self) {
        self.blocks += rhs.blocks;
        self.dropped_indices += rhs.dropped_indices;
    }
}

/// 区块在世界中的原点（方块坐标）以及索引打包方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkOrigin {
    pub base_x: i32,
    pub base_z: i32,
    pub packing: Packing,
}

/// 区块或 section 坐标换算成最小的方块坐标，要求 16 格都在 i32 范围内
fn block_base(coord: i32) -> Option<i32> {
    coord
        .checked_mul(16)
        .filter(|base| base.checked_add(15).is_some())
}

/// 解码一个区块的所有 section
///
/// `fallback_pos` 是区块坐标，在 `xPos`/`zPos` 缺失时使用。
/// 没有可识别的 section 列表时返回 `None`。
pub fn decode_chunk<S: RowSink + ?Sized>(
    root: &Compound,
    fallback_pos: (i32, i32),
    options: &ExtractOptions,
    sink: &mut S,
) -> Result<Option<SectionStats>, ChunkError> {
    let data_version = root.get_i32("DataVersion").unwrap_or(0);
    // 1.18 之前的区块包在 Level 里
    let level = root.get_compound("Level").unwrap_or(root);

    let Some(sections) = level
        .get_list("Sections")
        .or_else(|| level.get_list("sections"))
    else {
        return Ok(None);
    };

    let chunk_x = level.get_i32("xPos").unwrap_or(fallback_pos.0);
    let chunk_z = level.get_i32("zPos").unwrap_or(fallback_pos.1);
    let (Some(base_x), Some(base_z)) = (block_base(chunk_x), block_base(chunk_z)) else {
        return Err(ChunkError::PositionOutOfRange {
            x: chunk_x.into(),
            z: chunk_z.into(),
        });
    };
    let origin = ChunkOrigin {
        base_x,
        base_z,
        packing: Packing::for_data_version(data_version),
    };

    decode_sections(sections, origin, options, sink)
        .map(Some)
        .map_err(ChunkError::Sink)
}

/// 解码 section 列表，逐个方块写入 `sink`
pub fn decode_sections<S: RowSink + ?Sized>(
    sections: &TagList,
    origin: ChunkOrigin,
    options: &ExtractOptions,
    sink: &mut S,
) -> io::Result<SectionStats> {
    let mut stats = SectionStats::default();
    for section in sections.iter().filter_map(Tag::as_compound) {
        stats += decode_section(section, origin, options, sink)?;
    }
    Ok(stats)
}

fn decode_section<S: RowSink + ?Sized>(
    section: &Compound,
    origin: ChunkOrigin,
    options: &ExtractOptions,
    sink: &mut S,
) -> io::Result<SectionStats> {
    let Some(section_y) = section.get_i32("Y").or_else(|| section.get_i32("y")) else {
        return Ok(SectionStats::default());
    };

    // 超出 i32 的 Y 不可能落在高度范围内
    let Some(base_y) = block_base(section_y) else {
        return Ok(SectionStats::default());
    };
    if base_y > options.y_max || base_y + 15 < options.y_min {
        return Ok(SectionStats::default());
    }

    if let Some(blocks) = section.get_byte_array("Blocks") {
        let Some(data) = section.get_byte_array("Data") else {
            return Ok(SectionStats::default());
        };
        let legacy = LegacySection {
            blocks,
            data,
            add: section.get_byte_array("Add"),
        };
        return legacy.write_blocks(origin, base_y, options, sink);
    }

    match IndexedSection::from_compound(section) {
        Some(indexed) => indexed.write_blocks(origin, base_y, options, sink),
        None => Ok(SectionStats::default()),
    }
}

/// section 内索引对应的局部坐标 (x, y, z)
fn local_position(index: usize) -> (i32, i32, i32) {
    let lx = (index & 15) as i32;
    let lz = ((index >> 4) & 15) as i32;
    let ly = (index >> 8) as i32;
    (lx, ly, lz)
}

/// 旧版（1.13 之前）的 section
#[derive(Debug, Clone, Copy)]
pub struct LegacySection<'a> {
    pub blocks: &'a [i8],
    pub data: &'a [i8],
    pub add: Option<&'a [i8]>,
}

impl LegacySection<'_> {
    /// 返回 (方块 ID, 数据值)，数组不足时按 0 处理
    pub fn block_at(&self, index: usize) -> (u16, u8) {
        let mut id = self.blocks.get(index).map_or(0, |&b| u16::from(b as u8));
        if let Some(add) = self.add {
            id += u16::from(nibble(add, index)) << 8;
        }
        (id, nibble(self.data, index))
    }

    fn write_blocks<S: RowSink + ?Sized>(
        &self,
        origin: ChunkOrigin,
        base_y: i32,
        options: &ExtractOptions,
        sink: &mut S,
    ) -> io::Result<SectionStats> {
        let mut stats = SectionStats::default();
        for index in 0..SECTION_VOLUME {
            let (lx, ly, lz) = local_position(index);
            let y = base_y + ly;
            if y < options.y_min || y > options.y_max {
                continue;
            }

            let (id, data) = self.block_at(index);
            if options.skip_air && id == 0 && data == 0 {
                continue;
            }

            let block = format!("legacy:{id}:{data}");
            sink.write_row(origin.base_x + lx, y, origin.base_z + lz, &block)?;
            stats.blocks += 1;
        }
        Ok(stats)
    }
}

/// 半字节数组，偶数索引在低 4 位
fn nibble(arr: &[i8], index: usize) -> u8 {
    let Some(&byte) = arr.get(index / 2) else {
        return 0;
    };
    let byte = byte as u8;
    if index % 2 == 0 {
        byte & 0x0F
    } else {
        (byte >> 4) & 0x0F
    }
}

/// 调色板格式的 section
#[derive(Debug, Clone)]
pub struct IndexedSection<'a> {
    pub palette: Vec<String>,
    /// 缺失时整个 section 都是调色板第 0 项
    pub states: Option<&'a [i64]>,
}

impl<'a> IndexedSection<'a> {
    /// 依次尝试 1.18+ 的 `block_states`、1.13~1.17 的 `Palette`/`BlockStates`
    pub fn from_compound(section: &'a Compound) -> Option<Self> {
        let (palette, states) = match section.get_compound("block_states") {
            Some(block_states) => (
                block_states.get_list("palette"),
                block_states.get_long_array("data"),
            ),
            None => (
                section
                    .get_list("Palette")
                    .or_else(|| section.get_list("palette")),
                section
                    .get_long_array("BlockStates")
                    .or_else(|| section.get_long_array("data")),
            ),
        };

        let palette = palette.filter(|p| !p.is_empty())?;
        Some(Self {
            palette: palette.iter().map(format_palette_entry).collect(),
            states: states.filter(|s| !s.is_empty()),
        })
    }

    fn write_blocks<S: RowSink + ?Sized>(
        &self,
        origin: ChunkOrigin,
        base_y: i32,
        options: &ExtractOptions,
        sink: &mut S,
    ) -> io::Result<SectionStats> {
        let bits = bits_per_index(self.palette.len());
        let mut stats = SectionStats::default();

        for index in 0..SECTION_VOLUME {
            let (lx, ly, lz) = local_position(index);
            let y = base_y + ly;
            if y < options.y_min || y > options.y_max {
                continue;
            }

            let palette_id = match self.states {
                Some(states) => decode_palette_index(states, index, bits, origin.packing),
                None => Some(0),
            };
            let Some(block) = palette_id.and_then(|id| self.palette.get(id)) else {
                stats.dropped_indices += 1;
                continue;
            };

            if options.skip_air && *block == options.air_id {
                continue;
            }

            sink.write_row(origin.base_x + lx, y, origin.base_z + lz, block)?;
            stats.blocks += 1;
        }
        Ok(stats)
    }
}

/// 每个索引占用的位数：`max(ceil(log2(palette_len)), 4)`
pub fn bits_per_index(palette_len: usize) -> u32 {
    let needed = usize::BITS - palette_len.saturating_sub(1).leading_zeros();
    needed.max(4)
}

/// 取出第 `index` 个调色板索引
///
/// 索引所在的 long 超出数组时返回 `None`。
pub fn decode_palette_index(
    states: &[i64],
    index: usize,
    bits: u32,
    packing: Packing,
) -> Option<usize> {
    let bits_usize = bits as usize;
    let (word, shift) = match packing {
        Packing::Stretching => ((index * bits_usize) / 64, ((index * bits_usize) % 64) as u32),
        Packing::Aligned => {
            let per_word = 64 / bits_usize;
            (index / per_word, ((index % per_word) * bits_usize) as u32)
        }
    };

    let mut value = (*states.get(word)? as u64) >> shift;

    if packing == Packing::Stretching && 64 - shift < bits {
        if let Some(&next) = states.get(word + 1) {
            let leftover = bits - (64 - shift);
            value |= (next as u64 & ((1u64 << leftover) - 1)) << (bits - leftover);
        }
    }

    Some((value & ((1u64 << bits) - 1)) as usize)
}

/// 把调色板条目格式化为 `name` 或 `name[k1=v1,k2=v2]`
///
/// 属性按键名排序，保证同一方块在不同文件里得到同一字符串。
pub fn format_palette_entry(entry: &Tag) -> String {
    let Some(compound) = entry.as_compound() else {
        return AIR_ID.to_string();
    };
    let name = match compound.get_str("Name") {
        Some(name) if !name.trim().is_empty() => name,
        _ => return AIR_ID.to_string(),
    };

    let props: BTreeMap<&str, &str> = compound
        .get_compound("Properties")
        .map(|props| {
            props
                .iter()
                .filter_map(|(k, v)| v.as_str().map(|v| (k.as_str(), v)))
                .collect()
        })
        .unwrap_or_default();

    if props.is_empty() {
        return name.to_string();
    }

    let joined: Vec<String> = props.iter().map(|(k, v)| format!("{k}={v}")).collect();
    format!("{name}[{}]", joined.join(","))
}
