//! Minecraft 区域文件方块提取与方块 ID 映射
//!
//! 读取 `.mca` 区域文件中的每个方块，输出 `x,y,z,block` 表格，
//! 再把出现过的方块 ID 映射到另一套方块 ID

pub mod config;
pub mod error;
pub mod extract;
pub mod mapper;
pub mod mca;
pub mod nbt;
pub mod section;
pub mod tables;
pub mod tokens;

pub use config::Config;
pub use error::{ChunkError, MalformedTag, RegionError};
pub use extract::{extract_all, extract_region, ExtractOptions, ExtractSummary, ExtractedVoxel, RowSink};
pub use mapper::{map_blocks, DestinationPool, MapOptions, MappingEntry, MappingResult, MappingSource};
pub use mca::{parse_mca_filename, Region};
pub use nbt::{Compound, Tag};
