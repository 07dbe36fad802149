//! 配置文件加载与管理

use crate::extract::ExtractOptions;
use crate::mapper::MapOptions;
use crate::section::AIR_ID;
use anyhow::{Context, Result};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// 当前目录下的配置文件名
pub const LOCAL_CONFIG_FILE: &str = "regionmap.toml";

/// 主配置结构
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 路径配置
    pub paths: PathsConfig,
    /// 提取配置
    pub extract: ExtractConfig,
    /// 映射配置
    pub map: MapConfig,
}

/// 路径配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// MCA 文件所在目录
    pub regions_dir: PathBuf,
    /// 区域 CSV 输出目录
    pub output_dir: PathBuf,
    /// 映射表
    pub mapping_file: PathBuf,
    /// 未匹配方块列表
    pub unmatched_file: PathBuf,
    /// 手动覆盖表
    pub overrides_file: PathBuf,
    /// 目标方块 ID 列表
    pub block_ids_file: PathBuf,
}

/// 提取配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractConfig {
    /// 跳过空气
    pub skip_air: bool,
    /// 视为空气的方块 ID
    pub air_id: String,
    /// 最低 Y（含）
    pub y_min: i32,
    /// 最高 Y（含）
    pub y_max: i32,
}

/// 映射配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapConfig {
    /// 启发式匹配最低分数
    pub min_score: f64,
    /// 不参与自动匹配的目标方块
    pub denylist: Vec<String>,
}

// ============== 默认值 ==============

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            regions_dir: PathBuf::from("mc-regions"),
            output_dir: PathBuf::from("mc-regions"),
            mapping_file: PathBuf::from("block-mapping.csv"),
            unmatched_file: PathBuf::from("unmapped-blocks.csv"),
            overrides_file: PathBuf::from("block-overrides.csv"),
            block_ids_file: PathBuf::from("block-ids.txt"),
        }
    }
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            skip_air: true,
            air_id: AIR_ID.to_string(),
            y_min: 0,
            y_max: 319,
        }
    }
}

impl Default for MapConfig {
    fn default() -> Self {
        let defaults = MapOptions::default();
        Self {
            min_score: defaults.min_score,
            denylist: defaults.denylist,
        }
    }
}

impl ExtractConfig {
    pub fn to_options(&self) -> ExtractOptions {
        ExtractOptions {
            skip_air: self.skip_air,
            air_id: self.air_id.clone(),
            y_min: self.y_min,
            y_max: self.y_max,
        }
    }
}

impl MapConfig {
    pub fn to_options(&self) -> MapOptions {
        MapOptions {
            min_score: self.min_score,
            denylist: self.denylist.clone(),
        }
    }
}

// ============== 配置加载 ==============

impl Config {
    /// 从文件加载配置
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).with_context(|| format!("无法读取配置 {:?}", path))?;
        let config: Config =
            toml::from_str(&content).with_context(|| format!("配置格式错误 {:?}", path))?;
        Ok(config)
    }

    /// 保存配置到文件
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, content)?;
        Ok(())
    }

    /// 获取默认配置文件路径
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("regionmap").join("config.toml"))
    }

    /// 按优先级加载配置：
    /// 1. 当前目录的 regionmap.toml
    /// 2. 用户配置目录的 config.toml
    /// 3. 默认配置
    pub fn load() -> Self {
        let candidates = std::iter::once(PathBuf::from(LOCAL_CONFIG_FILE))
            .chain(Self::default_config_path());

        for path in candidates {
            if !path.exists() {
                continue;
            }
            match Self::load_from_file(&path) {
                Ok(config) => {
                    info!("已加载配置: {}", path.display());
                    return config;
                }
                Err(e) => warn!("跳过配置 {}: {:#}", path.display(), e),
            }
        }

        Self::default()
    }

    /// 生成默认配置文件内容
    pub fn default_toml() -> Result<String> {
        Ok(toml::to_string_pretty(&Self::default())?)
    }
}
