//! 源方块到目标方块的映射
//!
//! 每个源方块 ID 恰好产生一条 [`MappingEntry`]：
//! 覆盖表中的条目直接采用（`manual`），其余按词元集合的 Dice 系数挑选最相近的目标方块
//! （`heuristic`），分数不足阈值则记为 `unmatched`。

use crate::tokens::{destination_tokens, source_tokens};
use log::{debug, info};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

/// 每种方块（去掉属性后）的出现次数
pub type BlockCounts = HashMap<String, u64>;

/// 手动覆盖表：源方块 -> 目标方块，目标为空表示强制不匹配
pub type Overrides = HashMap<String, String>;

const LEGACY_PREFIX: &str = "legacy:";

/// 去掉方块状态属性并补全命名空间
///
/// `legacy:` 开头的 ID 原样返回，空白输入返回空字符串。
pub fn base_block_id(block: &str) -> String {
    let trimmed = block.trim();
    if trimmed.is_empty() || trimmed.starts_with(LEGACY_PREFIX) {
        return trimmed.to_string();
    }
    let base = trimmed.split('[').next().unwrap_or_default();
    if base.contains(':') {
        base.to_string()
    } else {
        format!("minecraft:{base}")
    }
}

/// 映射条目的来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MappingSource {
    Manual,
    Heuristic,
    Unmatched,
}

impl MappingSource {
    pub fn as_str(self) -> &'static str {
        match self {
            MappingSource::Manual => "manual",
            MappingSource::Heuristic => "heuristic",
            MappingSource::Unmatched => "unmatched",
        }
    }
}

impl fmt::Display for MappingSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MappingSource {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "manual" => Ok(MappingSource::Manual),
            "heuristic" => Ok(MappingSource::Heuristic),
            "unmatched" => Ok(MappingSource::Unmatched),
            other => anyhow::bail!("未知的映射来源: {other}"),
        }
    }
}

/// 一条映射
#[derive(Debug, Clone, PartialEq)]
pub struct MappingEntry {
    pub source_id: String,
    pub target_id: Option<String>,
    /// 取值 [0, 1]，已保留三位小数
    pub score: f64,
    pub source: MappingSource,
}

/// 映射选项
#[derive(Debug, Clone, PartialEq)]
pub struct MapOptions {
    /// 启发式匹配的最低分数
    pub min_score: f64,
    /// 永远不会被自动选中的目标方块
    pub denylist: Vec<String>,
}

impl Default for MapOptions {
    fn default() -> Self {
        Self {
            min_score: 0.45,
            denylist: vec!["Wood_Sticks".to_string()],
        }
    }
}

/// 可供选择的目标方块，预先分好词
///
/// 排除黑名单后按字节序排序并去重，同分时取排序靠前者。
#[derive(Debug, Clone, Default)]
pub struct DestinationPool {
    ids: Vec<String>,
    tokens: Vec<HashSet<String>>,
}

impl DestinationPool {
    pub fn new<I, S>(ids: I, denylist: &[String]) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut ids: Vec<String> = ids
            .into_iter()
            .map(Into::into)
            .filter(|id| !denylist.contains(id))
            .collect();
        ids.sort();
        ids.dedup();

        let tokens = ids
            .iter()
            .map(|id| destination_tokens(id).into_iter().collect())
            .collect();
        Self { ids, tokens }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids
            .binary_search_by(|candidate| candidate.as_str().cmp(id))
            .is_ok()
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    /// 分数最高的目标方块；全部为 0 时没有结果
    pub fn best_match(&self, tokens: &HashSet<String>) -> Option<(&str, f64)> {
        let mut best: Option<(&str, f64)> = None;
        for (id, candidate) in self.ids.iter().zip(&self.tokens) {
            let score = dice_score(tokens, candidate);
            if score > best.map_or(0.0, |(_, s)| s) {
                best = Some((id.as_str(), score));
            }
        }
        best
    }
}

/// 两个词元集合的 Dice 系数 `2|A∩B| / (|A|+|B|)`
pub fn dice_score(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let overlap = a.intersection(b).count();
    if overlap == 0 {
        return 0.0;
    }
    (2 * overlap) as f64 / (a.len() + b.len()) as f64
}

/// 四舍五入到三位小数
pub fn round_score(score: f64) -> f64 {
    (score * 1000.0).round() / 1000.0
}

/// 映射结果
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MappingResult {
    /// 按源方块 ID 排序（不区分大小写）
    pub entries: Vec<MappingEntry>,
    /// 未匹配或覆盖目标无效的源方块，顺序同 `entries`
    pub unmatched: Vec<String>,
}

/// 映射统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MapSummary {
    pub sources: usize,
    pub rows: usize,
    pub unmatched: usize,
    pub pool_size: usize,
}

impl MappingResult {
    pub fn summary(&self, counts: &BlockCounts, pool: &DestinationPool) -> MapSummary {
        MapSummary {
            sources: counts.len(),
            rows: self.entries.len(),
            unmatched: self.unmatched.len(),
            pool_size: pool.len(),
        }
    }
}

/// 为每个出现过的源方块生成映射
pub fn map_blocks(
    counts: &BlockCounts,
    overrides: &Overrides,
    pool: &DestinationPool,
    min_score: f64,
) -> MappingResult {
    let mut sources: Vec<&str> = counts
        .keys()
        .map(String::as_str)
        .filter(|s| !s.trim().is_empty())
        .collect();
    sources.sort_by(|a, b| {
        a.to_lowercase()
            .cmp(&b.to_lowercase())
            .then_with(|| a.cmp(b))
    });

    let mut result = MappingResult::default();
    for source_id in sources {
        let entry = map_one(source_id, overrides, pool, min_score);
        let unresolved = match entry.source {
            MappingSource::Manual => entry
                .target_id
                .as_deref()
                .map_or(true, |target| !pool.contains(target)),
            MappingSource::Heuristic => false,
            MappingSource::Unmatched => true,
        };
        if unresolved {
            result.unmatched.push(source_id.to_string());
        }
        result.entries.push(entry);
    }

    info!(
        "映射完成: 源方块 {} 未匹配 {} 目标方块 {}",
        result.entries.len(),
        result.unmatched.len(),
        pool.len()
    );
    result
}

fn map_one(source_id: &str, overrides: &Overrides, pool: &DestinationPool, min_score: f64) -> MappingEntry {
    if let Some(target) = overrides.get(source_id) {
        let target = target.trim();
        if !target.is_empty() && !pool.contains(target) {
            debug!("覆盖目标 {target} 不在目标方块列表中 ({source_id})");
        }
        return MappingEntry {
            source_id: source_id.to_string(),
            target_id: (!target.is_empty()).then(|| target.to_string()),
            score: 1.0,
            source: MappingSource::Manual,
        };
    }

    let tokens: HashSet<String> = source_tokens(source_id).into_iter().collect();
    match pool.best_match(&tokens) {
        Some((target, score)) if score >= min_score => MappingEntry {
            source_id: source_id.to_string(),
            target_id: Some(target.to_string()),
            score: round_score(score),
            source: MappingSource::Heuristic,
        },
        best => MappingEntry {
            source_id: source_id.to_string(),
            target_id: None,
            score: round_score(best.map_or(0.0, |(_, s)| s)),
            source: MappingSource::Unmatched,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(tokens: &[&str]) -> HashSet<String> {
        tokens.iter().map(|t| t.to_string()).collect()
    }

    fn counts(ids: &[&str]) -> BlockCounts {
        ids.iter().map(|id| (id.to_string(), 1)).collect()
    }

    #[test]
    fn base_id_strips_properties() {
        assert_eq!(base_block_id(" minecraft:oak_log[axis=y] "), "minecraft:oak_log");
        assert_eq!(base_block_id("stone"), "minecraft:stone");
        assert_eq!(base_block_id("legacy:17:2"), "legacy:17:2");
        assert_eq!(base_block_id("mod:thing"), "mod:thing");
        assert_eq!(base_block_id("   "), "");
    }

    #[test]
    fn dice_of_partial_overlap() {
        let score = dice_score(&set(&["oak", "planks"]), &set(&["planks"]));
        assert_eq!(round_score(score), 0.667);
        assert_eq!(dice_score(&set(&["a"]), &set(&["b"])), 0.0);
        assert_eq!(dice_score(&set(&[]), &set(&["b"])), 0.0);
        assert_eq!(dice_score(&set(&["a", "b"]), &set(&["b", "a"])), 1.0);
    }

    #[test]
    fn rounds_half_up() {
        assert_eq!(round_score(0.6665), 0.667);
        assert_eq!(round_score(0.1234), 0.123);
        assert_eq!(round_score(0.0), 0.0);
    }

    #[test]
    fn pool_filters_sorts_and_dedups() {
        let pool = DestinationPool::new(
            ["Soil_Dirt", "Wood_Sticks", "Rock_Stone", "Soil_Dirt"],
            &MapOptions::default().denylist,
        );
        assert_eq!(pool.ids(), ["Rock_Stone", "Soil_Dirt"]);
        assert!(pool.contains("Soil_Dirt"));
        assert!(!pool.contains("Wood_Sticks"));
    }

    #[test]
    fn ties_go_to_first_in_sorted_pool() {
        let pool = DestinationPool::new(["Stone_B", "Stone_A"], &[]);
        let (target, score) = pool.best_match(&set(&["stone"])).unwrap();
        assert_eq!(target, "Stone_A");
        assert!((score - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(pool.best_match(&set(&["dirt"])), None);
    }

    #[test]
    fn heuristic_match_above_threshold() {
        let pool = DestinationPool::new(["Wood_Oak_Planks", "Rock_Stone"], &[]);
        let result = map_blocks(
            &counts(&["minecraft:oak_planks"]),
            &Overrides::new(),
            &pool,
            0.45,
        );
        assert_eq!(
            result.entries,
            [MappingEntry {
                source_id: "minecraft:oak_planks".to_string(),
                target_id: Some("Wood_Oak_Planks".to_string()),
                score: 0.8,
                source: MappingSource::Heuristic,
            }]
        );
        assert!(result.unmatched.is_empty());
    }

    #[test]
    fn blank_override_is_manual_and_unmatched() {
        let pool = DestinationPool::new(["Rock_Stone"], &[]);
        let overrides = Overrides::from([("foo".to_string(), "  ".to_string())]);
        let result = map_blocks(&counts(&["foo"]), &overrides, &pool, 0.45);

        assert_eq!(result.entries.len(), 1);
        let entry = &result.entries[0];
        assert_eq!(entry.source, MappingSource::Manual);
        assert_eq!(entry.target_id, None);
        assert_eq!(entry.score, 1.0);
        assert_eq!(result.unmatched, ["foo"]);
    }

    #[test]
    fn override_outside_pool_is_kept_but_reported() {
        let pool = DestinationPool::new(["Rock_Stone", "Wood_Sticks"], &["Wood_Sticks".to_string()]);
        let overrides = Overrides::from([
            ("minecraft:stick".to_string(), "Wood_Sticks".to_string()),
            ("minecraft:stone".to_string(), "Rock_Stone".to_string()),
        ]);
        let result = map_blocks(
            &counts(&["minecraft:stick", "minecraft:stone"]),
            &overrides,
            &pool,
            0.45,
        );
        assert_eq!(result.entries[0].target_id.as_deref(), Some("Wood_Sticks"));
        assert_eq!(result.entries[0].source, MappingSource::Manual);
        assert_eq!(result.unmatched, ["minecraft:stick"]);
    }

    #[test]
    fn denylisted_target_is_never_chosen() {
        let denylist = vec!["Wood_Oak_Planks".to_string()];
        let pool = DestinationPool::new(["Wood_Oak_Planks", "Stone_Cobble"], &denylist);
        let result = map_blocks(&counts(&["minecraft:oak_planks"]), &Overrides::new(), &pool, 0.45);

        let entry = &result.entries[0];
        assert_eq!(entry.source, MappingSource::Unmatched);
        assert_eq!(entry.target_id, None);
        assert_eq!(entry.score, 0.0);
        assert_eq!(result.unmatched, ["minecraft:oak_planks"]);
    }

    #[test]
    fn low_score_keeps_best_score() {
        let pool = DestinationPool::new(["Rock_Stone_Brick_Wall_Mossy"], &[]);
        let result = map_blocks(&counts(&["minecraft:stone"]), &Overrides::new(), &pool, 0.45);
        let entry = &result.entries[0];
        assert_eq!(entry.source, MappingSource::Unmatched);
        assert_eq!(entry.score, 0.333);
    }

    #[test]
    fn entries_sorted_case_insensitively_and_repeatable() {
        let pool = DestinationPool::new(["Rock_Stone", "Soil_Dirt", "Soil_Sand"], &[]);
        let counts = counts(&["minecraft:sand", "", "B:dirt", "a:stone", "minecraft:Dirt"]);
        let first = map_blocks(&counts, &Overrides::new(), &pool, 0.45);
        let ids: Vec<&str> = first.entries.iter().map(|e| e.source_id.as_str()).collect();
        assert_eq!(ids, ["a:stone", "B:dirt", "minecraft:Dirt", "minecraft:sand"]);

        let second = map_blocks(&counts, &Overrides::new(), &pool, 0.45);
        assert_eq!(first, second);
        assert_eq!(
            first.summary(&counts, &pool),
            MapSummary {
                sources: 5,
                rows: 4,
                unmatched: 0,
                pool_size: 3,
            }
        );
    }

    #[test]
    fn source_kind_parses_back() {
        for kind in [MappingSource::Manual, MappingSource::Heuristic, MappingSource::Unmatched] {
            assert_eq!(kind.to_string().parse::<MappingSource>().unwrap(), kind);
        }
        assert!("UNMAPPED".parse::<MappingSource>().is_err());
    }
}
