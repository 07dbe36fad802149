//! Minecraft 区域文件方块提取与方块 ID 映射工具

use anyhow::Result;
use clap::{Parser, Subcommand};
use log::{info, warn};
use std::path::{Path, PathBuf};
use std::time::Instant;

use regionmap::config::LOCAL_CONFIG_FILE;
use regionmap::mapper::MapSummary;
use regionmap::{extract_all, map_blocks, tables, Config, DestinationPool, ExtractSummary};

/// Minecraft 区域文件方块提取与方块 ID 映射工具
#[derive(Parser)]
#[command(name = "regionmap", version, about)]
struct Cli {
    /// 配置文件路径
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 提取 MCA 文件中的方块为 CSV
    Extract {
        /// MCA 文件夹路径（默认取配置）
        regions_dir: Option<PathBuf>,
        /// CSV 输出文件夹路径（默认取配置）
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// 根据提取出的 CSV 生成方块映射表
    Map {
        /// CSV 文件夹路径（默认取配置）
        csv_dir: Option<PathBuf>,
    },
    /// 先提取再映射
    Run,
    /// 生成默认配置文件
    Config {
        /// 输出路径（默认: regionmap.toml）
        #[arg(short, long, default_value = LOCAL_CONFIG_FILE)]
        output: PathBuf,
        /// 覆盖已存在的文件
        #[arg(long)]
        force: bool,
    },
}

fn load_config(config_path: Option<PathBuf>) -> Config {
    if let Some(path) = config_path {
        match Config::load_from_file(&path) {
            Ok(config) => {
                info!("已加载配置: {}", path.display());
                return config;
            }
            Err(e) => {
                warn!("无法加载配置 {}: {:#}", path.display(), e);
            }
        }
    }
    Config::load()
}

fn run_extract(config: &Config, regions_dir: &Path, output_dir: &Path) -> ExtractSummary {
    println!("提取区域: {:?}", regions_dir);
    println!("输出目录: {:?}", output_dir);
    println!(
        "Y 范围: {}..={}  跳过空气: {}",
        config.extract.y_min,
        config.extract.y_max,
        if config.extract.skip_air { "是" } else { "否" }
    );
    println!();

    let start = Instant::now();
    let summary = extract_all(regions_dir, output_dir, &config.extract.to_options());

    if summary.files == 0 && summary.errors == 0 {
        println!("没有找到 MCA 文件");
    } else {
        println!("文件: {}", summary.files);
        println!("区块: {}", summary.chunks);
        println!("方块: {}", summary.blocks);
        println!("错误: {}", summary.errors);
        if summary.dropped_indices > 0 {
            println!("无效调色板索引: {}", summary.dropped_indices);
        }
    }
    println!("\n耗时: {:.2}s", start.elapsed().as_secs_f64());
    summary
}

fn run_map(config: &Config, csv_dir: &Path) -> Result<MapSummary> {
    let paths = &config.paths;
    let options = config.map.to_options();

    println!("读取 CSV: {:?}", csv_dir);
    println!("映射表: {:?}", paths.mapping_file);
    println!();

    let start = Instant::now();
    let counts = tables::load_block_counts(csv_dir);
    if counts.is_empty() {
        println!("没有找到方块数据");
        return Ok(MapSummary::default());
    }

    let overrides = tables::load_overrides(&paths.overrides_file)?;
    let block_ids = tables::load_block_ids(&paths.block_ids_file)?;
    let pool = DestinationPool::new(block_ids, &options.denylist);

    let result = map_blocks(&counts, &overrides, &pool, options.min_score);
    tables::write_mapping(&paths.mapping_file, &result.entries)?;
    tables::write_unmatched(&paths.unmatched_file, &result.unmatched)?;

    let summary = result.summary(&counts, &pool);
    println!("源方块: {}", summary.sources);
    println!("映射行: {}", summary.rows);
    println!("未匹配: {}", summary.unmatched);
    println!("目标方块: {}", summary.pool_size);
    println!("\n耗时: {:.2}s", start.elapsed().as_secs_f64());
    Ok(summary)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = load_config(cli.config);

    match cli.command {
        Commands::Extract {
            regions_dir,
            output,
        } => {
            let regions_dir = regions_dir.unwrap_or_else(|| config.paths.regions_dir.clone());
            let output_dir = output.unwrap_or_else(|| config.paths.output_dir.clone());
            run_extract(&config, &regions_dir, &output_dir);
        }

        Commands::Map { csv_dir } => {
            let csv_dir = csv_dir.unwrap_or_else(|| config.paths.output_dir.clone());
            run_map(&config, &csv_dir)?;
        }

        Commands::Run => {
            let start = Instant::now();

            println!("========================================");
            println!("步骤 1/2: 提取方块");
            println!("========================================");
            run_extract(&config, &config.paths.regions_dir, &config.paths.output_dir);

            println!();
            println!("========================================");
            println!("步骤 2/2: 生成映射");
            println!("========================================");
            run_map(&config, &config.paths.output_dir)?;

            println!("\n完成! 总耗时: {:.2}s", start.elapsed().as_secs_f64());
        }

        Commands::Config { output, force } => {
            if output.exists() && !force {
                anyhow::bail!("文件已存在: {:?}\n使用 --force 覆盖", output);
            }

            Config::default().save_to_file(&output)?;
            println!("已生成配置文件: {:?}", output);
            println!("\n默认配置:\n{}", Config::default_toml()?);
        }
    }

    Ok(())
}
