//! batch-plan: 对 JSONL 条目文件运行批处理打包并输出批次计划
//!
//! Usage:
//!   batch-plan plan <items.jsonl> [--config <pipeline.yaml>]   Print the batch plan as JSON
//!   batch-plan config [--config <pipeline.yaml>]               Print the effective configuration

use ai_batch_pipeline::batch::DynamicBatchBuilder;
use ai_batch_pipeline::config::PipelineConfig;
use ai_batch_pipeline::types::Item;
use anyhow::{bail, Context};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        print_usage();
        std::process::exit(1);
    }

    match args[1].as_str() {
        "plan" => cmd_plan(&args[2..]),
        "config" => cmd_config(&args[2..]),
        "version" | "--version" | "-V" => {
            println!("batch-plan {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {other}");
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    }
}

fn print_usage() {
    println!(
        r#"batch-plan: token-bounded batch planning

USAGE:
    batch-plan <COMMAND> [OPTIONS]

COMMANDS:
    plan <items.jsonl> [--config <path>]   Pack items and print the batch plan as JSON
    config [--config <path>]               Print the effective configuration as YAML
    version                                Show version information
    help                                   Show this help message

ENVIRONMENT:
    AI_BATCH_*                             Configuration overrides
    RUST_LOG                               Log filter (default: info)"#
    );
}

fn config_flag(args: &[String]) -> Option<PathBuf> {
    args.iter()
        .position(|a| a == "--config")
        .and_then(|i| args.get(i + 1))
        .map(PathBuf::from)
}

fn load_config(args: &[String]) -> anyhow::Result<PipelineConfig> {
    let path = config_flag(args);
    PipelineConfig::load(path.as_deref()).context("loading pipeline configuration")
}

fn read_items(path: &Path) -> anyhow::Result<Vec<Item>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(n, line)| {
            serde_json::from_str::<Item>(line)
                .with_context(|| format!("{}:{}: invalid item", path.display(), n + 1))
        })
        .collect()
}

#[derive(Serialize)]
struct PlannedBatch {
    index: usize,
    item_ids: Vec<i64>,
    estimated_tokens: usize,
    truncated: bool,
}

#[derive(Serialize)]
struct Plan {
    total_items: usize,
    max_tokens_per_request: usize,
    max_batch_size: usize,
    batches: Vec<PlannedBatch>,
}

fn cmd_plan(args: &[String]) -> anyhow::Result<()> {
    let Some(items_path) = args.first().filter(|a| !a.starts_with("--")) else {
        bail!("plan requires an items file (JSON lines)");
    };
    let config = load_config(args)?;
    let items = read_items(Path::new(items_path))?;
    let total_items = items.len();

    let builder = DynamicBatchBuilder::new(config.batch.clone());
    let batches: Vec<PlannedBatch> = builder
        .build(items)
        .into_iter()
        .enumerate()
        .map(|(index, b)| PlannedBatch {
            index,
            item_ids: b.item_ids(),
            estimated_tokens: b.estimated_tokens,
            truncated: b.truncated,
        })
        .collect();
    info!(items = total_items, batches = batches.len(), "batch plan built");

    let plan = Plan {
        total_items,
        max_tokens_per_request: config.batch.max_tokens_per_request,
        max_batch_size: config.batch.max_batch_size,
        batches,
    };
    println!("{}", serde_json::to_string_pretty(&plan)?);
    Ok(())
}

fn cmd_config(args: &[String]) -> anyhow::Result<()> {
    let config = load_config(args)?;
    print!("{}", serde_yaml::to_string(&config)?);
    Ok(())
}
