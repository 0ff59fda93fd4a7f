//! # CLI 模块
//!
//! 使用 `clap` 定义命令行参数和子命令。
//!
//! ## 命令结构
//! - `info`: 读取 CIF 并打印结构摘要与警告
//! - `tags`: 打印数据块的原始标签
//! - `convert`: 批量展开为 P1 CIF
//! - `export`: 导出每个位点到 CSV
//!
//! ## 依赖关系
//! - 被 `main.rs` 使用
//! - 子模块: read, info, tags, convert, export

pub mod convert;
pub mod export;
pub mod info;
pub mod read;
pub mod tags;

use clap::{Parser, Subcommand};

/// cifkit - 晶体学信息文件 (CIF) 工具
#[derive(Parser)]
#[command(name = "cifkit")]
#[command(author = "Changjiang Wu")]
#[command(version)]
#[command(about = "Read, symmetry-expand and write Crystallographic Information Files", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// 可用的子命令
#[derive(Subcommand)]
pub enum Commands {
    /// Summarize the structures stored in a CIF file
    Info(info::InfoArgs),

    /// Print the raw tags of a data block
    Tags(tags::TagsArgs),

    /// Re-emit CIF files as symmetry-expanded P1 CIF
    Convert(convert::ConvertArgs),

    /// Export every site of a structure to CSV
    Export(export::ExportArgs),
}
