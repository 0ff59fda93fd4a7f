//! # convert 子命令 CLI 定义
//!
//! 批量把 CIF 文件展开为 P1 CIF
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/convert.rs`

use crate::cli::read::{FormatChoice, ReadArgs};
use clap::Args;
use std::path::PathBuf;

/// convert 子命令参数
#[derive(Args, Debug)]
pub struct ConvertArgs {
    /// Input directory containing CIF files
    #[arg(short, long)]
    pub input: PathBuf,

    /// Output directory for converted files
    #[arg(short, long)]
    pub output: PathBuf,

    /// Recurse into subdirectories
    #[arg(short, long, default_value_t = false)]
    pub recursive: bool,

    /// Glob pattern for input files
    #[arg(short, long, default_value = "*.cif")]
    pub pattern: String,

    /// Number of parallel jobs (0 = auto)
    #[arg(short, long, default_value_t = 0)]
    pub jobs: usize,

    /// Output layout
    #[arg(long, value_enum, default_value_t = FormatChoice::Default)]
    pub format: FormatChoice,

    /// Keep fractional coordinates outside [0, 1)
    #[arg(long, default_value_t = false)]
    pub no_wrap: bool,

    /// Overwrite existing output files
    #[arg(long, default_value_t = false)]
    pub overwrite: bool,

    #[command(flatten)]
    pub read: ReadArgs,
}
