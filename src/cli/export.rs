//! # export 子命令 CLI 定义
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/export.rs`

use crate::cli::read::ReadArgs;
use clap::Args;
use std::path::PathBuf;

/// export 子命令参数
#[derive(Args, Debug)]
pub struct ExportArgs {
    /// CIF file to read
    pub file: PathBuf,

    /// Output CSV file
    #[arg(short, long, default_value = "sites.csv")]
    pub output: PathBuf,

    #[command(flatten)]
    pub read: ReadArgs,
}
