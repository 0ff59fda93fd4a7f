//! # info 子命令 CLI 定义
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/info.rs`

use crate::cli::read::ReadArgs;
use clap::Args;
use std::path::PathBuf;

/// info 子命令参数
#[derive(Args, Debug)]
pub struct InfoArgs {
    /// CIF file to read
    pub file: PathBuf,

    #[command(flatten)]
    pub read: ReadArgs,
}
