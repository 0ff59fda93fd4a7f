//! # tags 子命令 CLI 定义
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/tags.rs`

use crate::cli::read::ReaderChoice;
use crate::parsers::cif::BlockSelector;
use clap::Args;
use std::path::PathBuf;

/// tags 子命令参数
#[derive(Args, Debug)]
pub struct TagsArgs {
    /// CIF file to read
    pub file: PathBuf,

    /// Block to print: 'all', an index (negative counts from the end) or a block name
    #[arg(short, long, default_value = "all", allow_hyphen_values = true)]
    pub block: BlockSelector,

    /// Parser backend
    #[arg(long, value_enum, default_value_t = ReaderChoice::Native)]
    pub reader: ReaderChoice,

    /// Print the tags as JSON
    #[arg(long, default_value_t = false)]
    pub json: bool,
}
