//! # cifkit - 晶体学信息文件 (CIF) 工具
//!
//! 读取 CIF 文件、按空间群展开不对称单元，并写回 CIF。
//!
//! ## 子命令
//! - `info` - 结构摘要与解析警告
//! - `tags` - 打印数据块的原始标签
//! - `convert` - 批量展开为 P1 CIF
//! - `export` - 位点导出为 CSV
//!
//! ## 依赖关系
//! ```text
//! main.rs
//!   ├── cli/        (命令行参数定义)
//!   ├── commands/   (命令执行逻辑)
//!   │     ├── parsers/cif/ (CIF 读写)
//!   │     ├── symmetry/    (空间群与对称展开)
//!   │     └── models/      (数据模型)
//!   ├── diagnostics.rs (警告通道)
//!   ├── utils/      (工具函数)
//!   └── error.rs    (错误处理)
//! ```

mod cli;
mod commands;
mod diagnostics;
mod error;
mod models;
mod parsers;
mod symmetry;
mod utils;

use clap::Parser;
use cli::Cli;

fn main() {
    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    let cli = Cli::parse();

    if let Err(e) = commands::run(cli.command) {
        utils::output::print_error(&format!("{}", e));
        std::process::exit(1);
    }
}
