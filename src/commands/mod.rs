//! # 命令执行模块
//!
//! 实现各子命令的业务逻辑。
//!
//! ## 依赖关系
//! - 被 `main.rs` 调用
//! - 使用 `cli/`, `parsers/`, `models/`, `utils/`
//! - 子模块: info, tags, convert, export

pub mod convert;
pub mod export;
pub mod info;
pub mod tags;

use crate::cli::Commands;
use crate::diagnostics::Diagnostics;
use crate::error::Result;
use crate::utils::output;

/// 执行命令
pub fn run(cmd: Commands) -> Result<()> {
    match cmd {
        Commands::Info(args) => info::execute(args),
        Commands::Tags(args) => tags::execute(args),
        Commands::Convert(args) => convert::execute(args),
        Commands::Export(args) => export::execute(args),
    }
}

/// 打印收集到的警告
pub(crate) fn report_warnings(diag: &Diagnostics) {
    for warning in diag.warnings() {
        output::print_warning(&warning.to_string());
    }
}
