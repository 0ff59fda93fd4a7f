//! # 解析器模块
//!
//! 结构文件的读写入口。目前只有 CIF 一种格式。
//!
//! ## 依赖关系
//! - 被 `commands/` 模块使用
//! - 使用 `models/` 数据模型
//! - 子模块: cif

pub mod cif;

use crate::diagnostics::Diagnostics;
use crate::error::{CifError, Result};
use crate::models::Crystal;
use std::path::Path;

/// 从文件路径推断格式并解析
pub fn parse_structure_file(
    path: &Path,
    options: &cif::ReadOptions,
    selector: &cif::BlockSelector,
    diag: &mut Diagnostics,
) -> Result<Vec<Crystal>> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|s| s.to_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "cif" | "mmcif" => cif::read_cif(path, options, selector, diag),
        _ => Err(CifError::InvalidArgument(format!(
            "Cannot determine format for: {}",
            path.display()
        ))),
    }
}
