//! # tags 命令实现
//!
//! 打印数据块的原始标签映射（不构建结构）。
//!
//! ## 依赖关系
//! - 使用 `cli/tags.rs` 定义的参数
//! - 使用 `parsers/cif`
//! - 使用 `serde_json` 输出 JSON

use crate::cli::tags::TagsArgs;
use crate::error::{CifError, Result};
use crate::parsers::cif::{self, CifBlock, TagMap};
use crate::utils::output;

use serde::Serialize;
use tabled::{Table, Tabled};

#[derive(Debug, Clone, Tabled)]
struct TagRow {
    #[tabled(rename = "Tag")]
    tag: String,
    #[tabled(rename = "Value")]
    value: String,
}

#[derive(Serialize)]
struct BlockDump<'a> {
    name: &'a str,
    tags: &'a TagMap,
}

/// 执行 tags 命令
pub fn execute(args: TagsArgs) -> Result<()> {
    let blocks = cif::read_blocks(&args.file, args.reader.into(), &args.block)?;

    if args.json {
        println!("{}", to_json(&blocks)?);
        return Ok(());
    }

    for block in &blocks {
        output::print_header(&format!("data_{}", block.name));
        let rows: Vec<TagRow> = block
            .tags
            .iter()
            .map(|(tag, value)| TagRow {
                tag: tag.clone(),
                value: value.to_string(),
            })
            .collect();
        println!("{}", Table::new(&rows));

        for warning in &block.warnings {
            output::print_warning(&warning.to_string());
        }
    }

    Ok(())
}

/// 把数据块序列化为 JSON 数组
fn to_json(blocks: &[CifBlock]) -> Result<String> {
    let dump: Vec<BlockDump> = blocks
        .iter()
        .map(|b| BlockDump {
            name: &b.name,
            tags: &b.tags,
        })
        .collect();

    serde_json::to_string_pretty(&dump).map_err(|e| CifError::InvalidData {
        block: blocks.first().map(|b| b.name.clone()).unwrap_or_default(),
        reason: e.to_string(),
    })
}
