//! # CIF 引擎
//!
//! 读取方向：字节 -> latin-1 解码 -> Unicode 规范化 -> 行游标 ->
//! 数据块 -> 结构物化。写出方向：`Crystal` -> CIF 文本。
//!
//! ## 子模块
//! - `value`: 原始 token 的类型判定与转换
//! - `unicode`: 反斜杠转义与上下标
//! - `lines`: 行游标
//! - `parse`: 标签、多行字符串、`loop_` 与数据块解析
//! - `block`: `CifBlock` 与结构物化
//! - `backend`: 内置与外部 (`cif2json`) 读取后端
//! - `writer`: CIF 写出
//!
//! ## 依赖关系
//! - 被 `commands/` 使用
//! - 使用 `models/`, `symmetry/`, `diagnostics.rs`

pub mod backend;
pub mod block;
pub mod lines;
pub mod parse;
pub mod unicode;
pub mod value;
pub mod writer;

pub use backend::{BlockIter, CifBackend, ReaderKind};
pub use block::{CifBlock, ReadOptions};
pub use value::TagMap;
pub use writer::{write_cif_file, CifFormat, WriteOptions};

use crate::diagnostics::Diagnostics;
use crate::error::{CifError, Result};
use crate::models::Crystal;

use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// 选择要读取的数据块
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum BlockSelector {
    #[default]
    All,
    /// 序号，负数从末尾数起
    Index(isize),
    /// 按 `data_` 名称
    Name(String),
}

impl FromStr for BlockSelector {
    type Err = CifError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(CifError::InvalidArgument("empty block selector".to_string()));
        }
        if s.eq_ignore_ascii_case("all") || s == ":" {
            return Ok(BlockSelector::All);
        }
        Ok(match s.parse::<isize>() {
            Ok(index) => BlockSelector::Index(index),
            Err(_) => BlockSelector::Name(s.to_string()),
        })
    }
}

impl fmt::Display for BlockSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockSelector::All => write!(f, "all"),
            BlockSelector::Index(i) => write!(f, "{}", i),
            BlockSelector::Name(name) => write!(f, "{}", name),
        }
    }
}

/// 按选择器挑出数据块；只解析到能确定结果为止
pub fn select_blocks<I>(blocks: I, selector: &BlockSelector) -> Result<Vec<CifBlock>>
where
    I: Iterator<Item = Result<CifBlock>>,
{
    match selector {
        BlockSelector::All => blocks.collect(),
        BlockSelector::Index(index) if *index >= 0 => {
            for (i, block) in blocks.enumerate() {
                let block = block?;
                if i == *index as usize {
                    return Ok(vec![block]);
                }
            }
            Err(CifError::BlockNotFound(selector.to_string()))
        }
        BlockSelector::Index(index) => {
            let mut all: Vec<CifBlock> = blocks.collect::<Result<_>>()?;
            let back = index.unsigned_abs();
            if back > all.len() {
                return Err(CifError::BlockNotFound(selector.to_string()));
            }
            Ok(vec![all.swap_remove(all.len() - back)])
        }
        BlockSelector::Name(name) => {
            for block in blocks {
                let block = block?;
                if block.name == *name {
                    return Ok(vec![block]);
                }
            }
            Err(CifError::BlockNotFound(name.clone()))
        }
    }
}

/// 用选定的后端解析文件
pub fn parse_cif(path: &Path, reader: ReaderKind) -> Result<BlockIter> {
    reader.backend().blocks(path)
}

/// 读取文件中选定数据块的原始标签
pub fn read_blocks(path: &Path, reader: ReaderKind, selector: &BlockSelector) -> Result<Vec<CifBlock>> {
    select_blocks(parse_cif(path, reader)?, selector)
}

fn materialize(blocks: Vec<CifBlock>, options: &ReadOptions, diag: &mut Diagnostics) -> Result<Vec<Crystal>> {
    blocks
        .into_iter()
        .map(|block| {
            diag.extend(block.warnings.iter().cloned());
            block.to_crystal(options, diag)
        })
        .collect()
}

/// 读取 CIF 文件并构建结构
pub fn read_cif(
    path: &Path,
    options: &ReadOptions,
    selector: &BlockSelector,
    diag: &mut Diagnostics,
) -> Result<Vec<Crystal>> {
    options.validate()?;
    let blocks = read_blocks(path, options.reader, selector)?;
    materialize(blocks, options, diag)
}
