//! # 读取相关的共享参数
//!
//! `info`、`convert`、`export` 共用同一组读取选项。
//!
//! ## 依赖关系
//! - 被 `cli/` 各子命令通过 `#[command(flatten)]` 引用
//! - 转换为 `parsers/cif` 的 `ReadOptions` / `BlockSelector`

use crate::parsers::cif::{BlockSelector, CifFormat, ReadOptions, ReaderKind};
use clap::{Args, ValueEnum};

/// 读取后端
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq, Default)]
pub enum ReaderChoice {
    /// Built-in parser
    #[default]
    Native,
    /// External COD `cif2json` tool
    Codcif,
}

impl From<ReaderChoice> for ReaderKind {
    fn from(choice: ReaderChoice) -> Self {
        match choice {
            ReaderChoice::Native => ReaderKind::Native,
            ReaderChoice::Codcif => ReaderKind::Codcif,
        }
    }
}

/// 写出布局
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq, Default)]
pub enum FormatChoice {
    /// Plain layout
    #[default]
    Default,
    /// Materials Project layout with formula tags
    Mp,
}

impl From<FormatChoice> for CifFormat {
    fn from(choice: FormatChoice) -> Self {
        match choice {
            FormatChoice::Default => CifFormat::Default,
            FormatChoice::Mp => CifFormat::Mp,
        }
    }
}

impl std::fmt::Display for FormatChoice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FormatChoice::Default => write!(f, "default"),
            FormatChoice::Mp => write!(f, "mp"),
        }
    }
}

/// 共享读取参数
#[derive(Args, Debug, Clone)]
pub struct ReadArgs {
    /// Parser backend
    #[arg(long, value_enum, default_value_t = ReaderChoice::Native)]
    pub reader: ReaderChoice,

    /// Keep every raw tag on the resulting structure
    #[arg(long, default_value_t = false)]
    pub store_tags: bool,

    /// Reduce rhombohedral/centered cells to the primitive cell (implies --no-subtrans)
    #[arg(long, default_value_t = false)]
    pub primitive: bool,

    /// Symmetry operations in the file do not include centering translations
    #[arg(long, default_value_t = false)]
    pub no_subtrans: bool,

    /// Ignore _atom_site_occupancy
    #[arg(long, default_value_t = false)]
    pub no_occupancies: bool,

    /// Block to read: 'all', an index (negative counts from the end) or a block name
    #[arg(short, long, default_value = "all", allow_hyphen_values = true)]
    pub block: BlockSelector,
}

impl ReadArgs {
    pub fn options(&self) -> ReadOptions {
        ReadOptions {
            store_tags: self.store_tags,
            primitive_cell: self.primitive,
            subtrans_included: !(self.no_subtrans || self.primitive),
            fractional_occupancies: !self.no_occupancies,
            reader: self.reader.into(),
        }
    }
}
