//! # 数据模型模块
//!
//! 定义统一的晶体结构表示和元素数据。
//!
//! ## 依赖关系
//! - 被 `parsers/`、`symmetry/` 和 `commands/` 使用
//! - 子模块: structure, element

pub mod element;
pub mod structure;

pub use structure::{Atom, Crystal, Lattice, OccupancyMap, SpacegroupInfo};
