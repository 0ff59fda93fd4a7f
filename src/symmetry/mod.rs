//! # 对称性模块
//!
//! 空间群解析与不对称单元展开，供 CIF 结构物化使用。
//!
//! ## 依赖关系
//! - 被 `parsers/cif/block.rs` 使用
//! - 使用 `models/`, `diagnostics.rs`
//! - 子模块: symop, hall, tables, spacegroup, expand

pub mod expand;
pub mod hall;
pub mod spacegroup;
pub mod symop;
pub mod tables;

pub use expand::{expand, AsymmetricUnit};
pub use spacegroup::{BuiltinSpacegroups, Spacegroup, SpacegroupService};
