//! # 统一错误处理模块
//!
//! 定义 cifkit 的所有错误类型，使用 `thiserror` 派生。
//! 只会产生警告的情况不在这里，见 `diagnostics.rs`。
//!
//! ## 依赖关系
//! - 被所有其他模块使用
//! - 无外部模块依赖

use thiserror::Error;

/// cifkit 统一错误类型
#[derive(Error, Debug)]
pub enum CifError {
    // ─────────────────────────────────────────────────────────────
    // I/O 错误
    // ─────────────────────────────────────────────────────────────
    #[error("Failed to read file: {path}")]
    FileReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file: {path}")]
    FileWriteError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Directory not found: {path}")]
    DirectoryNotFound { path: String },

    #[error("File not found: {path}")]
    FileNotFound { path: String },

    // ─────────────────────────────────────────────────────────────
    // 语法错误
    // ─────────────────────────────────────────────────────────────
    #[error("Unexpected CIF file entry: \"{line}\"")]
    UnexpectedEntry { line: String },

    #[error("Unexpected end of file while reading {context}")]
    UnexpectedEof { context: String },

    // ─────────────────────────────────────────────────────────────
    // 数据错误
    // ─────────────────────────────────────────────────────────────
    #[error("No positions found in structure '{block}'")]
    NoPositions { block: String },

    #[error("Structure '{block}' has fractional coordinates but not lattice parameters")]
    MissingCell { block: String },

    #[error("Space group number {declared} does not match the symmetry operations (space group {derived})")]
    SpacegroupMismatch { declared: u16, derived: u16 },

    #[error("Spacegroup setting must be 1 or 2, not {0}")]
    InvalidSetting(i64),

    #[error("Spacegroup setting {requested} does not match the symmetry operations (setting {derived} of space group {number})")]
    SettingMismatch { requested: u8, derived: u8, number: u16 },

    #[error("Unknown space group: {0}")]
    UnknownSpacegroup(String),

    #[error("Invalid Hall symbol '{symbol}': {reason}")]
    InvalidHallSymbol { symbol: String, reason: String },

    #[error("Invalid symmetry operation '{op}': {reason}")]
    InvalidSymop { op: String, reason: String },

    #[error("Invalid value for tag '{tag}': {reason}")]
    InvalidTag { tag: String, reason: String },

    #[error("Invalid data in block '{block}': {reason}")]
    InvalidData { block: String, reason: String },

    // ─────────────────────────────────────────────────────────────
    // 配置错误
    // ─────────────────────────────────────────────────────────────
    #[error(
        "Primitive cell cannot be determined when sublattice translations are included \
         in the symmetry operations listed in the CIF file"
    )]
    PrimitiveWithSubtrans,

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    // ─────────────────────────────────────────────────────────────
    // 外部后端错误
    // ─────────────────────────────────────────────────────────────
    #[error("CIF reader '{backend}' is unavailable: '{command}' not found in PATH")]
    DependencyUnavailable { backend: String, command: String },

    #[error("External command failed: {command}\n{stderr}")]
    CommandFailed { command: String, stderr: String },

    #[error("Malformed output from CIF reader '{backend}': {reason}")]
    BackendOutput { backend: String, reason: String },

    // ─────────────────────────────────────────────────────────────
    // 输出错误
    // ─────────────────────────────────────────────────────────────
    #[error("Character '{ch}' cannot be encoded as latin-1")]
    Encoding { ch: char },

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    // ─────────────────────────────────────────────────────────────
    // 其他
    // ─────────────────────────────────────────────────────────────
    #[error("No data block matches '{0}'")]
    BlockNotFound(String),

    #[error("No matching files found with pattern: {pattern}")]
    NoFilesFound { pattern: String },
}

/// Result 类型别名
pub type Result<T> = std::result::Result<T, CifError>;
