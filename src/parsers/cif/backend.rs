//! # CIF 读取后端
//!
//! 两种实现同一能力（“把文件解析成一串具名标签映射”）的策略：
//! - `NativeBackend`: 内置解析器，按 latin-1 解码后惰性解析
//! - `CodcifBackend`: 调用 COD 工具 `cif2json`，把其 JSON 输出规整成 `CifBlock`
//!
//! ## 依赖关系
//! - 被 `parsers/cif/mod.rs` 调用
//! - 使用 `parsers/cif/{parse, value, block}.rs`
//! - 使用 `serde_json` 解析外部工具输出

use crate::diagnostics::Diagnostics;
use crate::error::{CifError, Result};
use crate::parsers::cif::block::CifBlock;
use crate::parsers::cif::parse::parse_cif_str;
use crate::parsers::cif::value::{convert_value, TagMap, TagValue};

use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::process::Command;

/// 数据块迭代器
pub type BlockIter = Box<dyn Iterator<Item = Result<CifBlock>>>;

/// 读取后端
pub trait CifBackend {
    fn name(&self) -> &'static str;

    /// 解析文件，按顺序产出数据块
    fn blocks(&self, path: &Path) -> Result<BlockIter>;
}

/// 后端选择
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReaderKind {
    #[default]
    Native,
    Codcif,
}

impl ReaderKind {
    pub fn backend(&self) -> Box<dyn CifBackend> {
        match self {
            ReaderKind::Native => Box::new(NativeBackend),
            ReaderKind::Codcif => Box::new(CodcifBackend::default()),
        }
    }
}

/// 按 latin-1 解码：每个字节对应同值的码位
pub fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

// ─────────────────────────────────────────────────────────────
// 内置解析器
// ─────────────────────────────────────────────────────────────

#[derive(Debug, Default, Clone, Copy)]
pub struct NativeBackend;

impl CifBackend for NativeBackend {
    fn name(&self) -> &'static str {
        "native"
    }

    fn blocks(&self, path: &Path) -> Result<BlockIter> {
        let bytes = fs::read(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => CifError::FileNotFound {
                path: path.display().to_string(),
            },
            _ => CifError::FileReadError {
                path: path.display().to_string(),
                source: e,
            },
        })?;

        Ok(Box::new(parse_cif_str(&decode_latin1(&bytes))))
    }
}

// ─────────────────────────────────────────────────────────────
// COD 工具
// ─────────────────────────────────────────────────────────────

/// 外部 `cif2json` 调用
#[derive(Debug, Clone)]
pub struct CodcifBackend {
    pub command: String,
}

impl Default for CodcifBackend {
    fn default() -> Self {
        CodcifBackend {
            command: "cif2json".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CodDatablock {
    name: String,
    #[serde(default)]
    values: BTreeMap<String, Vec<String>>,
}

impl CodcifBackend {
    /// 把 `cif2json` 的输出转换成数据块
    pub fn parse_output(&self, json: &str) -> Result<Vec<CifBlock>> {
        let datablocks: Vec<CodDatablock> =
            serde_json::from_str(json).map_err(|e| CifError::BackendOutput {
                backend: self.name().to_string(),
                reason: e.to_string(),
            })?;

        Ok(datablocks
            .into_iter()
            .map(|datablock| {
                let mut diag = Diagnostics::new();
                let tags: TagMap = datablock
                    .values
                    .into_iter()
                    .map(|(tag, raw)| {
                        let mut values: Vec<_> =
                            raw.iter().map(|v| convert_value(v, &mut diag)).collect();
                        let value = if values.len() == 1 {
                            TagValue::Single(values.remove(0))
                        } else {
                            TagValue::Column(values)
                        };
                        (tag.to_lowercase(), value)
                    })
                    .collect();

                let mut block = CifBlock::new(datablock.name, tags);
                block.warnings = diag.take();
                block
            })
            .collect())
    }
}

impl CifBackend for CodcifBackend {
    fn name(&self) -> &'static str {
        "codcif"
    }

    fn blocks(&self, path: &Path) -> Result<BlockIter> {
        if !path.exists() {
            return Err(CifError::FileNotFound {
                path: path.display().to_string(),
            });
        }

        let output = Command::new(&self.command)
            .arg(path)
            .output()
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => CifError::DependencyUnavailable {
                    backend: self.name().to_string(),
                    command: self.command.clone(),
                },
                _ => CifError::CommandFailed {
                    command: self.command.clone(),
                    stderr: e.to_string(),
                },
            })?;

        if !output.status.success() {
            return Err(CifError::CommandFailed {
                command: format!("{} {}", self.command, path.display()),
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            });
        }

        let blocks = self.parse_output(&String::from_utf8_lossy(&output.stdout))?;
        Ok(Box::new(blocks.into_iter().map(Ok)))
    }
}
