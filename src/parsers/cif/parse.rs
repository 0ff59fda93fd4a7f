//! # CIF 文档解析
//!
//! 在 `LineStream` 上做递归下降：顶层逐个识别 `data_` 块，块内依次处理
//! 单值标签、分号包围的多行字符串与 `loop_` 表。
//!
//! 块按需产出（`CifBlocks` 是惰性迭代器），出错后迭代结束。
//!
//! ## 依赖关系
//! - 被 `parsers/cif/backend.rs` 和 `parsers/cif/mod.rs` 调用
//! - 使用 `parsers/cif/{lines, value, unicode, block}.rs`, `diagnostics.rs`

use crate::diagnostics::{CifWarning, Diagnostics};
use crate::error::{CifError, Result};
use crate::parsers::cif::block::CifBlock;
use crate::parsers::cif::lines::LineStream;
use crate::parsers::cif::unicode::format_unicode;
use crate::parsers::cif::value::{convert_value, TagMap, TagValue, Value};

use std::collections::HashMap;

/// CIF 2.0 文件的首行标记
const CIF2_MARKER: &str = "#\\#CIF_2.0";

/// 取下一行并去掉首尾空白；行已耗尽时返回空串（与空行同样处理）
fn next_trimmed(stream: &mut LineStream) -> String {
    stream
        .advance()
        .map(|l| l.trim().to_string())
        .unwrap_or_default()
}

fn starts_with_keyword(line: &str, keyword: &str) -> bool {
    line.get(..keyword.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(keyword))
}

// ─────────────────────────────────────────────────────────────
// 词法
// ─────────────────────────────────────────────────────────────

/// 按 CIF 规则切分 loop 数据行
///
/// 以引号开头的 token 延伸到后面紧跟空白（或行尾）的同种引号，
/// 引号保留给 `convert_value` 处理。
pub fn split_loop_row(line: &str, diag: &mut Diagnostics) -> Vec<String> {
    let mut tokens = Vec::new();
    let bytes = line.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i].is_ascii_whitespace() {
            i += 1;
            continue;
        }

        let start = i;
        let quote = bytes[i];
        if quote == b'\'' || quote == b'"' {
            let closing = (start + 1..bytes.len()).find(|&j| {
                bytes[j] == quote && bytes.get(j + 1).map_or(true, |b| b.is_ascii_whitespace())
            });
            match closing {
                Some(j) => {
                    tokens.push(line[start..=j].to_string());
                    i = j + 1;
                }
                None => {
                    diag.warn(CifWarning::UnterminatedQuote(line.to_string()));
                    tokens.push(line[start..].trim_end().to_string());
                    break;
                }
            }
        } else {
            while i < bytes.len() && !bytes[i].is_ascii_whitespace() {
                i += 1;
            }
            tokens.push(line[start..i].to_string());
        }
    }

    tokens
}

// ─────────────────────────────────────────────────────────────
// 语法单元
// ─────────────────────────────────────────────────────────────

/// 解析分号包围的多行字符串，`first` 为以 `;` 开头的首行
pub fn parse_multiline_string(stream: &mut LineStream, first: &str) -> Result<String> {
    let mut parts = vec![first.strip_prefix(';').unwrap_or(first).trim_start().to_string()];

    loop {
        let line = stream.advance().ok_or_else(|| CifError::UnexpectedEof {
            context: "a semicolon-delimited text field".to_string(),
        })?;
        if line.trim_start().starts_with(';') {
            break;
        }
        parts.push(line.trim_end().to_string());
    }

    Ok(parts.join("\n").trim().to_string())
}

/// 解析 `_key value` 或 `_key` 后跟下一行取值的单值标签
pub fn parse_singletag(
    stream: &mut LineStream,
    line: &str,
    diag: &mut Diagnostics,
) -> Result<(String, Value)> {
    if let Some((key, value)) = line.split_once(char::is_whitespace) {
        return Ok((key.to_string(), convert_value(value, diag)));
    }

    let key = line.to_string();
    let eof = || CifError::UnexpectedEof {
        context: format!("the value of {}", key),
    };

    let mut next = stream.advance().ok_or_else(eof)?;
    while next.trim().is_empty() || next.trim().starts_with('#') {
        next = stream.advance().ok_or_else(eof)?;
    }

    let next = next.trim();
    let raw = if next.starts_with(';') {
        parse_multiline_string(stream, next)?
    } else {
        next.to_string()
    };

    Ok((key, convert_value(&raw, diag)))
}

/// 解析 `loop_` 表，返回按表头顺序排列的 (标签, 列)
///
/// 表头中重复出现的标签只保留第一次出现的那一列，
/// 其余位置上的值被丢弃，各列长度始终相等。
pub fn parse_loop(
    stream: &mut LineStream,
    diag: &mut Diagnostics,
) -> Result<Vec<(String, Vec<Value>)>> {
    let mut header: Vec<String> = Vec::new();
    let mut line = next_trimmed(stream);

    while line.starts_with('_') {
        let mut tokens = line.split_whitespace();
        let tag = tokens.next().unwrap_or_default().to_lowercase();
        let rest: Vec<&str> = tokens.collect();
        header.push(tag);
        if rest.is_empty() {
            line = next_trimmed(stream);
        } else {
            // 表头行后面的 token 是第一行数据
            line = rest.join(" ");
            break;
        }
    }

    // 每个表头位置 -> 所属列
    let mut column_of: HashMap<&str, usize> = HashMap::new();
    let mut owners: Vec<Option<usize>> = Vec::with_capacity(header.len());
    let mut names: Vec<String> = Vec::new();
    let mut duplicates: Vec<String> = Vec::new();
    for tag in &header {
        if column_of.contains_key(tag.as_str()) {
            duplicates.push(tag.clone());
            owners.push(None);
        } else {
            column_of.insert(tag, names.len());
            owners.push(Some(names.len()));
            names.push(tag.clone());
        }
    }
    if !duplicates.is_empty() {
        diag.warn(CifWarning::DuplicateLoopTags(duplicates));
    }

    let mut columns: Vec<Vec<Value>> = vec![Vec::new(); names.len()];
    let mut tokens: Vec<String> = Vec::new();

    loop {
        if line.is_empty()
            || line.starts_with('_')
            || starts_with_keyword(&line, "data_")
            || starts_with_keyword(&line, "loop_")
        {
            break;
        }
        if line.starts_with('#') {
            line = next_trimmed(stream);
            continue;
        }

        let row = if line.starts_with(';') {
            vec![parse_multiline_string(stream, &line)?]
        } else if header.len() == 1 {
            vec![line.clone()]
        } else {
            split_loop_row(&line, diag)
        };
        line = next_trimmed(stream);

        tokens.extend(row);
        if tokens.len() < header.len() {
            continue;
        }
        if tokens.len() == header.len() {
            for (owner, token) in owners.iter().zip(&tokens) {
                let value = convert_value(token, diag);
                if let Some(idx) = owner {
                    columns[*idx].push(value);
                }
            }
        } else {
            diag.warn(CifWarning::WrongTokenCount(tokens.clone()));
        }
        tokens.clear();
    }

    if !tokens.is_empty() {
        diag.warn(CifWarning::WrongTokenCount(tokens));
    }
    if !line.is_empty() {
        stream.push_back(line);
    }

    Ok(names.into_iter().zip(columns).collect())
}

/// 解析块内所有条目，直到下一个 `data_` 或输入结束
pub fn parse_items(stream: &mut LineStream, diag: &mut Diagnostics) -> Result<TagMap> {
    let mut tags = TagMap::new();

    while let Some(raw) = stream.advance() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if line.starts_with('_') {
            let (key, value) = parse_singletag(stream, line, diag)?;
            tags.insert(key.to_lowercase(), TagValue::Single(value));
        } else if starts_with_keyword(line, "loop_") {
            for (key, column) in parse_loop(stream, diag)? {
                tags.insert(key, TagValue::Column(column));
            }
        } else if starts_with_keyword(line, "data_") {
            stream.push_back(line.to_string());
            break;
        } else if line.starts_with(';') {
            // 游离的文本字段，读掉但不保存
            parse_multiline_string(stream, line)?;
        } else {
            return Err(CifError::UnexpectedEntry {
                line: line.to_string(),
            });
        }
    }

    Ok(tags)
}

/// 解析一个数据块，`line` 为 `data_<name>` 行
pub fn parse_block(stream: &mut LineStream, line: &str, diag: &mut Diagnostics) -> Result<CifBlock> {
    let name = line
        .split_once('_')
        .map(|(_, name)| name.trim_end())
        .unwrap_or_default();
    let tags = parse_items(stream, diag)?;
    Ok(CifBlock::new(name, tags))
}

// ─────────────────────────────────────────────────────────────
// 文档
// ─────────────────────────────────────────────────────────────

/// 惰性的数据块迭代器
pub struct CifBlocks {
    stream: LineStream,
    leading: Vec<CifWarning>,
    failed: bool,
}

impl CifBlocks {
    /// 从已解码的文档文本创建
    pub fn new(text: &str) -> Self {
        let doc = format_unicode(text);
        let stream = LineStream::from_document(&doc);

        let mut leading = Vec::new();
        if stream.peek().is_some_and(|l| l.trim_end() == CIF2_MARKER) {
            leading.push(CifWarning::Cif2Detected);
        }

        CifBlocks {
            stream,
            leading,
            failed: false,
        }
    }
}

impl Iterator for CifBlocks {
    type Item = Result<CifBlock>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        loop {
            let raw = self.stream.advance()?;
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let mut diag = Diagnostics::new();
            diag.extend(self.leading.drain(..));

            let result = if starts_with_keyword(line, "data_") {
                parse_block(&mut self.stream, line, &mut diag).map(|mut block| {
                    block.warnings = diag.take();
                    block
                })
            } else {
                Err(CifError::UnexpectedEntry {
                    line: line.to_string(),
                })
            };

            if result.is_err() {
                self.failed = true;
            }
            return Some(result);
        }
    }
}

/// 解析 CIF 文本
pub fn parse_cif_str(text: &str) -> CifBlocks {
    CifBlocks::new(text)
}
