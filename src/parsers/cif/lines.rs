//! # 行游标
//!
//! 在不可变的行序列上维护一个下标，外加一行回退缓冲。
//! 解析器靠 `peek` 决定是否消费下一行，用 `push_back` 把
//! 终止 loop 的那一行还回去。
//!
//! ## 依赖关系
//! - 被 `parsers/cif/parse.rs` 使用
//! - 无外部模块依赖

/// 输入行游标
#[derive(Debug, Clone)]
pub struct LineStream {
    lines: Vec<String>,
    cursor: usize,
    pending: Option<String>,
}

impl LineStream {
    /// 按 `\n` 切分文档并丢弃空行
    pub fn from_document(doc: &str) -> Self {
        let lines = doc
            .split('\n')
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect();
        Self::new(lines)
    }

    pub fn new(lines: Vec<String>) -> Self {
        LineStream {
            lines,
            cursor: 0,
            pending: None,
        }
    }

    /// 取出下一行
    pub fn advance(&mut self) -> Option<String> {
        if let Some(line) = self.pending.take() {
            return Some(line);
        }
        let line = self.lines.get(self.cursor)?.clone();
        self.cursor += 1;
        Some(line)
    }

    /// 查看下一行但不消费
    pub fn peek(&self) -> Option<&str> {
        self.pending
            .as_deref()
            .or_else(|| self.lines.get(self.cursor).map(String::as_str))
    }

    /// 退回一行，最多一行
    pub fn push_back(&mut self, line: String) {
        debug_assert!(self.pending.is_none(), "only one line of lookahead");
        self.pending = Some(line);
    }
}
