//! # CIF 值类型与转换
//!
//! 把原始 token 分类为字符串、整数或浮点数。分类顺序有意义：
//! 引号字符串 > 整数 > 浮点 > 带不确定度的浮点 `1.234(5)` >
//! 括号未闭合的浮点 `1.234(5`（警告）> 普通字符串。
//!
//! ## 依赖关系
//! - 被 `parsers/cif/parse.rs`、`block.rs`、`backend.rs` 使用
//! - 使用 `parsers/cif/unicode.rs`, `diagnostics.rs`

use crate::diagnostics::{CifWarning, Diagnostics};
use crate::parsers::cif::unicode::handle_subscripts;

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

static INTEGER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[+-]?\d+$").unwrap());
static FLOAT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[+-]?(?:\d+(?:\.\d*)?|\.\d+)(?:[eE][+-]?\d+)?$").unwrap());
static FLOAT_WITH_UNCERTAINTY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[+-]?(?:\d+(?:\.\d*)?|\.\d+)(?:[eE][+-]?\d+)?\(\d+\)$").unwrap()
});
static FLOAT_WITH_OPEN_UNCERTAINTY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[+-]?(?:\d+(?:\.\d*)?|\.\d+)(?:[eE][+-]?\d+)?\(\d+$").unwrap()
});

/// 单个 CIF 值
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Int(i64),
    Float(f64),
    Text(String),
}

impl Value {
    /// 数值视图：整数与浮点均可
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            Value::Text(_) => None,
        }
    }

    /// 整数视图：浮点值仅在恰为整数时可用，文本会尝试解析
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            Value::Float(v) if v.fract() == 0.0 => Some(*v as i64),
            Value::Float(_) => None,
            Value::Text(s) => s.trim().parse().ok(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{}", v),
            // Debug 形式总带小数点或指数，重新解析后仍是浮点
            Value::Float(v) => write!(f, "{:?}", v),
            Value::Text(s) => write!(f, "{}", s),
        }
    }
}

/// 标签的取值：单值，或 `loop_` 中的一列
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TagValue {
    Single(Value),
    Column(Vec<Value>),
}

impl TagValue {
    /// 统一按列查看，单值视作长度为 1 的列
    pub fn values(&self) -> &[Value] {
        match self {
            TagValue::Single(v) => std::slice::from_ref(v),
            TagValue::Column(col) => col,
        }
    }

    pub fn as_single(&self) -> Option<&Value> {
        match self {
            TagValue::Single(v) => Some(v),
            TagValue::Column(col) if col.len() == 1 => col.first(),
            TagValue::Column(_) => None,
        }
    }
}

impl fmt::Display for TagValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TagValue::Single(v) => write!(f, "{}", v),
            TagValue::Column(col) => {
                let items: Vec<String> = col.iter().map(|v| v.to_string()).collect();
                write!(f, "[{}]", items.join(", "))
            }
        }
    }
}

/// 小写标签名 -> 值
pub type TagMap = BTreeMap<String, TagValue>;

/// 截掉 `(` 及其后的不确定度
fn strip_uncertainty(value: &str) -> Option<f64> {
    let head = value.split('(').next()?;
    head.parse().ok()
}

/// 把 CIF 原始 token 转换为对应类型
pub fn convert_value(raw: &str, diag: &mut Diagnostics) -> Value {
    let value = raw.trim();

    let quoted = value.len() >= 2
        && ((value.starts_with('\'') && value.ends_with('\''))
            || (value.starts_with('"') && value.ends_with('"')));

    if quoted {
        return Value::Text(handle_subscripts(&value[1..value.len() - 1]));
    }

    if INTEGER.is_match(value) {
        // 超出 i64 的整数退化为浮点
        if let Ok(v) = value.parse::<i64>() {
            return Value::Int(v);
        }
        if let Ok(v) = value.parse::<f64>() {
            return Value::Float(v);
        }
    }

    if FLOAT.is_match(value) {
        if let Ok(v) = value.parse::<f64>() {
            return Value::Float(v);
        }
    }

    if FLOAT_WITH_UNCERTAINTY.is_match(value) {
        if let Some(v) = strip_uncertainty(value) {
            return Value::Float(v);
        }
    }

    if FLOAT_WITH_OPEN_UNCERTAINTY.is_match(value) {
        if let Some(v) = strip_uncertainty(value) {
            diag.warn(CifWarning::BadlyFormedNumber(value.to_string()));
            return Value::Float(v);
        }
    }

    Value::Text(handle_subscripts(value))
}
