//! # CIF 文本的 Unicode 规范化
//!
//! CIF 用反斜杠转义表示希腊字母与重音字符（`\a` → α，`\'e` → é），
//! 用 `~2~`、`^3^` 表示上下标。读取时把整份文档先规范化，
//! 引号字符串在转换时再做一次上下标处理。
//!
//! ## 依赖关系
//! - 被 `parsers/cif/parse.rs` 和 `parsers/cif/value.rs` 调用
//! - 无外部模块依赖

use regex::{Captures, Regex};
use std::sync::LazyLock;

static SUBSCRIPT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"~([^~\n]+)~").unwrap());
static SUPERSCRIPT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\^([^\^\n]+)\^").unwrap());

/// 反斜杠转义表（不含前导 `\`），较长者在前
static ESCAPES: LazyLock<Vec<(&'static str, &'static str)>> = LazyLock::new(|| {
    let mut table: Vec<(&str, &str)> = vec![
        // 重音
        ("'a", "á"), ("'e", "é"), ("'i", "í"), ("'o", "ó"), ("'u", "ú"), ("'y", "ý"),
        ("'A", "Á"), ("'E", "É"), ("'I", "Í"), ("'O", "Ó"), ("'U", "Ú"), ("'Y", "Ý"),
        ("'c", "ć"), ("'n", "ń"), ("'s", "ś"), ("'z", "ź"),
        ("`a", "à"), ("`e", "è"), ("`i", "ì"), ("`o", "ò"), ("`u", "ù"),
        ("`A", "À"), ("`E", "È"), ("`I", "Ì"), ("`O", "Ò"), ("`U", "Ù"),
        ("^a", "â"), ("^e", "ê"), ("^i", "î"), ("^o", "ô"), ("^u", "û"),
        ("^A", "Â"), ("^E", "Ê"), ("^I", "Î"), ("^O", "Ô"), ("^U", "Û"),
        ("\"a", "ä"), ("\"e", "ë"), ("\"i", "ï"), ("\"o", "ö"), ("\"u", "ü"), ("\"y", "ÿ"),
        ("\"A", "Ä"), ("\"E", "Ë"), ("\"I", "Ï"), ("\"O", "Ö"), ("\"U", "Ü"),
        ("~a", "ã"), ("~n", "ñ"), ("~o", "õ"), ("~A", "Ã"), ("~N", "Ñ"), ("~O", "Õ"),
        (",c", "ç"), (",C", "Ç"),
        ("/o", "ø"), ("/O", "Ø"), ("&s", "ß"),
        ("%a", "å"), ("%A", "Å"), ("%", "°"),
        // 希腊字母
        ("a", "α"), ("b", "β"), ("c", "χ"), ("d", "δ"), ("e", "ε"), ("f", "φ"),
        ("g", "γ"), ("h", "η"), ("i", "ι"), ("k", "κ"), ("l", "λ"), ("m", "μ"),
        ("n", "ν"), ("o", "ο"), ("p", "π"), ("q", "θ"), ("r", "ρ"), ("s", "σ"),
        ("t", "τ"), ("u", "υ"), ("w", "ω"), ("x", "ξ"), ("y", "ψ"), ("z", "ζ"),
        ("A", "Α"), ("B", "Β"), ("C", "Χ"), ("D", "Δ"), ("E", "Ε"), ("F", "Φ"),
        ("G", "Γ"), ("H", "Η"), ("I", "Ι"), ("K", "Κ"), ("L", "Λ"), ("M", "Μ"),
        ("N", "Ν"), ("O", "Ο"), ("P", "Π"), ("Q", "Θ"), ("R", "Ρ"), ("S", "Σ"),
        ("T", "Τ"), ("U", "Υ"), ("W", "Ω"), ("X", "Ξ"), ("Y", "Ψ"), ("Z", "Ζ"),
    ];
    table.sort_by_key(|(pattern, _)| std::cmp::Reverse(pattern.len()));
    table
});

fn subscript_char(c: char) -> Option<char> {
    Some(match c {
        '0'..='9' => char::from_u32(0x2080 + (c as u32 - '0' as u32))?,
        '+' => '₊',
        '-' => '₋',
        '=' => '₌',
        '(' => '₍',
        ')' => '₎',
        'a' => 'ₐ',
        'e' => 'ₑ',
        'o' => 'ₒ',
        'x' => 'ₓ',
        'h' => 'ₕ',
        'k' => 'ₖ',
        'l' => 'ₗ',
        'm' => 'ₘ',
        'n' => 'ₙ',
        'p' => 'ₚ',
        's' => 'ₛ',
        't' => 'ₜ',
        _ => return None,
    })
}

fn superscript_char(c: char) -> Option<char> {
    Some(match c {
        '1' => '¹',
        '2' => '²',
        '3' => '³',
        '0' | '4'..='9' => char::from_u32(0x2070 + (c as u32 - '0' as u32))?,
        '+' => '⁺',
        '-' => '⁻',
        '=' => '⁼',
        '(' => '⁽',
        ')' => '⁾',
        'n' => 'ⁿ',
        'i' => 'ⁱ',
        _ => return None,
    })
}

/// 全部字符都能转换时才替换，否则原样保留整个匹配
fn replace_marked(text: &str, pattern: &Regex, map: fn(char) -> Option<char>) -> String {
    pattern
        .replace_all(text, |caps: &Captures| {
            caps[1]
                .chars()
                .map(map)
                .collect::<Option<String>>()
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// `~...~` → 下标，`^...^` → 上标
pub fn handle_subscripts(text: &str) -> String {
    if !text.contains('~') && !text.contains('^') {
        return text.to_string();
    }
    let text = replace_marked(text, &SUBSCRIPT, subscript_char);
    replace_marked(&text, &SUPERSCRIPT, superscript_char)
}

/// 替换反斜杠转义，再处理上下标
pub fn format_unicode(doc: &str) -> String {
    if !doc.contains('\\') {
        return handle_subscripts(doc);
    }

    let mut out = String::with_capacity(doc.len());
    let mut rest = doc;
    while let Some(pos) = rest.find('\\') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos + 1..];

        // `\\` 是字面反斜杠
        if let Some(after) = tail.strip_prefix('\\') {
            out.push_str("\\\\");
            rest = after;
            continue;
        }

        match ESCAPES.iter().find(|(pattern, _)| tail.starts_with(pattern)) {
            Some((pattern, replacement)) => {
                out.push_str(replacement);
                rest = &tail[pattern.len()..];
            }
            None => {
                out.push('\\');
                rest = tail;
            }
        }
    }
    out.push_str(rest);

    handle_subscripts(&out)
}
