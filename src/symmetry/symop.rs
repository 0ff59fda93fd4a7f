//! # 对称操作
//!
//! 解析 `x,y,z` 形式的对称操作（如 `-x+1/2, y, -z+1/2`），
//! 作用于分数坐标，并支持复合与按晶格平移取模比较。
//!
//! ## 依赖关系
//! - 被 `symmetry/spacegroup.rs` 和 `symmetry/expand.rs` 使用
//! - 无外部模块依赖

use crate::error::{CifError, Result};
use std::str::FromStr;

/// 平移比较时的分母：1/24 能精确表示 1/2、1/3、1/4、1/6、1/8
const TRANSLATION_GRID: f64 = 24.0;

/// 分数坐标下的对称操作 x' = R·x + t
#[derive(Debug, Clone, PartialEq)]
pub struct SymOp {
    pub rotation: [[f64; 3]; 3],
    pub translation: [f64; 3],
}

impl SymOp {
    pub fn identity() -> Self {
        SymOp {
            rotation: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
            translation: [0.0; 3],
        }
    }

    /// 纯平移操作
    pub fn translation(t: [f64; 3]) -> Self {
        SymOp {
            translation: t,
            ..SymOp::identity()
        }
    }

    /// 作用于分数坐标
    pub fn apply(&self, p: [f64; 3]) -> [f64; 3] {
        let r = &self.rotation;
        let t = &self.translation;
        [
            r[0][0] * p[0] + r[0][1] * p[1] + r[0][2] * p[2] + t[0],
            r[1][0] * p[0] + r[1][1] * p[1] + r[1][2] * p[2] + t[1],
            r[2][0] * p[0] + r[2][1] * p[1] + r[2][2] * p[2] + t[2],
        ]
    }

    /// 复合：先作用 `other`，再作用 `self`
    pub fn compose(&self, other: &SymOp) -> SymOp {
        let mut rotation = [[0.0; 3]; 3];
        for (i, row) in rotation.iter_mut().enumerate() {
            for (j, cell) in row.iter_mut().enumerate() {
                *cell = (0..3).map(|k| self.rotation[i][k] * other.rotation[k][j]).sum();
            }
        }
        let shifted = self.apply(other.translation);
        SymOp {
            rotation,
            translation: shifted.map(|x| x.rem_euclid(1.0)),
        }
    }

    /// 按晶格平移取模后的比较键
    pub fn key(&self) -> OpKey {
        let mut rot = [[0i32; 3]; 3];
        for i in 0..3 {
            for j in 0..3 {
                rot[i][j] = self.rotation[i][j].round() as i32;
            }
        }
        let trans = self
            .translation
            .map(|x| ((x * TRANSLATION_GRID).round() as i64).rem_euclid(TRANSLATION_GRID as i64) as i32);
        OpKey { rot, trans }
    }
}

/// 对称操作的离散化比较键
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OpKey {
    rot: [[i32; 3]; 3],
    trans: [i32; 3],
}

impl OpKey {
    /// 旋转部分
    pub fn rotation(&self) -> [[i32; 3]; 3] {
        self.rot
    }
}

fn chop_integer(s: &str) -> Option<(u32, &str)> {
    let len = s.chars().take_while(|c| c.is_ascii_digit()).count();
    if len == 0 {
        return None;
    }
    let value = s[..len].parse().ok()?;
    Some((value, &s[len..]))
}

/// 解析一个分量，如 `-x+1/2`、`x-y`、`0.5+z`，返回 [cx, cy, cz, t]
fn parse_component(op: &str, component: &str) -> Result<[f64; 4]> {
    let invalid = |reason: String| CifError::InvalidSymop {
        op: op.to_string(),
        reason,
    };

    let mut out = [0.0; 4];
    let cleaned = component.replace(' ', "").to_lowercase();
    let mut s = cleaned.as_str();
    if s.is_empty() {
        return Err(invalid("empty component".to_string()));
    }

    while !s.is_empty() {
        let sign = match s.as_bytes()[0] {
            b'-' => {
                s = &s[1..];
                -1.0
            }
            b'+' => {
                s = &s[1..];
                1.0
            }
            _ => 1.0,
        };

        // 系数：整数、分数或小数，可省略
        let coef = if let Some((num, rest)) = chop_integer(s) {
            s = rest;
            if let Some(rest) = s.strip_prefix('/') {
                let (den, rest) = chop_integer(rest).ok_or_else(|| {
                    invalid(format!("expected integer denominator in '{}'", component))
                })?;
                if den == 0 {
                    return Err(invalid("zero denominator".to_string()));
                }
                s = rest;
                num as f64 / den as f64
            } else if let Some(rest) = s.strip_prefix('.') {
                let len = rest.chars().take_while(|c| c.is_ascii_digit()).count();
                let text = format!("{}.{}", num, &rest[..len]);
                s = &rest[len..];
                text.parse::<f64>()
                    .map_err(|e| invalid(format!("bad number '{}': {}", text, e)))?
            } else {
                num as f64
            }
        } else {
            1.0
        };

        match s.chars().next() {
            Some(c @ 'x'..='z') => {
                let idx = (c as u8 - b'x') as usize;
                out[idx] += sign * coef;
                s = &s[1..];
            }
            Some('+') | Some('-') | None => out[3] += sign * coef,
            Some('*') => {
                // 形如 2*x
                s = &s[1..];
                match s.chars().next() {
                    Some(c @ 'x'..='z') => {
                        out[(c as u8 - b'x') as usize] += sign * coef;
                        s = &s[1..];
                    }
                    _ => return Err(invalid(format!("dangling '*' in '{}'", component))),
                }
            }
            Some(c) => {
                return Err(invalid(format!(
                    "invalid direction '{}', expected x, y, or z",
                    c
                )))
            }
        }
    }

    Ok(out)
}

impl FromStr for SymOp {
    type Err = CifError;

    fn from_str(s: &str) -> Result<Self> {
        // 有些文件给出 "1 x,y,z" 形式（序号在前）或带引号
        let body = s.trim().trim_matches(|c| c == '\'' || c == '"');
        let body = match body.split_once(char::is_whitespace) {
            Some((head, rest)) if head.chars().all(|c| c.is_ascii_digit()) => rest,
            _ => body,
        };

        let parts: Vec<&str> = body.split(',').collect();
        if parts.len() != 3 {
            return Err(CifError::InvalidSymop {
                op: s.to_string(),
                reason: format!("expected 3 components, found {}", parts.len()),
            });
        }

        let mut rotation = [[0.0; 3]; 3];
        let mut translation = [0.0; 3];
        for (row, part) in parts.iter().enumerate() {
            let [cx, cy, cz, t] = parse_component(s, part)?;
            rotation[row] = [cx, cy, cz];
            translation[row] = t;
        }

        Ok(SymOp {
            rotation,
            translation,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_identity() {
        let op: SymOp = "x,y,z".parse().unwrap();
        assert_eq!(op, SymOp::identity());
    }

    #[test]
    fn test_parse_with_fractions() {
        let op: SymOp = "x+1/3,-y+x,-3z".parse().unwrap();
        assert_eq!(
            op.rotation,
            [[1.0, 0.0, 0.0], [1.0, -1.0, 0.0], [0.0, 0.0, -3.0]]
        );
        assert!((op.translation[0] - 1.0 / 3.0).abs() < 1e-12);
        assert_eq!(op.translation[1], 0.0);
    }

    #[test]
    fn test_parse_translation_first_and_spaces() {
        let op: SymOp = "1/2+X, 1/2 - Y, z".parse().unwrap();
        assert_eq!(op.rotation[0], [1.0, 0.0, 0.0]);
        assert_eq!(op.rotation[1], [0.0, -1.0, 0.0]);
        assert_eq!(op.translation, [0.5, 0.5, 0.0]);
    }

    #[test]
    fn test_parse_decimal_and_numbered() {
        let op: SymOp = "2 -x+0.5,y,-z".parse().unwrap();
        assert_eq!(op.rotation[0], [-1.0, 0.0, 0.0]);
        assert_eq!(op.translation, [0.5, 0.0, 0.0]);
    }

    #[test]
    fn test_parse_errors() {
        assert!("x,y".parse::<SymOp>().is_err());
        assert!("x,y,w".parse::<SymOp>().is_err());
        assert!("x+1/,y,z".parse::<SymOp>().is_err());
    }

    #[test]
    fn test_apply_and_compose() {
        let inv: SymOp = "-x,-y,-z".parse().unwrap();
        let screw: SymOp = "-x,y+1/2,-z+1/2".parse().unwrap();

        let p = inv.apply([0.1, 0.2, 0.3]);
        assert_eq!(p, [-0.1, -0.2, -0.3]);

        // 先 screw 再 inv：x, -y-1/2, z-1/2 ≡ x, -y+1/2, z+1/2
        let glide = inv.compose(&screw);
        let expected: SymOp = "x,-y+1/2,z+1/2".parse().unwrap();
        assert_eq!(glide.key(), expected.key());
    }

    #[test]
    fn test_translation_composes_as_shift() {
        let screw: SymOp = "-y,x,z+1/4".parse().unwrap();
        let shifted = SymOp::translation([0.5, 0.5, 0.5]).compose(&screw);
        let expected: SymOp = "-y+1/2,x+1/2,z+3/4".parse().unwrap();
        assert_eq!(shifted.key(), expected.key());
        assert_eq!(shifted.key().rotation(), screw.key().rotation());
    }

    #[test]
    fn test_key_is_modulo_lattice() {
        let a: SymOp = "x+1,y,z-1/2".parse().unwrap();
        let b: SymOp = "x,y,z+1/2".parse().unwrap();
        assert_eq!(a.key(), b.key());
    }
}
