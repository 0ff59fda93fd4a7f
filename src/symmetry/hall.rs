//! # Hall 符号
//!
//! 把 Hall 空间群符号（如 `-P 2ac 2n`、`P 31 2c (0 0 1)`）展开为
//! 格心类型与生成元。空间群目录的每个设置都以 Hall 符号给出。
//!
//! 符号结构：`[-]L` 格心字母，随后是若干 `[-]N[轴][平移]` 矩阵符号，
//! 末尾可带以 1/12 为单位的原点平移 `(a b c)`。
//!
//! ## 依赖关系
//! - 被 `symmetry/spacegroup.rs` 使用
//! - 使用 `symmetry/symop.rs`

use crate::error::{CifError, Result};
use crate::symmetry::spacegroup::Centering;
use crate::symmetry::symop::SymOp;

use std::str::FromStr;

type Matrix = [[f64; 3]; 3];

/// 旋转轴方向
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    X,
    Y,
    Z,
    /// `'`：垂直于主轴的面对角线 a-b 方向
    Prime,
    /// `"`：垂直于主轴的面对角线 a+b 方向
    DoublePrime,
    /// `*`：体对角线 [111]
    Diagonal,
}

impl Axis {
    fn from_char(c: char) -> Option<Self> {
        match c {
            'x' => Some(Axis::X),
            'y' => Some(Axis::Y),
            'z' => Some(Axis::Z),
            '\'' => Some(Axis::Prime),
            '"' => Some(Axis::DoublePrime),
            '*' => Some(Axis::Diagonal),
            _ => None,
        }
    }

    /// 螺旋平移所沿的晶轴
    fn index(&self) -> Option<usize> {
        match self {
            Axis::X => Some(0),
            Axis::Y => Some(1),
            Axis::Z => Some(2),
            _ => None,
        }
    }
}

/// 展开后的 Hall 符号
#[derive(Debug, Clone)]
pub struct HallSymbol {
    pub centering: Centering,
    /// 不含格心平移的生成元（已作原点平移）
    pub generators: Vec<SymOp>,
}

impl HallSymbol {
    /// 生成元加上格心平移，闭包即为完整空间群
    pub fn generators_with_centering(&self) -> Vec<SymOp> {
        let mut all = self.generators.clone();
        all.extend(
            self.centering
                .subtrans()
                .into_iter()
                .skip(1)
                .map(SymOp::translation),
        );
        all
    }
}

fn rotation(order: u8, axis: Axis, principal: Axis) -> Option<Matrix> {
    let m = |rows: [[i8; 3]; 3]| rows.map(|r| r.map(f64::from));
    let matrix = match (order, axis, principal) {
        (1, _, _) => m([[1, 0, 0], [0, 1, 0], [0, 0, 1]]),
        (2, Axis::Z, _) => m([[-1, 0, 0], [0, -1, 0], [0, 0, 1]]),
        (3, Axis::Z, _) => m([[0, -1, 0], [1, -1, 0], [0, 0, 1]]),
        (4, Axis::Z, _) => m([[0, -1, 0], [1, 0, 0], [0, 0, 1]]),
        (6, Axis::Z, _) => m([[1, -1, 0], [1, 0, 0], [0, 0, 1]]),
        (2, Axis::X, _) => m([[1, 0, 0], [0, -1, 0], [0, 0, -1]]),
        (3, Axis::X, _) => m([[1, 0, 0], [0, 0, -1], [0, 1, -1]]),
        (4, Axis::X, _) => m([[1, 0, 0], [0, 0, -1], [0, 1, 0]]),
        (6, Axis::X, _) => m([[1, 0, 0], [0, 1, -1], [0, 1, 0]]),
        (2, Axis::Y, _) => m([[-1, 0, 0], [0, 1, 0], [0, 0, -1]]),
        (3, Axis::Y, _) => m([[-1, 0, 1], [0, 1, 0], [-1, 0, 0]]),
        (4, Axis::Y, _) => m([[0, 0, 1], [0, 1, 0], [-1, 0, 0]]),
        (6, Axis::Y, _) => m([[0, 0, 1], [0, 1, 0], [-1, 0, 1]]),
        (2, Axis::Prime, Axis::Z) => m([[0, -1, 0], [-1, 0, 0], [0, 0, -1]]),
        (2, Axis::DoublePrime, Axis::Z) => m([[0, 1, 0], [1, 0, 0], [0, 0, -1]]),
        (2, Axis::Prime, Axis::X) => m([[-1, 0, 0], [0, 0, -1], [0, -1, 0]]),
        (2, Axis::DoublePrime, Axis::X) => m([[-1, 0, 0], [0, 0, 1], [0, 1, 0]]),
        (2, Axis::Prime, Axis::Y) => m([[0, 0, -1], [0, -1, 0], [-1, 0, 0]]),
        (2, Axis::DoublePrime, Axis::Y) => m([[0, 0, 1], [0, -1, 0], [1, 0, 0]]),
        (3, Axis::Diagonal, _) => m([[0, 0, 1], [1, 0, 0], [0, 1, 0]]),
        _ => return None,
    };
    Some(matrix)
}

fn translation_letter(c: char) -> Option<[f64; 3]> {
    const H: f64 = 0.5;
    const Q: f64 = 0.25;
    match c {
        'a' => Some([H, 0.0, 0.0]),
        'b' => Some([0.0, H, 0.0]),
        'c' => Some([0.0, 0.0, H]),
        'n' => Some([H, H, H]),
        'u' => Some([Q, 0.0, 0.0]),
        'v' => Some([0.0, Q, 0.0]),
        'w' => Some([0.0, 0.0, Q]),
        'd' => Some([Q, Q, Q]),
        _ => None,
    }
}

/// 省略轴时的默认方向
fn default_axis(order: u8, position: usize, previous: Option<u8>) -> Option<Axis> {
    match (position, order, previous) {
        (_, 1, _) | (0, _, _) => Some(Axis::Z),
        (1, 2, Some(2 | 4)) => Some(Axis::X),
        (1, 2, Some(3 | 6)) => Some(Axis::Prime),
        (1 | 2, 3, _) => Some(Axis::Diagonal),
        _ => None,
    }
}

/// 解析一个矩阵符号，返回 (操作, 旋转阶次, 轴)
fn parse_matrix(
    token: &str,
    position: usize,
    previous: Option<(u8, Axis)>,
) -> std::result::Result<(SymOp, u8, Axis), String> {
    let (improper, body) = match token.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, token),
    };
    let mut chars = body.chars().peekable();

    let order = match chars.next() {
        Some(c @ ('1' | '2' | '3' | '4' | '6')) => c as u8 - b'0',
        _ => return Err(format!("expected a rotation order in '{}'", token)),
    };
    let explicit = chars.peek().copied().and_then(Axis::from_char);
    if explicit.is_some() {
        chars.next();
    }
    let axis = match explicit {
        Some(axis) => axis,
        None => default_axis(order, position, previous.map(|(n, _)| n))
            .ok_or_else(|| format!("cannot infer the axis of '{}'", token))?,
    };
    // `'` 与 `"` 相对前一个晶轴；体对角线之后仍按 z 处理
    let principal = match previous {
        Some((_, a @ (Axis::X | Axis::Y))) => a,
        _ => Axis::Z,
    };

    let mut rot = rotation(order, axis, principal)
        .ok_or_else(|| format!("no {}-fold rotation along the axis of '{}'", order, token))?;
    if improper {
        rot = rot.map(|row| row.map(|x| -x));
    }

    let mut translation = [0.0; 3];
    for c in chars {
        let shift = match c.to_digit(10) {
            Some(k) => {
                let i = axis
                    .index()
                    .filter(|_| (k as u8) < order)
                    .ok_or_else(|| format!("invalid screw component in '{}'", token))?;
                let mut t = [0.0; 3];
                t[i] = k as f64 / order as f64;
                t
            }
            None => translation_letter(c)
                .ok_or_else(|| format!("unknown translation '{}' in '{}'", c, token))?,
        };
        for k in 0..3 {
            translation[k] += shift[k];
        }
    }

    Ok((
        SymOp {
            rotation: rot,
            translation,
        },
        order,
        axis,
    ))
}

/// `(a b c)`，单位为 1/12
fn parse_shift(text: &str) -> Option<[f64; 3]> {
    let inner = text.trim().strip_suffix(')')?;
    let values: Vec<f64> = inner
        .split_whitespace()
        .map(|v| v.parse::<i32>().ok().map(|n| n as f64 / 12.0))
        .collect::<Option<_>>()?;
    <[f64; 3]>::try_from(values).ok()
}

impl FromStr for HallSymbol {
    type Err = CifError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = |reason: String| CifError::InvalidHallSymbol {
            symbol: s.to_string(),
            reason,
        };

        let (body, shift) = match s.split_once('(') {
            Some((body, tail)) => {
                let shift = parse_shift(tail)
                    .ok_or_else(|| invalid(format!("bad origin shift '({}'", tail)))?;
                (body, Some(shift))
            }
            None => (s, None),
        };

        let mut tokens = body.split_whitespace();
        let lattice = tokens
            .next()
            .ok_or_else(|| invalid("empty symbol".to_string()))?;
        let (centrosymmetric, letter) = match lattice.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, lattice),
        };
        let centering = match letter.to_ascii_uppercase().as_str() {
            "P" => Centering::P,
            "A" => Centering::A,
            "B" => Centering::B,
            "C" => Centering::C,
            "I" => Centering::I,
            "F" => Centering::F,
            "R" => Centering::R,
            other => return Err(invalid(format!("unknown lattice symbol '{}'", other))),
        };

        let mut generators = Vec::new();
        if centrosymmetric {
            generators.push(SymOp {
                rotation: [[-1.0, 0.0, 0.0], [0.0, -1.0, 0.0], [0.0, 0.0, -1.0]],
                translation: [0.0; 3],
            });
        }

        let mut previous = None;
        for (position, token) in tokens.enumerate() {
            let (op, order, axis) = parse_matrix(token, position, previous).map_err(invalid)?;
            generators.push(op);
            previous = Some((order, axis));
        }

        // 原点平移：S·W·S⁻¹
        if let Some(v) = shift {
            let forward = SymOp::translation(v);
            let back = SymOp::translation(v.map(|x| -x));
            generators = generators
                .iter()
                .map(|g| forward.compose(&g.compose(&back)))
                .collect();
        }

        Ok(HallSymbol {
            centering,
            generators,
        })
    }
}
