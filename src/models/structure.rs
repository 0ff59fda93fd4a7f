//! # 晶体结构数据模型
//!
//! 定义统一的结构表示：CIF 读取器产生它，CIF 写出器消费它。
//! 有晶格时原子坐标为分数坐标；无晶格（非周期体系）时为笛卡尔坐标。
//!
//! ## 依赖关系
//! - 被 `parsers/` 、`symmetry/` 和 `commands/` 使用
//! - 使用 `models/element.rs`

use crate::models::element;
use crate::parsers::cif::TagMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 每个 kind（或原子序号）上各元素的占据率
pub type OccupancyMap = BTreeMap<usize, BTreeMap<String, f64>>;

/// 分数坐标回卷时使用的容差，避免 0.9999999 被卷到 1 附近
const WRAP_EPS: f64 = 1e-7;

/// 晶格参数表示
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lattice {
    /// 晶格向量矩阵 (3x3)，行向量表示 a, b, c
    /// [[a1, a2, a3], [b1, b2, b3], [c1, c2, c3]]
    pub matrix: [[f64; 3]; 3],
}

impl Lattice {
    /// 从晶格参数 (a, b, c, alpha, beta, gamma) 创建晶格
    /// 角度单位：度
    pub fn from_parameters(a: f64, b: f64, c: f64, alpha: f64, beta: f64, gamma: f64) -> Self {
        let cos_alpha = alpha.to_radians().cos();
        let cos_beta = beta.to_radians().cos();
        let (sin_gamma, cos_gamma) = gamma.to_radians().sin_cos();

        let a_vec = [a, 0.0, 0.0];
        let b_vec = [b * cos_gamma, b * sin_gamma, 0.0];

        let c1 = c * cos_beta;
        let c2 = c * (cos_alpha - cos_beta * cos_gamma) / sin_gamma;
        let c3 = (c * c - c1 * c1 - c2 * c2).max(0.0).sqrt();

        Lattice {
            matrix: [a_vec, b_vec, [c1, c2, c3]],
        }
    }

    /// 从晶格向量矩阵创建
    pub fn from_vectors(matrix: [[f64; 3]; 3]) -> Self {
        Lattice { matrix }
    }

    /// 获取晶格参数 (a, b, c, alpha, beta, gamma)
    pub fn parameters(&self) -> (f64, f64, f64, f64, f64, f64) {
        let [a_vec, b_vec, c_vec] = self.matrix;

        let a = norm(a_vec);
        let b = norm(b_vec);
        let c = norm(c_vec);

        let alpha = (dot(b_vec, c_vec) / (b * c)).clamp(-1.0, 1.0).acos().to_degrees();
        let beta = (dot(a_vec, c_vec) / (a * c)).clamp(-1.0, 1.0).acos().to_degrees();
        let gamma = (dot(a_vec, b_vec) / (a * b)).clamp(-1.0, 1.0).acos().to_degrees();

        (a, b, c, alpha, beta, gamma)
    }

    /// 计算晶格体积
    pub fn volume(&self) -> f64 {
        det(&self.matrix)
    }

    /// 晶格矩阵的逆，奇异时返回 `None`
    pub fn inverse(&self) -> Option<[[f64; 3]; 3]> {
        invert(&self.matrix)
    }

    /// 笛卡尔坐标 -> 分数坐标
    pub fn to_fractional(&self, cart: [f64; 3]) -> Option<[f64; 3]> {
        let inv = self.inverse()?;
        Some(row_times_matrix(cart, &inv))
    }

    /// 分数坐标 -> 笛卡尔坐标
    pub fn to_cartesian(&self, frac: [f64; 3]) -> [f64; 3] {
        row_times_matrix(frac, &self.matrix)
    }
}

/// 原子信息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Atom {
    /// 元素符号
    pub element: String,

    /// 坐标：有晶格时为分数坐标，否则为笛卡尔坐标 (Å)
    pub position: [f64; 3],

    /// 可选：原子标签（用于区分同种元素的不同位置）
    pub label: Option<String>,

    /// 显式质量（如氘），`None` 表示使用标准原子质量
    pub mass: Option<f64>,

    /// 对称展开时对应的不对称单元位点序号
    pub kind: Option<usize>,
}

impl Atom {
    pub fn new(element: impl Into<String>, position: [f64; 3]) -> Self {
        Atom {
            element: element.into(),
            position,
            label: None,
            mass: None,
            kind: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_mass(mut self, mass: f64) -> Self {
        self.mass = Some(mass);
        self
    }

    /// 原子质量：显式质量优先，否则查标准质量表
    pub fn mass(&self) -> Option<f64> {
        self.mass.or_else(|| element::atomic_mass(&self.element))
    }
}

/// 空间群摘要
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpacegroupInfo {
    pub number: Option<u16>,
    pub symbol: String,
    pub setting: u8,
}

/// 晶体结构
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Crystal {
    /// 结构名称（CIF 数据块名）
    pub name: String,

    /// 晶格，`None` 表示非周期体系
    pub lattice: Option<Lattice>,

    /// 原子列表
    pub atoms: Vec<Atom>,

    /// 空间群
    pub space_group: Option<SpacegroupInfo>,

    /// 混合/部分占据信息，键为 `Atom::kind`（无 kind 时为原子序号）
    pub occupancy: Option<OccupancyMap>,

    /// 读取时保留的原始 CIF 标签
    pub tags: Option<TagMap>,

    /// 来源文件格式
    pub source_format: Option<String>,
}

impl Crystal {
    pub fn new(name: impl Into<String>, lattice: Option<Lattice>, atoms: Vec<Atom>) -> Self {
        Crystal {
            name: name.into(),
            lattice,
            atoms,
            space_group: None,
            occupancy: None,
            tags: None,
            source_format: None,
        }
    }

    pub fn is_periodic(&self) -> bool {
        self.lattice.is_some()
    }

    /// 元素符号列表
    #[cfg(test)]
    pub fn symbols(&self) -> Vec<&str> {
        self.atoms.iter().map(|a| a.element.as_str()).collect()
    }

    /// 计算化学式（按元素字母顺序）
    pub fn formula(&self) -> String {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();

        for atom in &self.atoms {
            *counts.entry(atom.element.as_str()).or_insert(0) += 1;
        }

        counts
            .into_iter()
            .map(|(el, count)| format_count(el, count))
            .collect::<Vec<_>>()
            .join("")
    }

    /// 约化化学式：按出现顺序合并相邻的同种元素，例如 H H O -> H2O
    pub fn reduced_formula(&self) -> String {
        let mut runs: Vec<(&str, usize)> = Vec::new();
        for atom in &self.atoms {
            match runs.last_mut() {
                Some((el, count)) if *el == atom.element => *count += 1,
                _ => runs.push((atom.element.as_str(), 1)),
            }
        }

        runs.into_iter()
            .map(|(el, count)| format_count(el, count))
            .collect()
    }

    /// 笛卡尔坐标 (Å)
    pub fn cartesian_positions(&self) -> Vec<[f64; 3]> {
        match &self.lattice {
            Some(lattice) => self
                .atoms
                .iter()
                .map(|a| lattice.to_cartesian(a.position))
                .collect(),
            None => self.atoms.iter().map(|a| a.position).collect(),
        }
    }

    /// 分数坐标，`wrap` 为真时卷回 [0, 1)；非周期体系返回 `None`
    pub fn scaled_positions(&self, wrap: bool) -> Option<Vec<[f64; 3]>> {
        self.lattice.as_ref()?;
        Some(
            self.atoms
                .iter()
                .map(|a| if wrap { wrap_fractional(a.position) } else { a.position })
                .collect(),
        )
    }

    /// 每个原子的质量，未知元素记为 0
    pub fn masses(&self) -> Vec<f64> {
        self.atoms.iter().map(|a| a.mass().unwrap_or(0.0)).collect()
    }
}

/// 把分数坐标卷回 [0, 1)
pub fn wrap_fractional(p: [f64; 3]) -> [f64; 3] {
    p.map(|x| (x + WRAP_EPS).rem_euclid(1.0) - WRAP_EPS)
}

fn format_count(el: &str, count: usize) -> String {
    if count == 1 {
        el.to_string()
    } else {
        format!("{}{}", el, count)
    }
}

fn dot(u: [f64; 3], v: [f64; 3]) -> f64 {
    u[0] * v[0] + u[1] * v[1] + u[2] * v[2]
}

fn norm(u: [f64; 3]) -> f64 {
    dot(u, u).sqrt()
}

fn det(m: &[[f64; 3]; 3]) -> f64 {
    m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1]) - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
        + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0])
}

/// 3x3 矩阵求逆
pub fn invert(m: &[[f64; 3]; 3]) -> Option<[[f64; 3]; 3]> {
    let d = det(m);
    if d.abs() < 1e-12 {
        return None;
    }

    Some([
        [
            (m[1][1] * m[2][2] - m[1][2] * m[2][1]) / d,
            (m[0][2] * m[2][1] - m[0][1] * m[2][2]) / d,
            (m[0][1] * m[1][2] - m[0][2] * m[1][1]) / d,
        ],
        [
            (m[1][2] * m[2][0] - m[1][0] * m[2][2]) / d,
            (m[0][0] * m[2][2] - m[0][2] * m[2][0]) / d,
            (m[0][2] * m[1][0] - m[0][0] * m[1][2]) / d,
        ],
        [
            (m[1][0] * m[2][1] - m[1][1] * m[2][0]) / d,
            (m[0][1] * m[2][0] - m[0][0] * m[2][1]) / d,
            (m[0][0] * m[1][1] - m[0][1] * m[1][0]) / d,
        ],
    ])
}

/// 行向量乘矩阵：v · M
pub fn row_times_matrix(v: [f64; 3], m: &[[f64; 3]; 3]) -> [f64; 3] {
    [
        v[0] * m[0][0] + v[1] * m[1][0] + v[2] * m[2][0],
        v[0] * m[0][1] + v[1] * m[1][1] + v[2] * m[2][1],
        v[0] * m[0][2] + v[1] * m[1][2] + v[2] * m[2][2],
    ]
}

/// 矩阵乘法：A · B
pub fn matmul(a: &[[f64; 3]; 3], b: &[[f64; 3]; 3]) -> [[f64; 3]; 3] {
    [
        row_times_matrix(a[0], b),
        row_times_matrix(a[1], b),
        row_times_matrix(a[2], b),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lattice_from_parameters_cubic() {
        let lattice = Lattice::from_parameters(5.0, 5.0, 5.0, 90.0, 90.0, 90.0);
        let (a, b, c, alpha, beta, gamma) = lattice.parameters();

        assert!((a - 5.0).abs() < 1e-6);
        assert!((b - 5.0).abs() < 1e-6);
        assert!((c - 5.0).abs() < 1e-6);
        assert!((alpha - 90.0).abs() < 1e-6);
        assert!((beta - 90.0).abs() < 1e-6);
        assert!((gamma - 90.0).abs() < 1e-6);
    }

    #[test]
    fn test_lattice_volume_cubic() {
        let lattice = Lattice::from_parameters(5.0, 5.0, 5.0, 90.0, 90.0, 90.0);
        // 5^3 = 125
        assert!((lattice.volume().abs() - 125.0).abs() < 1e-6);
    }

    #[test]
    fn test_lattice_triclinic_parameters() {
        let lattice = Lattice::from_parameters(4.1, 5.2, 6.3, 80.0, 95.0, 110.0);
        let (a, b, c, alpha, beta, gamma) = lattice.parameters();

        assert!((a - 4.1).abs() < 1e-9);
        assert!((b - 5.2).abs() < 1e-9);
        assert!((c - 6.3).abs() < 1e-9);
        assert!((alpha - 80.0).abs() < 1e-9);
        assert!((beta - 95.0).abs() < 1e-9);
        assert!((gamma - 110.0).abs() < 1e-9);
    }

    #[test]
    fn test_fractional_cartesian_round_trip() {
        let lattice = Lattice::from_parameters(3.0, 3.0, 5.0, 90.0, 90.0, 120.0);
        let frac = [0.25, 0.5, 0.75];
        let cart = lattice.to_cartesian(frac);
        let back = lattice.to_fractional(cart).unwrap();

        for k in 0..3 {
            assert!((back[k] - frac[k]).abs() < 1e-12);
        }
    }

    #[test]
    fn test_singular_lattice_has_no_inverse() {
        let lattice = Lattice::from_vectors([[1.0, 0.0, 0.0], [2.0, 0.0, 0.0], [0.0, 0.0, 1.0]]);
        assert!(lattice.inverse().is_none());
    }

    #[test]
    fn test_wrap_fractional() {
        let p = wrap_fractional([1.25, -0.25, 0.99999999]);
        assert!((p[0] - 0.25).abs() < 1e-12);
        assert!((p[1] - 0.75).abs() < 1e-12);
        // 紧贴 1 的值卷到 0 附近
        assert!(p[2].abs() < 1e-7);
    }

    #[test]
    fn test_crystal_formula() {
        let lattice = Lattice::from_parameters(5.0, 5.0, 5.0, 90.0, 90.0, 90.0);
        let atoms = vec![
            Atom::new("Na", [0.0, 0.0, 0.0]),
            Atom::new("Na", [0.5, 0.5, 0.0]),
            Atom::new("Cl", [0.5, 0.0, 0.0]),
            Atom::new("Cl", [0.0, 0.5, 0.0]),
        ];
        let crystal = Crystal::new("NaCl", Some(lattice), atoms);

        assert_eq!(crystal.formula(), "Cl2Na2");
        assert_eq!(crystal.reduced_formula(), "Na2Cl2");
    }

    #[test]
    fn test_reduced_formula_keeps_order() {
        let atoms = vec![
            Atom::new("C", [0.0, 0.0, 0.0]),
            Atom::new("H", [1.0, 0.0, 0.0]),
            Atom::new("H", [0.0, 1.0, 0.0]),
            Atom::new("H", [0.0, 0.0, 1.0]),
            Atom::new("O", [0.0, 0.0, 2.0]),
        ];
        let crystal = Crystal::new("methanol-ish", None, atoms);
        assert_eq!(crystal.reduced_formula(), "CH3O");
        assert!(!crystal.is_periodic());
        assert!(crystal.scaled_positions(true).is_none());
    }

    #[test]
    fn test_atom_mass_override() {
        let atom = Atom::new("H", [0.0, 0.0, 0.0]).with_mass(2.01355);
        assert_eq!(atom.mass(), Some(2.01355));

        let atom = Atom::new("O", [0.0, 0.0, 0.0]).with_label("O1");
        assert_eq!(atom.label, Some("O1".to_string()));
        assert!((atom.mass().unwrap() - 15.999).abs() < 1e-9);
    }
}
