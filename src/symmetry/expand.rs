//! # 对称展开
//!
//! 把不对称单元经空间群的全部操作（含亚晶格平移）展开为完整晶胞，
//! 处理混合占据、重复位点，以及可选的原胞约化。
//!
//! ## 依赖关系
//! - 被 `parsers/cif/block.rs` 调用
//! - 使用 `symmetry/spacegroup.rs`, `models/structure.rs`, `diagnostics.rs`

use crate::diagnostics::{CifWarning, Diagnostics};
use crate::models::structure::{invert, matmul, row_times_matrix, wrap_fractional};
use crate::models::{Atom, Crystal, Lattice, OccupancyMap};
use crate::symmetry::spacegroup::{Centering, Spacegroup};

use std::collections::BTreeMap;

/// 判定两个分数坐标重合的容差
pub const SYMPREC: f64 = 1e-3;

/// 不同 kind 落在同一位点时的处理方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnDuplicates {
    /// 保留先出现的位点
    Keep,
    /// 保留先出现的位点并发出警告
    Warn,
}

/// 不对称单元
#[derive(Debug, Clone)]
pub struct AsymmetricUnit {
    pub symbols: Vec<String>,
    pub scaled_positions: Vec<[f64; 3]>,
    pub masses: Option<Vec<f64>>,
    pub labels: Option<Vec<String>>,
}

/// 周期性地比较两个分数坐标
fn same_site(a: [f64; 3], b: [f64; 3], symprec: f64) -> bool {
    (0..3).all(|k| {
        let d = (a[k] - b[k]).abs();
        d < symprec || (d - 1.0).abs() < symprec
    })
}

/// 求所有等价位点，返回 (分数坐标, 每个位点对应的 kind)
pub fn equivalent_sites(
    spacegroup: &Spacegroup,
    basis: &[[f64; 3]],
    on_duplicates: OnDuplicates,
    symprec: f64,
    diag: &mut Diagnostics,
) -> (Vec<[f64; 3]>, Vec<usize>) {
    let mut sites: Vec<[f64; 3]> = Vec::new();
    let mut kinds: Vec<usize> = Vec::new();

    for (kind, &pos) in basis.iter().enumerate() {
        for op in spacegroup.operations() {
            let image = op.apply(pos);
            for t in spacegroup.subtrans() {
                let site = wrap_fractional([image[0] + t[0], image[1] + t[1], image[2] + t[2]]);

                let mut found = false;
                for idx in 0..sites.len() {
                    if !same_site(site, sites[idx], symprec) {
                        continue;
                    }
                    found = true;
                    if kinds[idx] == kind {
                        continue;
                    }
                    match on_duplicates {
                        OnDuplicates::Keep => {}
                        OnDuplicates::Warn => diag.warn(CifWarning::DuplicateSite {
                            kind,
                            existing: kinds[idx],
                            position: site,
                        }),
                    }
                }

                if !found {
                    sites.push(site);
                    kinds.push(kind);
                }
            }
        }
    }

    (sites, kinds)
}

/// 收集每个不对称位点上的占据率，重合位点上的其它物种一并记入
fn occupancy_map(unit: &AsymmetricUnit, occupancies: &[f64], symprec: f64) -> OccupancyMap {
    let mut map = OccupancyMap::new();
    for (i, &coord) in unit.scaled_positions.iter().enumerate() {
        let mut occ = BTreeMap::new();
        occ.insert(unit.symbols[i].clone(), occupancies[i]);
        for (j, &other) in unit.scaled_positions.iter().enumerate() {
            if i == j {
                continue;
            }
            let dist = (0..3).map(|k| (coord[k] - other[k]).powi(2)).sum::<f64>().sqrt();
            if dist < symprec {
                occ.insert(unit.symbols[j].clone(), occupancies[j]);
            }
        }
        map.insert(i, occ);
    }
    map
}

/// 占据率最高的物种；并列时取字母序靠后者
fn dominant_species(occ: &BTreeMap<String, f64>) -> Option<&str> {
    occ.iter()
        .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(sym, _)| sym.as_str())
}

/// 由不对称单元构建完整晶体
pub fn expand(
    name: &str,
    unit: &AsymmetricUnit,
    lattice: &Lattice,
    spacegroup: &Spacegroup,
    occupancies: Option<&[f64]>,
    primitive_cell: bool,
    diag: &mut Diagnostics,
) -> Crystal {
    let occ_map = occupancies.map(|occ| occupancy_map(unit, occ, SYMPREC));

    // 有占据数据时混合位点属于预期情况，不发警告
    let on_duplicates = if occ_map.is_some() {
        OnDuplicates::Keep
    } else {
        OnDuplicates::Warn
    };
    let (sites, kinds) =
        equivalent_sites(spacegroup, &unit.scaled_positions, on_duplicates, SYMPREC, diag);

    let atoms: Vec<Atom> = sites
        .iter()
        .zip(&kinds)
        .map(|(&site, &kind)| {
            let element = occ_map
                .as_ref()
                .and_then(|m| m.get(&kind))
                .and_then(dominant_species)
                .unwrap_or(&unit.symbols[kind]);
            Atom {
                element: element.to_string(),
                position: site,
                label: unit.labels.as_ref().map(|l| l[kind].clone()),
                mass: unit.masses.as_ref().map(|m| m[kind]),
                kind: Some(kind),
            }
        })
        .collect();

    let mut crystal = Crystal::new(name, Some(lattice.clone()), atoms);
    crystal.space_group = Some(spacegroup.info());
    crystal.occupancy = occ_map;

    if primitive_cell && spacegroup.centering() != Centering::P {
        reduce_to_primitive(&mut crystal, spacegroup.scaled_primitive_cell());
    }

    crystal
}

/// 切换到原胞：新晶格 = P·L，分数坐标 f' = f·P⁻¹，去除重复位点
fn reduce_to_primitive(crystal: &mut Crystal, basis: [[f64; 3]; 3]) {
    let (Some(lattice), Some(inv)) = (crystal.lattice.as_ref(), invert(&basis)) else {
        return;
    };
    let new_lattice = Lattice::from_vectors(matmul(&basis, &lattice.matrix));

    let mut kept: Vec<Atom> = Vec::new();
    for atom in crystal.atoms.drain(..) {
        let position = wrap_fractional(row_times_matrix(atom.position, &inv));
        if kept.iter().any(|a| same_site(a.position, position, SYMPREC)) {
            continue;
        }
        kept.push(Atom { position, ..atom });
    }

    crystal.atoms = kept;
    crystal.lattice = Some(new_lattice);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symmetry::spacegroup::{BuiltinSpacegroups, SpacegroupService};

    fn unit(symbols: &[&str], positions: &[[f64; 3]]) -> AsymmetricUnit {
        AsymmetricUnit {
            symbols: symbols.iter().map(|s| s.to_string()).collect(),
            scaled_positions: positions.to_vec(),
            masses: None,
            labels: None,
        }
    }

    #[test]
    fn test_rocksalt_expansion() {
        let sg = BuiltinSpacegroups.by_number(225, 1).unwrap();
        let lattice = Lattice::from_parameters(5.64, 5.64, 5.64, 90.0, 90.0, 90.0);
        let asym = unit(&["Na", "Cl"], &[[0.0, 0.0, 0.0], [0.5, 0.5, 0.5]]);
        let mut diag = Diagnostics::new();

        let crystal = expand("NaCl", &asym, &lattice, &sg, None, false, &mut diag);

        assert_eq!(crystal.atoms.len(), 8);
        assert_eq!(crystal.formula(), "Cl4Na4");
        assert!(diag.is_empty());
        assert_eq!(crystal.space_group.as_ref().unwrap().number, Some(225));
    }

    #[test]
    fn test_rocksalt_primitive_cell() {
        let sg = BuiltinSpacegroups.by_number(225, 1).unwrap();
        let lattice = Lattice::from_parameters(5.64, 5.64, 5.64, 90.0, 90.0, 90.0);
        let asym = unit(&["Na", "Cl"], &[[0.0, 0.0, 0.0], [0.5, 0.5, 0.5]]);
        let mut diag = Diagnostics::new();

        let crystal = expand("NaCl", &asym, &lattice, &sg, None, true, &mut diag);

        assert_eq!(crystal.atoms.len(), 2);
        let volume = crystal.lattice.as_ref().unwrap().volume().abs();
        assert!((volume - 5.64f64.powi(3) / 4.0).abs() < 1e-6);
    }

    #[test]
    fn test_general_position_multiplicity() {
        let sg = BuiltinSpacegroups.by_number(14, 1).unwrap();
        let lattice = Lattice::from_parameters(5.0, 6.0, 7.0, 90.0, 100.0, 90.0);
        let asym = unit(&["O"], &[[0.1, 0.2, 0.3]]);
        let mut diag = Diagnostics::new();

        let crystal = expand("O", &asym, &lattice, &sg, None, false, &mut diag);
        assert_eq!(crystal.atoms.len(), 4);
        assert!(crystal.atoms.iter().all(|a| a.kind == Some(0)));
    }

    #[test]
    fn test_mixed_occupancy_keeps_dominant_species() {
        let sg = BuiltinSpacegroups.by_number(1, 1).unwrap();
        let lattice = Lattice::from_parameters(3.0, 3.0, 3.0, 90.0, 90.0, 90.0);
        let asym = unit(&["Fe", "Ni"], &[[0.0, 0.0, 0.0], [0.0, 0.0, 0.0]]);
        let mut diag = Diagnostics::new();

        let crystal = expand("FeNi", &asym, &lattice, &sg, Some(&[0.3, 0.7]), false, &mut diag);

        assert_eq!(crystal.atoms.len(), 1);
        assert_eq!(crystal.atoms[0].element, "Ni");
        assert!(diag.is_empty());
        let occ = crystal.occupancy.as_ref().unwrap();
        assert_eq!(occ[&0]["Fe"], 0.3);
        assert_eq!(occ[&0]["Ni"], 0.7);
    }

    #[test]
    fn test_duplicate_sites_warn() {
        let sg = BuiltinSpacegroups.by_number(1, 1).unwrap();
        let asym = unit(&["Fe", "Ni"], &[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0]]);
        let mut diag = Diagnostics::new();

        let (sites, kinds) =
            equivalent_sites(&sg, &asym.scaled_positions, OnDuplicates::Warn, SYMPREC, &mut diag);
        assert_eq!(sites.len(), 1);
        assert_eq!(kinds, vec![0]);
        assert_eq!(diag.warnings().len(), 1);

        let mut diag = Diagnostics::new();
        let (_, kinds) =
            equivalent_sites(&sg, &asym.scaled_positions, OnDuplicates::Keep, SYMPREC, &mut diag);
        assert_eq!(kinds, vec![0]);
        assert!(diag.is_empty());
    }
}
