//! # CIF 写出
//!
//! 把一组 `Crystal` 写成 CIF 文本：每个结构一个 `data_` 块，
//! 有晶格时写晶胞参数与通用 P1 对称信息，原子以 `loop_` 表给出。
//! 混合占据的位点按占据率映射展开为多行。输出编码为 latin-1。
//!
//! ## 依赖关系
//! - 被 `commands/convert.rs` 调用
//! - 使用 `models/structure.rs`

use crate::error::{CifError, Result};
use crate::models::Crystal;
use crate::parsers::cif::block::CELL_TAGS;

use regex::Regex;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;

static FORMULA_TERM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([A-Z][a-z]*)(\d*)").unwrap());

const GENERIC_SPACEGROUP_INFO: &str = "_symmetry_space_group_name_H-M    \"P 1\"\n\
_symmetry_int_tables_number       1\n\
\n\
loop_\n\
\x20 _symmetry_equiv_pos_as_xyz\n\
\x20 'x, y, z'\n";

/// 原子表的列布局
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CifFormat {
    #[default]
    Default,
    /// Materials Project 风格
    Mp,
}

/// 写出选项
#[derive(Debug, Clone)]
pub struct WriteOptions {
    pub format: CifFormat,
    /// 分数坐标卷回 [0, 1)
    pub wrap: bool,
    /// 每个结构每个原子的标签，替代自动生成的 `Na1`、`Na2`…
    pub labels: Option<Vec<Vec<String>>>,
    /// 附加到原子表的列：(标签名, 每个结构每个原子的原样文本)
    pub loop_keys: Vec<(String, Vec<Vec<String>>)>,
}

impl Default for WriteOptions {
    fn default() -> Self {
        WriteOptions {
            format: CifFormat::Default,
            wrap: true,
            labels: None,
            loop_keys: Vec::new(),
        }
    }
}

/// 模仿 C 的 `%g`：6 位有效数字，去掉末尾的零
pub fn fmt_g(value: f64) -> String {
    const PRECISION: i32 = 6;

    if value == 0.0 {
        return if value.is_sign_negative() { "-0" } else { "0" }.to_string();
    }
    if !value.is_finite() {
        return if value.is_nan() {
            "nan".to_string()
        } else if value > 0.0 {
            "inf".to_string()
        } else {
            "-inf".to_string()
        };
    }

    // 先按科学计数法舍入，得到舍入后的指数
    let sci = format!("{:.*e}", (PRECISION - 1) as usize, value);
    let (mantissa, exponent) = sci.split_once('e').unwrap_or((sci.as_str(), "0"));
    let exponent: i32 = exponent.parse().unwrap_or(0);

    if (-4..PRECISION).contains(&exponent) {
        let fixed = format!("{:.*}", (PRECISION - 1 - exponent) as usize, value);
        strip_trailing_zeros(&fixed).to_string()
    } else {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!(
            "{}e{}{:02}",
            strip_trailing_zeros(mantissa),
            sign,
            exponent.abs()
        )
    }
}

fn strip_trailing_zeros(number: &str) -> &str {
    if number.contains('.') {
        number.trim_end_matches('0').trim_end_matches('.')
    } else {
        number
    }
}

/// `Na2Cl` -> `Na2 Cl1`
fn formula_sum(formula: &str) -> String {
    FORMULA_TERM
        .captures_iter(formula)
        .map(|caps| {
            let count = if caps[2].is_empty() { "1" } else { &caps[2] };
            format!("{}{}", &caps[1], count)
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// 按原子给出的逐行数据：长度为原子数时按展开关系复制，
/// 长度已等于行数时原样使用
fn per_row(what: &str, values: &[String], origins: &[usize], n_atoms: usize) -> Result<Vec<String>> {
    if values.len() == origins.len() {
        Ok(values.to_vec())
    } else if values.len() == n_atoms {
        Ok(origins.iter().map(|&i| values[i].clone()).collect())
    } else {
        Err(CifError::InvalidArgument(format!(
            "{} has {} entries but the structure has {} atoms",
            what,
            values.len(),
            n_atoms
        )))
    }
}

/// 一行原子数据
struct SiteRow {
    symbol: String,
    position: [f64; 3],
    occupancy: f64,
    origin: usize,
}

/// 把占据率映射展开成行：先是每个原子本身，混合位点的其它物种追加在后
fn site_rows(crystal: &Crystal, coords: &[[f64; 3]]) -> Vec<SiteRow> {
    let mut rows: Vec<SiteRow> = crystal
        .atoms
        .iter()
        .zip(coords)
        .enumerate()
        .map(|(i, (atom, &position))| SiteRow {
            symbol: atom.element.clone(),
            position,
            occupancy: 1.0,
            origin: i,
        })
        .collect();

    let Some(occupancy) = &crystal.occupancy else {
        return rows;
    };

    let n = rows.len();
    for i in 0..n {
        let key = crystal.atoms[i].kind.unwrap_or(i);
        let Some(species) = occupancy.get(&key) else {
            continue;
        };
        if let Some(&occ) = species.get(&rows[i].symbol) {
            rows[i].occupancy = occ;
        }
        for (symbol, &occ) in species {
            if *symbol != rows[i].symbol {
                rows.push(SiteRow {
                    symbol: symbol.clone(),
                    position: rows[i].position,
                    occupancy: occ,
                    origin: i,
                });
            }
        }
    }

    rows
}

fn format_frame(index: usize, crystal: &Crystal, options: &WriteOptions, out: &mut String) -> Result<()> {
    let name = crystal.name.trim();
    if name.is_empty() {
        out.push_str(&format!("data_image{}\n", index));
    } else {
        out.push_str(&format!("data_{}\n", name.replace(char::is_whitespace, "_")));
    }

    if options.format == CifFormat::Mp {
        let formula = crystal.reduced_formula();
        out.push_str(&format!("_chemical_formula_structural       {}\n", formula));
        out.push_str(&format!("_chemical_formula_sum      \"{}\"\n", formula_sum(&formula)));
    }

    let coords = match (&crystal.lattice, crystal.scaled_positions(options.wrap)) {
        (Some(lattice), Some(scaled)) => {
            let (a, b, c, alpha, beta, gamma) = lattice.parameters();
            for (tag, value) in CELL_TAGS.iter().zip([a, b, c, alpha, beta, gamma]) {
                out.push_str(&format!("{:<20} {}\n", tag, fmt_g(value)));
            }
            out.push('\n');
            out.push_str(GENERIC_SPACEGROUP_INFO);
            out.push('\n');
            scaled
        }
        _ => crystal.cartesian_positions(),
    };
    let coord_type = if crystal.is_periodic() { "fract" } else { "Cartn" };

    out.push_str("loop_\n");
    let columns: Vec<String> = match options.format {
        CifFormat::Mp => vec![
            "type_symbol".to_string(),
            "label".to_string(),
            "symmetry_multiplicity".to_string(),
            format!("{}_x", coord_type),
            format!("{}_y", coord_type),
            format!("{}_z", coord_type),
            "occupancy".to_string(),
        ],
        CifFormat::Default => vec![
            "label".to_string(),
            "occupancy".to_string(),
            format!("{}_x", coord_type),
            format!("{}_y", coord_type),
            format!("{}_z", coord_type),
            "thermal_displace_type".to_string(),
            "B_iso_or_equiv".to_string(),
            "type_symbol".to_string(),
        ],
    };
    for column in &columns {
        out.push_str(&format!("  _atom_site_{}\n", column));
    }

    let rows = site_rows(crystal, &coords);
    let origins: Vec<usize> = rows.iter().map(|r| r.origin).collect();
    let n_atoms = crystal.atoms.len();

    // 附加列在表头中紧跟标准列
    let mut extra = vec![String::new(); rows.len()];
    for (key, frames) in &options.loop_keys {
        out.push_str(&format!("  _{}\n", key));
        let values = frames.get(index).ok_or_else(|| {
            CifError::InvalidArgument(format!("loop key '{}' has no data for image {}", key, index))
        })?;
        let values = per_row(&format!("loop key '{}'", key), values, &origins, n_atoms)?;
        for (ext, value) in extra.iter_mut().zip(values) {
            ext.push_str("  ");
            ext.push_str(&value);
        }
    }

    let labels = match &options.labels {
        Some(frames) => {
            let labels = frames.get(index).ok_or_else(|| {
                CifError::InvalidArgument(format!("no labels given for image {}", index))
            })?;
            per_row("labels", labels, &origins, n_atoms)?
        }
        None => {
            let mut counts: HashMap<&str, usize> = HashMap::new();
            rows.iter()
                .map(|row| {
                    let count = counts.entry(row.symbol.as_str()).or_insert(0);
                    *count += 1;
                    format!("{}{}", row.symbol, count)
                })
                .collect()
        }
    };

    for ((row, label), ext) in rows.iter().zip(&labels).zip(&extra) {
        let [x, y, z] = row.position;
        let line = match options.format {
            CifFormat::Mp => format!(
                "  {:<2}  {:>4}  {:>4}  {:7.5}  {:7.5}  {:7.5}  {:6.1}{}\n",
                row.symbol, label, 1, x, y, z, row.occupancy, ext
            ),
            CifFormat::Default => format!(
                "  {:<8} {:6.4} {:7.5}  {:7.5}  {:7.5}  {:>4}  {:6.3}  {:<2}{}\n",
                label, row.occupancy, x, y, z, "Biso", 1.0, row.symbol, ext
            ),
        };
        out.push_str(&line);
    }

    Ok(())
}

/// 生成 CIF 文本
pub fn to_cif_string(crystals: &[Crystal], options: &WriteOptions) -> Result<String> {
    let mut out = String::new();
    for (index, crystal) in crystals.iter().enumerate() {
        format_frame(index, crystal, options, &mut out)?;
    }
    Ok(out)
}

/// 按 latin-1 编码，超出范围的字符报错
pub fn encode_latin1(text: &str) -> Result<Vec<u8>> {
    text.chars()
        .map(|ch| u8::try_from(u32::from(ch)).map_err(|_| CifError::Encoding { ch }))
        .collect()
}

/// 写出 CIF 文件
pub fn write_cif_file(path: &Path, crystals: &[Crystal], options: &WriteOptions) -> Result<()> {
    let bytes = encode_latin1(&to_cif_string(crystals, options)?)?;
    fs::write(path, bytes).map_err(|e| CifError::FileWriteError {
        path: path.display().to_string(),
        source: e,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Diagnostics;
    use crate::models::{Atom, Lattice, OccupancyMap};
    use crate::parsers::cif::block::ReadOptions;
    use crate::parsers::cif::parse::parse_cif_str;
    use std::collections::BTreeMap;

    fn rocksalt() -> Crystal {
        let lattice = Lattice::from_parameters(5.64, 5.64, 5.64, 90.0, 90.0, 90.0);
        let atoms = vec![
            Atom::new("Na", [0.0, 0.0, 0.0]),
            Atom::new("Cl", [0.5, 0.5, 0.5]),
        ];
        Crystal::new("rock salt", Some(lattice), atoms)
    }

    #[test]
    fn test_fmt_g() {
        assert_eq!(fmt_g(5.64), "5.64");
        assert_eq!(fmt_g(90.0), "90");
        assert_eq!(fmt_g(0.0), "0");
        assert_eq!(fmt_g(3.0000001), "3");
        assert_eq!(fmt_g(0.0001), "0.0001");
        assert_eq!(fmt_g(1e-5), "1e-05");
        assert_eq!(fmt_g(123456789.0), "1.23457e+08");
        assert_eq!(fmt_g(-2.5), "-2.5");
        assert_eq!(fmt_g(999999.5), "1e+06");
    }

    #[test]
    fn test_formula_sum() {
        assert_eq!(formula_sum("NaCl"), "Na1 Cl1");
        assert_eq!(formula_sum("H2O"), "H2 O1");
    }

    #[test]
    fn test_default_layout() {
        let text = to_cif_string(&[rocksalt()], &WriteOptions::default()).unwrap();

        assert!(text.starts_with("data_rock_salt\n"));
        assert!(text.contains("_cell_length_a       5.64\n"));
        assert!(text.contains("_cell_angle_gamma    90\n"));
        assert!(text.contains("  'x, y, z'\n\nloop_\n  _atom_site_label\n"));
        assert!(text.contains("  Na1      1.0000 0.00000  0.00000  0.00000  Biso   1.000  Na\n"));
        assert!(text.contains("  Cl1      1.0000 0.50000  0.50000  0.50000  Biso   1.000  Cl\n"));
    }

    #[test]
    fn test_mp_layout() {
        let options = WriteOptions {
            format: CifFormat::Mp,
            ..WriteOptions::default()
        };
        let text = to_cif_string(&[rocksalt()], &options).unwrap();

        assert!(text.contains("_chemical_formula_structural       NaCl\n"));
        assert!(text.contains("_chemical_formula_sum      \"Na1 Cl1\"\n"));
        assert!(text.contains("  _atom_site_symmetry_multiplicity\n"));
        assert!(text.contains("  Na   Na1     1  0.00000  0.00000  0.00000     1.0\n"));
    }

    #[test]
    fn test_round_trip() {
        let text = to_cif_string(&[rocksalt()], &WriteOptions::default()).unwrap();
        let block = parse_cif_str(&text).next().unwrap().unwrap();
        let crystal = block
            .to_crystal(&ReadOptions::default(), &mut Diagnostics::new())
            .unwrap();

        let (a, _, _, alpha, _, _) = crystal.lattice.as_ref().unwrap().parameters();
        assert!((a - 5.64).abs() < 1e-6);
        assert!((alpha - 90.0).abs() < 1e-6);
        assert_eq!(crystal.symbols(), vec!["Na", "Cl"]);
        for x in crystal.atoms[1].position {
            assert!((x - 0.5).abs() < 1e-6);
        }
    }

    #[test]
    fn test_occupancy_expansion_and_extra_columns() {
        let lattice = Lattice::from_parameters(3.0, 3.0, 3.0, 90.0, 90.0, 90.0);
        let mut atom = Atom::new("Ni", [0.0, 0.0, 0.0]);
        atom.kind = Some(0);
        let mut crystal = Crystal::new("alloy", Some(lattice), vec![atom]);
        let mut occupancy = OccupancyMap::new();
        occupancy.insert(0, BTreeMap::from([("Fe".to_string(), 0.3), ("Ni".to_string(), 0.7)]));
        crystal.occupancy = Some(occupancy);

        let options = WriteOptions {
            loop_keys: vec![("my_tag".to_string(), vec![vec!["A".to_string()]])],
            ..WriteOptions::default()
        };
        let text = to_cif_string(&[crystal], &options).unwrap();

        assert!(text.contains("  _atom_site_type_symbol\n  _my_tag\n"));
        assert!(text.contains("  Ni1      0.7000 0.00000  0.00000  0.00000  Biso   1.000  Ni  A\n"));
        assert!(text.contains("  Fe1      0.3000 0.00000  0.00000  0.00000  Biso   1.000  Fe  A\n"));

        let block = parse_cif_str(&text).next().unwrap().unwrap();
        let reread = block
            .to_crystal(&ReadOptions::default(), &mut Diagnostics::new())
            .unwrap();
        assert_eq!(reread.symbols(), vec!["Ni"]);
        assert_eq!(reread.occupancy.unwrap()[&0]["Fe"], 0.3);
    }

    #[test]
    fn test_explicit_labels() {
        let options = WriteOptions {
            labels: Some(vec![vec!["Na_a".to_string(), "Cl_b".to_string()]]),
            ..WriteOptions::default()
        };
        let text = to_cif_string(&[rocksalt()], &options).unwrap();
        assert!(text.contains("  Na_a     1.0000"));

        let options = WriteOptions {
            labels: Some(vec![vec!["only_one".to_string()]]),
            ..WriteOptions::default()
        };
        assert!(matches!(
            to_cif_string(&[rocksalt()], &options),
            Err(CifError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_per_atom_labels_follow_expanded_rows() {
        let lattice = Lattice::from_parameters(3.0, 3.0, 3.0, 90.0, 90.0, 90.0);
        let atoms = vec![
            Atom::new("Ni", [0.0, 0.0, 0.0]),
            Atom::new("Co", [0.5, 0.5, 0.5]),
        ];
        let mut crystal = Crystal::new("alloy", Some(lattice), atoms);
        let mut occupancy = OccupancyMap::new();
        occupancy.insert(0, BTreeMap::from([("Fe".to_string(), 0.3), ("Ni".to_string(), 0.7)]));
        crystal.occupancy = Some(occupancy);

        // 两个原子、三行：Fe 行沿用第一个原子的标签
        let options = WriteOptions {
            labels: Some(vec![vec!["Site_A".to_string(), "Site_B".to_string()]]),
            ..WriteOptions::default()
        };
        let text = to_cif_string(&[crystal], &options).unwrap();

        assert!(text.contains("  Site_A   0.7000 0.00000  0.00000  0.00000  Biso   1.000  Ni\n"));
        assert!(text.contains("  Site_B   1.0000 0.50000  0.50000  0.50000  Biso   1.000  Co\n"));
        assert!(text.contains("  Site_A   0.3000 0.00000  0.00000  0.00000  Biso   1.000  Fe\n"));
    }

    #[test]
    fn test_molecule_uses_cartesian_columns() {
        let atoms = vec![Atom::new("O", [0.0, 0.0, 0.0]), Atom::new("H", [0.0, 0.0, 0.96])];
        let crystal = Crystal::new("", None, atoms);
        let text = to_cif_string(&[crystal], &WriteOptions::default()).unwrap();

        assert!(text.starts_with("data_image0\nloop_\n"));
        assert!(text.contains("  _atom_site_Cartn_x\n"));
        assert!(!text.contains("_cell_length_a"));
    }

    #[test]
    fn test_latin1_encoding() {
        assert_eq!(encode_latin1("Å").unwrap(), vec![0xc5]);
        assert!(matches!(
            encode_latin1("α-quartz"),
            Err(CifError::Encoding { ch: 'α' })
        ));
    }
}
