//! # CIF 数据块与结构物化
//!
//! `CifBlock` 持有一个 `data_` 段的标签映射，并负责把它转换成
//! `Crystal`：晶胞、坐标、元素、质量（氘修正）、占据率与空间群，
//! 有晶胞时经对称展开得到完整晶胞。
//!
//! ## 依赖关系
//! - 被 `parsers/cif/mod.rs`、`commands/` 使用
//! - 使用 `symmetry/`, `models/`, `parsers/cif/value.rs`

use crate::diagnostics::{CifWarning, Diagnostics};
use crate::error::{CifError, Result};
use crate::models::element::{atomic_mass, DEUTERIUM_MASS};
use crate::models::{Atom, Crystal, Lattice, OccupancyMap};
use crate::parsers::cif::backend::ReaderKind;
use crate::parsers::cif::value::{TagMap, TagValue, Value};
use crate::symmetry::{expand, AsymmetricUnit, BuiltinSpacegroups, Spacegroup, SpacegroupService};

use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;

static ELEMENT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[A-Z][a-z]?").unwrap());

pub const CELL_TAGS: [&str; 6] = [
    "_cell_length_a",
    "_cell_length_b",
    "_cell_length_c",
    "_cell_angle_alpha",
    "_cell_angle_beta",
    "_cell_angle_gamma",
];

const FRACT_TAGS: [&str; 3] = ["_atom_site_fract_x", "_atom_site_fract_y", "_atom_site_fract_z"];
const CARTN_TAGS: [&str; 3] = ["_atom_site_cartn_x", "_atom_site_cartn_y", "_atom_site_cartn_z"];

const SYMBOL_TAGS: [&str; 2] = ["_atom_site_type_symbol", "_atom_site_label"];

const SPACEGROUP_NUMBER_TAGS: [&str; 3] = [
    "_space_group.it_number",
    "_space_group_it_number",
    "_symmetry_int_tables_number",
];

const HM_SYMBOL_TAGS: [&str; 3] = [
    "_space_group.patterson_name_h-m",
    "_symmetry_space_group_name_h-m",
    "_space_group_name_h-m_alt",
];

const SYMOP_TAGS: [&str; 3] = [
    "_space_group_symop_operation_xyz",
    "_space_group_symop.operation_xyz",
    "_symmetry_equiv_pos_as_xyz",
];

const SETTING_TAG: &str = "_symmetry_space_group_setting";
const CRYSTAL_SYSTEM_TAGS: [&str; 2] = ["_space_group_crystal_system", "_symmetry_cell_setting"];
const OCCUPANCY_TAG: &str = "_atom_site_occupancy";

// ─────────────────────────────────────────────────────────────
// 读取选项
// ─────────────────────────────────────────────────────────────

/// 读取与物化选项
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadOptions {
    /// 把原始标签保存到结构上
    pub store_tags: bool,
    /// 输出原胞而非惯用胞
    pub primitive_cell: bool,
    /// 文件列出的对称操作已包含格心平移
    pub subtrans_included: bool,
    /// 读取 `_atom_site_occupancy`
    pub fractional_occupancies: bool,
    pub reader: ReaderKind,
}

impl Default for ReadOptions {
    fn default() -> Self {
        ReadOptions {
            store_tags: false,
            primitive_cell: false,
            subtrans_included: true,
            fractional_occupancies: true,
            reader: ReaderKind::Native,
        }
    }
}

impl ReadOptions {
    /// 检查互斥选项，在任何读取之前调用
    pub fn validate(&self) -> Result<()> {
        if self.primitive_cell && self.subtrans_included {
            return Err(CifError::PrimitiveWithSubtrans);
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────
// 数据块
// ─────────────────────────────────────────────────────────────

/// 一个 `data_` 数据块
#[derive(Debug, Clone, PartialEq)]
pub struct CifBlock {
    pub name: String,
    /// 小写标签名 -> 值
    pub tags: TagMap,
    /// 解析本块文本时产生的警告
    pub warnings: Vec<CifWarning>,
}

impl CifBlock {
    pub fn new(name: impl Into<String>, tags: TagMap) -> Self {
        CifBlock {
            name: name.into(),
            tags,
            warnings: Vec::new(),
        }
    }

    fn get_any(&self, names: &[&'static str]) -> Option<(&'static str, &TagValue)> {
        names
            .iter()
            .find_map(|&name| self.tags.get(name).map(|v| (name, v)))
    }

    fn invalid_tag(tag: &str, reason: impl Into<String>) -> CifError {
        CifError::InvalidTag {
            tag: tag.to_string(),
            reason: reason.into(),
        }
    }

    fn invalid_data(&self, reason: impl Into<String>) -> CifError {
        CifError::InvalidData {
            block: self.name.clone(),
            reason: reason.into(),
        }
    }

    fn numeric_column(tag: &str, value: &TagValue) -> Result<Vec<f64>> {
        value
            .values()
            .iter()
            .map(|v| {
                v.as_f64()
                    .ok_or_else(|| Self::invalid_tag(tag, format!("non-numeric value '{}'", v)))
            })
            .collect()
    }

    fn coordinates(&self, tags: [&str; 3]) -> Result<Option<Vec<[f64; 3]>>> {
        let mut columns = Vec::with_capacity(3);
        for tag in tags {
            match self.tags.get(tag) {
                Some(value) => columns.push(Self::numeric_column(tag, value)?),
                None => return Ok(None),
            }
        }

        let n = columns[0].len();
        if columns.iter().any(|c| c.len() != n) {
            return Err(self.invalid_data(format!(
                "coordinate columns {} have different lengths",
                tags.join(", ")
            )));
        }

        Ok(Some(
            (0..n)
                .map(|i| [columns[0][i], columns[1][i], columns[2][i]])
                .collect(),
        ))
    }

    // ─────────────────────────────────────────────────────────
    // 晶胞与坐标
    // ─────────────────────────────────────────────────────────

    /// 晶胞参数 (a, b, c, α, β, γ)；六个标签缺一即视为没有晶胞
    pub fn cellpar(&self) -> Result<Option<[f64; 6]>> {
        let mut cellpar = [0.0; 6];
        for (slot, tag) in cellpar.iter_mut().zip(CELL_TAGS) {
            let Some(value) = self.tags.get(tag) else {
                return Ok(None);
            };
            *slot = value
                .as_single()
                .and_then(Value::as_f64)
                .ok_or_else(|| Self::invalid_tag(tag, format!("expected a number, got '{}'", value)))?;
        }
        Ok(Some(cellpar))
    }

    /// 三维晶格；没有晶胞或晶胞退化时为 `None`
    pub fn lattice(&self) -> Result<Option<Lattice>> {
        Ok(self.cellpar()?.and_then(|[a, b, c, alpha, beta, gamma]| {
            (a > 0.0 && b > 0.0 && c > 0.0)
                .then(|| Lattice::from_parameters(a, b, c, alpha, beta, gamma))
        }))
    }

    /// `_atom_site_fract_*`
    pub fn scaled_positions(&self) -> Result<Option<Vec<[f64; 3]>>> {
        self.coordinates(FRACT_TAGS)
    }

    /// `_atom_site_cartn_*`
    pub fn cartesian_positions(&self) -> Result<Option<Vec<[f64; 3]>>> {
        self.coordinates(CARTN_TAGS)
    }

    // ─────────────────────────────────────────────────────────
    // 元素、质量、占据率
    // ─────────────────────────────────────────────────────────

    /// 元素符号，氘保留为 `D`
    fn symbols_with_deuterium(&self) -> Result<Vec<String>> {
        let (tag, labels) = self
            .get_any(&SYMBOL_TAGS)
            .ok_or_else(|| self.invalid_data("no _atom_site_type_symbol or _atom_site_label"))?;

        labels
            .values()
            .iter()
            .map(|label| {
                let text = label.to_string();
                ELEMENT
                    .find(&text)
                    .map(|m| m.as_str().to_string())
                    .ok_or_else(|| Self::invalid_tag(tag, format!("no element symbol in '{}'", text)))
            })
            .collect()
    }

    /// 元素符号（`D` 记作 `H`）
    pub fn symbols(&self) -> Result<Vec<String>> {
        Ok(self
            .symbols_with_deuterium()?
            .into_iter()
            .map(|s| if s == "D" { "H".to_string() } else { s })
            .collect())
    }

    /// 含氘时给出全部原子的质量，否则 `None`
    pub fn masses(&self) -> Result<Option<Vec<f64>>> {
        let symbols = self.symbols_with_deuterium()?;
        if !symbols.iter().any(|s| s == "D") {
            return Ok(None);
        }
        Ok(Some(
            symbols
                .iter()
                .map(|s| {
                    if s == "D" {
                        DEUTERIUM_MASS
                    } else {
                        atomic_mass(s).unwrap_or(0.0)
                    }
                })
                .collect(),
        ))
    }

    /// `_atom_site_occupancy`，`?` 与 `.` 记为 1
    pub fn occupancies(&self) -> Result<Option<Vec<f64>>> {
        let Some(value) = self.tags.get(OCCUPANCY_TAG) else {
            return Ok(None);
        };
        value
            .values()
            .iter()
            .map(|v| match v {
                Value::Text(s) if s == "?" || s == "." => Ok(1.0),
                _ => v.as_f64().ok_or_else(|| {
                    Self::invalid_tag(OCCUPANCY_TAG, format!("non-numeric value '{}'", v))
                }),
            })
            .collect::<Result<Vec<_>>>()
            .map(Some)
    }

    fn labels(&self) -> Option<Vec<String>> {
        self.tags
            .get("_atom_site_label")
            .map(|v| v.values().iter().map(|l| l.to_string()).collect())
    }

    // ─────────────────────────────────────────────────────────
    // 空间群
    // ─────────────────────────────────────────────────────────

    pub fn spacegroup_number(&self) -> Result<Option<u16>> {
        let Some((tag, value)) = self.get_any(&SPACEGROUP_NUMBER_TAGS) else {
            return Ok(None);
        };
        value
            .as_single()
            .and_then(Value::as_i64)
            .and_then(|n| u16::try_from(n).ok())
            .filter(|n| (1..=230).contains(n))
            .map(Some)
            .ok_or_else(|| Self::invalid_tag(tag, format!("invalid space group number '{}'", value)))
    }

    pub fn hm_symbol(&self) -> Option<String> {
        self.get_any(&HM_SYMBOL_TAGS)
            .and_then(|(_, v)| v.as_single())
            .map(|v| v.to_string())
    }

    /// 显式列出的对称操作
    pub fn sitesym(&self) -> Option<Vec<String>> {
        self.get_any(&SYMOP_TAGS)
            .map(|(_, v)| v.values().iter().map(|op| op.to_string()).collect())
    }

    /// `_symmetry_space_group_setting`，只允许 1 或 2
    pub fn setting(&self) -> Result<Option<u8>> {
        let Some(value) = self.tags.get(SETTING_TAG) else {
            return Ok(None);
        };
        let setting = value
            .as_single()
            .and_then(Value::as_i64)
            .ok_or_else(|| Self::invalid_tag(SETTING_TAG, format!("expected an integer, got '{}'", value)))?;
        match setting {
            1 | 2 => Ok(Some(setting as u8)),
            other => Err(CifError::InvalidSetting(other)),
        }
    }

    /// 由晶系标签推断菱方空间群的 setting
    fn infer_setting(&self, spacegroup: &Spacegroup, diag: &mut Diagnostics) -> Option<u8> {
        let (_, value) = self.get_any(&CRYSTAL_SYSTEM_TAGS)?;
        let system = value.to_string();

        if !spacegroup.is_rhombohedral() {
            diag.warn(CifWarning::UninterpretedCrystalSystem {
                system,
                spacegroup: spacegroup.to_string(),
            });
            return None;
        }

        match system.to_lowercase().as_str() {
            "hexagonal" => Some(1),
            "trigonal" | "rhombohedral" => Some(2),
            _ => {
                diag.warn(CifWarning::UnexpectedCrystalSystem {
                    system,
                    spacegroup: spacegroup.to_string(),
                });
                None
            }
        }
    }

    /// 解析空间群：对称操作 > 序号 > H-M 符号 > P1
    pub fn spacegroup<S: SpacegroupService>(
        &self,
        service: &S,
        subtrans_included: bool,
        diag: &mut Diagnostics,
    ) -> Result<Spacegroup> {
        let number = self.spacegroup_number()?;
        let symbol = self.hm_symbol();
        let explicit_setting = self.setting()?;
        let sitesym = self.sitesym();

        let mut spacegroup = match (&sitesym, number, &symbol) {
            (Some(ops), _, _) => {
                service.from_operations(ops, number, symbol.as_deref(), subtrans_included)?
            }
            // 符号能区分同一序号下的不同设置（如 P 1 21/n 1）
            (None, Some(n), Some(s)) => match service.by_symbol(s, None) {
                Ok(sg) if sg.number() == Some(n) => sg,
                _ => service.by_number(n, 1)?,
            },
            (None, Some(n), None) => service.by_number(n, 1)?,
            (None, None, Some(s)) => service.by_symbol(s, None)?,
            (None, None, None) => service.by_number(1, 1)?,
        };

        let setting = match explicit_setting {
            Some(s) => Some(s),
            None => self.infer_setting(&spacegroup, diag),
        };

        if let Some(setting) = setting.filter(|&s| s != spacegroup.setting()) {
            if sitesym.is_none() {
                spacegroup = service.by_symbol(spacegroup.symbol(), Some(setting))?;
            } else if let (true, Some(number)) = (spacegroup.is_identified(), spacegroup.number()) {
                return Err(CifError::SettingMismatch {
                    requested: setting,
                    derived: spacegroup.setting(),
                    number,
                });
            } else {
                spacegroup.set_setting(setting);
            }
        }

        if let (Some(declared), Some(derived)) = (number, spacegroup.number()) {
            if declared != derived {
                return Err(CifError::SpacegroupMismatch { declared, derived });
            }
        }

        Ok(spacegroup)
    }

    // ─────────────────────────────────────────────────────────
    // 物化
    // ─────────────────────────────────────────────────────────

    /// 由标签构建晶体结构
    pub fn to_crystal(&self, options: &ReadOptions, diag: &mut Diagnostics) -> Result<Crystal> {
        options.validate()?;

        let lattice = self.lattice()?;
        let scaled = self.scaled_positions()?;
        let cartesian = self.cartesian_positions()?;
        if scaled.is_none() && cartesian.is_none() {
            return Err(CifError::NoPositions {
                block: self.name.clone(),
            });
        }

        let occupancies = if options.fractional_occupancies {
            self.occupancies()?
        } else {
            None
        };
        let symbols = self.symbols()?;
        let masses = self.masses()?;

        let mut crystal = match lattice {
            Some(lattice) => {
                let scaled = match scaled {
                    Some(scaled) => scaled,
                    None => cartesian
                        .unwrap_or_default()
                        .into_iter()
                        .map(|p| lattice.to_fractional(p))
                        .collect::<Option<Vec<_>>>()
                        .ok_or_else(|| self.invalid_data("singular unit cell"))?,
                };
                let n = scaled.len();
                self.check_lengths(n, &symbols, occupancies.as_deref())?;

                let spacegroup = self.spacegroup(&BuiltinSpacegroups, options.subtrans_included, diag)?;
                let unit = AsymmetricUnit {
                    symbols,
                    scaled_positions: scaled,
                    masses,
                    labels: self.labels().filter(|l| l.len() == n),
                };

                expand(
                    &self.name,
                    &unit,
                    &lattice,
                    &spacegroup,
                    occupancies.as_deref(),
                    options.primitive_cell,
                    diag,
                )
            }
            None => {
                if scaled.is_some() {
                    return Err(CifError::MissingCell {
                        block: self.name.clone(),
                    });
                }
                let Some(positions) = cartesian else {
                    return Err(CifError::NoPositions {
                        block: self.name.clone(),
                    });
                };
                self.check_lengths(positions.len(), &symbols, occupancies.as_deref())?;

                let labels = self.labels().filter(|l| l.len() == positions.len());
                let atoms = symbols
                    .iter()
                    .zip(&positions)
                    .enumerate()
                    .map(|(i, (symbol, &position))| {
                        let mut atom = Atom::new(symbol.clone(), position);
                        if let Some(masses) = &masses {
                            atom = atom.with_mass(masses[i]);
                        }
                        if let Some(labels) = &labels {
                            atom = atom.with_label(labels[i].clone());
                        }
                        atom
                    })
                    .collect();

                let mut crystal = Crystal::new(self.name.clone(), None, atoms);
                crystal.occupancy = occupancies.map(|occ| {
                    symbols
                        .iter()
                        .zip(occ)
                        .enumerate()
                        .map(|(i, (symbol, o))| (i, BTreeMap::from([(symbol.clone(), o)])))
                        .collect::<OccupancyMap>()
                });
                crystal
            }
        };

        crystal.source_format = Some("cif".to_string());
        if options.store_tags {
            crystal.tags = Some(self.tags.clone());
        }
        Ok(crystal)
    }

    fn check_lengths(&self, n: usize, symbols: &[String], occupancies: Option<&[f64]>) -> Result<()> {
        if symbols.len() != n {
            return Err(self.invalid_data(format!(
                "{} positions but {} element symbols",
                n,
                symbols.len()
            )));
        }
        if let Some(occ) = occupancies.filter(|o| o.len() != n) {
            return Err(self.invalid_data(format!(
                "{} positions but {} occupancies",
                n,
                occ.len()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::cif::parse::parse_cif_str;

    fn block(text: &str) -> CifBlock {
        parse_cif_str(text).next().unwrap().unwrap()
    }

    fn single(v: Value) -> TagValue {
        TagValue::Single(v)
    }

    fn column<T: Into<Value>>(items: Vec<T>) -> TagValue {
        TagValue::Column(items.into_iter().map(Into::into).collect())
    }

    impl From<f64> for Value {
        fn from(v: f64) -> Self {
            Value::Float(v)
        }
    }

    impl From<&str> for Value {
        fn from(v: &str) -> Self {
            Value::Text(v.to_string())
        }
    }

    fn cubic_tags(a: f64) -> TagMap {
        let mut tags = TagMap::new();
        for tag in &CELL_TAGS[..3] {
            tags.insert(tag.to_string(), single(Value::Float(a)));
        }
        for tag in &CELL_TAGS[3..] {
            tags.insert(tag.to_string(), single(Value::Int(90)));
        }
        tags
    }

    fn read(block: &CifBlock) -> Result<Crystal> {
        block.to_crystal(&ReadOptions::default(), &mut Diagnostics::new())
    }

    #[test]
    fn test_single_sodium_atom() {
        let mut tags = cubic_tags(5.0);
        tags.insert("_atom_site_fract_x".into(), column(vec![0.0]));
        tags.insert("_atom_site_fract_y".into(), column(vec![0.0]));
        tags.insert("_atom_site_fract_z".into(), column(vec![0.0]));
        tags.insert("_atom_site_type_symbol".into(), column(vec!["Na"]));
        let block = CifBlock::new("Na", tags);

        let crystal = read(&block).unwrap();

        assert_eq!(crystal.atoms.len(), 1);
        assert_eq!(crystal.atoms[0].element, "Na");
        assert_eq!(crystal.atoms[0].position, [0.0, 0.0, 0.0]);
        let (a, b, c, alpha, beta, gamma) = crystal.lattice.as_ref().unwrap().parameters();
        for length in [a, b, c] {
            assert!((length - 5.0).abs() < 1e-10);
        }
        for angle in [alpha, beta, gamma] {
            assert!((angle - 90.0).abs() < 1e-10);
        }
        assert_eq!(crystal.space_group.as_ref().unwrap().number, Some(1));
    }

    #[test]
    fn test_deuterium_masses() {
        let block = block(
            "data_heavy_water\n\
             loop_\n\
             _atom_site_label\n\
             _atom_site_Cartn_x\n\
             _atom_site_Cartn_y\n\
             _atom_site_Cartn_z\n\
             D1 0.0 0.0 0.0\n\
             O1 0.0 0.0 1.0\n",
        );

        assert_eq!(block.symbols().unwrap(), vec!["H", "O"]);
        let masses = block.masses().unwrap().unwrap();
        assert_eq!(masses[0], 2.01355);
        assert_eq!(masses[1], atomic_mass("O").unwrap());

        let crystal = read(&block).unwrap();
        assert!(crystal.lattice.is_none());
        assert_eq!(crystal.symbols(), vec!["H", "O"]);
        assert_eq!(crystal.masses(), masses);
    }

    #[test]
    fn test_no_deuterium_means_default_masses() {
        let mut tags = TagMap::new();
        tags.insert("_atom_site_label".into(), column(vec!["Fe1", "O2a"]));
        let block = CifBlock::new("x", tags);
        assert_eq!(block.symbols().unwrap(), vec!["Fe", "O"]);
        assert!(block.masses().unwrap().is_none());
    }

    #[test]
    fn test_primitive_with_subtrans_rejected_before_reading() {
        let block = CifBlock::new("empty", TagMap::new());
        let options = ReadOptions {
            primitive_cell: true,
            subtrans_included: true,
            ..ReadOptions::default()
        };
        let result = block.to_crystal(&options, &mut Diagnostics::new());
        assert!(matches!(result, Err(CifError::PrimitiveWithSubtrans)));
    }

    #[test]
    fn test_no_positions() {
        let block = CifBlock::new("empty", cubic_tags(4.0));
        assert!(matches!(read(&block), Err(CifError::NoPositions { .. })));
    }

    #[test]
    fn test_fractional_without_cell() {
        let mut tags = TagMap::new();
        tags.insert("_atom_site_fract_x".into(), column(vec![0.0]));
        tags.insert("_atom_site_fract_y".into(), column(vec![0.0]));
        tags.insert("_atom_site_fract_z".into(), column(vec![0.0]));
        tags.insert("_atom_site_type_symbol".into(), column(vec!["Na"]));
        let block = CifBlock::new("nocell", tags);
        assert!(matches!(read(&block), Err(CifError::MissingCell { .. })));
    }

    #[test]
    fn test_partial_cell_is_no_cell() {
        let mut tags = cubic_tags(4.0);
        tags.remove("_cell_angle_gamma");
        let block = CifBlock::new("partial", tags);
        assert!(block.cellpar().unwrap().is_none());
    }

    const ROCKSALT: &str = "data_NaCl\n\
        _cell_length_a 5.64\n\
        _cell_length_b 5.64\n\
        _cell_length_c 5.64\n\
        _cell_angle_alpha 90\n\
        _cell_angle_beta 90\n\
        _cell_angle_gamma 90\n\
        _symmetry_space_group_name_H-M 'F m -3 m'\n\
        _symmetry_Int_Tables_number 225\n\
        loop_\n\
        _atom_site_label\n\
        _atom_site_type_symbol\n\
        _atom_site_fract_x\n\
        _atom_site_fract_y\n\
        _atom_site_fract_z\n\
        Na1 Na 0.0 0.0 0.0\n\
        Cl1 Cl 0.5 0.5 0.5\n";

    #[test]
    fn test_rocksalt_by_number() {
        let block = block(ROCKSALT);
        let crystal = read(&block).unwrap();

        assert_eq!(crystal.name, "NaCl");
        assert_eq!(crystal.atoms.len(), 8);
        assert_eq!(crystal.formula(), "Cl4Na4");
        assert_eq!(crystal.atoms[0].label.as_deref(), Some("Na1"));
        assert!(crystal.tags.is_none());
    }

    #[test]
    fn test_store_tags_and_primitive_cell() {
        let block = block(ROCKSALT);
        let options = ReadOptions {
            store_tags: true,
            primitive_cell: true,
            subtrans_included: false,
            ..ReadOptions::default()
        };

        let crystal = block.to_crystal(&options, &mut Diagnostics::new()).unwrap();
        assert_eq!(crystal.atoms.len(), 2);
        assert_eq!(crystal.tags.as_ref(), Some(&block.tags));
    }

    #[test]
    fn test_spacegroup_from_symbol() {
        let mut tags = cubic_tags(4.0);
        tags.insert(
            "_symmetry_space_group_name_h-m".into(),
            single(Value::Text("I m -3 m".into())),
        );
        let block = CifBlock::new("bcc", tags);
        let sg = block
            .spacegroup(&BuiltinSpacegroups, true, &mut Diagnostics::new())
            .unwrap();
        assert_eq!(sg.number(), Some(229));
    }

    #[test]
    fn test_spacegroup_mismatch() {
        let mut tags = cubic_tags(4.0);
        tags.insert("_symmetry_int_tables_number".into(), single(Value::Int(2)));
        tags.insert("_symmetry_equiv_pos_as_xyz".into(), column(vec!["x,y,z"]));
        let block = CifBlock::new("bad", tags);

        let err = block
            .spacegroup(&BuiltinSpacegroups, true, &mut Diagnostics::new())
            .unwrap_err();
        assert!(matches!(
            err,
            CifError::SpacegroupMismatch {
                declared: 2,
                derived: 1
            }
        ));
    }

    fn site_block(name: &str, tag: (&str, Value), sites: &[(&str, [f64; 3])]) -> CifBlock {
        let mut tags = cubic_tags(5.0);
        tags.insert(tag.0.into(), single(tag.1));
        tags.insert(
            "_atom_site_type_symbol".into(),
            column(sites.iter().map(|s| s.0).collect()),
        );
        for (k, axis) in ["x", "y", "z"].iter().enumerate() {
            tags.insert(
                format!("_atom_site_fract_{}", axis),
                column(sites.iter().map(|s| s.1[k]).collect()),
            );
        }
        CifBlock::new(name, tags)
    }

    #[test]
    fn test_orthorhombic_by_number_or_symbol() {
        let general = [("O", [0.1, 0.2, 0.3])];
        for tag in [
            ("_symmetry_int_tables_number", Value::Int(63)),
            ("_symmetry_space_group_name_h-m", Value::Text("C m c m".into())),
        ] {
            let crystal = read(&site_block("cmcm", tag, &general)).unwrap();
            assert_eq!(crystal.atoms.len(), 16);
            assert_eq!(crystal.space_group.as_ref().unwrap().number, Some(63));
        }
    }

    #[test]
    fn test_tetragonal_by_number_or_symbol() {
        let rutile = [("Ti", [0.0, 0.0, 0.0]), ("O", [0.3, 0.3, 0.0])];
        for tag in [
            ("_symmetry_int_tables_number", Value::Int(136)),
            ("_symmetry_space_group_name_h-m", Value::Text("P 42/m n m".into())),
        ] {
            let crystal = read(&site_block("rutile", tag, &rutile)).unwrap();
            assert_eq!(crystal.formula(), "O4Ti2");
            assert_eq!(crystal.space_group.as_ref().unwrap().number, Some(136));
        }
    }

    #[test]
    fn test_symbol_selects_alternate_setting() {
        let mut block = site_block(
            "p21n",
            ("_symmetry_space_group_name_h-m", Value::Text("P 1 21/n 1".into())),
            &[("O", [0.1, 0.2, 0.3])],
        );
        block
            .tags
            .insert("_symmetry_int_tables_number".into(), single(Value::Int(14)));

        let crystal = read(&block).unwrap();
        assert_eq!(crystal.space_group.as_ref().unwrap().symbol, "P 1 21/n 1");
        assert_eq!(crystal.atoms.len(), 4);
        // 2_1 螺旋带 n 平移：-x+1/2, y+1/2, -z+1/2
        let expected = [0.4, 0.7, 0.2];
        assert!(crystal
            .atoms
            .iter()
            .any(|a| (0..3).all(|k| (a.position[k] - expected[k]).abs() < 1e-8)));
    }

    #[test]
    fn test_setting_conflicting_with_operations() {
        let mut tags = cubic_tags(4.0);
        tags.insert("_symmetry_equiv_pos_as_xyz".into(), column(vec!["x,y,z", "-x,-y,-z"]));
        tags.insert(SETTING_TAG.into(), single(Value::Int(2)));
        let block = CifBlock::new("p-1", tags);

        let err = block
            .spacegroup(&BuiltinSpacegroups, true, &mut Diagnostics::new())
            .unwrap_err();
        assert!(matches!(
            err,
            CifError::SettingMismatch {
                requested: 2,
                derived: 1,
                number: 2
            }
        ));
    }

    #[test]
    fn test_setting_kept_for_unidentified_operations() {
        let mut tags = cubic_tags(4.0);
        tags.insert("_symmetry_equiv_pos_as_xyz".into(), column(vec!["x,y,z", "-x+1/2,-y,-z"]));
        tags.insert(SETTING_TAG.into(), single(Value::Int(2)));
        let block = CifBlock::new("shifted", tags);

        let sg = block
            .spacegroup(&BuiltinSpacegroups, true, &mut Diagnostics::new())
            .unwrap();
        assert!(!sg.is_identified());
        assert_eq!(sg.setting(), 2);
    }

    #[test]
    fn test_invalid_setting() {
        let mut tags = cubic_tags(4.0);
        tags.insert(SETTING_TAG.into(), single(Value::Int(3)));
        let block = CifBlock::new("bad", tags);
        assert!(matches!(block.setting(), Err(CifError::InvalidSetting(3))));
    }

    #[test]
    fn test_rhombohedral_setting_from_crystal_system() {
        let mut tags = cubic_tags(4.0);
        tags.insert("_symmetry_int_tables_number".into(), single(Value::Int(166)));
        tags.insert("_symmetry_cell_setting".into(), single(Value::Text("Rhombohedral".into())));
        let block = CifBlock::new("r", tags);

        let mut diag = Diagnostics::new();
        let sg = block.spacegroup(&BuiltinSpacegroups, true, &mut diag).unwrap();
        assert_eq!(sg.number(), Some(166));
        assert_eq!(sg.setting(), 2);
        assert!(diag.is_empty());
    }

    #[test]
    fn test_crystal_system_warnings() {
        let mut tags = cubic_tags(4.0);
        tags.insert("_symmetry_int_tables_number".into(), single(Value::Int(166)));
        tags.insert("_space_group_crystal_system".into(), single(Value::Text("cubic".into())));
        let block = CifBlock::new("r", tags);
        let mut diag = Diagnostics::new();
        let sg = block.spacegroup(&BuiltinSpacegroups, true, &mut diag).unwrap();
        assert_eq!(sg.setting(), 1);
        assert!(matches!(
            diag.warnings(),
            [CifWarning::UnexpectedCrystalSystem { .. }]
        ));

        let mut tags = cubic_tags(4.0);
        tags.insert("_symmetry_int_tables_number".into(), single(Value::Int(225)));
        tags.insert("_space_group_crystal_system".into(), single(Value::Text("cubic".into())));
        let block = CifBlock::new("c", tags);
        let mut diag = Diagnostics::new();
        block.spacegroup(&BuiltinSpacegroups, true, &mut diag).unwrap();
        assert!(matches!(
            diag.warnings(),
            [CifWarning::UninterpretedCrystalSystem { .. }]
        ));
    }

    #[test]
    fn test_no_cell_occupancy_map() {
        let block = block(
            "data_molecule\n\
             loop_\n\
             _atom_site_type_symbol\n\
             _atom_site_occupancy\n\
             _atom_site_Cartn_x\n\
             _atom_site_Cartn_y\n\
             _atom_site_Cartn_z\n\
             C 1.0 0.0 0.0 0.0\n\
             O 0.5 0.0 0.0 1.2\n",
        );

        let crystal = read(&block).unwrap();
        let occ = crystal.occupancy.as_ref().unwrap();
        assert_eq!(occ[&0]["C"], 1.0);
        assert_eq!(occ[&1]["O"], 0.5);

        let options = ReadOptions {
            fractional_occupancies: false,
            ..ReadOptions::default()
        };
        let crystal = block.to_crystal(&options, &mut Diagnostics::new()).unwrap();
        assert!(crystal.occupancy.is_none());
    }

    #[test]
    fn test_cartesian_positions_with_cell_are_converted() {
        let mut tags = cubic_tags(4.0);
        tags.insert("_atom_site_cartn_x".into(), column(vec![2.0]));
        tags.insert("_atom_site_cartn_y".into(), column(vec![1.0]));
        tags.insert("_atom_site_cartn_z".into(), column(vec![0.0]));
        tags.insert("_atom_site_type_symbol".into(), column(vec!["Cu"]));
        let block = CifBlock::new("cu", tags);

        let crystal = read(&block).unwrap();
        let p = crystal.atoms[0].position;
        assert!((p[0] - 0.5).abs() < 1e-10);
        assert!((p[1] - 0.25).abs() < 1e-10);
        assert!(p[2].abs() < 1e-10);
    }

    #[test]
    fn test_column_length_mismatch() {
        let mut tags = cubic_tags(4.0);
        tags.insert("_atom_site_fract_x".into(), column(vec![0.0, 0.5]));
        tags.insert("_atom_site_fract_y".into(), column(vec![0.0]));
        tags.insert("_atom_site_fract_z".into(), column(vec![0.0]));
        tags.insert("_atom_site_type_symbol".into(), column(vec!["Cu"]));
        let block = CifBlock::new("cu", tags);
        assert!(matches!(read(&block), Err(CifError::InvalidData { .. })));
    }
}
