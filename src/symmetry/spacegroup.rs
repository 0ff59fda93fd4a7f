//! # 空间群服务
//!
//! 按国际表序号、Hermann-Mauguin 符号或显式对称操作列表解析空间群。
//! 内置目录覆盖全部 230 个空间群的常用设置（见 `tables.rs`），
//! 每个设置由 Hall 符号展开、求闭包得到。
//!
//! setting 沿用两值约定：对有两种原点选择的空间群，1/2 即原点选择；
//! 对菱方空间群，1 为六方轴，2 为菱方轴。
//!
//! ## 依赖关系
//! - 被 `parsers/cif/block.rs` 调用
//! - 使用 `symmetry/symop.rs`, `symmetry/hall.rs`, `symmetry/tables.rs`, `models/structure.rs`

use crate::error::{CifError, Result};
use crate::models::SpacegroupInfo;
use crate::symmetry::hall::HallSymbol;
use crate::symmetry::symop::{OpKey, SymOp};
use crate::symmetry::tables::SPACEGROUP_SETTINGS;

use std::collections::BTreeSet;
use std::fmt;
use std::sync::LazyLock;

/// 菱方空间群序号
pub const RHOMBOHEDRAL_SPACEGROUPS: [u16; 7] = [146, 148, 155, 160, 161, 166, 167];

/// 旧符号 -> 现行符号
const OLD_SPACEGROUP_NAMES: [(&str, &str); 5] = [
    ("Abm2", "Aem2"),
    ("Aba2", "Aea2"),
    ("Cmca", "Cmce"),
    ("Cmma", "Cmme"),
    ("Ccca", "Ccce"),
];

/// 格心类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Centering {
    P,
    A,
    B,
    C,
    I,
    F,
    /// 六方轴下的菱方格心（正向设置）
    R,
}

impl Centering {
    /// 亚晶格平移
    pub fn subtrans(&self) -> Vec<[f64; 3]> {
        const H: f64 = 0.5;
        const T1: f64 = 1.0 / 3.0;
        const T2: f64 = 2.0 / 3.0;
        match self {
            Centering::P => vec![[0.0; 3]],
            Centering::A => vec![[0.0; 3], [0.0, H, H]],
            Centering::B => vec![[0.0; 3], [H, 0.0, H]],
            Centering::C => vec![[0.0; 3], [H, H, 0.0]],
            Centering::I => vec![[0.0; 3], [H, H, H]],
            Centering::F => vec![[0.0; 3], [0.0, H, H], [H, 0.0, H], [H, H, 0.0]],
            Centering::R => vec![[0.0; 3], [T2, T1, T1], [T1, T2, T2]],
        }
    }

    /// 原胞基矢（以惯用胞分数坐标表示的行向量）
    pub fn primitive_basis(&self) -> [[f64; 3]; 3] {
        const H: f64 = 0.5;
        const T1: f64 = 1.0 / 3.0;
        const T2: f64 = 2.0 / 3.0;
        match self {
            Centering::P => [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
            Centering::A => [[1.0, 0.0, 0.0], [0.0, H, -H], [0.0, H, H]],
            Centering::B => [[H, 0.0, -H], [0.0, 1.0, 0.0], [H, 0.0, H]],
            Centering::C => [[H, -H, 0.0], [H, H, 0.0], [0.0, 0.0, 1.0]],
            Centering::I => [[-H, H, H], [H, -H, H], [H, H, -H]],
            Centering::F => [[0.0, H, H], [H, 0.0, H], [H, H, 0.0]],
            Centering::R => [[T2, T1, T1], [-T1, T1, T1], [-T1, -T2, T1]],
        }
    }
}

/// 目录中的一个空间群设置
struct CatalogGroup {
    number: u16,
    symbol: &'static str,
    /// 去空格后的符号，用于比较
    compact: String,
    setting: u8,
    centering: Centering,
    /// 陪集代表（每个旋转部分一个操作，不含格心平移）
    operations: Vec<SymOp>,
    /// 含格心平移的完整操作比较键
    keys: BTreeSet<OpKey>,
}

static CATALOG: LazyLock<Vec<CatalogGroup>> = LazyLock::new(|| {
    SPACEGROUP_SETTINGS
        .iter()
        .map(|&(number, symbol, choice, hall)| {
            let hall: HallSymbol = hall
                .parse()
                .expect("catalog Hall symbols are valid");
            let full = close_group(&hall.generators_with_centering());
            let keys = full.iter().map(SymOp::key).collect();
            CatalogGroup {
                number,
                symbol,
                compact: symbol.split_whitespace().collect(),
                setting: setting_of_choice(choice),
                centering: hall.centering,
                operations: coset_representatives(full),
                keys,
            }
        })
        .collect()
});

/// 设置代号 -> setting：原点选择 2 与菱方轴记为 2，其余为 1
fn setting_of_choice(choice: &str) -> u8 {
    if choice.starts_with('2') || choice == "R" {
        2
    } else {
        1
    }
}

/// 由生成元求群闭包（平移按晶格取模）
fn close_group(generators: &[SymOp]) -> Vec<SymOp> {
    let mut ops = vec![SymOp::identity()];
    let mut seen: BTreeSet<OpKey> = ops.iter().map(SymOp::key).collect();

    let mut start = 0;
    while start < ops.len() {
        let end = ops.len();
        for i in start..end {
            for g in generators {
                let candidate = g.compose(&ops[i]);
                if seen.insert(candidate.key()) {
                    ops.push(candidate);
                }
            }
        }
        start = end;
    }
    ops
}

/// 每个旋转部分保留最先出现的操作
fn coset_representatives(full: Vec<SymOp>) -> Vec<SymOp> {
    let mut rotations = BTreeSet::new();
    full.into_iter()
        .filter(|op| rotations.insert(op.key().rotation()))
        .collect()
}

/// 操作 × 亚晶格平移 的全部比较键
fn full_keys(operations: &[SymOp], subtrans: &[[f64; 3]]) -> BTreeSet<OpKey> {
    operations
        .iter()
        .flat_map(|op| {
            subtrans
                .iter()
                .map(move |t| SymOp::translation(*t).compose(op).key())
        })
        .collect()
}


/// 规范化 Hermann-Mauguin 符号，返回 (去空格符号, 后缀指定的 setting)。
///
/// 后缀 `:H`/`:1` 对应 setting 1，`:R`/`:2` 对应 setting 2；
/// `:1cab` 这类带轴置换的代号取其数字前缀。
pub fn normalize_symbol(symbol: &str) -> (String, Option<u8>) {
    let mut text = symbol.trim().trim_matches(|c| c == '\'' || c == '"');
    let mut setting = None;

    if let Some((head, suffix)) = text.rsplit_once(':') {
        let suffix = suffix.trim();
        setting = match suffix.chars().next() {
            Some('h' | 'H' | '1') => Some(1),
            Some('r' | 'R' | '2') => Some(2),
            _ => None,
        };
        text = head;
    }

    let compact: String = text.split_whitespace().collect();
    let compact = OLD_SPACEGROUP_NAMES
        .iter()
        .find(|(old, _)| *old == compact)
        .map(|(_, new)| new.to_string())
        .unwrap_or(compact);

    (compact, setting)
}

/// 单斜短符号补成 b 轴唯一的全符号："P21/c" -> "P121/c1"
fn unique_axis_b(compact: &str) -> Option<String> {
    let mut chars = compact.chars();
    let lattice = chars.next().filter(|c| "PABCI".contains(*c))?;
    let rest = chars.as_str();
    (!rest.is_empty()).then(|| format!("{}1{}1", lattice, rest))
}

/// 解析后的空间群
#[derive(Debug, Clone)]
pub struct Spacegroup {
    number: Option<u16>,
    symbol: String,
    setting: u8,
    centering: Centering,
    operations: Vec<SymOp>,
    subtrans: Vec<[f64; 3]>,
    /// 是否对应目录中的某个设置
    identified: bool,
}

impl Spacegroup {
    pub fn number(&self) -> Option<u16> {
        self.number
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn setting(&self) -> u8 {
        self.setting
    }

    pub fn centering(&self) -> Centering {
        self.centering
    }

    /// 不含格心平移的对称操作
    pub fn operations(&self) -> &[SymOp] {
        &self.operations
    }

    pub fn subtrans(&self) -> &[[f64; 3]] {
        &self.subtrans
    }

    /// 显式操作未能与目录中任何设置对应时为 false
    pub fn is_identified(&self) -> bool {
        self.identified
    }

    pub fn is_rhombohedral(&self) -> bool {
        self.number
            .is_some_and(|n| RHOMBOHEDRAL_SPACEGROUPS.contains(&n))
    }

    /// 原胞基矢（惯用胞分数坐标下的行向量）
    pub fn scaled_primitive_cell(&self) -> [[f64; 3]; 3] {
        self.centering.primitive_basis()
    }

    pub(crate) fn set_setting(&mut self, setting: u8) {
        self.setting = setting;
    }

    pub fn info(&self) -> SpacegroupInfo {
        SpacegroupInfo {
            number: self.number,
            symbol: self.symbol.clone(),
            setting: self.setting,
        }
    }

    fn from_catalog(group: &CatalogGroup) -> Self {
        Spacegroup {
            number: Some(group.number),
            symbol: group.symbol.to_string(),
            setting: group.setting,
            centering: group.centering,
            operations: group.operations.clone(),
            subtrans: group.centering.subtrans(),
            identified: true,
        }
    }
}

impl fmt::Display for Spacegroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.number {
            Some(n) => write!(f, "{} ({})", self.symbol, n),
            None => write!(f, "{}", self.symbol),
        }
    }
}

/// 空间群解析服务
pub trait SpacegroupService {
    /// 按国际表序号和 setting 查找标准设置
    fn by_number(&self, number: u16, setting: u8) -> Result<Spacegroup>;

    /// 按 Hermann-Mauguin 符号查找；`setting` 优先于符号后缀
    fn by_symbol(&self, symbol: &str, setting: Option<u8>) -> Result<Spacegroup>;

    /// 由显式对称操作构建空间群。
    ///
    /// `subtrans_included` 为真时操作列表已含格心平移；否则格心平移
    /// 取自 `symbol` 或 `declared` 对应的目录空间群。
    fn from_operations(
        &self,
        operations: &[String],
        declared: Option<u16>,
        symbol: Option<&str>,
        subtrans_included: bool,
    ) -> Result<Spacegroup>;
}

/// 内置空间群目录
#[derive(Debug, Default, Clone, Copy)]
pub struct BuiltinSpacegroups;

impl BuiltinSpacegroups {
    fn lookup_symbol(&self, symbol: &str, setting: Option<u8>) -> Option<&'static CatalogGroup> {
        let (compact, suffix) = normalize_symbol(symbol);
        let matching = |key: &str| -> Vec<&'static CatalogGroup> {
            CATALOG
                .iter()
                .filter(|g| g.compact.eq_ignore_ascii_case(key))
                .collect()
        };

        let mut candidates = matching(&compact);
        if candidates.is_empty() {
            if let Some(full) = unique_axis_b(&compact) {
                candidates = matching(&full);
            }
        }

        match setting.or(suffix) {
            Some(wanted) => candidates.into_iter().find(|g| g.setting == wanted),
            None => candidates.into_iter().next(),
        }
    }

    /// 与目录逐一比较操作集合，识别空间群
    fn identify(&self, operations: &[SymOp], subtrans: &[[f64; 3]]) -> Option<&'static CatalogGroup> {
        let keys = full_keys(operations, subtrans);
        CATALOG.iter().find(|g| g.keys == keys)
    }
}

fn check_setting(setting: u8) -> Result<()> {
    match setting {
        1 | 2 => Ok(()),
        other => Err(CifError::InvalidSetting(other as i64)),
    }
}

impl SpacegroupService for BuiltinSpacegroups {
    fn by_number(&self, number: u16, setting: u8) -> Result<Spacegroup> {
        check_setting(setting)?;
        CATALOG
            .iter()
            .find(|g| g.number == number && g.setting == setting)
            .map(Spacegroup::from_catalog)
            .ok_or_else(|| {
                CifError::UnknownSpacegroup(format!("number {} (setting {})", number, setting))
            })
    }

    fn by_symbol(&self, symbol: &str, setting: Option<u8>) -> Result<Spacegroup> {
        if let Some(s) = setting {
            check_setting(s)?;
        }
        self.lookup_symbol(symbol, setting)
            .map(Spacegroup::from_catalog)
            .ok_or_else(|| match setting {
                Some(s) => CifError::UnknownSpacegroup(format!("{} (setting {})", symbol, s)),
                None => CifError::UnknownSpacegroup(symbol.to_string()),
            })
    }

    fn from_operations(
        &self,
        operations: &[String],
        declared: Option<u16>,
        symbol: Option<&str>,
        subtrans_included: bool,
    ) -> Result<Spacegroup> {
        let ops = operations
            .iter()
            .map(|s| s.parse::<SymOp>())
            .collect::<Result<Vec<_>>>()?;

        let centering = if subtrans_included {
            Centering::P
        } else {
            let reference = symbol
                .and_then(|s| self.lookup_symbol(s, None))
                .or_else(|| {
                    declared.and_then(|n| CATALOG.iter().find(|g| g.number == n))
                });
            reference.map(|g| g.centering).ok_or_else(|| {
                CifError::UnknownSpacegroup(format!(
                    "cannot determine sublattice translations for {}",
                    symbol
                        .map(str::to_string)
                        .or_else(|| declared.map(|n| n.to_string()))
                        .unwrap_or_else(|| "an unnamed space group".to_string())
                ))
            })?
        };
        let subtrans = centering.subtrans();

        let (number, setting, name, identified) = match self.identify(&ops, &subtrans) {
            Some(g) => (Some(g.number), g.setting, g.symbol.to_string(), true),
            None => (
                declared,
                1,
                symbol.map(str::to_string).unwrap_or_else(|| "unnamed".to_string()),
                false,
            ),
        };

        Ok(Spacegroup {
            number,
            symbol: name,
            setting,
            centering,
            operations: ops,
            subtrans,
            identified,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order(number: u16, setting: u8) -> usize {
        BuiltinSpacegroups
            .by_number(number, setting)
            .unwrap()
            .operations()
            .len()
    }

    fn strings(ops: &[&str]) -> Vec<String> {
        ops.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_catalog_group_orders() {
        assert_eq!(order(1, 1), 1);
        assert_eq!(order(2, 1), 2);
        assert_eq!(order(12, 1), 4);
        assert_eq!(order(14, 1), 4);
        assert_eq!(order(62, 1), 8);
        assert_eq!(order(63, 1), 8);
        assert_eq!(order(136, 1), 16);
        assert_eq!(order(139, 1), 16);
        assert_eq!(order(148, 1), 6);
        assert_eq!(order(166, 1), 12);
        assert_eq!(order(166, 2), 12);
        assert_eq!(order(167, 2), 12);
        assert_eq!(order(194, 1), 24);
        assert_eq!(order(225, 1), 48);
        assert_eq!(order(227, 2), 48);
        assert_eq!(order(230, 1), 48);
    }

    #[test]
    fn test_every_number_has_a_standard_setting() {
        for number in 1..=230u16 {
            let sg = BuiltinSpacegroups.by_number(number, 1).unwrap();
            assert_eq!(sg.number(), Some(number));
        }
    }

    #[test]
    fn test_settings_share_group_order() {
        let mut orders = std::collections::BTreeMap::new();
        for g in CATALOG.iter() {
            let order = g.operations.len();
            assert_eq!(*orders.entry(g.number).or_insert(order), order, "{}", g.symbol);
            assert_eq!(g.keys.len(), order * g.centering.subtrans().len(), "{}", g.symbol);
        }
        assert_eq!(orders.len(), 230);
    }

    #[test]
    fn test_lookup_by_symbol() {
        let sg = BuiltinSpacegroups.by_symbol("Fm-3m", None).unwrap();
        assert_eq!(sg.number(), Some(225));
        assert_eq!(sg.subtrans().len(), 4);

        let sg = BuiltinSpacegroups.by_symbol("P 1 21/c 1", None).unwrap();
        assert_eq!(sg.number(), Some(14));

        let sg = BuiltinSpacegroups.by_symbol("P21/c", None).unwrap();
        assert_eq!(sg.symbol(), "P 1 21/c 1");

        let sg = BuiltinSpacegroups.by_symbol("R -3 m :R", None).unwrap();
        assert_eq!(sg.number(), Some(166));
        assert_eq!(sg.setting(), 2);
        assert!(sg.is_rhombohedral());
    }

    #[test]
    fn test_lookup_alternate_settings() {
        let sg = BuiltinSpacegroups.by_symbol("P 1 21/n 1", None).unwrap();
        assert_eq!(sg.number(), Some(14));
        let glide: SymOp = "-x+1/2,y+1/2,-z+1/2".parse().unwrap();
        assert!(sg.operations().iter().any(|op| op.key() == glide.key()));

        let sg = BuiltinSpacegroups.by_symbol("P 42/m n m", None).unwrap();
        assert_eq!(sg.number(), Some(136));
        assert_eq!(sg.operations().len(), 16);

        let sg = BuiltinSpacegroups.by_symbol("C m c m", None).unwrap();
        assert_eq!(sg.number(), Some(63));
        assert_eq!(sg.centering(), Centering::C);

        let sg = BuiltinSpacegroups.by_symbol("A m m a", None).unwrap();
        assert_eq!(sg.number(), Some(63));
        assert_eq!(sg.centering(), Centering::A);

        let sg = BuiltinSpacegroups.by_symbol("B 2/m 1 1", None).unwrap();
        assert_eq!(sg.number(), Some(12));
        assert_eq!(sg.centering(), Centering::B);
    }

    #[test]
    fn test_origin_choices() {
        let first = BuiltinSpacegroups.by_symbol("F d -3 m", None).unwrap();
        assert_eq!(first.setting(), 1);
        let second = BuiltinSpacegroups.by_symbol("F d -3 m:2", None).unwrap();
        assert_eq!(second.setting(), 2);
        assert_eq!(second.number(), Some(227));

        // 原点选择 2 的原点上有对称中心
        let inversion: SymOp = "-x,-y,-z".parse().unwrap();
        assert!(second.operations().iter().any(|op| op.key() == inversion.key()));
        assert!(!first.operations().iter().any(|op| op.key() == inversion.key()));

        let explicit = BuiltinSpacegroups.by_symbol("F d -3 m", Some(2)).unwrap();
        assert_eq!(explicit.setting(), 2);
    }

    #[test]
    fn test_unknown_spacegroup() {
        assert!(matches!(
            BuiltinSpacegroups.by_number(231, 1),
            Err(CifError::UnknownSpacegroup(_))
        ));
        assert!(matches!(
            BuiltinSpacegroups.by_number(225, 2),
            Err(CifError::UnknownSpacegroup(_))
        ));
        assert!(matches!(
            BuiltinSpacegroups.by_number(1, 3),
            Err(CifError::InvalidSetting(3))
        ));
        assert!(BuiltinSpacegroups.by_symbol("Q 9", None).is_err());
        assert!(BuiltinSpacegroups.by_symbol("P 1 21/n 1", Some(2)).is_err());
    }

    #[test]
    fn test_normalize_old_names() {
        assert_eq!(normalize_symbol("Cmca").0, "Cmce");
        assert_eq!(normalize_symbol("Ccca").0, "Ccce");
        assert_eq!(normalize_symbol("'P 63/m m c'").0, "P63/mmc");
        assert_eq!(normalize_symbol("R -3 c:H"), ("R-3c".to_string(), Some(1)));
        assert_eq!(normalize_symbol("P n c b :2cab"), ("Pncb".to_string(), Some(2)));
    }

    #[test]
    fn test_identify_from_operations() {
        let ops = strings(&["x,y,z", "-x,-y,-z"]);
        let sg = BuiltinSpacegroups
            .from_operations(&ops, None, None, true)
            .unwrap();
        assert_eq!(sg.number(), Some(2));
        assert!(sg.is_identified());
        assert_eq!(sg.subtrans(), &[[0.0; 3]]);
    }

    #[test]
    fn test_identify_alternate_setting_from_operations() {
        let ops = strings(&["x,y,z", "-x+1/2,y+1/2,-z+1/2", "-x,-y,-z", "x+1/2,-y+1/2,z+1/2"]);
        let sg = BuiltinSpacegroups
            .from_operations(&ops, Some(14), None, false)
            .unwrap();
        assert_eq!(sg.number(), Some(14));
        assert_eq!(sg.symbol(), "P 1 21/n 1");
    }

    #[test]
    fn test_identify_with_listed_centering() {
        // C 2/m，格心平移已写在操作列表中
        let ops = strings(&[
            "x,y,z",
            "-x,y,-z",
            "-x,-y,-z",
            "x,-y,z",
            "x+1/2,y+1/2,z",
            "-x+1/2,y+1/2,-z",
            "-x+1/2,-y+1/2,-z",
            "x+1/2,-y+1/2,z",
        ]);
        let sg = BuiltinSpacegroups
            .from_operations(&ops, None, None, true)
            .unwrap();
        assert_eq!(sg.number(), Some(12));
        assert_eq!(sg.operations().len(), 8);
    }

    #[test]
    fn test_subtrans_from_declared_group() {
        let ops = strings(&["x,y,z", "-x,y,-z", "-x,-y,-z", "x,-y,z"]);
        let sg = BuiltinSpacegroups
            .from_operations(&ops, Some(12), None, false)
            .unwrap();
        assert_eq!(sg.number(), Some(12));
        assert_eq!(sg.centering(), Centering::C);
        assert_eq!(sg.subtrans().len(), 2);
    }

    #[test]
    fn test_subtrans_from_symbol_before_number() {
        // A 1 2/m 1：序号同为 12，但格心是 A
        let ops = strings(&["x,y,z", "-x,y,-z", "-x,-y,-z", "x,-y,z"]);
        let sg = BuiltinSpacegroups
            .from_operations(&ops, Some(12), Some("A 1 2/m 1"), false)
            .unwrap();
        assert_eq!(sg.centering(), Centering::A);
        assert_eq!(sg.symbol(), "A 1 2/m 1");
    }

    #[test]
    fn test_unidentified_operations_keep_declared_number() {
        // 原点平移过的 P-1
        let ops = strings(&["x,y,z", "-x+1/2,-y,-z"]);
        let sg = BuiltinSpacegroups
            .from_operations(&ops, Some(2), Some("P -1"), true)
            .unwrap();
        assert_eq!(sg.number(), Some(2));
        assert_eq!(sg.symbol(), "P -1");
        assert!(!sg.is_identified());
    }

    #[test]
    fn test_primitive_basis_volumes() {
        let det = |m: [[f64; 3]; 3]| {
            m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1])
                - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
                + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0])
        };
        assert!((det(Centering::F.primitive_basis()).abs() - 0.25).abs() < 1e-12);
        assert!((det(Centering::I.primitive_basis()).abs() - 0.5).abs() < 1e-12);
        assert!((det(Centering::C.primitive_basis()).abs() - 0.5).abs() < 1e-12);
        assert!((det(Centering::A.primitive_basis()).abs() - 0.5).abs() < 1e-12);
        assert!((det(Centering::B.primitive_basis()).abs() - 0.5).abs() < 1e-12);
        assert!((det(Centering::R.primitive_basis()).abs() - 1.0 / 3.0).abs() < 1e-12);
    }
}
