//! # info 命令实现
//!
//! 读取 CIF 文件，以表格形式打印每个结构的摘要，并列出解析警告。
//!
//! ## 依赖关系
//! - 使用 `cli/info.rs` 定义的参数
//! - 使用 `parsers/cif`, `models/`
//! - 使用 `utils/output.rs`

use crate::cli::info::InfoArgs;
use crate::commands::report_warnings;
use crate::diagnostics::Diagnostics;
use crate::error::Result;
use crate::models::Crystal;
use crate::parsers::cif;
use crate::utils::output;

use tabled::{Table, Tabled};

/// 摘要表的一行
#[derive(Debug, Clone, Tabled)]
struct SummaryRow {
    #[tabled(rename = "Block")]
    block: String,
    #[tabled(rename = "Formula")]
    formula: String,
    #[tabled(rename = "Atoms")]
    atoms: usize,
    #[tabled(rename = "Space group")]
    space_group: String,
    #[tabled(rename = "Setting")]
    setting: String,
    #[tabled(rename = "Cell (Å, °)")]
    cell: String,
    #[tabled(rename = "Volume (Å³)")]
    volume: String,
}

impl SummaryRow {
    fn from_crystal(crystal: &Crystal) -> Self {
        let (space_group, setting) = match &crystal.space_group {
            Some(sg) => {
                let name = match sg.number {
                    Some(n) => format!("{} ({})", sg.symbol, n),
                    None => sg.symbol.clone(),
                };
                (name, sg.setting.to_string())
            }
            None => ("-".to_string(), "-".to_string()),
        };

        let volume = crystal
            .lattice
            .as_ref()
            .map(|l| format!("{:.3}", l.volume().abs()))
            .unwrap_or_else(|| "-".to_string());

        let cell = match &crystal.lattice {
            Some(lattice) => {
                let (a, b, c, alpha, beta, gamma) = lattice.parameters();
                format!(
                    "{:.4} {:.4} {:.4} {:.2} {:.2} {:.2}",
                    a, b, c, alpha, beta, gamma
                )
            }
            None => "non-periodic".to_string(),
        };

        SummaryRow {
            block: crystal.name.clone(),
            formula: crystal.formula(),
            atoms: crystal.atoms.len(),
            space_group,
            setting,
            cell,
            volume,
        }
    }
}

/// 执行 info 命令
pub fn execute(args: InfoArgs) -> Result<()> {
    output::print_header(&format!("Reading {}", args.file.display()));

    let options = args.read.options();
    let mut diag = Diagnostics::new();
    let crystals = cif::read_cif(&args.file, &options, &args.read.block, &mut diag)?;

    if crystals.is_empty() {
        output::print_warning("No data blocks found.");
        report_warnings(&diag);
        return Ok(());
    }

    let rows: Vec<SummaryRow> = crystals.iter().map(SummaryRow::from_crystal).collect();
    println!("{}", Table::new(&rows));

    for crystal in &crystals {
        if let Some(occupancy) = &crystal.occupancy {
            let mixed = occupancy.values().filter(|species| species.len() > 1).count();
            if mixed > 0 {
                output::print_info(&format!(
                    "{}: {} site(s) with mixed occupancy",
                    crystal.name, mixed
                ));
            }
        }
        if let Some(tags) = &crystal.tags {
            output::print_info(&format!("{}: {} raw tag(s) kept", crystal.name, tags.len()));
        }
    }

    report_warnings(&diag);
    output::print_done(&format!(
        "{} structure(s) read with {} warning(s)",
        crystals.len(),
        diag.warnings().len()
    ));

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Atom, Lattice, SpacegroupInfo};

    #[test]
    fn test_summary_row() {
        let mut crystal = Crystal::new(
            "NaCl",
            Some(Lattice::from_parameters(5.64, 5.64, 5.64, 90.0, 90.0, 90.0)),
            vec![Atom::new("Na", [0.0; 3]), Atom::new("Cl", [0.5; 3])],
        );
        crystal.space_group = Some(SpacegroupInfo {
            number: Some(225),
            symbol: "F m -3 m".to_string(),
            setting: 1,
        });

        let row = SummaryRow::from_crystal(&crystal);
        assert_eq!(row.formula, "ClNa");
        assert_eq!(row.atoms, 2);
        assert_eq!(row.space_group, "F m -3 m (225)");
        assert_eq!(row.cell, "5.6400 5.6400 5.6400 90.00 90.00 90.00");
        assert_eq!(row.volume, "179.406");
    }

    #[test]
    fn test_summary_row_molecule() {
        let crystal = Crystal::new("h2o", None, vec![Atom::new("O", [0.0; 3])]);
        let row = SummaryRow::from_crystal(&crystal);
        assert_eq!(row.space_group, "-");
        assert_eq!(row.cell, "non-periodic");
    }
}
