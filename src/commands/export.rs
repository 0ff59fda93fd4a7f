//! # export 命令实现
//!
//! 把结构中的每个位点（展开后的原子）写成一行 CSV。
//!
//! ## 依赖关系
//! - 使用 `cli/export.rs` 定义的参数
//! - 使用 `parsers/cif`, `models/`
//! - 使用 `csv` + `serde` 序列化记录

use crate::cli::export::ExportArgs;
use crate::commands::report_warnings;
use crate::diagnostics::Diagnostics;
use crate::error::{CifError, Result};
use crate::models::Crystal;
use crate::parsers::cif;
use crate::utils::output;

use serde::Serialize;
use std::io::Write;
use std::path::Path;

/// CSV 中的一行
#[derive(Debug, Clone, PartialEq, Serialize)]
struct SiteRecord {
    block: String,
    index: usize,
    label: Option<String>,
    element: String,
    kind: Option<usize>,
    frac_x: Option<f64>,
    frac_y: Option<f64>,
    frac_z: Option<f64>,
    cart_x: f64,
    cart_y: f64,
    cart_z: f64,
    mass: f64,
    occupancy: Option<f64>,
}

/// 展开一个结构的所有位点
fn site_records(crystal: &Crystal) -> Vec<SiteRecord> {
    let cartesian = crystal.cartesian_positions();
    let scaled = crystal.scaled_positions(false);
    let masses = crystal.masses();

    crystal
        .atoms
        .iter()
        .enumerate()
        .map(|(i, atom)| {
            let frac = scaled.as_ref().map(|s| s[i]);
            let occupancy = crystal.occupancy.as_ref().and_then(|occ| {
                occ.get(&atom.kind.unwrap_or(i))
                    .and_then(|species| species.get(&atom.element))
                    .copied()
            });

            SiteRecord {
                block: crystal.name.clone(),
                index: i,
                label: atom.label.clone(),
                element: atom.element.clone(),
                kind: atom.kind,
                frac_x: frac.map(|p| p[0]),
                frac_y: frac.map(|p| p[1]),
                frac_z: frac.map(|p| p[2]),
                cart_x: cartesian[i][0],
                cart_y: cartesian[i][1],
                cart_z: cartesian[i][2],
                mass: masses[i],
                occupancy,
            }
        })
        .collect()
}

/// 写出 CSV
fn write_sites<W: Write>(writer: W, crystals: &[Crystal]) -> Result<usize> {
    let mut wtr = csv::Writer::from_writer(writer);
    let mut count = 0;

    for crystal in crystals {
        for record in site_records(crystal) {
            wtr.serialize(&record)?;
            count += 1;
        }
    }

    wtr.flush().map_err(|e| CifError::FileWriteError {
        path: "<csv>".to_string(),
        source: e,
    })?;
    Ok(count)
}

/// 执行 export 命令
pub fn execute(args: ExportArgs) -> Result<()> {
    output::print_header(&format!("Exporting sites of {}", args.file.display()));

    let options = args.read.options();
    let mut diag = Diagnostics::new();
    let crystals = cif::read_cif(&args.file, &options, &args.read.block, &mut diag)?;
    report_warnings(&diag);

    let count = export_to_path(&crystals, &args.output)?;
    output::print_success(&format!(
        "{} site(s) from {} structure(s) saved to '{}'",
        count,
        crystals.len(),
        args.output.display()
    ));

    Ok(())
}

fn export_to_path(crystals: &[Crystal], path: &Path) -> Result<usize> {
    let file = std::fs::File::create(path).map_err(|e| CifError::FileWriteError {
        path: path.display().to_string(),
        source: e,
    })?;
    write_sites(file, crystals)
}
