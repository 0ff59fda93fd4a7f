//! # convert 命令实现
//!
//! 批量读取 CIF 文件，按空间群展开后重新写成 P1 CIF。
//!
//! ## 功能
//! - 按 glob 模式收集输入文件（可递归）
//! - 并行处理，每个文件的警告在进度条上方打印
//! - 已存在的输出默认跳过
//!
//! ## 依赖关系
//! - 使用 `cli/convert.rs` 定义的参数
//! - 使用 `parsers/`, `parsers/cif/writer.rs`
//! - 使用 `utils/output.rs`, `utils/progress.rs`

use crate::cli::convert::ConvertArgs;
use crate::diagnostics::Diagnostics;
use crate::error::{CifError, Result};
use crate::parsers;
use crate::parsers::cif::{self, ReadOptions, WriteOptions};
use crate::utils::{output, progress};

use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use walkdir::WalkDir;

/// 执行 convert 命令
pub fn execute(args: ConvertArgs) -> Result<()> {
    output::print_header(&format!("Expanding CIF files ({} layout)", args.format));

    let options = args.read.options();
    options.validate()?;

    // 验证输入目录
    if !args.input.is_dir() {
        return Err(CifError::DirectoryNotFound {
            path: args.input.display().to_string(),
        });
    }

    // 创建输出目录
    fs::create_dir_all(&args.output).map_err(|e| CifError::FileWriteError {
        path: args.output.display().to_string(),
        source: e,
    })?;

    let files = collect_input_files(&args.input, &args.pattern, args.recursive)?;

    if files.is_empty() {
        return Err(CifError::NoFilesFound {
            pattern: format!("{}/{}", args.input.display(), args.pattern),
        });
    }

    output::print_info(&format!("Found {} files to convert", files.len()));

    // 设置并行度
    let num_threads = if args.jobs == 0 {
        num_cpus::get()
    } else {
        args.jobs
    };

    rayon::ThreadPoolBuilder::new()
        .num_threads(num_threads)
        .build_global()
        .ok();

    let write_options = WriteOptions {
        format: args.format.into(),
        wrap: !args.no_wrap,
        ..WriteOptions::default()
    };

    let pb = progress::create_progress_bar(files.len() as u64, "Converting");
    let success_count = AtomicUsize::new(0);
    let skip_count = AtomicUsize::new(0);
    let fail_count = AtomicUsize::new(0);

    files.par_iter().for_each(|input_path| {
        let mut diag = Diagnostics::new();
        let result = convert_file(
            input_path,
            &args.output,
            &options,
            &args.read.block,
            &write_options,
            args.overwrite,
            &mut diag,
        );

        if !diag.is_empty() {
            pb.suspend(|| {
                for warning in diag.warnings() {
                    output::print_warning(&format!("{}: {}", input_path.display(), warning));
                }
            });
        }

        match result {
            Ok(ConvertStatus::Success) => {
                success_count.fetch_add(1, Ordering::SeqCst);
            }
            Ok(ConvertStatus::Skipped) => {
                skip_count.fetch_add(1, Ordering::SeqCst);
            }
            Err(e) => {
                fail_count.fetch_add(1, Ordering::SeqCst);
                pb.suspend(|| {
                    output::print_error(&format!("{}: {}", input_path.display(), e));
                });
            }
        }
        pb.inc(1);
    });

    pb.finish_with_message("Done");

    output::print_done(&format!(
        "Converted {} file(s) into '{}' ({} skipped, {} failed)",
        success_count.load(Ordering::SeqCst),
        args.output.display(),
        skip_count.load(Ordering::SeqCst),
        fail_count.load(Ordering::SeqCst)
    ));

    Ok(())
}

#[derive(Debug, PartialEq, Eq)]
enum ConvertStatus {
    Success,
    Skipped,
}

/// 收集输入文件
fn collect_input_files(input_dir: &Path, pattern: &str, recursive: bool) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    let walker = if recursive {
        WalkDir::new(input_dir)
    } else {
        WalkDir::new(input_dir).max_depth(1)
    };

    let glob_pattern = glob::Pattern::new(pattern).map_err(|e| {
        CifError::InvalidArgument(format!("Invalid pattern '{}': {}", pattern, e))
    })?;

    for entry in walker.into_iter().filter_map(|e| e.ok()) {
        if entry.file_type().is_file() {
            if let Some(name) = entry.file_name().to_str() {
                if glob_pattern.matches(name) {
                    files.push(entry.path().to_path_buf());
                }
            }
        }
    }

    files.sort();
    Ok(files)
}

/// 读取一个文件并写出展开后的 P1 CIF
fn convert_file(
    input_path: &Path,
    output_dir: &Path,
    options: &ReadOptions,
    selector: &cif::BlockSelector,
    write_options: &WriteOptions,
    overwrite: bool,
    diag: &mut Diagnostics,
) -> Result<ConvertStatus> {
    let stem = input_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("structure");
    let output_path = output_dir.join(format!("{}.cif", stem));

    if output_path.exists() && !overwrite {
        return Ok(ConvertStatus::Skipped);
    }

    let crystals = parsers::parse_structure_file(input_path, options, selector, diag)?;
    cif::write_cif_file(&output_path, &crystals, write_options)?;

    Ok(ConvertStatus::Success)
}
