//! # 诊断信息（警告通道）
//!
//! 解析过程中不致命的问题以 `CifWarning` 记录，解析继续进行。
//! 调用方通过 `Diagnostics` 收集，CLI 层统一打印。
//!
//! ## 依赖关系
//! - 被 `parsers/cif/` 和 `symmetry/` 使用
//! - 被 `commands/` 读取并输出

use thiserror::Error;

/// 解析警告
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CifWarning {
    #[error("Badly formed number: \"{0}\"")]
    BadlyFormedNumber(String),

    #[error("Duplicated loop tags: {0:?}")]
    DuplicateLoopTags(Vec<String>),

    #[error("Wrong number of tokens: {0:?}")]
    WrongTokenCount(Vec<String>),

    #[error("No closing quotation in: {0}")]
    UnterminatedQuote(String),

    #[error(
        "CIF v2.0 file format detected; the native CIF reader might incorrectly \
         interpret some syntax constructions, use the codcif reader instead"
    )]
    Cif2Detected,

    #[error("unexpected crystal system '{system}' for space group {spacegroup}")]
    UnexpectedCrystalSystem { system: String, spacegroup: String },

    #[error(
        "crystal system '{system}' is not interpreted for space group {spacegroup}. \
         This may result in wrong setting!"
    )]
    UninterpretedCrystalSystem { system: String, spacegroup: String },

    #[error("scaled position {position:?} of kind {kind} coincides with a site of kind {existing}")]
    DuplicateSite {
        kind: usize,
        existing: usize,
        position: [f64; 3],
    },
}

/// 警告收集器
#[derive(Debug, Default, Clone)]
pub struct Diagnostics {
    warnings: Vec<CifWarning>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn warn(&mut self, warning: CifWarning) {
        self.warnings.push(warning);
    }

    pub fn extend<I: IntoIterator<Item = CifWarning>>(&mut self, warnings: I) {
        self.warnings.extend(warnings);
    }

    pub fn warnings(&self) -> &[CifWarning] {
        &self.warnings
    }

    pub fn is_empty(&self) -> bool {
        self.warnings.is_empty()
    }

    /// 取出所有警告并清空
    pub fn take(&mut self) -> Vec<CifWarning> {
        std::mem::take(&mut self.warnings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_warning_messages() {
        let w = CifWarning::BadlyFormedNumber("1.234(5".to_string());
        assert_eq!(w.to_string(), "Badly formed number: \"1.234(5\"");

        let w = CifWarning::DuplicateLoopTags(vec!["_atom_site_label".to_string()]);
        assert!(w.to_string().contains("_atom_site_label"));
    }

    #[test]
    fn test_take_clears() {
        let mut diag = Diagnostics::new();
        diag.warn(CifWarning::Cif2Detected);
        assert_eq!(diag.warnings().len(), 1);
        let taken = diag.take();
        assert_eq!(taken.len(), 1);
        assert!(diag.is_empty());
    }
}
