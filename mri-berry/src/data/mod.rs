use std::path::Path;

use crate::{PrepError, PrepResult};

mod store;

pub use store::{FsStore, VolumeStore};

/// 体积文件格式. 由文件扩展名决定.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum VolumeFormat {
    /// `.nii` 或 `.nii.gz`. 原始扫描和标注使用该格式.
    Nifti,

    /// `.npy` 裸数组. 中间结果和最终输出使用该格式.
    Npy,
}

impl VolumeFormat {
    /// 根据 `path` 的文件名判断格式. 无法识别时返回 `PrepError::UnsupportedFormat`.
    pub fn from_path(path: &Path) -> PrepResult<Self> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| PrepError::UnsupportedFormat(path.to_owned()))?;
        if name.ends_with(".nii") || name.ends_with(".nii.gz") {
            Ok(Self::Nifti)
        } else if name.ends_with(".npy") {
            Ok(Self::Npy)
        } else {
            Err(PrepError::UnsupportedFormat(path.to_owned()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_path() {
        let f = |p: &str| VolumeFormat::from_path(Path::new(p));
        assert_eq!(f("a/1_t1.nii.gz").unwrap(), VolumeFormat::Nifti);
        assert_eq!(f("1_t1.nii").unwrap(), VolumeFormat::Nifti);
        assert_eq!(f("/tmp/t1/1_t1.npy").unwrap(), VolumeFormat::Npy);
        assert!(matches!(f("1_t1.mha"), Err(PrepError::UnsupportedFormat(_))));
        assert!(f("/").is_err());
    }
}
