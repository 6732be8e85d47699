use std::fmt;
use std::fs;
use std::path::Path;

use log::{debug, warn};

use super::{ChannelType, Layout};
use crate::{PrepError, PrepResult};

/// 受试者标识. 对应输入目录下每个受试者的子目录名.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct SubjectId(String);

impl SubjectId {
    /// 创建.
    #[inline]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// 获取字符串形式.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SubjectId {
    #[inline]
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// 一次预处理中共同参与统计的全部受试者.
///
/// 受试者按标识升序排列且互不重复. 创建后不可修改.
#[derive(Clone, Debug)]
pub struct Cohort {
    subjects: Vec<SubjectId>,
}

impl Cohort {
    /// 从给定受试者构造. 重复项会被合并.
    ///
    /// 如果结果为空, 返回 `PrepError::EmptyCohort`.
    pub fn from_subjects<I: IntoIterator<Item = SubjectId>>(it: I) -> PrepResult<Self> {
        let mut subjects: Vec<SubjectId> = it.into_iter().collect();
        subjects.sort_unstable();
        subjects.dedup();
        if subjects.is_empty() {
            return Err(PrepError::EmptyCohort);
        }
        Ok(Self { subjects })
    }

    /// 扫描 `input_dir`, 每个子目录视作一个受试者. 普通文件会被忽略.
    pub fn discover<P: AsRef<Path>>(input_dir: P) -> PrepResult<Self> {
        let input_dir = input_dir.as_ref();
        let entries = fs::read_dir(input_dir).map_err(|e| PrepError::io(input_dir, e))?;

        let mut subjects = Vec::with_capacity(64);
        for entry in entries {
            let entry = entry.map_err(|e| PrepError::io(input_dir, e))?;
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            match entry.file_name().into_string() {
                Ok(name) => subjects.push(SubjectId::new(name)),
                Err(name) => warn!("Skipping non UTF-8 subject directory {name:?}"),
            }
        }
        debug!("Discovered {} subjects under {}", subjects.len(), input_dir.display());
        Self::from_subjects(subjects)
    }

    /// 检查每个受试者的全部通道文件和标注文件是否存在.
    ///
    /// 返回第一个缺失的文件.
    pub fn check_inputs(&self, layout: &Layout) -> PrepResult<()> {
        for subject in self.iter() {
            for channel in ChannelType::ALL {
                let p = layout.source_path(subject, channel);
                if !p.is_file() {
                    return Err(PrepError::MissingInput(p));
                }
            }
            let p = layout.mask_path(subject);
            if !p.is_file() {
                return Err(PrepError::MissingInput(p));
            }
        }
        Ok(())
    }

    /// 受试者个数.
    #[inline]
    pub fn len(&self) -> usize {
        self.subjects.len()
    }

    /// 总是 `false`. 空集合无法构造.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.subjects.is_empty()
    }

    /// 按升序迭代受试者.
    #[inline]
    pub fn iter(&self) -> impl ExactSizeIterator<Item = &SubjectId> {
        self.subjects.iter()
    }

    /// 全部受试者.
    #[inline]
    pub fn subjects(&self) -> &[SubjectId] {
        &self.subjects
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_from_subjects_sorted_and_deduped() {
        let c = Cohort::from_subjects(["2", "10", "1", "2"].map(SubjectId::from)).unwrap();
        let ids: Vec<&str> = c.iter().map(SubjectId::as_str).collect();
        assert_eq!(ids, ["1", "10", "2"]);
        assert_eq!(c.len(), 3);
    }

    #[test]
    fn test_empty_cohort() {
        assert!(matches!(
            Cohort::from_subjects(Vec::new()),
            Err(PrepError::EmptyCohort)
        ));
    }

    #[test]
    fn test_discover_ignores_files() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir(tmp.path().join("7")).unwrap();
        fs::create_dir(tmp.path().join("3")).unwrap();
        fs::write(tmp.path().join("notes.txt"), "x").unwrap();

        let c = Cohort::discover(tmp.path()).unwrap();
        assert_eq!(c.subjects(), &[SubjectId::from("3"), SubjectId::from("7")]);
    }

    #[test]
    fn test_check_inputs_reports_missing_file() {
        let tmp = TempDir::new().unwrap();
        let layout = Layout::new(tmp.path(), tmp.path().join("out"), tmp.path().join("tmp"));
        let subject = SubjectId::from("0");
        fs::create_dir(tmp.path().join("0")).unwrap();
        for c in ChannelType::ALL {
            fs::write(layout.source_path(&subject, c), b"").unwrap();
        }

        let cohort = Cohort::from_subjects([subject.clone()]).unwrap();
        match cohort.check_inputs(&layout) {
            Err(PrepError::MissingInput(p)) => assert_eq!(p, layout.mask_path(&subject)),
            other => panic!("unexpected {other:?}"),
        }

        fs::write(layout.mask_path(&subject), b"").unwrap();
        assert!(cohort.check_inputs(&layout).is_ok());
    }
}
