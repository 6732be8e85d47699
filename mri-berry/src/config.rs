//! 运行配置.

use std::path::PathBuf;
use std::time::Duration;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::bias::N4Params;
use crate::consts::{DEFAULT_PERCENTILES, EDGE_SPACE, ROTATE_TIMES};
use crate::dataset::Naming;
use crate::merge::{MergeOptions, UpperClamp};
use crate::norm::Percentiles;
use crate::{PrepError, PrepResult};

/// 一次预处理运行的全部可调参数. 目录不在其中, 由 [`crate::dataset::Layout`] 描述.
///
/// 打开 `serde` feature 时可从 TOML 文件读取, 缺省字段取默认值.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PrepConfig {
    /// 百分位点, 严格递增且位于 `(0, 1]`.
    pub percentiles: Vec<f64>,

    /// 包围盒每侧的边距.
    pub edge_space: usize,

    /// 包围盒上界的截断方式.
    pub upper_clamp: UpperClamp,

    /// 合并前的旋转次数.
    pub rotate_times: usize,

    /// 合并前是否做 z-score 标准化.
    pub standardize: bool,

    /// 跳过偏置场校正, 直接复制原始扫描.
    pub skip_bias_correction: bool,

    /// 工作线程数. 0 表示使用全部可用核心.
    pub workers: usize,

    /// 单次外部校正的超时 (毫秒). `None` 表示不限时.
    pub unit_timeout_ms: Option<u64>,

    /// 从该目录读取已有的 landmark 记录, 而不是重新估计.
    pub landmark_dir: Option<PathBuf>,

    /// 文件命名约定.
    pub naming: Naming,

    /// N4 参数.
    pub n4: N4Params,
}

impl Default for PrepConfig {
    fn default() -> Self {
        Self {
            percentiles: DEFAULT_PERCENTILES.to_vec(),
            edge_space: EDGE_SPACE,
            upper_clamp: UpperClamp::default(),
            rotate_times: ROTATE_TIMES,
            standardize: false,
            skip_bias_correction: false,
            workers: 0,
            unit_timeout_ms: None,
            landmark_dir: None,
            naming: Naming::default(),
            n4: N4Params::default(),
        }
    }
}

impl PrepConfig {
    /// 设置百分位点.
    pub fn with_percentiles(mut self, percentiles: &[f64]) -> Self {
        self.percentiles = percentiles.to_vec();
        self
    }

    /// 设置边距.
    pub fn with_edge_space(mut self, edge_space: usize) -> Self {
        self.edge_space = edge_space;
        self
    }

    /// 设置上界截断方式.
    pub fn with_upper_clamp(mut self, upper_clamp: UpperClamp) -> Self {
        self.upper_clamp = upper_clamp;
        self
    }

    /// 设置旋转次数.
    pub fn with_rotate_times(mut self, rotate_times: usize) -> Self {
        self.rotate_times = rotate_times;
        self
    }

    /// 开关 z-score 标准化.
    pub fn with_standardize(mut self, standardize: bool) -> Self {
        self.standardize = standardize;
        self
    }

    /// 设置命名约定.
    pub fn with_naming(mut self, naming: Naming) -> Self {
        self.naming = naming;
        self
    }

    /// 设置 N4 参数.
    pub fn with_n4(mut self, n4: N4Params) -> Self {
        self.n4 = n4;
        self
    }

    /// 开关偏置场校正.
    pub fn with_skip_bias_correction(mut self, skip: bool) -> Self {
        self.skip_bias_correction = skip;
        self
    }

    /// 设置工作线程数.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// 设置外部校正超时. 不足一毫秒的部分向上取整.
    pub fn with_unit_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.unit_timeout_ms = timeout.map(|d| {
            let ms = d.as_millis() + u128::from(d.subsec_nanos() % 1_000_000 != 0);
            u64::try_from(ms).unwrap_or(u64::MAX)
        });
        self
    }

    /// 复用 `dir` 中的 landmark 记录.
    pub fn with_landmark_dir<P: Into<PathBuf>>(mut self, dir: Option<P>) -> Self {
        self.landmark_dir = dir.map(Into::into);
        self
    }

    /// 检查配置.
    pub fn validate(&self) -> PrepResult<()> {
        Percentiles::new(&self.percentiles)?;
        self.naming.validate()?;
        self.n4.validate()?;
        if self.unit_timeout_ms == Some(0) {
            return Err(PrepError::config("unit timeout must be positive"));
        }
        Ok(())
    }

    /// 经过检查的百分位点.
    #[inline]
    pub fn percentiles(&self) -> PrepResult<Percentiles> {
        Percentiles::new(&self.percentiles)
    }

    /// 合并阶段的选项.
    pub fn merge_options(&self) -> MergeOptions {
        MergeOptions {
            edge_space: self.edge_space,
            upper_clamp: self.upper_clamp,
            rotate_times: self.rotate_times,
            standardize: self.standardize,
        }
    }

    /// 外部校正超时.
    #[inline]
    pub fn unit_timeout(&self) -> Option<Duration> {
        self.unit_timeout_ms.map(Duration::from_millis)
    }
}

#[cfg(feature = "serde")]
impl PrepConfig {
    /// 从 TOML 文本解析, 并检查.
    pub fn from_toml_str(s: &str) -> PrepResult<Self> {
        let cfg: Self = toml::from_str(s).map_err(PrepError::config)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// 从 TOML 文件读取, 并检查.
    pub fn from_toml_file<P: AsRef<std::path::Path>>(path: P) -> PrepResult<Self> {
        let path = path.as_ref();
        let s = std::fs::read_to_string(path).map_err(|e| PrepError::io(path, e))?;
        Self::from_toml_str(&s)
    }

    /// 序列化为 TOML 文本.
    pub fn to_toml_string(&self) -> PrepResult<String> {
        toml::to_string(self).map_err(PrepError::config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let cfg = PrepConfig::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.percentiles().unwrap().len(), 11);
        assert_eq!(cfg.merge_options(), MergeOptions::default());
        assert_eq!(cfg.unit_timeout(), None);
    }

    #[test]
    fn test_setters() {
        let cfg = PrepConfig::default()
            .with_edge_space(1)
            .with_upper_clamp(UpperClamp::Extent)
            .with_rotate_times(0)
            .with_standardize(true)
            .with_workers(2)
            .with_unit_timeout(Some(Duration::from_secs(30)))
            .with_landmark_dir(Some("/tmp/lm"));
        let m = cfg.merge_options();
        assert_eq!(m.edge_space, 1);
        assert_eq!(m.upper_clamp, UpperClamp::Extent);
        assert_eq!(m.rotate_times, 0);
        assert!(m.standardize);
        assert_eq!(cfg.unit_timeout(), Some(Duration::from_secs(30)));
        assert_eq!(cfg.landmark_dir, Some(PathBuf::from("/tmp/lm")));
    }

    #[test]
    fn test_unit_timeout_keeps_millis() {
        let t = |d| PrepConfig::default().with_unit_timeout(Some(d)).unit_timeout();
        assert_eq!(t(Duration::from_millis(1900)), Some(Duration::from_millis(1900)));
        assert_eq!(t(Duration::from_millis(500)), Some(Duration::from_millis(500)));
        assert_eq!(t(Duration::from_micros(1500)), Some(Duration::from_millis(2)));
        assert!(PrepConfig::default()
            .with_unit_timeout(Some(Duration::ZERO))
            .validate()
            .is_err());
    }

    #[test]
    fn test_invalid() {
        assert!(PrepConfig::default()
            .with_percentiles(&[0.5, 0.2])
            .validate()
            .is_err());
        let mut cfg = PrepConfig::default();
        cfg.unit_timeout_ms = Some(0);
        assert!(cfg.validate().is_err());
        let mut cfg = PrepConfig::default();
        cfg.naming.mask_tag = "t2".to_string();
        assert!(cfg.validate().is_err());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_toml() {
        let cfg = PrepConfig::from_toml_str(
            r#"
            percentiles = [0.1, 0.5, 0.9]
            edge_space = 2
            upper_clamp = "extent"
            workers = 4

            [n4]
            iterations = [10, 10]
            "#,
        )
        .unwrap();
        assert_eq!(cfg.percentiles, [0.1, 0.5, 0.9]);
        assert_eq!(cfg.edge_space, 2);
        assert_eq!(cfg.upper_clamp, UpperClamp::Extent);
        assert_eq!(cfg.workers, 4);
        assert_eq!(cfg.n4.iterations, [10, 10]);
        assert_eq!(cfg.n4.shrink_factor, 3);
        assert_eq!(cfg.rotate_times, ROTATE_TIMES);

        let back = PrepConfig::from_toml_str(&cfg.to_toml_string().unwrap()).unwrap();
        assert_eq!(back, cfg);

        assert!(matches!(
            PrepConfig::from_toml_str("percentiles = [1.5]"),
            Err(PrepError::InvalidConfig(_))
        ));
        assert!(PrepConfig::from_toml_str("edge_space = \"wide\"").is_err());
    }
}
