//! 基于百分位 landmark 的跨受试者强度标准化.
//!
//! 分两步进行:
//!
//! 1. [`landmark`]: 对同一通道的每个受试者求百分位轮廓 ([`PercentileProfile`]),
//!   再对全体求逐位置均值, 得到 [`LandmarkProfile`];
//! 2. [`transform`]: 以受试者自身轮廓为横坐标断点, landmark 为纵坐标断点,
//!   对每个前景体素做分段线性映射.
//!
//! 两步都先经过 [`background`] 中同一个背景统一化操作.

use std::ops::Deref;

use crate::consts::DEFAULT_PERCENTILES;
use crate::{PrepError, PrepResult};

pub mod background;
pub mod landmark;
pub mod record;
pub mod transform;

pub use landmark::{mean_landmarks, percentile_profile, LandmarkEstimate};
pub use transform::{interp, transform};

/// 经过检查的百分位点集合, 每个点附带一个列名 (用于 landmark 记录).
#[derive(Clone, Debug, PartialEq)]
pub struct Percentiles {
    points: Vec<f64>,
    names: Vec<String>,
}

impl Default for Percentiles {
    fn default() -> Self {
        // 常量集合必然合法.
        Self::new(&DEFAULT_PERCENTILES).unwrap()
    }
}

impl Percentiles {
    /// 构造. 要求 `points` 非空, 每个值在 `(0, 1]` 内, 且严格递增.
    pub fn new(points: &[f64]) -> PrepResult<Self> {
        if points.is_empty() {
            return Err(PrepError::config("no percentile configured"));
        }
        if let Some(p) = points.iter().find(|p| !(**p > 0.0 && **p <= 1.0)) {
            return Err(PrepError::config(format!(
                "percentile {p} is out of (0, 1]"
            )));
        }
        if points.windows(2).any(|w| w[0] >= w[1]) {
            return Err(PrepError::config("percentiles must be strictly increasing"));
        }
        Ok(Self {
            points: points.to_vec(),
            names: points.iter().copied().map(column_name).collect(),
        })
    }

    /// 百分位点.
    #[inline]
    pub fn points(&self) -> &[f64] {
        &self.points
    }

    /// 列名, 形如 `pct1`, `pct10`, `pct99`.
    #[inline]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// 百分位点个数.
    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// 总是 `false`.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// 百分位点 `p` 对应的列名.
fn column_name(p: f64) -> String {
    let v = p * 100.0;
    if (v - v.round()).abs() < 1e-9 {
        format!("pct{}", v.round() as u32)
    } else {
        format!("pct{v}")
    }
}

/// 对 `n` 个升序排列的前景体素, 百分位点 `p` 选取的下标: `ceil(p * n) - 1`, 不小于 0.
#[inline]
pub fn percentile_rank(p: f64, n: usize) -> usize {
    let idx = (p * n as f64).ceil() as i64 - 1;
    idx.max(0) as usize
}

macro_rules! impl_profile {
    ($($profile: ident),+) => {
        $(
            impl Deref for $profile {
                type Target = [f64];

                #[inline]
                fn deref(&self) -> &Self::Target {
                    &self.0
                }
            }

            impl From<Vec<f64>> for $profile {
                #[inline]
                fn from(v: Vec<f64>) -> Self {
                    Self(v)
                }
            }

            impl $profile {
                /// 获取底层数据.
                #[inline]
                pub fn into_inner(self) -> Vec<f64> {
                    self.0
                }

                /// 是否单调不减.
                #[inline]
                pub fn is_monotonic(&self) -> bool {
                    self.0.windows(2).all(|w| w[0] <= w[1])
                }
            }
        )+
    };
}

/// 单个受试者某通道的百分位轮廓. 与 [`Percentiles`] 一一对应, 单调不减.
#[derive(Clone, Debug, PartialEq)]
pub struct PercentileProfile(Vec<f64>);

/// 某通道全体受试者百分位轮廓的逐位置均值.
#[derive(Clone, Debug, PartialEq)]
pub struct LandmarkProfile(Vec<f64>);

impl_profile!(PercentileProfile, LandmarkProfile);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_percentiles() {
        let p = Percentiles::default();
        assert_eq!(p.len(), 11);
        assert_eq!(p.names()[0], "pct1");
        assert_eq!(p.names()[1], "pct10");
        assert_eq!(p.names()[10], "pct99");
    }

    #[test]
    fn test_invalid_percentiles() {
        assert!(Percentiles::new(&[]).is_err());
        assert!(Percentiles::new(&[0.0, 0.5]).is_err());
        assert!(Percentiles::new(&[0.5, 1.5]).is_err());
        assert!(Percentiles::new(&[0.5, 0.5]).is_err());
        assert!(Percentiles::new(&[0.9, 0.1]).is_err());
        assert!(Percentiles::new(&[f64::NAN]).is_err());
        assert!(Percentiles::new(&[0.1, 1.0]).is_ok());
    }

    #[test]
    fn test_fractional_column_name() {
        let p = Percentiles::new(&[0.5, 0.995]).unwrap();
        assert_eq!(p.names()[0], "pct50");
        assert!(p.names()[1].starts_with("pct99.5"));
    }

    #[test]
    fn test_percentile_rank() {
        assert_eq!(percentile_rank(0.1, 1), 0);
        assert_eq!(percentile_rank(0.99, 1), 0);
        assert_eq!(percentile_rank(0.5, 10), 4);
        assert_eq!(percentile_rank(1.0, 10), 9);
        assert_eq!(percentile_rank(0.01, 10), 0);
        assert_eq!(percentile_rank(0.01, 0), 0);
    }
}
