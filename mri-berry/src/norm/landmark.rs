//! 百分位轮廓与 landmark 估计.

use std::collections::BTreeMap;

use log::debug;
use ndarray::{ArrayBase, Data, Dimension};

use super::background::BackgroundShift;
use super::{percentile_rank, LandmarkProfile, PercentileProfile, Percentiles};
use crate::dataset::SubjectId;
use crate::{PrepError, PrepResult, Volume};

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
    }
}

/// 计算单个体积的百分位轮廓.
///
/// 先统一背景, 再丢弃所有 `<= 0` 的体素 (以及 NaN), 对剩余体素升序排序,
/// 对每个百分位点 `p` 取下标 [`percentile_rank`] 处的值.
///
/// 如果没有前景体素, 返回 `PrepError::EmptyForeground`.
pub fn percentile_profile<S, D>(
    volume: &ArrayBase<S, D>,
    pcts: &Percentiles,
) -> PrepResult<PercentileProfile>
where
    S: Data<Elem = f32>,
    D: Dimension,
{
    let shift = BackgroundShift::detect(volume);
    let mut fg: Vec<f32> = volume
        .iter()
        .map(|&x| shift.apply(x))
        .filter(|&x| x > 0.0)
        .collect();
    if fg.is_empty() {
        return Err(PrepError::EmptyForeground);
    }
    fg.sort_unstable_by(f32::total_cmp);

    let n = fg.len();
    Ok(pcts
        .points()
        .iter()
        .map(|&p| fg[percentile_rank(p, n)] as f64)
        .collect::<Vec<_>>()
        .into())
}

/// 对全部轮廓求逐位置算术均值.
///
/// 这是一次显式的顺序折叠, 调用方负责给出确定的迭代顺序.
/// 轮廓为空返回 `PrepError::EmptyCohort`, 长度不一致返回 `PrepError::InvalidConfig`.
pub fn mean_landmarks<'a, I>(profiles: I) -> PrepResult<LandmarkProfile>
where
    I: IntoIterator<Item = &'a PercentileProfile>,
{
    let mut it = profiles.into_iter();
    let first = it.next().ok_or(PrepError::EmptyCohort)?;

    let (sum, count) = it.try_fold((first.to_vec(), 1usize), |(mut sum, count), p| {
        if p.len() != sum.len() {
            return Err(PrepError::config(format!(
                "percentile profile has {} points, expected {}",
                p.len(),
                sum.len()
            )));
        }
        sum.iter_mut().zip(p.iter()).for_each(|(s, v)| *s += v);
        Ok((sum, count + 1))
    })?;

    let n = count as f64;
    Ok(sum.into_iter().map(|s| s / n).collect::<Vec<_>>().into())
}

/// 某通道的 landmark 估计结果.
#[derive(Clone, Debug, PartialEq)]
pub struct LandmarkEstimate {
    /// 全体均值.
    pub landmarks: LandmarkProfile,

    /// 每个受试者自己的轮廓.
    pub profiles: BTreeMap<SubjectId, PercentileProfile>,
}

impl LandmarkEstimate {
    /// 归约阶段: 按受试者标识顺序折叠已算好的轮廓.
    ///
    /// 由于 `BTreeMap` 的迭代顺序只取决于键, 结果与轮廓的计算顺序无关.
    pub fn from_profiles(profiles: BTreeMap<SubjectId, PercentileProfile>) -> PrepResult<Self> {
        let landmarks = mean_landmarks(profiles.values())?;
        Ok(Self {
            landmarks,
            profiles,
        })
    }

    /// 映射 + 归约, 供单独估计某一通道时使用. `load` 负责读取某受试者的该通道体积.
    ///
    /// 打开 `rayon` feature 时映射阶段在调用方所处的线程池中并行执行:
    /// 在 `ThreadPool::install` 之内调用即使用该池, 否则使用全局池.
    /// 遇到第一个错误即返回.
    ///
    /// [`Pipeline`](crate::pipeline::Pipeline) 需要逐单元记录失败, 因此它在自己的
    /// 工作线程池中分别调度 [`percentile_profile`] 与 [`LandmarkEstimate::from_profiles`],
    /// 两者与本函数共用同一份映射和归约.
    pub fn estimate<F>(subjects: &[SubjectId], pcts: &Percentiles, load: F) -> PrepResult<Self>
    where
        F: Fn(&SubjectId) -> PrepResult<Volume> + Sync + Send,
    {
        let map_one = |s: &SubjectId| -> PrepResult<(SubjectId, PercentileProfile)> {
            let profile = percentile_profile(&load(s)?, pcts)?;
            debug!("Subject {s}: profile {profile:?}");
            Ok((s.clone(), profile))
        };

        #[cfg(feature = "rayon")]
        let profiles = subjects
            .par_iter()
            .map(map_one)
            .collect::<PrepResult<BTreeMap<_, _>>>()?;

        #[cfg(not(feature = "rayon"))]
        let profiles = subjects
            .iter()
            .map(map_one)
            .collect::<PrepResult<BTreeMap<_, _>>>()?;

        Self::from_profiles(profiles)
    }
}
