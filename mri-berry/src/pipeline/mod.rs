//! 三阶段批处理调度.
//!
//! 1. 偏置场校正: 每个 (通道, 受试者) 一个单元;
//! 2. 强度标准化: 先并行计算所有百分位轮廓, 再逐通道归约出 landmark 并落盘,
//!   最后并行变换每个 (通道, 受试者);
//! 3. 合并裁剪: 每个受试者一个单元.
//!
//! 阶段之间严格同步: 上一阶段全部单元结束后才开始下一阶段.
//! 任何单元失败都会让整次运行失败, 但同一阶段的其余单元仍然执行完毕.

use std::collections::BTreeMap;
use std::fmt;
use std::time::{Duration, Instant};

use itertools::iproduct;
use log::{info, warn};

use crate::bias::{BiasCorrector, CopyThrough, N4Command};
use crate::config::PrepConfig;
use crate::data::{FsStore, VolumeStore};
use crate::dataset::{ChannelType, Cohort, Layout, SubjectId};
use crate::merge::merge;
use crate::norm::record::{read_landmarks, write_landmarks};
use crate::norm::{percentile_profile, transform, LandmarkEstimate, LandmarkProfile, Percentiles};
use crate::{PrepError, PrepResult};

mod pool;
mod scratch;

pub use pool::WorkerPool;
pub use scratch::cleanup;

/// 处理阶段.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum Stage {
    /// 偏置场校正.
    BiasCorrection,
    /// 强度标准化.
    Normalization,
    /// 合并与裁剪.
    Merge,
}

impl Stage {
    /// 全部阶段, 按执行顺序.
    pub const ALL: [Stage; 3] = [Self::BiasCorrection, Self::Normalization, Self::Merge];
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::BiasCorrection => "bias correction",
            Self::Normalization => "normalization",
            Self::Merge => "merge",
        })
    }
}

/// 工作单元标识: 某个受试者, 或某个受试者的某个通道.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct UnitId {
    /// 受试者.
    pub subject: SubjectId,
    /// 通道. 合并阶段的单元不区分通道.
    pub channel: Option<ChannelType>,
}

impl UnitId {
    /// 整个受试者.
    #[inline]
    pub fn subject(subject: SubjectId) -> Self {
        Self {
            subject,
            channel: None,
        }
    }

    /// 受试者的某个通道.
    #[inline]
    pub fn channel(subject: SubjectId, channel: ChannelType) -> Self {
        Self {
            subject,
            channel: Some(channel),
        }
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.channel {
            Some(ch) => write!(f, "subject `{}` ({ch})", self.subject),
            None => write!(f, "subject `{}`", self.subject),
        }
    }
}

/// 运行状态.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum RunState {
    /// 尚未开始.
    Created,
    /// 偏置场校正中.
    Stage1Running,
    /// 偏置场校正完成.
    Stage1Done,
    /// landmark 已就绪.
    Stage2LandmarksComputed,
    /// 强度变换中.
    Stage2TransformRunning,
    /// 强度标准化完成.
    Stage2Done,
    /// 合并裁剪中.
    Stage3Running,
    /// 全部完成, 临时文件已清理.
    Completed,
    /// 某个阶段失败. 临时文件保留.
    Failed,
}

impl RunState {
    /// 是否允许从 `self` 转移到 `next`.
    pub fn can_advance_to(self, next: RunState) -> bool {
        use RunState::*;
        matches!(
            (self, next),
            (Created, Stage1Running)
                | (Stage1Running, Stage1Done)
                | (Stage1Done, Stage2LandmarksComputed)
                | (Stage2LandmarksComputed, Stage2TransformRunning)
                | (Stage2TransformRunning, Stage2Done)
                | (Stage2Done, Stage3Running)
                | (Stage3Running, Completed)
        ) || (next == Failed && self.is_running())
    }

    /// 是否处于某个阶段之中.
    pub fn is_running(self) -> bool {
        !matches!(self, Self::Created | Self::Completed | Self::Failed)
    }
}

/// 一次成功运行的摘要.
#[derive(Clone, Debug, Default)]
pub struct RunReport {
    /// 受试者数.
    pub subjects: usize,
    /// 每个阶段的耗时.
    pub durations: Vec<(Stage, Duration)>,
    /// 每个通道的 landmark.
    pub landmarks: BTreeMap<ChannelType, LandmarkProfile>,
    /// 每个受试者裁剪后的多通道体积形状.
    pub shapes: BTreeMap<SubjectId, [usize; 4]>,
    /// 清理掉的临时子目录数.
    pub scratch_removed: usize,
}

impl RunReport {
    /// 总耗时.
    pub fn total(&self) -> Duration {
        self.durations.iter().map(|(_, d)| *d).sum()
    }
}

/// 预处理流水线.
pub struct Pipeline {
    config: PrepConfig,
    layout: Layout,
    corrector: Box<dyn BiasCorrector>,
    store: Box<dyn VolumeStore>,
    pool: WorkerPool,
    state: RunState,
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("config", &self.config)
            .field("layout", &self.layout)
            .field("pool", &self.pool)
            .field("state", &self.state)
            .finish()
    }
}

impl Pipeline {
    /// 按 `config` 创建. `layout` 的命名约定被 `config.naming` 取代.
    ///
    /// 偏置场校正默认调用外部 N4, 配置了 `skip_bias_correction` 时直接复制.
    pub fn new(config: PrepConfig, layout: Layout) -> PrepResult<Self> {
        config.validate()?;
        let corrector: Box<dyn BiasCorrector> = if config.skip_bias_correction {
            Box::new(CopyThrough)
        } else {
            Box::new(N4Command::new().with_timeout(config.unit_timeout()))
        };
        let pool = WorkerPool::new(config.workers)?;
        Ok(Self {
            layout: layout.with_naming(config.naming.clone()),
            config,
            corrector,
            store: Box::new(FsStore),
            pool,
            state: RunState::Created,
        })
    }

    /// 替换偏置场校正器.
    pub fn with_corrector<C: BiasCorrector + 'static>(mut self, corrector: C) -> Self {
        self.corrector = Box::new(corrector);
        self
    }

    /// 替换体积存储.
    pub fn with_store<S: VolumeStore + 'static>(mut self, store: S) -> Self {
        self.store = Box::new(store);
        self
    }

    /// 当前状态.
    #[inline]
    pub fn state(&self) -> RunState {
        self.state
    }

    /// 目录布局.
    #[inline]
    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// 配置.
    #[inline]
    pub fn config(&self) -> &PrepConfig {
        &self.config
    }

    fn advance(&mut self, next: RunState) {
        debug_assert!(
            self.state.can_advance_to(next),
            "illegal transition {:?} -> {next:?}",
            self.state
        );
        self.state = next;
    }

    /// 失败时把状态置为 `Failed`.
    fn guard<T>(&mut self, r: PrepResult<T>) -> PrepResult<T> {
        if r.is_err() && self.state.is_running() {
            self.advance(RunState::Failed);
        }
        r
    }

    /// 发现输入目录下的受试者, 并执行全部三个阶段.
    pub fn run(&mut self) -> PrepResult<RunReport> {
        let cohort = Cohort::discover(self.layout.input_dir())?;
        self.run_cohort(&cohort)
    }

    /// 对给定受试者执行全部三个阶段. 每个 `Pipeline` 只能运行一次.
    ///
    /// 成功时删除临时目录下的所有子目录 (保留 landmark 记录), 失败时保留全部临时文件.
    pub fn run_cohort(&mut self, cohort: &Cohort) -> PrepResult<RunReport> {
        if self.state != RunState::Created {
            return Err(PrepError::config(format!(
                "pipeline already ran (state {:?})",
                self.state
            )));
        }
        cohort.check_inputs(&self.layout)?;
        self.layout.create_dirs()?;
        let pcts = self.config.percentiles()?;
        let subjects = cohort.subjects();
        info!(
            "Preprocessing {} subjects with {} workers",
            subjects.len(),
            self.pool.workers()
        );

        let mut report = RunReport {
            subjects: subjects.len(),
            ..Default::default()
        };

        self.advance(RunState::Stage1Running);
        let t = Instant::now();
        let r = self.correct_bias(subjects);
        self.guard(r)?;
        self.advance(RunState::Stage1Done);
        report.durations.push((Stage::BiasCorrection, t.elapsed()));
        info!("Bias correction done in {:?}", t.elapsed());

        let t = Instant::now();
        let r = self.normalize(subjects, &pcts);
        report.landmarks = self.guard(r)?;
        report.durations.push((Stage::Normalization, t.elapsed()));
        info!("Normalization done in {:?}", t.elapsed());

        self.advance(RunState::Stage3Running);
        let t = Instant::now();
        let r = self.merge_all(subjects);
        report.shapes = self.guard(r)?;
        report.durations.push((Stage::Merge, t.elapsed()));
        info!("Merge done in {:?}", t.elapsed());

        let r = cleanup(self.layout.temp_dir());
        report.scratch_removed = self.guard(r)?;
        self.advance(RunState::Completed);
        Ok(report)
    }

    /// 阶段 1.
    fn correct_bias(&self, subjects: &[SubjectId]) -> PrepResult<()> {
        let units = channel_units(subjects);
        let (layout, corrector, params) = (&self.layout, &*self.corrector, &self.config.n4);
        self.pool.dispatch(Stage::BiasCorrection, &units, |(ch, s)| {
            corrector.correct(
                &layout.source_path(s, *ch),
                &layout.corrected_path(*ch, s),
                params,
            )
        })?;
        Ok(())
    }

    /// 阶段 2. 内部推进 `Stage2LandmarksComputed -> Stage2TransformRunning -> Stage2Done`.
    fn normalize(
        &mut self,
        subjects: &[SubjectId],
        pcts: &Percentiles,
    ) -> PrepResult<BTreeMap<ChannelType, LandmarkProfile>> {
        let units = channel_units(subjects);
        let estimates = self.estimate_landmarks(&units, pcts)?;
        self.advance(RunState::Stage2LandmarksComputed);

        self.advance(RunState::Stage2TransformRunning);
        let (layout, store) = (&self.layout, &*self.store);
        let shared = &estimates;
        self.pool.dispatch(Stage::Normalization, &units, |(ch, s)| {
            let est = &shared[ch];
            let volume = store.load_volume(&layout.corrected_path(*ch, s))?;
            let out = transform(&volume, &est.profiles[s], &est.landmarks)?;
            store.save_volume(&layout.normalized_path(*ch, s), &out)
        })?;
        self.advance(RunState::Stage2Done);

        Ok(estimates
            .into_iter()
            .map(|(ch, est)| (ch, est.landmarks))
            .collect())
    }

    /// 并行计算所有轮廓, 逐通道归约 (或读取) landmark 并落盘.
    fn estimate_landmarks(
        &self,
        units: &[(ChannelType, SubjectId)],
        pcts: &Percentiles,
    ) -> PrepResult<BTreeMap<ChannelType, LandmarkEstimate>> {
        let (layout, store) = (&self.layout, &*self.store);
        let profiles = self.pool.dispatch(Stage::Normalization, units, |(ch, s)| {
            percentile_profile(&store.load_volume(&layout.corrected_path(*ch, s))?, pcts)
        })?;

        let mut grouped: BTreeMap<ChannelType, BTreeMap<SubjectId, _>> = BTreeMap::new();
        for ((ch, s), p) in units.iter().zip(profiles) {
            grouped.entry(*ch).or_default().insert(s.clone(), p);
        }

        let mut estimates = BTreeMap::new();
        for (ch, profiles) in grouped {
            let mut est = LandmarkEstimate::from_profiles(profiles)?;
            if let Some(dir) = &self.config.landmark_dir {
                let path = layout.landmark_path_in(dir, ch);
                est.landmarks = read_landmarks(&path, pcts)?;
                info!("Channel {ch}: landmarks loaded from {}", path.display());
            }
            if !est.landmarks.is_monotonic() {
                warn!("Channel {ch}: landmarks are not monotonic");
            }
            write_landmarks(&layout.landmark_path(ch), pcts, &est.landmarks)?;
            info!("Channel {ch}: landmarks {:?}", &*est.landmarks);
            estimates.insert(ch, est);
        }
        Ok(estimates)
    }

    /// 阶段 3.
    fn merge_all(&self, subjects: &[SubjectId]) -> PrepResult<BTreeMap<SubjectId, [usize; 4]>> {
        let (layout, store) = (&self.layout, &*self.store);
        let opts = self.config.merge_options();
        let shapes = self.pool.dispatch(Stage::Merge, subjects, |s| {
            let channels = ChannelType::ALL
                .iter()
                .map(|&ch| {
                    store
                        .load_volume(&layout.normalized_path(ch, s))
                        .map(|v| (ch, v))
                })
                .collect::<PrepResult<Vec<_>>>()?;
            let mask = store.load_mask(&layout.mask_path(s))?;
            let (full, mask) = merge(channels, mask, &opts)?;
            store.save_merged(&layout.full_output_path(s), &full)?;
            store.save_mask(&layout.mask_output_path(s), &mask)?;
            let (x, y, z, c) = full.dim();
            Ok([x, y, z, c])
        })?;
        Ok(subjects.iter().cloned().zip(shapes).collect())
    }
}

/// 所有 (通道, 受试者) 单元, 先按通道再按受试者排列.
fn channel_units(subjects: &[SubjectId]) -> Vec<(ChannelType, SubjectId)> {
    iproduct!(ChannelType::ALL, subjects.iter().cloned()).collect()
}
