//! 阶段内的工作单元调度.

use log::{debug, warn};

use super::{Stage, UnitId};
use crate::dataset::{ChannelType, SubjectId};
use crate::{PrepError, PrepResult};

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
    }
}

/// 可以被调度的工作单元.
pub(crate) trait AsUnit {
    /// 用于日志与错误报告的标识.
    fn unit_id(&self) -> UnitId;
}

impl AsUnit for SubjectId {
    #[inline]
    fn unit_id(&self) -> UnitId {
        UnitId::subject(self.clone())
    }
}

impl AsUnit for (ChannelType, SubjectId) {
    #[inline]
    fn unit_id(&self) -> UnitId {
        UnitId::channel(self.1.clone(), self.0)
    }
}

/// 固定大小的工作线程池. 每个阶段的所有单元都在同一个池中执行.
pub struct WorkerPool {
    workers: usize,
    #[cfg(feature = "rayon")]
    pool: rayon::ThreadPool,
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("workers", &self.workers)
            .finish()
    }
}

impl WorkerPool {
    /// 创建含 `workers` 个线程的池. `workers` 为 0 时使用全部可用核心.
    ///
    /// 未打开 `rayon` feature 时所有单元都在调用线程上依次执行.
    pub fn new(workers: usize) -> PrepResult<Self> {
        let workers = if workers == 0 {
            std::thread::available_parallelism().map_or(1, usize::from)
        } else {
            workers
        };

        #[cfg(feature = "rayon")]
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("mri-prep-{i}"))
            .build()
            .map_err(PrepError::config)?;

        Ok(Self {
            workers,
            #[cfg(feature = "rayon")]
            pool,
        })
    }

    /// 线程数.
    #[inline]
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// 在池中执行 `stage` 的全部单元, 结果按单元顺序返回.
    ///
    /// 即使有单元失败, 其余单元也会执行完毕. 每个失败都会被记录,
    /// 返回的错误对应按单元顺序的第一个失败.
    pub(crate) fn dispatch<U, T, F>(&self, stage: Stage, units: &[U], op: F) -> PrepResult<Vec<T>>
    where
        U: AsUnit + Sync,
        T: Send,
        F: Fn(&U) -> PrepResult<T> + Sync + Send,
    {
        let run_one = |u: &U| {
            debug!("{stage}: {}", u.unit_id());
            op(u)
        };

        #[cfg(feature = "rayon")]
        let results: Vec<PrepResult<T>> =
            self.pool.install(|| units.par_iter().map(run_one).collect());

        #[cfg(not(feature = "rayon"))]
        let results: Vec<PrepResult<T>> = units.iter().map(run_one).collect();

        let mut first = None;
        let mut failed = 0;
        let mut ans = Vec::with_capacity(results.len());
        for (u, r) in units.iter().zip(results) {
            match r {
                Ok(v) => ans.push(v),
                Err(e) => {
                    let unit = u.unit_id();
                    warn!("{stage} failed on {unit}: {e}");
                    failed += 1;
                    if first.is_none() {
                        first = Some((unit, e));
                    }
                }
            }
        }

        match first {
            None => Ok(ans),
            Some((unit, source)) => Err(PrepError::Unit {
                stage,
                unit,
                failed,
                source: Box::new(source),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn subjects(n: usize) -> Vec<SubjectId> {
        (0..n).map(|i| SubjectId::new(format!("{i:03}"))).collect()
    }

    #[test]
    fn test_results_keep_unit_order() {
        let pool = WorkerPool::new(3).unwrap();
        assert_eq!(pool.workers(), 3);
        let units = subjects(20);
        let out = pool
            .dispatch(Stage::Merge, &units, |s| Ok(s.as_str().to_string()))
            .unwrap();
        let expected: Vec<_> = units.iter().map(|s| s.as_str().to_string()).collect();
        assert_eq!(out, expected);
    }

    #[test]
    fn test_all_units_run_and_first_failure_reported() {
        let pool = WorkerPool::new(4).unwrap();
        let units: Vec<_> = subjects(10)
            .into_iter()
            .map(|s| (ChannelType::T2, s))
            .collect();
        let ran = AtomicUsize::new(0);
        let r = pool.dispatch(Stage::Normalization, &units, |(_, s)| {
            ran.fetch_add(1, Ordering::SeqCst);
            match s.as_str() {
                "003" | "007" => Err(PrepError::EmptyForeground),
                _ => Ok(()),
            }
        });
        assert_eq!(ran.load(Ordering::SeqCst), 10);
        match r {
            Err(PrepError::Unit {
                stage,
                unit,
                failed,
                source,
            }) => {
                assert_eq!(stage, Stage::Normalization);
                assert_eq!(unit, UnitId::channel(SubjectId::from("003"), ChannelType::T2));
                assert_eq!(failed, 2);
                assert!(matches!(*source, PrepError::EmptyForeground));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_zero_workers_means_all_cores() {
        let pool = WorkerPool::new(0).unwrap();
        assert!(pool.workers() >= 1);
        let out = pool
            .dispatch(Stage::BiasCorrection, &subjects(0), |_| Ok(()))
            .unwrap();
        assert!(out.is_empty());
    }
}
