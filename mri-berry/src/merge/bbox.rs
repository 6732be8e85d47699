use std::ops::Range;

use ndarray::{ArrayBase, ArrayView, Data, Dimension, Ix3, Slice};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 包围盒扩展后, 上界的截断方式.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum UpperClamp {
    /// 上界不超过 `extent - 1`. 会比真实范围少一个体素, 与已有的训练数据保持一致.
    #[default]
    LastIndex,

    /// 上界不超过 `extent`.
    Extent,
}

impl UpperClamp {
    /// 长度为 `extent` 的轴上, 半开区间上界的最大值.
    #[inline]
    pub fn cap(self, extent: usize) -> usize {
        match self {
            Self::LastIndex => extent.saturating_sub(1),
            Self::Extent => extent,
        }
    }
}

/// 三维轴对齐包围盒. 每个轴都是半开区间 `[begin, end)`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BoundingBox {
    begin: [usize; 3],
    end: [usize; 3],
}

impl BoundingBox {
    /// 直接构造. 要求每个轴 `begin <= end`.
    pub fn new(begin: [usize; 3], end: [usize; 3]) -> Self {
        debug_assert!(begin.iter().zip(end.iter()).all(|(b, e)| b <= e));
        Self { begin, end }
    }

    /// 所有 `true` 体素的最小包围盒, 三个轴互相独立.
    /// 不存在 `true` 体素时返回 `None`.
    pub fn from_foreground<S>(fg: &ArrayBase<S, Ix3>) -> Option<Self>
    where
        S: Data<Elem = bool>,
    {
        let mut begin = [usize::MAX; 3];
        let mut end = [0; 3];
        let mut found = false;
        for ((x, y, z), _) in fg.indexed_iter().filter(|(_, v)| **v) {
            found = true;
            for (d, i) in [x, y, z].into_iter().enumerate() {
                begin[d] = begin[d].min(i);
                end[d] = end[d].max(i + 1);
            }
        }
        found.then_some(Self { begin, end })
    }

    /// 两端各扩展 `margin`, 下界不小于 0, 上界按 `clamp` 截断到 `extent` 以内.
    pub fn expand(&self, margin: usize, extent: [usize; 3], clamp: UpperClamp) -> Self {
        let mut ans = self.clone();
        for d in 0..3 {
            ans.begin[d] = self.begin[d].saturating_sub(margin);
            ans.end[d] = self.end[d].saturating_add(margin).min(clamp.cap(extent[d]));
        }
        ans
    }

    /// 下界.
    #[inline]
    pub fn begin(&self) -> [usize; 3] {
        self.begin
    }

    /// 上界 (不含).
    #[inline]
    pub fn end(&self) -> [usize; 3] {
        self.end
    }

    /// 第 `d` 个轴的范围.
    #[inline]
    pub fn range(&self, d: usize) -> Range<usize> {
        self.begin[d]..self.end[d].max(self.begin[d])
    }

    /// 盒子的形状. 退化的轴长度为 0.
    pub fn shape(&self) -> [usize; 3] {
        [0, 1, 2].map(|d| self.range(d).len())
    }

    /// 是否不含任何体素.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.shape().contains(&0)
    }

    /// 用盒子切片 `a` 的前三个轴, 其余轴保持完整.
    ///
    /// # 注意
    ///
    /// 盒子必须位于 `a` 的范围之内, 否则 panic.
    pub fn slice<'a, A, S, D>(&self, a: &'a ArrayBase<S, D>) -> ArrayView<'a, A, D>
    where
        S: Data<Elem = A>,
        D: Dimension,
    {
        a.slice_each_axis(|ax| {
            let d = ax.axis.index();
            if d < 3 {
                let r = self.range(d);
                Slice::from(r.start as isize..r.end as isize)
            } else {
                Slice::from(..)
            }
        })
    }
}
