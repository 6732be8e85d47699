//! 背景统一化.
//!
//! 约定背景总是体积的最小值且为 0. 若某体积的最小值 `m` 为负, 则认为
//! `m` 才是真正的背景: 先把值为 0 的体素改为 `m`, 再把整个体积平移 `-m`.
//! 估计器与变换器都只通过本模块判定背景.

use ndarray::{ArrayBase, Data, DataMut, Dimension};

/// 某个体积的背景平移量. 由 [`BackgroundShift::detect`] 计算.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct BackgroundShift {
    /// 负的全局最小值. 为 `None` 时不做任何修改.
    min: Option<f32>,
}

impl BackgroundShift {
    /// 检查体积的全局最小值. NaN 被忽略.
    pub fn detect<S, D>(volume: &ArrayBase<S, D>) -> Self
    where
        S: Data<Elem = f32>,
        D: Dimension,
    {
        let min = volume.iter().copied().fold(f32::INFINITY, f32::min);
        Self {
            min: (min < 0.0).then_some(min),
        }
    }

    /// 是否需要平移.
    #[inline]
    pub fn is_identity(&self) -> bool {
        self.min.is_none()
    }

    /// 对单个体素应用平移. 0 体素视作背景, 结果仍为 0.
    #[inline]
    pub fn apply(&self, x: f32) -> f32 {
        match self.min {
            None => x,
            Some(_) if x == 0.0 => 0.0,
            Some(m) => x - m,
        }
    }
}

/// 原地统一背景. 返回体积是否被修改.
pub fn rebase_background<S, D>(volume: &mut ArrayBase<S, D>) -> bool
where
    S: DataMut<Elem = f32>,
    D: Dimension,
{
    let shift = BackgroundShift::detect(volume);
    if shift.is_identity() {
        return false;
    }
    volume.mapv_inplace(|x| shift.apply(x));
    true
}
