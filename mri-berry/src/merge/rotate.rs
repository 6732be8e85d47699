use ndarray::{Array, ArrayBase, ArrayView, Axis, Data, Dimension};

/// 在前两个轴构成的平面内逆时针旋转 `k` 次 90 度, 与 `numpy.rot90(a, k, axes=(0, 1))` 一致.
///
/// 只调整视图的步长, 不复制数据. `k` 按 4 取模, `k` 次旋转的逆是 `4 - k` 次.
///
/// # 注意
///
/// `view` 至少需要两个轴, 否则 panic.
pub fn rot90_view<A, D>(mut view: ArrayView<'_, A, D>, k: usize) -> ArrayView<'_, A, D>
where
    D: Dimension,
{
    assert!(view.ndim() >= 2);
    match k % 4 {
        1 => {
            view.invert_axis(Axis(1));
            view.swap_axes(0, 1);
        }
        2 => {
            view.invert_axis(Axis(0));
            view.invert_axis(Axis(1));
        }
        3 => {
            view.swap_axes(0, 1);
            view.invert_axis(Axis(1));
        }
        _ => {}
    }
    view
}

/// 同 [`rot90_view`], 但返回标准内存布局的新数组.
pub fn rot90<A, S, D>(a: &ArrayBase<S, D>, k: usize) -> Array<A, D>
where
    A: Clone,
    S: Data<Elem = A>,
    D: Dimension,
{
    rot90_view(a.view(), k).as_standard_layout().into_owned()
}
