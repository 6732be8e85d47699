//! 分段线性强度映射.

use ndarray::{ArrayBase, Data, Ix3};
use num::Float;

use super::background::BackgroundShift;
use super::{LandmarkProfile, PercentileProfile};
use crate::{PrepError, PrepResult, Volume};

/// 单调分段线性插值, 语义与 `numpy.interp` 一致.
///
/// `xp` 必须单调不减, 且与 `fp` 等长 (非空). 落在 `xp` 范围之外的 `x`
/// 被截断到最近的端点值. `xp` 中的重复断点不会产生除零:
/// 总是选取满足 `xp[j] <= x < xp[j + 1]` 的区间.
pub fn interp<F: Float>(x: F, xp: &[F], fp: &[F]) -> F {
    debug_assert!(!xp.is_empty() && xp.len() == fp.len());
    let last = xp.len() - 1;
    if x < xp[0] {
        return fp[0];
    }
    if x >= xp[last] {
        return fp[last];
    }

    // xp[0] <= x < xp[last], 因此 1 <= pos <= last.
    let j = xp.partition_point(|&p| p <= x) - 1;
    let (x0, x1) = (xp[j], xp[j + 1]);
    let (y0, y1) = (fp[j], fp[j + 1]);
    y0 + (x - x0) * (y1 - y0) / (x1 - x0)
}

/// 把 `volume` 的强度分布校准到 `landmarks` 上.
///
/// 背景统一后, 对每个体素 `x`:
///
/// - `x` 为背景 (0) 时保持 0;
/// - `x >= subject` 最大断点时取 `landmarks` 的最大值;
/// - `x < subject` 最小断点时置 0;
/// - 其余情况以 `subject` 为横坐标, `landmarks` 为纵坐标做 [`interp`].
pub fn transform<S>(
    volume: &ArrayBase<S, Ix3>,
    subject: &PercentileProfile,
    landmarks: &LandmarkProfile,
) -> PrepResult<Volume>
where
    S: Data<Elem = f32>,
{
    if subject.is_empty() {
        return Err(PrepError::EmptyForeground);
    }
    if subject.len() != landmarks.len() {
        return Err(PrepError::config(format!(
            "subject profile has {} points while landmarks have {}",
            subject.len(),
            landmarks.len()
        )));
    }

    let lo = subject[0];
    let hi = subject[subject.len() - 1];
    let top = landmarks[landmarks.len() - 1];

    let shift = BackgroundShift::detect(volume);
    Ok(volume.mapv(|x| {
        let x = shift.apply(x) as f64;
        let y = if !(x > 0.0) {
            0.0
        } else if x >= hi {
            top
        } else if x < lo {
            0.0
        } else {
            interp(x, &subject[..], &landmarks[..])
        };
        y as f32
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array3};

    #[test]
    fn test_interp() {
        let xp = [1.0, 2.0, 4.0];
        let fp = [10.0, 20.0, 40.0];
        assert_eq!(interp(0.0, &xp, &fp), 10.0);
        assert_eq!(interp(1.0, &xp, &fp), 10.0);
        assert_eq!(interp(1.5, &xp, &fp), 15.0);
        assert_eq!(interp(3.0, &xp, &fp), 30.0);
        assert_eq!(interp(4.0, &xp, &fp), 40.0);
        assert_eq!(interp(9.0, &xp, &fp), 40.0);
    }

    #[test]
    fn test_interp_repeated_breakpoints() {
        let xp = [10.0f32, 10.0, 20.0];
        let fp = [0.0f32, 5.0, 15.0];
        assert_eq!(interp(10.0, &xp, &fp), 5.0);
        assert_eq!(interp(15.0, &xp, &fp), 10.0);
        assert_eq!(interp(9.0, &xp, &fp), 0.0);

        let xp = [3.0, 3.0, 3.0];
        let fp = [1.0, 2.0, 3.0];
        let y = interp(3.0, &xp, &fp);
        assert!(y.is_finite());
        assert_eq!(y, 3.0);
    }

    #[test]
    fn test_identity_on_in_range() {
        let subject: PercentileProfile = vec![1.0, 5.0, 10.0].into();
        let landmarks: LandmarkProfile = vec![1.0, 5.0, 10.0].into();
        let v = Array3::from_shape_fn((3, 3, 1), |(i, j, _)| (i * 3 + j) as f32);
        let out = transform(&v, &subject, &landmarks).unwrap();
        for (&a, &b) in v.iter().zip(out.iter()) {
            if a < 10.0 {
                assert_eq!(a, b);
            }
        }
    }

    #[test]
    fn test_high_and_low_override() {
        let subject: PercentileProfile = vec![2.0, 4.0].into();
        let landmarks: LandmarkProfile = vec![100.0, 200.0].into();
        let v = array![[[0.0f32, 1.0, 2.0, 3.0, 4.0, 7.0]]];
        let out = transform(&v, &subject, &landmarks).unwrap();
        assert_eq!(out, array![[[0.0f32, 0.0, 100.0, 150.0, 200.0, 200.0]]]);
    }

    #[test]
    fn test_negative_background() {
        // 背景为 -1, 平移后前景为 {1, 2, 3}.
        let subject: PercentileProfile = vec![1.0, 3.0].into();
        let landmarks: LandmarkProfile = vec![10.0, 30.0].into();
        let v = array![[[-1.0f32, 0.0, 0.0, 1.0, 2.0]]];
        let out = transform(&v, &subject, &landmarks).unwrap();
        assert_eq!(out, array![[[0.0f32, 0.0, 0.0, 20.0, 30.0]]]);
    }

    #[test]
    fn test_background_stays_zero() {
        let subject: PercentileProfile = vec![0.5, 1.0].into();
        let landmarks: LandmarkProfile = vec![3.0, 9.0].into();
        let v = Array3::<f32>::zeros((2, 2, 2));
        let out = transform(&v, &subject, &landmarks).unwrap();
        assert!(out.iter().all(|&x| x == 0.0));
    }

    #[test]
    fn test_length_mismatch() {
        let subject: PercentileProfile = vec![1.0, 2.0].into();
        let landmarks: LandmarkProfile = vec![1.0].into();
        let v = Array3::<f32>::ones((1, 1, 1));
        assert!(matches!(
            transform(&v, &subject, &landmarks),
            Err(PrepError::InvalidConfig(_))
        ));
    }
}
