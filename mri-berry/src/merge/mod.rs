//! 多通道合并与裁剪.
//!
//! 同一受试者的四个通道经过校验, 旋转并按 [`ChannelType`] 顺序叠放到
//! 最后一个轴上; 标注做同样的旋转. 最后按前景包围盒 (外加边距) 同时裁剪两者.

use log::debug;
use ndarray::{stack, ArrayView3, Axis};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::consts::{CHANNELS, EDGE_SPACE, ROTATE_TIMES};
use crate::dataset::ChannelType;
use crate::{Mask, MultiChannelVolume, PrepError, PrepResult, Volume};

mod bbox;
mod rotate;

pub use bbox::{BoundingBox, UpperClamp};
pub use rotate::{rot90, rot90_view};

/// 合并选项.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct MergeOptions {
    /// 包围盒每侧额外保留的体素数.
    pub edge_space: usize,

    /// 包围盒上界的截断方式.
    pub upper_clamp: UpperClamp,

    /// 在前两个轴构成的平面内旋转 90 度的次数.
    pub rotate_times: usize,

    /// 是否对每个通道的前景做 z-score 标准化.
    pub standardize: bool,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            edge_space: EDGE_SPACE,
            upper_clamp: UpperClamp::default(),
            rotate_times: ROTATE_TIMES,
            standardize: false,
        }
    }
}

/// 按 [`ChannelType`] 顺序整理通道. 每种通道必须恰好出现一次, 且形状相同.
fn arrange(channels: Vec<(ChannelType, Volume)>) -> PrepResult<Vec<Volume>> {
    let mut slots: [Option<Volume>; CHANNELS] = Default::default();
    for (ch, v) in channels {
        let slot = &mut slots[ch.index()];
        if slot.is_some() {
            return Err(PrepError::ChannelOrder(format!("duplicate channel `{ch}`")));
        }
        *slot = Some(v);
    }

    let volumes = slots
        .into_iter()
        .zip(ChannelType::ALL)
        .map(|(v, ch)| {
            v.ok_or_else(|| PrepError::ChannelOrder(format!("missing channel `{ch}`")))
        })
        .collect::<PrepResult<Vec<_>>>()?;

    let expected = volumes[0].shape().to_vec();
    for (ch, v) in ChannelType::ALL.iter().zip(volumes.iter()) {
        if v.shape() != expected.as_slice() {
            return Err(PrepError::ShapeMismatch {
                channel: ch.to_string(),
                expected,
                actual: v.shape().to_vec(),
            });
        }
    }
    Ok(volumes)
}

/// 对大于最小值的体素求均值和 (总体) 标准差, 并以此标准化整个体积.
///
/// 没有前景, 或标准差为 0 时不做任何修改, 返回 `false`.
pub fn standardize(volume: &mut Volume) -> bool {
    let min = volume.iter().copied().fold(f32::INFINITY, f32::min);
    let (n, sum) = volume
        .iter()
        .filter(|&&x| x > min)
        .fold((0usize, 0f64), |(n, s), &x| (n + 1, s + x as f64));
    if n == 0 {
        return false;
    }
    let mean = sum / n as f64;
    let var = volume
        .iter()
        .filter(|&&x| x > min)
        .map(|&x| (x as f64 - mean).powi(2))
        .sum::<f64>()
        / n as f64;
    let std = var.sqrt();
    if std == 0.0 {
        return false;
    }
    volume.mapv_inplace(|x| ((x as f64 - mean) / std) as f32);
    true
}

/// 合并同一受试者的四个通道, 并与标注一起裁剪.
///
/// 1. 校验通道集合与形状, 标注形状必须与通道一致;
/// 2. (可选) 逐通道 [`standardize`];
/// 3. 通道与标注都旋转 `opts.rotate_times` 次, 通道按枚举顺序叠放在最后一个轴;
/// 4. 通道和严格大于其最小值的体素为前景, 求包围盒并按 `opts` 扩展;
/// 5. 裁剪.
///
/// 找不到前景或包围盒退化时返回 `PrepError::EmptyVolume`.
pub fn merge(
    channels: Vec<(ChannelType, Volume)>,
    mask: Mask,
    opts: &MergeOptions,
) -> PrepResult<(MultiChannelVolume, Mask)> {
    let mut volumes = arrange(channels)?;
    let expected = volumes[0].shape().to_vec();
    if mask.shape() != expected.as_slice() {
        return Err(PrepError::ShapeMismatch {
            channel: crate::consts::naming::MASK_TAG.to_string(),
            expected,
            actual: mask.shape().to_vec(),
        });
    }

    if opts.standardize {
        for (ch, v) in ChannelType::ALL.iter().zip(volumes.iter_mut()) {
            if !standardize(v) {
                debug!("Channel {ch} is left unstandardized");
            }
        }
    }

    let k = opts.rotate_times;
    let views: Vec<ArrayView3<f32>> = volumes.iter().map(|v| rot90_view(v.view(), k)).collect();
    let full = stack(Axis(3), &views).map_err(|_| PrepError::ShapeMismatch {
        channel: "full".to_string(),
        expected: expected.clone(),
        actual: Vec::new(),
    })?;
    let mask = rot90(&mask, k);

    let sum = full.sum_axis(Axis(3));
    let min = sum.iter().copied().fold(f32::INFINITY, f32::min);
    let fg = sum.mapv(|s| s > min);

    let (x, y, z) = sum.dim();
    let bb = BoundingBox::from_foreground(&fg)
        .ok_or(PrepError::EmptyVolume)?
        .expand(opts.edge_space, [x, y, z], opts.upper_clamp);
    if bb.is_empty() {
        return Err(PrepError::EmptyVolume);
    }
    debug!("Bounding box {:?}..{:?}", bb.begin(), bb.end());

    let full = bb.slice(&full).as_standard_layout().into_owned();
    let mask = bb.slice(&mask).as_standard_layout().into_owned();
    Ok((full, mask))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Idx3d;
    use ndarray::{s, Array3};

    fn cube(n: usize, at: Idx3d, value: f32) -> Volume {
        let mut v = Array3::zeros((n, n, n));
        v[at] = value;
        v
    }

    fn channels_at(n: usize, at: Idx3d) -> Vec<(ChannelType, Volume)> {
        ChannelType::ALL
            .iter()
            .enumerate()
            .map(|(i, &ch)| (ch, cube(n, at, (i + 1) as f32)))
            .collect()
    }

    fn opts(edge_space: usize, upper_clamp: UpperClamp, rotate_times: usize) -> MergeOptions {
        MergeOptions {
            edge_space,
            upper_clamp,
            rotate_times,
            standardize: false,
        }
    }

    #[test]
    fn test_single_voxel_box() {
        let mask = Mask::zeros((4, 4, 4));
        let (full, m) = merge(
            channels_at(4, (2, 2, 2)),
            mask.clone(),
            &opts(1, UpperClamp::Extent, 0),
        )
        .unwrap();
        assert_eq!(full.dim(), (3, 3, 3, 4));
        assert_eq!(m.dim(), (3, 3, 3));
        assert_eq!(full[(1, 1, 1, 0)], 1.0);
        assert_eq!(full[(1, 1, 1, 3)], 4.0);

        // 旧的截断方式少保留一个体素.
        let (full, m) = merge(
            channels_at(4, (2, 2, 2)),
            mask,
            &opts(1, UpperClamp::LastIndex, 0),
        )
        .unwrap();
        assert_eq!(full.dim(), (2, 2, 2, 4));
        assert_eq!(m.dim(), (2, 2, 2));
    }

    #[test]
    fn test_rotated_box() {
        // 旋转 3 次后 (2, 2, 2) 位于 (2, 1, 2).
        let mut mask = Mask::zeros((4, 4, 4));
        mask[(2, 2, 2)] = 2;
        let (full, m) = merge(
            channels_at(4, (2, 2, 2)),
            mask.clone(),
            &opts(1, UpperClamp::LastIndex, 3),
        )
        .unwrap();
        assert_eq!(full.dim(), (2, 3, 2, 4));
        assert_eq!(full[(1, 1, 1, 2)], 3.0);
        assert_eq!(m[(1, 1, 1)], 2);

        let (full, m) = merge(
            channels_at(4, (2, 2, 2)),
            mask,
            &opts(1, UpperClamp::Extent, 3),
        )
        .unwrap();
        assert_eq!(full.dim(), (3, 3, 3, 4));
        assert_eq!(m[(1, 1, 1)], 2);
    }

    #[test]
    fn test_crop_matches_rotated_channels() {
        let n = 6;
        let channels: Vec<_> = ChannelType::ALL
            .iter()
            .enumerate()
            .map(|(c, &ch)| {
                let v = Array3::from_shape_fn((n, n, n), |(i, j, k)| {
                    if (1..4).contains(&i) && (2..5).contains(&j) && k == 3 {
                        (c * 10 + i + j) as f32
                    } else {
                        0.0
                    }
                });
                (ch, v)
            })
            .collect();
        let rotated: Vec<Volume> = channels.iter().map(|(_, v)| rot90(v, 3)).collect();
        let mask = Mask::from_shape_fn((n, n, n), |(i, j, k)| (i + j + k) as u8);
        let rotated_mask = rot90(&mask, 3);

        let o = opts(1, UpperClamp::Extent, 3);
        let (full, m) = merge(channels, mask, &o).unwrap();

        // 旋转后前景的范围.
        let fg = rotated[0].mapv(|x| x > 0.0);
        let bb = BoundingBox::from_foreground(&fg)
            .unwrap()
            .expand(1, [n; 3], UpperClamp::Extent);
        let [b0, b1, b2] = bb.begin();
        let [e0, e1, e2] = bb.end();
        for (c, r) in rotated.iter().enumerate() {
            assert_eq!(
                full.slice(s![.., .., .., c]),
                r.slice(s![b0..e0, b1..e1, b2..e2])
            );
        }
        assert_eq!(m, rotated_mask.slice(s![b0..e0, b1..e1, b2..e2]));
    }

    #[test]
    fn test_channel_order_errors() {
        let mask = Mask::zeros((2, 2, 2));
        let o = MergeOptions::default();

        let mut chs = channels_at(2, (0, 0, 0));
        chs.pop();
        assert!(matches!(
            merge(chs, mask.clone(), &o),
            Err(PrepError::ChannelOrder(_))
        ));

        let mut chs = channels_at(2, (0, 0, 0));
        chs[3].0 = ChannelType::T1;
        assert!(matches!(
            merge(chs, mask, &o),
            Err(PrepError::ChannelOrder(_))
        ));
    }

    #[test]
    fn test_shape_mismatch() {
        let o = MergeOptions::default();
        let mut chs = channels_at(3, (1, 1, 1));
        chs[2].1 = Array3::zeros((3, 3, 2));
        match merge(chs, Mask::zeros((3, 3, 3)), &o) {
            Err(PrepError::ShapeMismatch { channel, .. }) => assert_eq!(channel, "t1Gd"),
            other => panic!("unexpected {other:?}"),
        }

        let chs = channels_at(3, (1, 1, 1));
        match merge(chs, Mask::zeros((3, 3, 4)), &o) {
            Err(PrepError::ShapeMismatch { channel, .. }) => assert_eq!(channel, "mask"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_all_background() {
        let chs: Vec<_> = ChannelType::ALL
            .iter()
            .map(|&ch| (ch, Array3::zeros((3, 3, 3))))
            .collect();
        assert!(matches!(
            merge(chs, Mask::zeros((3, 3, 3)), &MergeOptions::default()),
            Err(PrepError::EmptyVolume)
        ));
    }

    #[test]
    fn test_degenerate_box_is_empty_volume() {
        // 长度为 1 的轴在旧的截断方式下没有体素可保留.
        let chs: Vec<_> = ChannelType::ALL
            .iter()
            .map(|&ch| {
                let mut v = Array3::zeros((3, 3, 1));
                v[(1, 1, 0)] = 1.0;
                (ch, v)
            })
            .collect();
        assert!(matches!(
            merge(chs, Mask::zeros((3, 3, 1)), &opts(2, UpperClamp::LastIndex, 0)),
            Err(PrepError::EmptyVolume)
        ));
    }

    #[test]
    fn test_standardize() {
        let mut v = Array3::zeros((2, 2, 1));
        v[(0, 0, 0)] = 1.0;
        v[(1, 1, 0)] = 3.0;
        assert!(standardize(&mut v));
        // 前景均值 2, 标准差 1.
        assert_eq!(v[(0, 0, 0)], -1.0);
        assert_eq!(v[(1, 1, 0)], 1.0);
        assert_eq!(v[(0, 1, 0)], -2.0);

        let mut flat = Array3::from_elem((2, 2, 2), 5.0f32);
        assert!(!standardize(&mut flat));
        let mut single = cube(2, (0, 0, 0), 1.0);
        assert!(!standardize(&mut single));
        assert_eq!(single[(0, 0, 0)], 1.0);
    }
}
