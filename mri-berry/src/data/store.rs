//! 体积的持久化存储.

use std::path::Path;

use ndarray::{Array3, ArrayBase, Data, Ix3, Ix4};
use ndarray_npy::{read_npy, write_npy};
use nifti::writer::WriterOptions;
use nifti::{IntoNdArray, NiftiObject, ReaderOptions};

use super::VolumeFormat;
use crate::{Mask, MultiChannelVolume, PrepError, PrepResult, Volume};

/// 体积读写接口.
///
/// 具体格式由实现者决定. 所有方法都可能阻塞.
pub trait VolumeStore: Send + Sync {
    /// 读取单通道扫描.
    fn load_volume(&self, path: &Path) -> PrepResult<Volume>;

    /// 读取标注. 标签值保持整数表示.
    fn load_mask(&self, path: &Path) -> PrepResult<Mask>;

    /// 保存单通道扫描.
    fn save_volume(&self, path: &Path, volume: &Volume) -> PrepResult<()>;

    /// 保存标注.
    fn save_mask(&self, path: &Path, mask: &Mask) -> PrepResult<()>;

    /// 保存合并后的多通道体积.
    fn save_merged(&self, path: &Path, merged: &MultiChannelVolume) -> PrepResult<()>;
}

/// 本地文件系统存储. 按扩展名选择 nifti 或 npy.
///
/// nifti 数据按存储顺序 `(x, y, z)` 读出, 并转换为标准 (行优先) 内存布局.
#[derive(Copy, Clone, Debug, Default)]
pub struct FsStore;

macro_rules! impl_read_nifti {
    ($($name: ident => $elem: ty),+) => {
        $(
            fn $name(path: &Path) -> PrepResult<Array3<$elem>> {
                let nifti_err = |source| PrepError::Nifti {
                    path: path.to_owned(),
                    source,
                };
                let obj = ReaderOptions::new().read_file(path).map_err(nifti_err)?;
                let data = obj
                    .into_volume()
                    .into_ndarray::<$elem>()
                    .map_err(nifti_err)?;

                let actual = data.ndim();
                let data = data
                    .into_dimensionality::<Ix3>()
                    .map_err(|_| PrepError::Dimensionality {
                        path: path.to_owned(),
                        expected: 3,
                        actual,
                    })?;

                // nifti 的数据段是列优先的.
                Ok(data.as_standard_layout().into_owned())
            }
        )+
    };
}

impl_read_nifti!(read_nifti_f32 => f32, read_nifti_u8 => u8);

/// 读取 npy, 并检查维度.
fn read_npy_checked<A, D>(path: &Path) -> PrepResult<ndarray::Array<A, D>>
where
    A: ndarray_npy::ReadableElement,
    D: ndarray::Dimension,
{
    read_npy(path).map_err(|source| match source {
        ndarray_npy::ReadNpyError::WrongNdim(expected, actual) => PrepError::Dimensionality {
            path: path.to_owned(),
            expected: expected.unwrap_or_default(),
            actual,
        },
        source => PrepError::ReadNpy {
            path: path.to_owned(),
            source,
        },
    })
}

macro_rules! impl_write {
    ($($name: ident => ($elem: ty, $dim: ty)),+) => {
        $(
            fn $name<S: Data<Elem = $elem>>(path: &Path, data: &ArrayBase<S, $dim>) -> PrepResult<()> {
                match VolumeFormat::from_path(path)? {
                    VolumeFormat::Npy => write_npy(path, data).map_err(|source| PrepError::WriteNpy {
                        path: path.to_owned(),
                        source,
                    }),
                    VolumeFormat::Nifti => WriterOptions::new(path)
                        .write_nifti(data)
                        .map_err(|source| PrepError::Nifti {
                            path: path.to_owned(),
                            source,
                        }),
                }
            }
        )+
    };
}

impl_write!(
    write_f32_3d => (f32, Ix3),
    write_u8_3d => (u8, Ix3),
    write_f32_4d => (f32, Ix4)
);

impl VolumeStore for FsStore {
    fn load_volume(&self, path: &Path) -> PrepResult<Volume> {
        match VolumeFormat::from_path(path)? {
            VolumeFormat::Nifti => read_nifti_f32(path),
            VolumeFormat::Npy => read_npy_checked(path),
        }
    }

    fn load_mask(&self, path: &Path) -> PrepResult<Mask> {
        match VolumeFormat::from_path(path)? {
            VolumeFormat::Nifti => read_nifti_u8(path),
            VolumeFormat::Npy => read_npy_checked(path),
        }
    }

    #[inline]
    fn save_volume(&self, path: &Path, volume: &Volume) -> PrepResult<()> {
        write_f32_3d(path, volume)
    }

    #[inline]
    fn save_mask(&self, path: &Path, mask: &Mask) -> PrepResult<()> {
        write_u8_3d(path, mask)
    }

    #[inline]
    fn save_merged(&self, path: &Path, merged: &MultiChannelVolume) -> PrepResult<()> {
        write_f32_4d(path, merged)
    }
}
