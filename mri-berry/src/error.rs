//! 运行时错误.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::pipeline::{Stage, UnitId};

/// 预处理过程中所有可预期的错误.
#[derive(Error, Debug)]
pub enum PrepError {
    /// 体积中不存在可用于统计百分位的前景体素.
    #[error("volume has no foreground voxels")]
    EmptyForeground,

    /// 同一受试者的通道 (或标注) 空间形状不一致.
    #[error("shape mismatch on `{channel}`: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        /// 出问题的通道名 (或 `mask`).
        channel: String,
        /// 期望形状.
        expected: Vec<usize>,
        /// 实际形状.
        actual: Vec<usize>,
    },

    /// 通道集合不完整或重复.
    #[error("channel order violated: {0}")]
    ChannelOrder(String),

    /// 合并裁剪时找不到前景, 或包围盒退化为空.
    #[error("no foreground left to crop")]
    EmptyVolume,

    /// 外部偏置场校正工具失败或不可用.
    #[error("external tool failed: {0}")]
    ExternalTool(String),

    /// 底层 I/O 错误.
    #[error("I/O error on `{}`: {source}", .path.display())]
    Io {
        /// 相关路径.
        path: PathBuf,
        /// 底层错误.
        source: std::io::Error,
    },

    /// nifti 读写错误.
    #[error("nifti error on `{}`: {source}", .path.display())]
    Nifti {
        /// 相关路径.
        path: PathBuf,
        /// 底层错误.
        source: nifti::NiftiError,
    },

    /// CSV 记录读写错误.
    #[error("csv error on `{}`: {source}", .path.display())]
    Csv {
        /// 相关路径.
        path: PathBuf,
        /// 底层错误.
        source: csv::Error,
    },

    /// npy 读取错误.
    #[error("cannot read npy `{}`: {source}", .path.display())]
    ReadNpy {
        /// 相关路径.
        path: PathBuf,
        /// 底层错误.
        source: ndarray_npy::ReadNpyError,
    },

    /// npy 写入错误.
    #[error("cannot write npy `{}`: {source}", .path.display())]
    WriteNpy {
        /// 相关路径.
        path: PathBuf,
        /// 底层错误.
        source: ndarray_npy::WriteNpyError,
    },

    /// 读到的数组维度不符合预期.
    #[error("`{}` has {actual} dimensions, expected {expected}", .path.display())]
    Dimensionality {
        /// 相关路径.
        path: PathBuf,
        /// 期望维度.
        expected: usize,
        /// 实际维度.
        actual: usize,
    },

    /// 无法根据扩展名判断文件格式.
    #[error("unsupported volume format: `{}`", .0.display())]
    UnsupportedFormat(PathBuf),

    /// 配置不合法.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// 受试者集合为空.
    #[error("cohort is empty")]
    EmptyCohort,

    /// 输入目录中缺少必需的文件.
    #[error("missing input file `{}`", .0.display())]
    MissingInput(PathBuf),

    /// 某阶段的某个工作单元失败. 只携带第一个失败单元的错误.
    #[error("{stage} failed on {unit} ({failed} unit(s) failed): {source}")]
    Unit {
        /// 所在阶段.
        stage: Stage,
        /// 第一个失败的单元.
        unit: UnitId,
        /// 本阶段失败单元总数.
        failed: usize,
        /// 第一个失败单元的原始错误.
        source: Box<PrepError>,
    },
}

/// 预处理运行时结果.
pub type PrepResult<T> = Result<T, PrepError>;

impl PrepError {
    /// 包装 `std::io::Error`, 并附带路径.
    #[inline]
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// 生成 `InvalidConfig`.
    #[inline]
    pub(crate) fn config(msg: impl fmt::Display) -> Self {
        Self::InvalidConfig(msg.to_string())
    }

    /// 如果是阶段失败, 获取最底层的错误; 否则返回自身.
    pub fn root_cause(&self) -> &PrepError {
        match self {
            Self::Unit { source, .. } => source.root_cause(),
            other => other,
        }
    }
}
