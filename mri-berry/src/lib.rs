#![warn(missing_docs)] // <= 合适时移除它.
// #![warn(clippy::missing_docs_in_private_items)]  // <= too strict.

//! 核心库. 提供 BraTS 格式多模态 3D 脑部 MRI (四通道扫描 + 肿瘤标注)
//! 的批量预处理: 偏置场校正调度, 跨受试者强度标准化, 多通道合并与最小包围盒裁剪.
//!
//! 该 crate 目前仅提供 `safe` 接口.
//!
//! # 注意
//!
//! 1. 偏置场校正算法本身不在本 crate 内实现, 而是通过 [`bias::BiasCorrector`]
//!   委托给外部工具 (默认为 ANTs `N4BiasFieldCorrection`).
//! 2. 体素坐标按照 nifti 存储顺序 `(x, y, z)` 组织, 不做轴置换.
//! 3. 所有可预期的失败 (空前景, 形状不一致, I/O 等) 都以 [`PrepError`] 返回,
//!   不会 panic. 违反内部不变量时程序才会 panic. As what Rust promises.
//!
//! # 开发计划
//!
//! ### 背景统一化 ✅
//!
//! 最小值为负的体积, 把 0 体素视作背景并平移到 0.
//! 估计器和变换器共用同一实现.
//!
//! 实现位于 `mri-berry/src/norm/background.rs`.
//!
//! ### 基于百分位 landmark 的强度标准化 ✅
//!
//! 参考论文: "New variants of a method of MRI scale standardization"
//! (Nyúl, Udupa, Zhang). 每个受试者计算百分位轮廓, 全体求均值得到 landmark,
//! 再按分段线性插值映射.
//!
//! 实现位于 `mri-berry/src/norm/*`.
//!
//! ### 多通道合并 + 最小包围盒裁剪 ✅
//!
//! 旋转 270° 对齐下游方向, 按通道求和判定前景, 外扩 `edge_space` 后裁剪.
//!
//! 实现位于 `mri-berry/src/merge/*`.
//!
//! ### 三阶段并行调度 ✅
//!
//! 阶段之间严格同步. 失败单元被收集并上报, 临时文件保留以便排查.
//!
//! 实现位于 `mri-berry/src/pipeline/*`.
//!
//! ### 包围盒上界 off-by-one ⌛️
//!
//! 默认行为把上界截断到 `extent - 1`, 与历史输出保持一致.
//! [`merge::UpperClamp::Extent`] 提供修正后的行为. 待下游模型重新训练后再切换默认值.

/// 三维索引, 同时也可一定程度上用作非负整数向量.
pub type Idx3d = (usize, usize, usize);

/// 单通道 3D 扫描体积. 0 代表背景.
pub type Volume = ndarray::Array3<f32>;

/// 3D 标注体积. 保持原始整数标签, 不转换为浮点.
pub type Mask = ndarray::Array3<u8>;

/// 多通道 3D 体积, 最后一维是通道轴, 顺序与 [`dataset::ChannelType::ALL`] 一致.
pub type MultiChannelVolume = ndarray::Array4<f32>;

pub mod bias;

pub mod config;

pub mod consts;

/// 体积的读写.
pub mod data;

pub mod dataset;

mod error;

pub use error::{PrepError, PrepResult};

pub mod merge;

pub mod norm;

pub mod pipeline;

pub mod prelude;
