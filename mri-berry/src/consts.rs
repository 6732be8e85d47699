//! 通用常量.

/// 文件命名相关.
pub mod naming {
    /// 原始扫描、标注以及偏置场校正输出的扩展名.
    pub const SOURCE_EXTENSION: &str = ".nii.gz";

    /// 标准化结果和最终输出的扩展名.
    pub const TARGET_EXTENSION: &str = ".npy";

    /// 标注文件的标签名, 即 `{subject}_{MASK_TAG}{ext}`.
    pub const MASK_TAG: &str = "mask";

    /// 输出目录下保存合并体积的子目录名.
    pub const FULL_FOLDER: &str = "full";

    /// 输出目录下保存裁剪后标注的子目录名.
    pub const MASK_FOLDER: &str = "mask";

    /// landmark 记录文件名后缀, 即 `{tag}{LANDMARKS_SUFFIX}`.
    pub const LANDMARKS_SUFFIX: &str = "_landmarks.csv";
}

/// N4 偏置场校正的默认参数.
pub mod n4 {
    /// 图像维度.
    pub const DIMENSION: u8 = 3;

    /// 每个分辨率层级的迭代次数.
    pub const ITERATIONS: [u32; 4] = [50, 50, 30, 20];

    /// 降采样因子.
    pub const SHRINK_FACTOR: u32 = 3;

    /// 收敛阈值.
    pub const CONVERGENCE_THRESHOLD: f64 = 0.0;

    /// B 样条拟合距离 (毫米).
    pub const BSPLINE_FITTING_DISTANCE: f64 = 300.0;

    /// 可执行文件名. 可由环境变量 `ANTS_N4_BIN` 覆盖.
    pub const PROGRAM: &str = "N4BiasFieldCorrection";
}

/// 默认百分位点: 1%, 10%, 20%, ..., 90%, 99%.
pub const DEFAULT_PERCENTILES: [f64; 11] = [
    0.01, 0.10, 0.20, 0.30, 0.40, 0.50, 0.60, 0.70, 0.80, 0.90, 0.99,
];

/// 最小包围盒在每个轴两端额外保留的体素数.
pub const EDGE_SPACE: usize = 5;

/// 合并前每个通道旋转 90° 的次数 (轴 0 -> 轴 1 方向).
pub const ROTATE_TIMES: usize = 3;

/// 通道个数.
pub const CHANNELS: usize = 4;
