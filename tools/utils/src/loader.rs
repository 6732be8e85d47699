//! 对 `mri-berry::dataset` 的更一层封装. 提供更直接的目录解析.

use std::env;
use std::path::PathBuf;

use mri_berry::dataset::{home_dataset_dir_with, Layout};

/// 按 "环境变量 -> `$HOME/dataset/brats/{leaf}`" 的顺序解析目录.
fn dir_from_env_or_home(var: &str, leaf: &str) -> Option<PathBuf> {
    match env::var_os(var) {
        Some(d) if !d.is_empty() => Some(PathBuf::from(d)),
        _ => home_dataset_dir_with(["brats", leaf]),
    }
}

/// 获取 BraTS 原始数据目录.
///
/// 1. 若环境变量 `$BTC_INPUT_DIR` 非空, 则返回其值;
/// 2. 否则, 返回 `$HOME/dataset/brats/input`.
#[inline]
pub fn input_dir_from_env_or_home() -> Option<PathBuf> {
    dir_from_env_or_home("BTC_INPUT_DIR", "input")
}

/// 获取预处理输出目录.
///
/// 1. 若环境变量 `$BTC_OUTPUT_DIR` 非空, 则返回其值;
/// 2. 否则, 返回 `$HOME/dataset/brats/output`.
#[inline]
pub fn output_dir_from_env_or_home() -> Option<PathBuf> {
    dir_from_env_or_home("BTC_OUTPUT_DIR", "output")
}

/// 获取临时目录.
///
/// 1. 若环境变量 `$BTC_TEMP_DIR` 非空, 则返回其值;
/// 2. 否则, 返回 `$HOME/dataset/brats/temp`.
#[inline]
pub fn temp_dir_from_env_or_home() -> Option<PathBuf> {
    dir_from_env_or_home("BTC_TEMP_DIR", "temp")
}

/// 组合目录布局. 显式给出的目录优先, 其次是环境变量, 最后是主目录.
///
/// 无法确定某个目录时返回 `None`.
pub fn layout_from(
    input: Option<PathBuf>,
    output: Option<PathBuf>,
    temp: Option<PathBuf>,
) -> Option<Layout> {
    let input = input.or_else(input_dir_from_env_or_home)?;
    let output = output.or_else(output_dir_from_env_or_home)?;
    let temp = temp.or_else(temp_dir_from_env_or_home)?;
    Some(Layout::new(input, output, temp))
}
