//! 数据集组织: 通道类型, 受试者集合与目录布局.

use std::path::{Path, PathBuf};

mod channel;
mod cohort;
mod layout;

pub use channel::{ChannelTags, ChannelType};
pub use cohort::{Cohort, SubjectId};
pub use layout::{Layout, Naming};

/// 获取 `{用户主目录}/dataset` 目录.
pub fn home_dataset_dir() -> Option<PathBuf> {
    let mut ans = dirs::home_dir()?;
    ans.push("dataset");
    Some(ans)
}

/// 获取 `{用户主目录}/dataset` 目录下给定继续项组成的全路径.
pub fn home_dataset_dir_with<P: AsRef<Path>, I: IntoIterator<Item = P>>(it: I) -> Option<PathBuf> {
    let mut ans = home_dataset_dir()?;
    ans.extend(it);
    Some(ans)
}
