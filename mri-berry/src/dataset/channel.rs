use std::fmt;

use crate::consts::CHANNELS;
use crate::{PrepError, PrepResult};

/// MRI 扫描模态.
///
/// 枚举顺序就是合并后多通道体积的通道轴顺序, 不可调整.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ChannelType {
    /// T2 Flair.
    Flair,

    /// T1 加权.
    T1,

    /// T1 钆增强.
    T1Gd,

    /// T2 加权.
    T2,
}

impl ChannelType {
    /// 全部通道, 按通道轴顺序排列.
    pub const ALL: [ChannelType; CHANNELS] = [Self::Flair, Self::T1, Self::T1Gd, Self::T2];

    /// 在通道轴上的下标.
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// 默认的文件名标签.
    #[inline]
    pub const fn default_tag(self) -> &'static str {
        match self {
            Self::Flair => "flair",
            Self::T1 => "t1",
            Self::T1Gd => "t1Gd",
            Self::T2 => "t2",
        }
    }
}

impl fmt::Display for ChannelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.default_tag())
    }
}

/// 通道到磁盘文件名标签的映射, 即 `{subject}_{tag}{ext}` 中的 `tag`.
///
/// 标签按 [`ChannelType::ALL`] 的顺序存放.
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ChannelTags([String; CHANNELS]);

impl Default for ChannelTags {
    fn default() -> Self {
        Self(ChannelType::ALL.map(|c| c.default_tag().to_string()))
    }
}

impl ChannelTags {
    /// 按通道轴顺序指定标签. 标签必须非空, 互不相同, 且不含路径分隔符.
    pub fn new(tags: [&str; CHANNELS]) -> PrepResult<Self> {
        let ans = Self(tags.map(str::to_string));
        ans.validate()?;
        Ok(ans)
    }

    /// 检查标签表是否合法.
    pub fn validate(&self) -> PrepResult<()> {
        for (i, tag) in self.0.iter().enumerate() {
            if tag.is_empty() || tag.contains(['/', '\\']) {
                return Err(PrepError::ChannelOrder(format!(
                    "invalid tag `{tag}` for `{}`",
                    ChannelType::ALL[i]
                )));
            }
            if self.0[..i].contains(tag) {
                return Err(PrepError::ChannelOrder(format!("tag `{tag}` used twice")));
            }
        }
        Ok(())
    }

    /// 获取 `channel` 的标签.
    #[inline]
    pub fn tag(&self, channel: ChannelType) -> &str {
        &self.0[channel.index()]
    }
}
