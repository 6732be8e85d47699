use std::fs;
use std::path::{Path, PathBuf};

use super::{ChannelTags, ChannelType, SubjectId};
use crate::consts::naming::*;
use crate::data::VolumeFormat;
use crate::{PrepError, PrepResult};

/// 文件命名约定.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct Naming {
    /// 各通道的文件名标签.
    pub tags: ChannelTags,

    /// 标注文件的标签.
    pub mask_tag: String,

    /// 原始文件 (及偏置场校正输出) 的扩展名, 包括前导 `.`.
    pub source_ext: String,

    /// 中间结果及最终输出的扩展名, 包括前导 `.`.
    pub target_ext: String,
}

impl Default for Naming {
    fn default() -> Self {
        Self {
            tags: ChannelTags::default(),
            mask_tag: MASK_TAG.to_string(),
            source_ext: SOURCE_EXTENSION.to_string(),
            target_ext: TARGET_EXTENSION.to_string(),
        }
    }
}

impl Naming {
    /// 检查命名约定是否合法.
    pub fn validate(&self) -> PrepResult<()> {
        self.tags.validate()?;
        if self.mask_tag.is_empty()
            || ChannelType::ALL
                .iter()
                .any(|&c| self.tags.tag(c) == self.mask_tag)
        {
            return Err(PrepError::config(format!(
                "mask tag `{}` must be non-empty and differ from channel tags",
                self.mask_tag
            )));
        }
        for ext in [&self.source_ext, &self.target_ext] {
            if !ext.starts_with('.') {
                return Err(PrepError::config(format!(
                    "extension `{ext}` must start with `.`"
                )));
            }
            // 在任何阶段开始之前发现无法读写的格式.
            VolumeFormat::from_path(Path::new(&format!("volume{ext}"))).map_err(|_| {
                PrepError::config(format!("extension `{ext}` is not a supported volume format"))
            })?;
        }
        Ok(())
    }
}

/// 输入, 临时与输出目录布局.
///
/// ```text
/// input_dir/{subject}/{subject}_{tag}{source_ext}      原始扫描
/// input_dir/{subject}/{subject}_{mask}{source_ext}     标注
/// temp_dir/{tag}/{subject}_{tag}{source_ext}           偏置场校正结果
/// temp_dir/{tag}/{subject}_{tag}{target_ext}           标准化结果
/// temp_dir/{tag}_landmarks.csv                         landmark 记录
/// output_dir/full/{subject}{target_ext}                合并裁剪后的多通道体积
/// output_dir/mask/{subject}{target_ext}                裁剪后的标注
/// ```
#[derive(Clone, Debug)]
pub struct Layout {
    input_dir: PathBuf,
    output_dir: PathBuf,
    temp_dir: PathBuf,
    naming: Naming,
}

impl Layout {
    /// 使用默认命名约定创建布局.
    pub fn new(
        input_dir: impl AsRef<Path>,
        output_dir: impl AsRef<Path>,
        temp_dir: impl AsRef<Path>,
    ) -> Self {
        Self {
            input_dir: input_dir.as_ref().to_owned(),
            output_dir: output_dir.as_ref().to_owned(),
            temp_dir: temp_dir.as_ref().to_owned(),
            naming: Naming::default(),
        }
    }

    /// 替换命名约定.
    #[inline]
    pub fn with_naming(mut self, naming: Naming) -> Self {
        self.naming = naming;
        self
    }

    /// 输入根目录.
    #[inline]
    pub fn input_dir(&self) -> &Path {
        &self.input_dir
    }

    /// 输出根目录.
    #[inline]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// 临时目录.
    #[inline]
    pub fn temp_dir(&self) -> &Path {
        &self.temp_dir
    }

    /// 命名约定.
    #[inline]
    pub fn naming(&self) -> &Naming {
        &self.naming
    }

    #[inline]
    fn channel_file(&self, subject: &SubjectId, channel: ChannelType, ext: &str) -> String {
        format!("{subject}_{}{ext}", self.naming.tags.tag(channel))
    }

    /// 原始扫描路径.
    pub fn source_path(&self, subject: &SubjectId, channel: ChannelType) -> PathBuf {
        let mut p = self.input_dir.join(subject.as_str());
        p.push(self.channel_file(subject, channel, &self.naming.source_ext));
        p
    }

    /// 原始标注路径.
    pub fn mask_path(&self, subject: &SubjectId) -> PathBuf {
        let mut p = self.input_dir.join(subject.as_str());
        p.push(format!(
            "{subject}_{}{}",
            self.naming.mask_tag, self.naming.source_ext
        ));
        p
    }

    /// 通道在临时目录下的子目录.
    #[inline]
    pub fn channel_temp_dir(&self, channel: ChannelType) -> PathBuf {
        self.temp_dir.join(self.naming.tags.tag(channel))
    }

    /// 偏置场校正结果路径.
    pub fn corrected_path(&self, channel: ChannelType, subject: &SubjectId) -> PathBuf {
        let mut p = self.channel_temp_dir(channel);
        p.push(self.channel_file(subject, channel, &self.naming.source_ext));
        p
    }

    /// 标准化结果路径.
    pub fn normalized_path(&self, channel: ChannelType, subject: &SubjectId) -> PathBuf {
        let mut p = self.channel_temp_dir(channel);
        p.push(self.channel_file(subject, channel, &self.naming.target_ext));
        p
    }

    /// 本次运行的 landmark 记录路径.
    #[inline]
    pub fn landmark_path(&self, channel: ChannelType) -> PathBuf {
        self.landmark_path_in(&self.temp_dir, channel)
    }

    /// 目录 `dir` 下 `channel` 的 landmark 记录路径.
    #[inline]
    pub fn landmark_path_in(&self, dir: &Path, channel: ChannelType) -> PathBuf {
        dir.join(format!("{}{LANDMARKS_SUFFIX}", self.naming.tags.tag(channel)))
    }

    /// 合并体积输出目录.
    #[inline]
    pub fn full_dir(&self) -> PathBuf {
        self.output_dir.join(FULL_FOLDER)
    }

    /// 标注输出目录.
    #[inline]
    pub fn mask_dir(&self) -> PathBuf {
        self.output_dir.join(MASK_FOLDER)
    }

    /// 合并体积输出路径.
    pub fn full_output_path(&self, subject: &SubjectId) -> PathBuf {
        let mut p = self.full_dir();
        p.push(format!("{subject}{}", self.naming.target_ext));
        p
    }

    /// 裁剪后标注的输出路径.
    pub fn mask_output_path(&self, subject: &SubjectId) -> PathBuf {
        let mut p = self.mask_dir();
        p.push(format!("{subject}{}", self.naming.target_ext));
        p
    }

    /// 创建临时目录 (含每个通道的子目录) 和两个输出目录. 已存在的目录不受影响.
    pub fn create_dirs(&self) -> PrepResult<()> {
        let dirs = ChannelType::ALL
            .map(|c| self.channel_temp_dir(c))
            .into_iter()
            .chain([self.full_dir(), self.mask_dir()]);
        for d in dirs {
            fs::create_dir_all(&d).map_err(|e| PrepError::io(&d, e))?;
        }
        Ok(())
    }
}
