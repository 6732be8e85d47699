//! 🍇欢迎光临🍓
//!
//! 涵盖了本 crate 一系列常用的功能.

pub use crate::{Idx3d, Mask, MultiChannelVolume, Volume};
pub use crate::{PrepError, PrepResult};

pub use crate::bias::{BiasCorrector, CopyThrough, N4Command, N4Params};
pub use crate::config::PrepConfig;
pub use crate::data::{FsStore, VolumeFormat, VolumeStore};

pub use crate::dataset::home_dataset_dir_with;
pub use crate::dataset::{ChannelTags, ChannelType, Cohort, Layout, Naming, SubjectId};

pub use crate::merge::{merge, BoundingBox, MergeOptions, UpperClamp};
pub use crate::norm::record::{read_landmarks, write_landmarks};
pub use crate::norm::{LandmarkEstimate, LandmarkProfile, PercentileProfile, Percentiles};

pub use crate::pipeline::{Pipeline, RunReport, RunState, Stage, UnitId};
