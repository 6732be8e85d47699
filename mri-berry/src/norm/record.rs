//! landmark 的持久化记录.
//!
//! 每个通道一个 CSV 文件, 带空白首列 (行号) 的表头, 加一行数据:
//!
//! ```text
//! ,pct1,pct10,pct20,...,pct99
//! 0,12.5,40.0,...
//! ```

use std::fs::File;
use std::iter;
use std::path::Path;

use csv::{ReaderBuilder, Trim, WriterBuilder};

use super::{LandmarkProfile, Percentiles};
use crate::{PrepError, PrepResult};

/// 把 `landmarks` 写入 `path`, 列名取自 `pcts`.
pub fn write_landmarks(
    path: &Path,
    pcts: &Percentiles,
    landmarks: &LandmarkProfile,
) -> PrepResult<()> {
    if pcts.len() != landmarks.len() {
        return Err(PrepError::config(format!(
            "{} percentiles but {} landmarks",
            pcts.len(),
            landmarks.len()
        )));
    }
    let csv_err = |source| PrepError::Csv {
        path: path.to_owned(),
        source,
    };

    let file = File::create(path).map_err(|e| PrepError::io(path, e))?;
    let mut w = WriterBuilder::new().from_writer(file);
    w.write_record(iter::once("").chain(pcts.names().iter().map(String::as_str)))
        .map_err(csv_err)?;
    w.write_record(iter::once("0".to_string()).chain(landmarks.iter().map(f64::to_string)))
        .map_err(csv_err)?;
    w.flush().map_err(|e| PrepError::io(path, e))
}

/// 读取 [`write_landmarks`] 写出的记录. 表头必须与 `pcts` 的列名完全一致.
///
/// 接受任何合法的 CSV 写法 (引号, `\r\n` 换行, 字段两侧的空白).
pub fn read_landmarks(path: &Path, pcts: &Percentiles) -> PrepResult<LandmarkProfile> {
    let csv_err = |source| PrepError::Csv {
        path: path.to_owned(),
        source,
    };
    let malformed = |what: &str| {
        PrepError::config(format!("malformed landmark record `{}`: {what}", path.display()))
    };

    let file = File::open(path).map_err(|e| PrepError::io(path, e))?;
    let mut r = ReaderBuilder::new().trim(Trim::All).from_reader(file);

    let header = r.headers().map_err(csv_err)?;
    let columns = header.iter().skip(1);
    if header.len() != pcts.len() + 1 || columns.zip(pcts.names()).any(|(a, b)| a != b) {
        return Err(malformed("columns differ from configured percentiles"));
    }

    let row = r
        .records()
        .next()
        .ok_or_else(|| malformed("missing data row"))?
        .map_err(csv_err)?;
    let values = row
        .iter()
        .skip(1)
        .map(str::parse::<f64>)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| malformed(&e.to_string()))?;
    if values.len() != pcts.len() {
        return Err(malformed("wrong number of values"));
    }

    let landmarks = LandmarkProfile::from(values);
    if !landmarks.is_monotonic() {
        return Err(malformed("landmarks are not monotonic"));
    }
    Ok(landmarks)
}
