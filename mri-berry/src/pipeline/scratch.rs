//! 临时目录的清理.

use std::fs;
use std::path::Path;

use log::debug;

use crate::{PrepError, PrepResult};

/// 删除 `temp_dir` 下的所有子目录, 保留直接位于其下的文件 (landmark 记录).
/// 返回删除的目录数. `temp_dir` 不存在时什么也不做.
pub fn cleanup(temp_dir: &Path) -> PrepResult<usize> {
    if !temp_dir.is_dir() {
        return Ok(0);
    }
    let mut removed = 0;
    for entry in fs::read_dir(temp_dir).map_err(|e| PrepError::io(temp_dir, e))? {
        let path = entry.map_err(|e| PrepError::io(temp_dir, e))?.path();
        if path.is_dir() {
            fs::remove_dir_all(&path).map_err(|e| PrepError::io(&path, e))?;
            debug!("Removed {}", path.display());
            removed += 1;
        }
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_keeps_top_level_files() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        fs::create_dir_all(root.join("t1")).unwrap();
        fs::write(root.join("t1").join("1_t1.npy"), b"x").unwrap();
        fs::create_dir_all(root.join("flair")).unwrap();
        fs::write(root.join("t1_landmarks.csv"), b",pct1\n0,1\n").unwrap();

        assert_eq!(cleanup(root).unwrap(), 2);
        assert!(!root.join("t1").exists());
        assert!(!root.join("flair").exists());
        assert!(root.join("t1_landmarks.csv").is_file());
    }

    #[test]
    fn test_missing_dir() {
        let tmp = TempDir::new().unwrap();
        assert_eq!(cleanup(&tmp.path().join("nothing")).unwrap(), 0);
    }
}
