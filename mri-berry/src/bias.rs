//! 偏置场校正.
//!
//! 本 crate 不实现校正算法本身, 只负责调度. 默认委托给 ANTs 的
//! `N4BiasFieldCorrection` 可执行文件.

use std::ffi::OsString;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use itertools::Itertools;
use log::debug;
use once_cell::sync::Lazy;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::consts::n4;
use crate::{PrepError, PrepResult};

/// 环境变量 `ANTS_N4_BIN` 指定的可执行文件, 未设置时为 [`n4::PROGRAM`].
static N4_PROGRAM: Lazy<PathBuf> = Lazy::new(|| {
    std::env::var_os("ANTS_N4_BIN")
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(n4::PROGRAM))
});

/// 等待子进程时的轮询间隔.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// N4 算法参数. 原样传给外部工具.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct N4Params {
    /// 图像维度.
    pub dimension: u8,
    /// 每个分辨率层级的迭代次数.
    pub iterations: Vec<u32>,
    /// 降采样因子.
    pub shrink_factor: u32,
    /// 收敛阈值.
    pub convergence_threshold: f64,
    /// B 样条拟合距离.
    pub bspline_fitting_distance: f64,
}

impl Default for N4Params {
    fn default() -> Self {
        Self {
            dimension: n4::DIMENSION,
            iterations: n4::ITERATIONS.to_vec(),
            shrink_factor: n4::SHRINK_FACTOR,
            convergence_threshold: n4::CONVERGENCE_THRESHOLD,
            bspline_fitting_distance: n4::BSPLINE_FITTING_DISTANCE,
        }
    }
}

impl N4Params {
    /// 生成命令行参数, 不含输入输出路径.
    pub fn args(&self) -> Vec<String> {
        vec![
            "-d".to_string(),
            self.dimension.to_string(),
            "--shrink-factor".to_string(),
            self.shrink_factor.to_string(),
            "--convergence".to_string(),
            format!(
                "[ {}, {:?} ]",
                self.iterations.iter().join("x"),
                self.convergence_threshold
            ),
            "--bspline-fitting".to_string(),
            format!("[ {} ]", self.bspline_fitting_distance),
        ]
    }

    /// 检查参数.
    pub fn validate(&self) -> PrepResult<()> {
        if self.iterations.is_empty() {
            return Err(PrepError::config("N4 needs at least one iteration level"));
        }
        if self.shrink_factor == 0 {
            return Err(PrepError::config("N4 shrink factor must be positive"));
        }
        if !(self.bspline_fitting_distance > 0.0) {
            return Err(PrepError::config("N4 B-spline distance must be positive"));
        }
        Ok(())
    }
}

/// 偏置场校正器. 读取 `input`, 把结果写到 `output`.
pub trait BiasCorrector: Send + Sync {
    /// 执行校正. 成功时 `output` 必须存在.
    fn correct(&self, input: &Path, output: &Path, params: &N4Params) -> PrepResult<()>;
}

impl<F> BiasCorrector for F
where
    F: Fn(&Path, &Path, &N4Params) -> PrepResult<()> + Send + Sync,
{
    #[inline]
    fn correct(&self, input: &Path, output: &Path, params: &N4Params) -> PrepResult<()> {
        self(input, output, params)
    }
}

/// 调用外部 `N4BiasFieldCorrection` 进程.
#[derive(Clone, Debug)]
pub struct N4Command {
    program: PathBuf,
    timeout: Option<Duration>,
}

impl Default for N4Command {
    fn default() -> Self {
        Self {
            program: N4_PROGRAM.clone(),
            timeout: None,
        }
    }
}

impl N4Command {
    /// 使用默认可执行文件, 不限时.
    pub fn new() -> Self {
        Self::default()
    }

    /// 指定可执行文件.
    pub fn with_program<P: Into<PathBuf>>(mut self, program: P) -> Self {
        self.program = program.into();
        self
    }

    /// 每次调用的最长时间. 超时的子进程会被杀死.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// 可执行文件.
    #[inline]
    pub fn program(&self) -> &Path {
        &self.program
    }

    fn command(&self, input: &Path, output: &Path, params: &N4Params) -> Command {
        let mut cmd = Command::new(&self.program);
        let args = params.args();
        // `-d 3` 之后紧接输入输出.
        cmd.args(&args[..2])
            .arg("--input-image")
            .arg(input)
            .arg("--output")
            .arg(output)
            .args(&args[2..]);
        cmd.stdin(Stdio::null()).stdout(Stdio::null());
        cmd
    }
}

/// 外部工具的标准错误输出写到 `output` 旁边的 `{file_name}.log`.
pub fn stderr_log_path(output: &Path) -> PathBuf {
    let mut name = output
        .file_name()
        .map(OsString::from)
        .unwrap_or_else(|| OsString::from("n4"));
    name.push(".log");
    output.with_file_name(name)
}

impl BiasCorrector for N4Command {
    fn correct(&self, input: &Path, output: &Path, params: &N4Params) -> PrepResult<()> {
        let log_path = stderr_log_path(output);
        let tool_err = |msg: String| {
            PrepError::ExternalTool(format!(
                "{}: {msg} (stderr in {})",
                self.program.display(),
                log_path.display()
            ))
        };

        let log = File::create(&log_path).map_err(|e| PrepError::io(&log_path, e))?;
        let mut child = self
            .command(input, output, params)
            .stderr(log)
            .spawn()
            .map_err(|e| tool_err(format!("cannot spawn ({e})")))?;
        debug!("Spawned N4 for {}", input.display());

        let status = match self.timeout {
            None => child.wait().map_err(|e| tool_err(e.to_string()))?,
            Some(timeout) => {
                let deadline = Instant::now() + timeout;
                loop {
                    if let Some(status) = child.try_wait().map_err(|e| tool_err(e.to_string()))? {
                        break status;
                    }
                    if Instant::now() >= deadline {
                        // 进程可能恰好在此刻退出, 忽略 kill 的失败.
                        let _ = child.kill();
                        let _ = child.wait();
                        return Err(tool_err(format!(
                            "timed out after {:?} on {}",
                            timeout,
                            input.display()
                        )));
                    }
                    thread::sleep(POLL_INTERVAL);
                }
            }
        };

        if !status.success() {
            return Err(tool_err(format!("{status} on {}", input.display())));
        }
        if !output.is_file() {
            return Err(tool_err(format!("no output written to {}", output.display())));
        }
        Ok(())
    }
}

/// 跳过校正, 直接复制输入.
#[derive(Copy, Clone, Debug, Default)]
pub struct CopyThrough;

impl BiasCorrector for CopyThrough {
    fn correct(&self, input: &Path, output: &Path, _: &N4Params) -> PrepResult<()> {
        fs::copy(input, output).map_err(|e| PrepError::io(input, e))?;
        Ok(())
    }
}
