//! BraTS 多模态 MRI 批量预处理.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use log::{error, LevelFilter};

mod result;
mod runner;

/// 偏置场校正, 强度标准化, 多通道合并裁剪.
///
/// 目录优先取命令行参数, 其次是环境变量 `BTC_INPUT_DIR`, `BTC_OUTPUT_DIR`,
/// `BTC_TEMP_DIR`, 最后是 `$HOME/dataset/brats/{input,output,temp}`.
#[derive(Debug, Parser)]
#[command(name = "mri-prep", version)]
pub struct Args {
    /// 原始数据目录, 每个受试者一个子目录
    #[arg(long)]
    pub input: Option<PathBuf>,

    /// 输出目录
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// 临时目录
    #[arg(long)]
    pub temp: Option<PathBuf>,

    /// TOML 配置文件
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// 工作线程数, 0 表示全部核心
    #[arg(long)]
    pub workers: Option<usize>,

    /// 包围盒每侧的边距
    #[arg(long)]
    pub edge_space: Option<usize>,

    /// 跳过偏置场校正
    #[arg(long)]
    pub skip_bias_correction: bool,

    /// 包围盒上界截断到轴长度, 而不是轴长度减一
    #[arg(long)]
    pub fix_upper_clamp: bool,

    /// 从该目录读取已有的 landmark 记录
    #[arg(long)]
    pub landmarks_from: Option<PathBuf>,

    /// 单次外部校正的超时 (秒)
    #[arg(long)]
    pub unit_timeout: Option<u64>,

    /// 合并前对每个通道做 z-score 标准化
    #[arg(long)]
    pub standardize: bool,

    /// 打印最终生效的配置 (TOML) 后退出
    #[arg(long)]
    pub dump_config: bool,

    /// 输出调试日志
    #[arg(short, long)]
    pub verbose: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();
    let level = if args.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    if let Err(e) = simple_logger::SimpleLogger::new().with_level(level).init() {
        eprintln!("Cannot initialize logger: {e}");
    }

    match runner::run(&args) {
        Ok(Some(report)) => {
            result::analyze(&report);
            ExitCode::SUCCESS
        }
        Ok(None) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
