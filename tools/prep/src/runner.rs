//! 程序运行函数.

use std::time::Duration;

use mri_berry::prelude::*;
use utils::loader;

use crate::Args;

/// 由命令行参数与配置文件得到最终配置. 命令行参数优先.
pub fn config_from(args: &Args) -> PrepResult<PrepConfig> {
    let mut cfg = match &args.config {
        Some(p) => PrepConfig::from_toml_file(p)?,
        None => PrepConfig::default(),
    };
    if let Some(w) = args.workers {
        cfg = cfg.with_workers(w);
    }
    if let Some(e) = args.edge_space {
        cfg = cfg.with_edge_space(e);
    }
    if args.skip_bias_correction {
        cfg = cfg.with_skip_bias_correction(true);
    }
    if args.fix_upper_clamp {
        cfg = cfg.with_upper_clamp(UpperClamp::Extent);
    }
    if args.landmarks_from.is_some() {
        cfg = cfg.with_landmark_dir(args.landmarks_from.clone());
    }
    if let Some(t) = args.unit_timeout {
        cfg = cfg.with_unit_timeout(Some(Duration::from_secs(t)));
    }
    if args.standardize {
        cfg = cfg.with_standardize(true);
    }
    if cfg.workers == 0 {
        cfg = cfg.with_workers(utils::cpus());
    }
    cfg.validate()?;
    Ok(cfg)
}

/// 实际运行. 只打印配置时返回 `None`.
pub fn run(args: &Args) -> PrepResult<Option<RunReport>> {
    let cfg = config_from(args)?;
    if args.dump_config {
        print!("{}", cfg.to_toml_string()?);
        return Ok(None);
    }

    let layout = loader::layout_from(args.input.clone(), args.output.clone(), args.temp.clone())
        .ok_or_else(|| PrepError::InvalidConfig("cannot resolve data directories".to_string()))?;
    log::info!(
        "Input: {}, output: {}, temp: {}",
        layout.input_dir().display(),
        layout.output_dir().display(),
        layout.temp_dir().display()
    );

    let mut pipeline = Pipeline::new(cfg, layout)?;
    pipeline.run().map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_flags_override_defaults() {
        let args = Args::parse_from([
            "mri-prep",
            "--workers",
            "3",
            "--edge-space",
            "2",
            "--fix-upper-clamp",
            "--skip-bias-correction",
            "--unit-timeout",
            "60",
            "--landmarks-from",
            "/tmp/lm",
        ]);
        let cfg = config_from(&args).unwrap();
        assert_eq!(cfg.workers, 3);
        assert_eq!(cfg.edge_space, 2);
        assert_eq!(cfg.upper_clamp, UpperClamp::Extent);
        assert!(cfg.skip_bias_correction);
        assert_eq!(cfg.unit_timeout(), Some(Duration::from_secs(60)));
        assert!(cfg.landmark_dir.is_some());
        assert!(!cfg.standardize);
    }

    #[test]
    fn test_defaults() {
        let cfg = config_from(&Args::parse_from(["mri-prep"])).unwrap();
        assert_eq!(cfg.upper_clamp, UpperClamp::LastIndex);
        assert!(cfg.workers >= 1);
        assert!(!cfg.skip_bias_correction);
    }
}
