//! 运行结果.

use std::io::{self, Write};

use itertools::Itertools;
use mri_berry::prelude::*;

/// 将 `report` 的结果写进 `w` 中.
fn describe_into<W: Write>(report: &RunReport, w: &mut W) -> io::Result<()> {
    const S4: &str = "    ";

    writeln!(w, "Subjects: {}", report.subjects)?;
    for (stage, d) in report.durations.iter() {
        writeln!(w, "{S4}{stage}: {:.3} s", d.as_secs_f64())?;
    }
    writeln!(w, "{S4}total: {:.3} s", report.total().as_secs_f64())?;

    writeln!(w, "Landmarks:")?;
    for (ch, lm) in report.landmarks.iter() {
        writeln!(
            w,
            "{S4}{ch}: [{}]",
            lm.iter().map(|v| format!("{v:.3}")).join(", ")
        )?;
    }

    writeln!(w, "Cropped shapes:")?;
    for (s, shape) in report.shapes.iter() {
        writeln!(w, "{S4}{s}: {shape:?}")?;
    }
    writeln!(w, "Removed {} scratch folders", report.scratch_removed)?;
    Ok(())
}

/// 同 [`describe_into`], 上下各加一条分隔线.
fn describe_framed<W: Write>(report: &RunReport, w: &mut W) -> io::Result<()> {
    utils::sep_to(&mut *w)?;
    describe_into(report, w)?;
    utils::sep_to(w)
}

/// 打印运行结果.
pub fn analyze(report: &RunReport) {
    let mut buf = Vec::with_capacity(512);
    match describe_framed(report, &mut buf) {
        Ok(()) => print!("{}", String::from_utf8_lossy(&buf)),
        Err(e) => log::warn!("Cannot describe run report: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_describe() {
        let mut report = RunReport {
            subjects: 1,
            durations: vec![(Stage::Merge, Duration::from_millis(1500))],
            ..Default::default()
        };
        report
            .landmarks
            .insert(ChannelType::T1, vec![1.0, 2.5].into());
        report.shapes.insert(SubjectId::from("9"), [1, 2, 3, 4]);

        let mut buf = Vec::new();
        describe_into(&report, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("merge: 1.500 s"));
        assert!(text.contains("t1: [1.000, 2.500]"));
        assert!(text.contains("9: [1, 2, 3, 4]"));
    }

    #[test]
    fn test_framed_by_separators() {
        let mut buf = Vec::new();
        describe_framed(&RunReport::default(), &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert!(lines[0].starts_with("----"));
        assert_eq!(lines.first(), lines.last());
        assert_eq!(lines[lines.len() - 2], "Removed 0 scratch folders");
    }
}
