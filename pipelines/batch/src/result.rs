//! 批处理结果.

use std::io::{self, Write};
use std::time::Duration;

use wm_bullseye::compose::MismatchCount;
use wm_bullseye::{Stage, SubjectError};

/// 单个被试成功处理后的统计.
#[derive(Clone, Debug)]
pub struct SubjectSummary {
    /// 分区不一致统计.
    pub counts: MismatchCount,
    /// 得到 bullseye 标签的体素个数.
    pub labels: usize,
    /// 总耗时 (加载, 计算与保存).
    pub elapsed: Duration,
}

/// 将单个被试的结果写进 `w` 中.
fn describe_into<W: Write>(
    name: &str,
    r: &Result<SubjectSummary, SubjectError>,
    w: &mut W,
) -> io::Result<()> {
    const S4: &str = "    ";

    writeln!(w, "Subject `{name}`:")?;
    match r {
        Ok(s) => {
            writeln!(w, "{S4}Labelled voxels: {}", s.labels)?;
            writeln!(w, "{S4}White-matter voxels: {}", s.counts.domain)?;
            writeln!(
                w,
                "{S4}Mismatched voxels: {} ({:.6})",
                s.counts.mismatched,
                s.counts.fraction()
            )?;
            write!(w, "{S4}Elapsed: {} ms", s.elapsed.as_millis())
        }
        Err(e) => write!(w, "{S4}Failed at stage `{}`: {}", e.stage, e.source),
    }
}

/// 批处理最终结果, 按被试编号排序.
pub struct BatchResult {
    data: Vec<(String, Result<SubjectSummary, SubjectError>)>,
}

impl BatchResult {
    pub fn from_iter<I: IntoIterator<Item = (String, Result<SubjectSummary, SubjectError>)>>(
        it: I,
    ) -> Self {
        let mut data: Vec<_> = it.into_iter().collect();
        data.sort_by(|a, b| a.0.cmp(&b.0));
        Self { data }
    }

    /// 被试个数.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// 失败的被试个数.
    pub fn failed(&self) -> usize {
        self.data.iter().filter(|(_, r)| r.is_err()).count()
    }

    /// 按顺序给出被试编号.
    pub fn subjects(&self) -> impl Iterator<Item = &str> {
        self.data.iter().map(|(s, _)| s.as_str())
    }

    /// 失败被试的出错阶段.
    pub fn failed_stages(&self) -> impl Iterator<Item = Stage> + '_ {
        self.data
            .iter()
            .filter_map(|(_, r)| r.as_ref().err().map(|e| e.stage))
    }

    /// 分析运行结果, 写入 `w`.
    pub fn analyze<W: Write>(&self, mut w: W) -> io::Result<()> {
        utils::sep_to(&mut w)?;
        for (key, r) in self.data.iter() {
            describe_into(key, r, &mut w)?;
            writeln!(w)?;
            utils::sep_to(&mut w)?;
        }

        let total: Duration = self
            .data
            .iter()
            .filter_map(|(_, r)| r.as_ref().ok().map(|s| s.elapsed))
            .sum();
        writeln!(
            w,
            "{} subjects, {} succeeded, {} failed, {} ms in total",
            self.len(),
            self.len() - self.failed(),
            self.failed(),
            total.as_millis()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wm_bullseye::BullseyeError;

    fn sample() -> BatchResult {
        let ok = SubjectSummary {
            counts: MismatchCount {
                mismatched: 3,
                domain: 1000,
            },
            labels: 997,
            elapsed: Duration::from_millis(120),
        };
        let err = SubjectError {
            subject: "sub-01".to_owned(),
            stage: Stage::Depth,
            source: BullseyeError::Config("boom".to_owned()),
        };
        BatchResult::from_iter([
            ("sub-02".to_owned(), Ok(ok)),
            ("sub-01".to_owned(), Err(err)),
        ])
    }

    #[test]
    fn test_analyze() {
        let r = sample();
        assert_eq!(r.len(), 2);
        assert_eq!(r.failed(), 1);
        assert_eq!(r.subjects().collect::<Vec<_>>(), ["sub-01", "sub-02"]);
        assert_eq!(r.failed_stages().collect::<Vec<_>>(), [Stage::Depth]);

        let mut buf = Vec::new();
        r.analyze(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("Subject `sub-01`:\n    Failed at stage `depth`"));
        assert!(text.contains("Mismatched voxels: 3 (0.003000)"));
        assert!(text.contains("2 subjects, 1 succeeded, 1 failed, 120 ms in total"));
        assert!(text.find("sub-01") < text.find("sub-02"));
    }
}
