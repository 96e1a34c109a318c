use std::fmt;
use std::path::PathBuf;

use crate::segment::Segment;

/// 解码失败的片段
pub struct LoadFailure {
    pub path: PathBuf,
    pub error: anyhow::Error,
}

pub type LoadedSegment = Result<Segment, LoadFailure>;

/// 一次添加的统计结果
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AddSummary {
    pub written: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl fmt::Display for AddSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "写入 {}，跳过 {}，失败 {}", self.written, self.skipped, self.failed)
    }
}
