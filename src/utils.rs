use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Result;
use indicatif::ProgressStyle;
use regex::Regex;
use walkdir::WalkDir;

use crate::config::{IdSource, OutputFormat};
use crate::score::ScoreElement;
use crate::segment::{Frame, Segment};

pub fn pb_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template(
            "{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] \
             {pos}/{len} ({eta}) {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-")
}

/// 扫描得到的片段：路径和按文件名排序的帧文件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentSource {
    pub path: PathBuf,
    pub frames: Vec<PathBuf>,
}

/// 根据后缀名构建匹配正则，多个后缀用逗号分隔
pub fn suffix_regex(suffix: &str) -> Result<Regex> {
    Ok(Regex::new(&format!("^(?i)({})$", suffix.replace(',', "|")))?)
}

fn has_suffix(path: &Path, re_suf: &Regex) -> bool {
    path.extension().is_some_and(|ext| re_suf.is_match(&ext.to_string_lossy()))
}

/// 扫描片段
///
/// - `path` 是文件时作为单帧片段
/// - `shot` 为真时，`path` 下的所有帧构成一个片段
/// - 否则 `path` 下直接存放的每个文件是一个单帧片段，每个子目录中直接存放的文件构成一个片段
pub fn scan_segments(path: &Path, re_suf: &Regex, shot: bool) -> Vec<SegmentSource> {
    if path.is_file() {
        return vec![SegmentSource { path: path.to_path_buf(), frames: vec![path.to_path_buf()] }];
    }

    let files = WalkDir::new(path)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file() && has_suffix(entry.path(), re_suf))
        .map(|entry| entry.into_path());

    if shot {
        let frames = files.collect::<Vec<_>>();
        if frames.is_empty() {
            return vec![];
        }
        return vec![SegmentSource { path: path.to_path_buf(), frames }];
    }

    let mut singles = vec![];
    let mut groups: BTreeMap<PathBuf, Vec<PathBuf>> = BTreeMap::new();
    for file in files {
        match file.parent() {
            Some(parent) if parent != path => {
                groups.entry(parent.to_path_buf()).or_default().push(file);
            }
            _ => singles.push(SegmentSource { path: file.clone(), frames: vec![file] }),
        }
    }
    singles.extend(groups.into_iter().map(|(path, frames)| SegmentSource { path, frames }));
    singles
}

/// 读取并解码片段的所有帧，同时生成片段 ID
pub fn load_segment(
    source: &SegmentSource,
    id_source: IdSource,
    replace: Option<&(Regex, String)>,
) -> Result<Segment> {
    let mut hasher = blake3::Hasher::new();
    let mut frames = Vec::with_capacity(source.frames.len());
    for path in &source.frames {
        let bytes = std::fs::read(path)?;
        hasher.update(&bytes);
        frames.push(Frame::decode(&bytes)?);
    }
    let id = match id_source {
        IdSource::Path => {
            let path = source.path.to_string_lossy();
            match replace {
                Some((re, rep)) => re.replace(&path, rep.as_str()).into_owned(),
                None => path.into_owned(),
            }
        }
        IdSource::Blake3 => hasher.finalize().to_hex().to_string(),
    };
    Ok(Segment::new(id, frames))
}

pub fn print_result(result: &[ScoreElement], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(result)?)
        }
        OutputFormat::Table => {
            for e in result {
                println!("{:.4}\t{}", e.score, e.id);
            }
        }
    }
    Ok(())
}
