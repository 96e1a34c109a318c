use std::path::PathBuf;

use indicatif::ProgressBar;
use log::{info, warn};
use rayon::prelude::*;
use regex::Regex;
use tokio::sync::mpsc::{Receiver, channel};
use tokio::task::{JoinHandle, spawn_blocking};

use super::types::*;
use crate::config::IdSource;
use crate::db::SqliteWriter;
use crate::extractor::{FeatureExtractor, Processed};
use crate::feature::FeatureTransform;
use crate::metrics;
use crate::utils::{SegmentSource, load_segment, scan_segments};

pub fn task_scan(
    path: PathBuf,
    pb: ProgressBar,
    regex_suf: Regex,
    shot: bool,
) -> (JoinHandle<()>, Receiver<SegmentSource>) {
    let (tx, rx) = channel(num_cpus::get());
    let t = spawn_blocking(move || {
        info!("开始扫描目录: {}", path.display());
        let sources = scan_segments(&path, &regex_suf, shot);
        info!("扫描完成，共 {} 个片段", sources.len());
        pb.set_length(sources.len() as u64);
        for source in sources {
            if tx.blocking_send(source).is_err() {
                break;
            }
        }
    });
    (t, rx)
}

pub fn task_load(
    mut lrx: Receiver<SegmentSource>,
    pb: ProgressBar,
    id_source: IdSource,
    replace: Option<(Regex, String)>,
) -> (JoinHandle<()>, Receiver<LoadedSegment>) {
    let (tx, rx) = channel(num_cpus::get());
    let t = spawn_blocking(move || {
        let mut buffer = vec![];
        let replace = replace.as_ref();
        // NOTE: 一次读取 cpu * 4 个片段，解码完成后再读取下一批，避免同时解码过多帧
        while lrx.blocking_recv_many(&mut buffer, num_cpus::get() * 4) != 0 {
            buffer.par_drain(..).for_each(|source| {
                let loaded = load_segment(&source, id_source, replace)
                    .map_err(|error| LoadFailure { path: source.path.clone(), error });
                if let Err(e) = &loaded {
                    pb.println(format!("解码失败: {}: {}", e.path.display(), e.error));
                }
                let _ = tx.blocking_send(loaded);
            });
        }
    });
    (t, rx)
}

pub fn task_add<T>(
    mut lrx: Receiver<LoadedSegment>,
    pb: ProgressBar,
    mut extractor: FeatureExtractor<T, SqliteWriter>,
) -> JoinHandle<AddSummary>
where
    T: FeatureTransform + 'static,
{
    tokio::spawn(async move {
        let mut summary = AddSummary::default();
        while let Some(loaded) = lrx.recv().await {
            match loaded {
                Ok(segment) => match extractor.process_segment(&segment).await {
                    Ok(Processed::Written) => {
                        summary.written += 1;
                        pb.set_message(segment.id().to_owned());
                    }
                    Ok(Processed::Skipped) => {
                        summary.skipped += 1;
                        pb.set_message(format!("跳过已添加片段: {}", segment.id()));
                    }
                    Err(e) => {
                        summary.failed += 1;
                        metrics::inc_extract_failed();
                        warn!("{e}");
                    }
                },
                Err(_) => {
                    summary.failed += 1;
                    metrics::inc_extract_failed();
                }
            }
            pb.inc(1);
        }
        extractor.finish();
        summary
    })
}
