use std::sync::LazyLock;

use prometheus::*;

use crate::extractor::Processed;
use crate::score::ScoreElement;

static METRIC_EXTRACT_SEGMENT_COUNT: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "shot_extract_segment_count",
        "count of the processed segments",
        &["result"]
    )
    .unwrap()
});

static METRIC_SEARCH_COUNT: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!("shot_search_count", "count of the queries", &["query"]).unwrap()
});

static METRIC_SEARCH_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    register_histogram_vec!(
        "shot_search_duration",
        "duration of the per-query search in seconds",
        &["query"]
    )
    .unwrap()
});

static METRIC_SEARCH_MAX_SCORE: LazyLock<HistogramVec> = LazyLock::new(|| {
    register_histogram_vec!(
        "shot_search_max_score",
        "max score of the per-query search",
        &["query"],
        (1..=20).map(|x| x as f64 * 0.05).collect()
    )
    .unwrap()
});

/// 增加片段处理计数
pub fn inc_extracted(result: Processed) {
    let label = match result {
        Processed::Skipped => "skipped",
        Processed::Written => "written",
    };
    METRIC_EXTRACT_SEGMENT_COUNT.with_label_values(&[label]).inc();
}

/// 增加写入失败计数
pub fn inc_extract_failed() {
    METRIC_EXTRACT_SEGMENT_COUNT.with_label_values(&["failed"]).inc();
}

/// 记录一次查询的耗时和最高分，`query` 为查询方式（segment 或 id）
pub fn observe_search(query: &str, duration: f64, result: &[ScoreElement]) {
    METRIC_SEARCH_COUNT.with_label_values(&[query]).inc();
    METRIC_SEARCH_DURATION.with_label_values(&[query]).observe(duration);
    if let Some(top) = result.first() {
        METRIC_SEARCH_MAX_SCORE.with_label_values(&[query]).observe(top.score);
    }
}

/// 以文本格式导出所有指标
pub fn gather_text() -> String {
    let encoder = TextEncoder::new();
    encoder.encode_to_string(&prometheus::gather()).unwrap_or_default()
}
