use std::sync::LazyLock;

use prometheus::*;

use crate::error::{AnalyzeError, Result};
use crate::relay::AnalysisItem;

static METRIC_ANALYZE_COUNT: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "im_analyze_count",
        "count of the analysis requests by outcome",
        &["outcome"]
    )
    .unwrap()
});

static METRIC_ANALYZE_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    register_histogram_vec!(
        "im_analyze_duration",
        "duration of the per-image analysis in seconds",
        &["outcome"],
        vec![0.25, 0.5, 1., 2., 4., 8., 16., 32., 64.]
    )
    .unwrap()
});

static METRIC_ANALYZE_LABELS: LazyLock<Histogram> = LazyLock::new(|| {
    register_histogram!(
        "im_analyze_labels",
        "number of labels returned per successful analysis",
        (0..=30).step_by(2).map(|x| x as f64).collect()
    )
    .unwrap()
});

/// 记录一次分析的结果和耗时
pub fn observe_analysis(result: &Result<Vec<AnalysisItem>>, duration: f64) {
    let outcome = outcome(result);

    METRIC_ANALYZE_COUNT.with_label_values(&[outcome]).inc();
    METRIC_ANALYZE_DURATION.with_label_values(&[outcome]).observe(duration);
    if let Ok(items) = result {
        METRIC_ANALYZE_LABELS.observe(items.len() as f64);
    }
}

fn outcome(result: &Result<Vec<AnalysisItem>>) -> &'static str {
    match result {
        Ok(_) => "ok",
        Err(AnalyzeError::MissingInput) => "missing_input",
        Err(AnalyzeError::UnsupportedImage(_)) => "unsupported_image",
        Err(AnalyzeError::Upstream(_)) => "upstream_call",
        Err(AnalyzeError::InvalidResponse { .. }) => "upstream_format",
    }
}
