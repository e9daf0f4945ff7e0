//! 解析結果を表示用テキストへ整形する。

use crate::analysis::{AnalysisResult, ChartSpec};

/// レポート画面に表示する行を組み立てる。
pub fn render_lines(result: &AnalysisResult) -> Vec<String> {
    let narrative = result.narrative();
    let mut lines = vec![
        "=== Analysis Report ===".to_string(),
        format!("Report ID: {}", result.report_label()),
        String::new(),
    ];

    // 要約。
    lines.push("Executive summary".into());
    lines.push(
        narrative
            .executive_summary
            .unwrap_or_else(|| "(not provided)".into()),
    );
    lines.push(String::new());

    // 主な発見事項を箇条書きにする。
    lines.push("Key findings".into());
    if narrative.key_findings.is_empty() {
        lines.push("(none)".into());
    } else {
        lines.extend(narrative.key_findings.iter().map(|f| format!("  • {f}")));
    }
    lines.push(String::new());

    // データ概要。
    if let Some(overview) = narrative.data_overview {
        lines.push("Data overview".into());
        lines.push(overview);
        lines.push(String::new());
    }

    // チャートは一覧のみ（描画は対象外）。
    let charts = result.charts();
    lines.push(format!("Charts ({})", charts.len()));
    lines.extend(
        charts
            .iter()
            .enumerate()
            .map(|(i, c)| chart_line(i + 1, c)),
    );
    lines
}

/// チャート1件分の行。
fn chart_line(n: usize, chart: &ChartSpec) -> String {
    if let Some(err) = &chart.error {
        return format!("  {n}. chart failed: {err}");
    }
    format!(
        "  {n}. {} [{}]",
        chart.title_text().unwrap_or_else(|| "Untitled".into()),
        chart.chart_type.as_deref().unwrap_or("unknown")
    )
}
