//! Wire types for the analysis service.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// `GET /health` response.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default)]
    pub service: String,
}

/// Body of `POST /api/v1/analyze-supabase`.
#[derive(Debug, Serialize)]
pub(crate) struct AnalyzeReq<'a> {
    pub bucket: &'a str,
    pub path: &'a str,
}

/// Error body returned by the service on non-2xx.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub detail: Option<String>,
}

/// Report payload. Kept as the raw JSON document and forwarded untouched;
/// the accessors below read the parts the client displays and tolerate
/// missing, null or oddly typed fields.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnalysisResult(Value);

/// One chart descriptor (a Plotly figure plus metadata, or a failure marker).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ChartSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chart_type: Option<String>,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub title: Value,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub data: Value,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub layout: Value,
    /// Set by the backend when the chart snippet failed to execute.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ChartSpec {
    /// Best-effort title: explicit `title`, then Plotly's `layout.title`.
    pub fn title_text(&self) -> Option<String> {
        text_of(&self.title).or_else(|| text_of(&self.layout["title"]))
    }
}

/// Narrative section of the report, read loosely from `storyteller_output`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Narrative {
    pub executive_summary: Option<String>,
    pub key_findings: Vec<String>,
    pub data_overview: Option<String>,
}

impl AnalysisResult {
    /// The document as received.
    pub fn raw(&self) -> &Value {
        &self.0
    }

    /// `report_id` as text (strings and numbers are accepted).
    pub fn report_id(&self) -> Option<String> {
        match &self.0["report_id"] {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// `report_id` for log and status lines.
    pub fn report_label(&self) -> String {
        self.report_id().unwrap_or_else(|| "-".into())
    }

    /// Chart descriptors from `chart_data`. A missing or null list is empty;
    /// entries that are not chart objects show up as failed charts.
    pub fn charts(&self) -> Vec<ChartSpec> {
        let Some(items) = self.0["chart_data"].as_array() else {
            return vec![];
        };
        items
            .iter()
            .map(|item| {
                serde_json::from_value(item.clone()).unwrap_or_else(|_| ChartSpec {
                    error: Some("unreadable chart entry".into()),
                    ..ChartSpec::default()
                })
            })
            .collect()
    }

    /// Pull the narrative fields out of `storyteller_output`.
    pub fn narrative(&self) -> Narrative {
        let s = &self.0["storyteller_output"];
        Narrative {
            executive_summary: s["executive_summary"].as_str().map(str::to_string),
            key_findings: s["key_findings"]
                .as_array()
                .map(|items| items.iter().filter_map(text_of).collect())
                .unwrap_or_default(),
            data_overview: s["data_overview"].as_str().map(str::to_string),
        }
    }
}

/// A plain string, or an object carrying a `text` field (Plotly titles).
fn text_of(v: &Value) -> Option<String> {
    match v {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Object(o) => o.get("text").and_then(Value::as_str).map(str::to_string),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_result_keeps_unknown_fields() {
        let raw = json!({
            "report_id": "r1",
            "storyteller_output": {"executive_summary": "Sales grew."},
            "chart_data": [{"chart_type": "bar", "data": [], "layout": {}, "title": "By region"}],
            "qa_output": {"overall_status": "Good"}
        });
        let r: AnalysisResult = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(r.report_id().as_deref(), Some("r1"));
        assert_eq!(r.raw()["qa_output"]["overall_status"], "Good");
        assert_eq!(r.charts()[0].chart_type.as_deref(), Some("bar"));
        // Forwarded unchanged.
        assert_eq!(serde_json::to_value(&r).unwrap(), raw);
    }

    #[test]
    fn test_result_tolerates_null_and_missing_fields() {
        let raw = json!({
            "report_id": null,
            "storyteller_output": null,
            "chart_data": null
        });
        let r: AnalysisResult = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(r.report_id(), None);
        assert_eq!(r.report_label(), "-");
        assert!(r.charts().is_empty());
        assert_eq!(r.narrative(), Narrative::default());
        assert_eq!(serde_json::to_value(&r).unwrap(), raw);

        // Absent fields are not filled in on the way out.
        let raw = json!({"report_id": "r1", "storyteller_output": {"a": 1}});
        let r: AnalysisResult = serde_json::from_value(raw.clone()).unwrap();
        assert!(r.charts().is_empty());
        assert_eq!(serde_json::to_value(&r).unwrap(), raw);
    }

    #[test]
    fn test_numeric_report_id_and_odd_chart_entries() {
        let r: AnalysisResult = serde_json::from_value(json!({
            "report_id": 42,
            "chart_data": ["not a chart", {"chart_type": "line", "title": 7}]
        }))
        .unwrap();
        assert_eq!(r.report_id().as_deref(), Some("42"));
        let charts = r.charts();
        assert_eq!(charts.len(), 2);
        assert_eq!(charts[0].error.as_deref(), Some("unreadable chart entry"));
        assert_eq!(charts[1].chart_type.as_deref(), Some("line"));
        assert_eq!(charts[1].title_text(), None);
    }

    #[test]
    fn test_narrative_is_read_loosely() {
        let r: AnalysisResult = serde_json::from_value(json!({
            "report_id": "r2",
            "storyteller_output": {
                "executive_summary": "Revenue is seasonal.",
                "key_findings": ["Q4 peaks", 42, "West leads"]
            }
        }))
        .unwrap();
        let n = r.narrative();
        assert_eq!(n.executive_summary.as_deref(), Some("Revenue is seasonal."));
        assert_eq!(n.key_findings, vec!["Q4 peaks", "West leads"]);
        assert_eq!(n.data_overview, None);
        assert!(r.charts().is_empty());
    }

    #[test]
    fn test_chart_title_falls_back_to_layout() {
        let c: ChartSpec = serde_json::from_value(json!({
            "data": [],
            "layout": {"title": {"text": "Monthly revenue"}}
        }))
        .unwrap();
        assert_eq!(c.title_text().as_deref(), Some("Monthly revenue"));
        assert_eq!(c.chart_type, None);
    }

    #[test]
    fn test_failed_chart_marker() {
        let c: ChartSpec = serde_json::from_value(json!({
            "error": "Snippet 2 did not create a 'fig' object.",
            "failed_code": "px.bar(df)"
        }))
        .unwrap();
        assert!(c.error.is_some());
        assert_eq!(c.extra["failed_code"], "px.bar(df)");
    }
}
