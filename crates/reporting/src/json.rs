use crate::SessionReport;

/// Pretty JSON, the format reports are stored in.
pub fn render_json(report: &SessionReport) -> serde_json::Result<String> {
    serde_json::to_string_pretty(report)
}

pub fn parse_report(contents: &str) -> serde_json::Result<SessionReport> {
    serde_json::from_str(contents)
}
