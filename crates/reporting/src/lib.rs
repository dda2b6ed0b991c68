use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

use popguard_core::ids::SessionId;
use popguard_core::types::{DecisionRequest, DecisionResponse, NavigationFailure, NavigationVerdict};

pub mod json;
pub mod redact;
pub mod timeline;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReportEvent {
    Decision {
        at: OffsetDateTime,
        request: DecisionRequest,
        response: DecisionResponse,
    },
    PopupBlocked {
        at: OffsetDateTime,
        url: String,
    },
    WindowIntercepted {
        at: OffsetDateTime,
        url: String,
        popup_blocking: bool,
    },
    NavigationFailed {
        at: OffsetDateTime,
        failure: NavigationFailure,
    },
    PopupBlockingToggled {
        at: OffsetDateTime,
        enabled: bool,
    },
    PopupRestored {
        at: OffsetDateTime,
        url: Option<String>,
    },
}

impl ReportEvent {
    pub fn at(&self) -> OffsetDateTime {
        match self {
            ReportEvent::Decision { at, .. }
            | ReportEvent::PopupBlocked { at, .. }
            | ReportEvent::WindowIntercepted { at, .. }
            | ReportEvent::NavigationFailed { at, .. }
            | ReportEvent::PopupBlockingToggled { at, .. }
            | ReportEvent::PopupRestored { at, .. } => *at,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportStats {
    pub decisions: u32,
    pub navigations_allowed: u32,
    pub navigations_cancelled: u32,
    pub dialogs_answered: u32,
    pub popups_blocked: u32,
    pub windows_intercepted: u32,
    pub navigation_failures: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionReport {
    pub session_id: SessionId,
    pub started_at: OffsetDateTime,
    pub ended_at: Option<OffsetDateTime>,
    pub events: Vec<ReportEvent>,
    pub stats: ReportStats,
}

impl SessionReport {
    pub fn new(
        session_id: SessionId,
        started_at: OffsetDateTime,
        ended_at: Option<OffsetDateTime>,
        mut events: Vec<ReportEvent>,
    ) -> Self {
        events.sort_by_key(|event| event.at());
        let stats = ReportStats::from_events(&events);
        Self {
            session_id,
            started_at,
            ended_at,
            events,
            stats,
        }
    }

    pub fn duration(&self) -> Option<Duration> {
        let end = self.ended_at?;
        Some(end - self.started_at)
    }

    pub fn human_summary(&self) -> String {
        let duration = self.duration().map(format_duration).unwrap_or_else(|| "unknown".to_string());
        let stats = &self.stats;
        let popup_line = if stats.popups_blocked == 0 && stats.windows_intercepted == 0 {
            "No popups were blocked.".to_string()
        } else {
            format!(
                "{} popups blocked, {} window requests intercepted.",
                stats.popups_blocked, stats.windows_intercepted
            )
        };

        let mut summary = format!(
            "Session {id} lasted {duration}.\n{decisions} decisions: {allowed} navigations allowed, {cancelled} cancelled, {dialogs} dialogs answered.\n{popup_line}",
            id = self.session_id,
            decisions = stats.decisions,
            allowed = stats.navigations_allowed,
            cancelled = stats.navigations_cancelled,
            dialogs = stats.dialogs_answered,
        );
        if stats.navigation_failures > 0 {
            summary.push_str(&format!("\n{} navigations failed to start.", stats.navigation_failures));
        }
        summary
    }
}

impl ReportStats {
    pub fn from_events(events: &[ReportEvent]) -> Self {
        let mut stats = ReportStats::default();

        for event in events {
            match event {
                ReportEvent::Decision { response, .. } => {
                    stats.decisions = stats.decisions.saturating_add(1);
                    match response {
                        DecisionResponse::NavigationVerdict(NavigationVerdict::Allow) => {
                            stats.navigations_allowed = stats.navigations_allowed.saturating_add(1)
                        }
                        DecisionResponse::NavigationVerdict(NavigationVerdict::Cancel) => {
                            stats.navigations_cancelled = stats.navigations_cancelled.saturating_add(1)
                        }
                        DecisionResponse::AlertAck
                        | DecisionResponse::ConfirmVerdict(_)
                        | DecisionResponse::PromptValue(_) => {
                            stats.dialogs_answered = stats.dialogs_answered.saturating_add(1)
                        }
                        DecisionResponse::NoNewContext => {}
                    }
                }
                ReportEvent::PopupBlocked { .. } => {
                    stats.popups_blocked = stats.popups_blocked.saturating_add(1)
                }
                ReportEvent::WindowIntercepted { .. } => {
                    stats.windows_intercepted = stats.windows_intercepted.saturating_add(1)
                }
                ReportEvent::NavigationFailed { .. } => {
                    stats.navigation_failures = stats.navigation_failures.saturating_add(1)
                }
                ReportEvent::PopupBlockingToggled { .. } | ReportEvent::PopupRestored { .. } => {}
            }
        }

        stats
    }
}

/// Collects events from several tasks for one session.
#[derive(Debug, Clone)]
pub struct SessionRecorder {
    session_id: SessionId,
    started_at: OffsetDateTime,
    events: Arc<Mutex<Vec<ReportEvent>>>,
}

impl SessionRecorder {
    pub fn start(session_id: SessionId) -> Self {
        Self {
            session_id,
            started_at: OffsetDateTime::now_utc(),
            events: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    pub fn record(&self, event: ReportEvent) {
        let mut events = self.events.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        events.push(event);
    }

    pub fn finish(&self) -> SessionReport {
        let events = self
            .events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        SessionReport::new(
            self.session_id,
            self.started_at,
            Some(OffsetDateTime::now_utc()),
            events,
        )
    }
}

pub(crate) fn describe_response(response: &DecisionResponse) -> String {
    match response {
        DecisionResponse::NavigationVerdict(verdict) => verdict.to_string(),
        DecisionResponse::AlertAck => "acknowledged".to_string(),
        DecisionResponse::ConfirmVerdict(true) => "confirmed".to_string(),
        DecisionResponse::ConfirmVerdict(false) => "declined".to_string(),
        DecisionResponse::PromptValue(Some(value)) => format!("answered {value:?}"),
        DecisionResponse::PromptValue(None) => "cancelled".to_string(),
        DecisionResponse::NoNewContext => "no new context".to_string(),
    }
}

fn format_duration(duration: Duration) -> String {
    let total_seconds = duration.as_seconds_f64().max(0.0) as i64;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    if hours > 0 {
        format!("{hours}h {minutes}m")
    } else if minutes > 0 {
        format!("{minutes}m {seconds}s")
    } else {
        format!("{seconds}s")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use popguard_core::types::NavigationRequest;

    fn navigation(url: &str, verdict: NavigationVerdict) -> ReportEvent {
        ReportEvent::Decision {
            at: OffsetDateTime::now_utc(),
            request: DecisionRequest::NavigationPolicy(NavigationRequest::new(url, false)),
            response: DecisionResponse::NavigationVerdict(verdict),
        }
    }

    #[test]
    fn test_stats_from_events() {
        let now = OffsetDateTime::now_utc();
        let events = vec![
            navigation("https://a.example", NavigationVerdict::Allow),
            navigation("https://c.example", NavigationVerdict::Cancel),
            ReportEvent::Decision {
                at: now,
                request: DecisionRequest::ConfirmAck {
                    message: "Leave?".to_string(),
                },
                response: DecisionResponse::ConfirmVerdict(false),
            },
            ReportEvent::PopupBlocked {
                at: now,
                url: "https://b.example".to_string(),
            },
            ReportEvent::WindowIntercepted {
                at: now,
                url: "https://w.example".to_string(),
                popup_blocking: true,
            },
            ReportEvent::PopupBlockingToggled { at: now, enabled: false },
        ];

        let stats = ReportStats::from_events(&events);
        assert_eq!(
            stats,
            ReportStats {
                decisions: 3,
                navigations_allowed: 1,
                navigations_cancelled: 1,
                dialogs_answered: 1,
                popups_blocked: 1,
                windows_intercepted: 1,
                navigation_failures: 0,
            }
        );
    }

    #[test]
    fn test_human_summary_mentions_popups() {
        let recorder = SessionRecorder::start(SessionId::new());
        recorder.record(ReportEvent::PopupBlocked {
            at: OffsetDateTime::now_utc(),
            url: "https://b.example".to_string(),
        });
        let report = recorder.finish();

        let summary = report.human_summary();
        assert!(summary.contains("1 popups blocked"));
        assert!(!summary.contains("failed"));
    }

    #[test]
    fn test_quiet_session_summary() {
        let recorder = SessionRecorder::start(SessionId::new());
        recorder.record(navigation("https://a.example", NavigationVerdict::Allow));
        let report = recorder.finish();
        assert!(report.human_summary().contains("No popups were blocked."));
        assert!(report.duration().is_some());
    }

    #[test]
    fn test_timeline_redacts_queries() {
        let lines = timeline::timeline(&[navigation(
            "https://a.example/login?token=secret",
            NavigationVerdict::Allow,
        )]);
        assert_eq!(lines.len(), 1);
        assert!(lines[0].ends_with("navigation https://a.example/login -> allow"));
        assert!(!lines[0].contains("secret"));
    }

    #[test]
    fn test_report_json_round_trip() {
        let recorder = SessionRecorder::start(SessionId::new());
        recorder.record(navigation("https://a.example", NavigationVerdict::Cancel));
        let report = recorder.finish();

        let rendered = json::render_json(&report).unwrap();
        let parsed = json::parse_report(&rendered).unwrap();
        assert_eq!(parsed.session_id, report.session_id);
        assert_eq!(parsed.stats, report.stats);
    }
}
