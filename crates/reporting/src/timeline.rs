use time::format_description::well_known::Rfc3339;

use crate::redact::redact_url;
use crate::ReportEvent;

pub fn timeline(events: &[ReportEvent]) -> Vec<String> {
    events
        .iter()
        .map(|event| {
            let at = event
                .at()
                .format(&Rfc3339)
                .unwrap_or_else(|_| format!("{:?}", event.at()));
            format!("{at}: {}", describe(event))
        })
        .collect()
}

fn describe(event: &ReportEvent) -> String {
    match event {
        ReportEvent::Decision {
            request, response, ..
        } => format!(
            "{} {} -> {}",
            request.kind(),
            redact_url(request.subject()),
            crate::describe_response(response)
        ),
        ReportEvent::PopupBlocked { url, .. } => format!("popup blocked {}", redact_url(url)),
        ReportEvent::WindowIntercepted {
            url,
            popup_blocking,
            ..
        } => format!(
            "window request {} (blocking {})",
            redact_url(url),
            if *popup_blocking { "on" } else { "off" }
        ),
        ReportEvent::NavigationFailed { failure, .. } => format!("navigation failed: {failure}"),
        ReportEvent::PopupBlockingToggled { enabled, .. } => {
            format!("popup blocking {}", if *enabled { "enabled" } else { "disabled" })
        }
        ReportEvent::PopupRestored { url, .. } => match url {
            Some(url) => format!("restored popup {}", redact_url(url)),
            None => "nothing to restore".to_string(),
        },
    }
}
