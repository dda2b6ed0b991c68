use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::ids::RequestId;
use crate::types::{DecisionKind, NavigationFailure, NavigationVerdict, PendingPopup};

/// Outbound stream from the coordinator to the decision authority.
///
/// A popup the policy suppresses goes out as `PopupBlocked` and is never put to
/// the authority, so `NavigationDecision` always concerns an ordinary navigation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum Command {
    NavigationDecision {
        request_id: RequestId,
        url: String,
    },
    PopupBlocked {
        url: String,
        blocked_at: OffsetDateTime,
    },
    Alert {
        request_id: RequestId,
        message: String,
    },
    Confirm {
        request_id: RequestId,
        message: String,
    },
    Prompt {
        request_id: RequestId,
        text: String,
        default_text: Option<String>,
    },
    WindowOpenRequested {
        url: String,
        popup_blocking: bool,
    },
    NavigationFailed {
        error: NavigationFailure,
    },
}

impl Command {
    /// Commands that expect a published answer carry the token to answer with.
    pub fn request_id(&self) -> Option<RequestId> {
        match self {
            Command::NavigationDecision { request_id, .. }
            | Command::Alert { request_id, .. }
            | Command::Confirm { request_id, .. }
            | Command::Prompt { request_id, .. } => Some(*request_id),
            _ => None,
        }
    }

    pub fn kind(&self) -> Option<DecisionKind> {
        match self {
            Command::NavigationDecision { .. } | Command::PopupBlocked { .. } => {
                Some(DecisionKind::NavigationPolicy)
            }
            Command::Alert { .. } => Some(DecisionKind::AlertAck),
            Command::Confirm { .. } => Some(DecisionKind::ConfirmAck),
            Command::Prompt { .. } => Some(DecisionKind::PromptAck),
            Command::WindowOpenRequested { .. } => Some(DecisionKind::CreateWindow),
            Command::NavigationFailed { .. } => None,
        }
    }
}

/// Inbound stream from the authority / toolbar back into the coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum Intent {
    TogglePopupBlocking,
    RestoreLastBlockedPopup,
    PublishNavigationVerdict {
        request_id: RequestId,
        verdict: NavigationVerdict,
    },
    PublishAlertAck {
        request_id: RequestId,
    },
    PublishConfirmVerdict {
        request_id: RequestId,
        confirmed: bool,
    },
    PublishPromptValue {
        request_id: RequestId,
        value: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum IntentOutcome {
    PopupBlocking { enabled: bool },
    Restored(Option<PendingPopup>),
    Published,
}

pub fn decode_line<T: DeserializeOwned>(line: &str) -> Result<T> {
    serde_json::from_str(line.trim()).with_context(|| format!("parse message: {}", line.trim()))
}
