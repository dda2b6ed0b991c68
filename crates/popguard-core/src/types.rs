use std::fmt;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionKind {
    NavigationPolicy,
    AlertAck,
    ConfirmAck,
    PromptAck,
    CreateWindow,
}

impl fmt::Display for DecisionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            DecisionKind::NavigationPolicy => "navigation",
            DecisionKind::AlertAck => "alert",
            DecisionKind::ConfirmAck => "confirm",
            DecisionKind::PromptAck => "prompt",
            DecisionKind::CreateWindow => "create-window",
        };
        write!(f, "{value}")
    }
}

/// A navigation intent raised by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigationRequest {
    pub url: String,
    /// Set when the target has no parent frame, i.e. a new top-level context.
    pub target_is_new_context: bool,
}

impl NavigationRequest {
    pub fn new(url: impl Into<String>, target_is_new_context: bool) -> Self {
        Self {
            url: url.into(),
            target_is_new_context,
        }
    }

    pub fn is_popup(&self) -> bool {
        self.target_is_new_context
    }
}

/// A request for a decision, built once by the adapter and consumed once by the coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DecisionRequest {
    NavigationPolicy(NavigationRequest),
    AlertAck {
        message: String,
    },
    ConfirmAck {
        message: String,
    },
    PromptAck {
        text: String,
        default_text: Option<String>,
    },
    CreateWindow {
        url: String,
    },
}

impl DecisionRequest {
    pub fn kind(&self) -> DecisionKind {
        match self {
            DecisionRequest::NavigationPolicy(_) => DecisionKind::NavigationPolicy,
            DecisionRequest::AlertAck { .. } => DecisionKind::AlertAck,
            DecisionRequest::ConfirmAck { .. } => DecisionKind::ConfirmAck,
            DecisionRequest::PromptAck { .. } => DecisionKind::PromptAck,
            DecisionRequest::CreateWindow { .. } => DecisionKind::CreateWindow,
        }
    }

    /// Only meaningful for navigation and window creation; dialogs are never popups.
    pub fn is_popup(&self) -> bool {
        match self {
            DecisionRequest::NavigationPolicy(request) => request.is_popup(),
            DecisionRequest::CreateWindow { .. } => true,
            _ => false,
        }
    }

    /// The URL or message text the request is about.
    pub fn subject(&self) -> &str {
        match self {
            DecisionRequest::NavigationPolicy(request) => &request.url,
            DecisionRequest::AlertAck { message } => message,
            DecisionRequest::ConfirmAck { message } => message,
            DecisionRequest::PromptAck { text, .. } => text,
            DecisionRequest::CreateWindow { url } => url,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NavigationVerdict {
    Allow,
    #[default]
    Cancel,
}

impl fmt::Display for NavigationVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NavigationVerdict::Allow => write!(f, "allow"),
            NavigationVerdict::Cancel => write!(f, "cancel"),
        }
    }
}

/// Sentinel handed back for window-creation requests. The coordinator never builds a
/// browsing context itself, so this is the only possible answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NoNewContext;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum DecisionResponse {
    NavigationVerdict(NavigationVerdict),
    AlertAck,
    ConfirmVerdict(bool),
    PromptValue(Option<String>),
    NoNewContext,
}

/// The answer a waiting request settles on when the authority never responds:
/// the least permissive one for its kind.
pub trait FailSafe {
    fn fail_safe() -> Self;
}

impl FailSafe for NavigationVerdict {
    fn fail_safe() -> Self {
        NavigationVerdict::Cancel
    }
}

impl FailSafe for () {
    fn fail_safe() -> Self {}
}

impl FailSafe for bool {
    fn fail_safe() -> Self {
        false
    }
}

impl FailSafe for Option<String> {
    fn fail_safe() -> Self {
        None
    }
}

impl DecisionResponse {
    pub fn fail_safe(kind: DecisionKind) -> Self {
        match kind {
            DecisionKind::NavigationPolicy => {
                DecisionResponse::NavigationVerdict(NavigationVerdict::fail_safe())
            }
            DecisionKind::AlertAck => DecisionResponse::AlertAck,
            DecisionKind::ConfirmAck => DecisionResponse::ConfirmVerdict(bool::fail_safe()),
            DecisionKind::PromptAck => DecisionResponse::PromptValue(Option::<String>::fail_safe()),
            DecisionKind::CreateWindow => DecisionResponse::NoNewContext,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingPopup {
    pub url: String,
    pub blocked_at: OffsetDateTime,
}

/// State the toolbar reads: whether blocking is on and what was blocked last.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicySnapshot {
    pub enabled: bool,
    pub last_blocked_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigationFailure {
    pub url: Option<String>,
    pub message: String,
}

impl fmt::Display for NavigationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.url {
            Some(url) => write!(f, "{url}: {}", self.message),
            None => write!(f, "{}", self.message),
        }
    }
}
