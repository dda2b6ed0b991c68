use serde::{Deserialize, Serialize};

use popguard_core::types::{DecisionRequest, NavigationFailure, NavigationRequest};

/// A callback raised by the rendering engine, in serializable form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EngineEvent {
    Navigation {
        url: String,
        #[serde(default)]
        target_is_new_context: bool,
    },
    Alert {
        message: String,
    },
    Confirm {
        message: String,
    },
    Prompt {
        text: String,
        #[serde(default)]
        default_text: Option<String>,
    },
    WindowOpen {
        url: String,
    },
    ProvisionalNavigationFailed {
        #[serde(default)]
        url: Option<String>,
        message: String,
    },
}

impl EngineEvent {
    /// The decision this event asks for; failures are informational and ask for none.
    pub fn to_request(&self) -> Option<DecisionRequest> {
        let request = match self {
            EngineEvent::Navigation {
                url,
                target_is_new_context,
            } => DecisionRequest::NavigationPolicy(NavigationRequest::new(
                url.clone(),
                *target_is_new_context,
            )),
            EngineEvent::Alert { message } => DecisionRequest::AlertAck {
                message: message.clone(),
            },
            EngineEvent::Confirm { message } => DecisionRequest::ConfirmAck {
                message: message.clone(),
            },
            EngineEvent::Prompt { text, default_text } => DecisionRequest::PromptAck {
                text: text.clone(),
                default_text: default_text.clone(),
            },
            EngineEvent::WindowOpen { url } => DecisionRequest::CreateWindow { url: url.clone() },
            EngineEvent::ProvisionalNavigationFailed { .. } => return None,
        };
        Some(request)
    }

    pub fn failure(&self) -> Option<NavigationFailure> {
        match self {
            EngineEvent::ProvisionalNavigationFailed { url, message } => Some(NavigationFailure {
                url: url.clone(),
                message: message.clone(),
            }),
            _ => None,
        }
    }
}
