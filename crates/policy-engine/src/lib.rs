use std::sync::{Arc, Mutex, MutexGuard};

use time::OffsetDateTime;
use tracing::debug;

use popguard_core::config::Config;
use popguard_core::types::{NavigationRequest, PendingPopup, PolicySnapshot};

mod decision;

pub use decision::{DecisionAction, PolicyDecision};

/// Popup suppression policy shared between the coordinator and the toolbar.
///
/// Every method is synchronous and never suspends, so it is safe to consult from
/// inside an engine callback. Clones share the same state.
#[derive(Debug, Clone, Default)]
pub struct PopupPolicy {
    state: Arc<Mutex<PopupPolicyState>>,
}

#[derive(Debug, Clone, Default)]
struct PopupPolicyState {
    enabled: bool,
    /// Most recently suppressed popup, kept until restored.
    last_blocked: Option<PendingPopup>,
}

impl PopupPolicy {
    pub fn new(enabled: bool) -> Self {
        Self {
            state: Arc::new(Mutex::new(PopupPolicyState {
                enabled,
                last_blocked: None,
            })),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.popguard.popup_blocking)
    }

    fn lock(&self) -> MutexGuard<'_, PopupPolicyState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn should_block(&self) -> bool {
        self.lock().enabled
    }

    /// Flips blocking and returns the new state. The blocked-popup record is untouched.
    pub fn toggle(&self) -> bool {
        let mut state = self.lock();
        state.enabled = !state.enabled;
        debug!(enabled = state.enabled, "popup blocking toggled");
        state.enabled
    }

    /// Overwrites any earlier record; only the latest blocked popup is retained.
    pub fn record_blocked(&self, url: impl Into<String>, blocked_at: OffsetDateTime) {
        let url = url.into();
        debug!(%url, "recording blocked popup");
        self.lock().last_blocked = Some(PendingPopup { url, blocked_at });
    }

    pub fn take_last_blocked(&self) -> Option<PendingPopup> {
        self.lock().last_blocked.take()
    }

    pub fn last_blocked(&self) -> Option<PendingPopup> {
        self.lock().last_blocked.clone()
    }

    pub fn snapshot(&self) -> PolicySnapshot {
        let state = self.lock();
        PolicySnapshot {
            enabled: state.enabled,
            last_blocked_url: state.last_blocked.as_ref().map(|popup| popup.url.clone()),
        }
    }

    /// Classifies a navigation against the current policy state.
    pub fn evaluate_navigation(&self, request: &NavigationRequest) -> PolicyDecision {
        if !request.is_popup() {
            return PolicyDecision {
                action: DecisionAction::Forward,
                reason: "Not a popup".to_string(),
            };
        }
        if self.should_block() {
            PolicyDecision {
                action: DecisionAction::Suppress,
                reason: format!("Popup to {} blocked", request.url),
            }
        } else {
            PolicyDecision {
                action: DecisionAction::Forward,
                reason: "Popup blocking disabled".to_string(),
            }
        }
    }
}
