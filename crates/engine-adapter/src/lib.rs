//! Engine-facing side of the coordinator.
//!
//! The engine's callbacks come in two shapes: ones that can hand back an answer
//! later (navigation policy, dialogs) and ones that must return on the spot
//! (window creation). The first kind awaits the coordinator directly. The second
//! kind spawns the coordinator call on the runtime and returns the sentinel
//! immediately, so the engine never waits on the authority.

use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use coordinator::DecisionCoordinator;
use popguard_core::types::{
    DecisionRequest, DecisionResponse, NavigationFailure, NavigationRequest, NavigationVerdict,
    NoNewContext,
};

pub mod events;
pub mod source;

pub use events::EngineEvent;
pub use source::{EventSource, JsonlSource};

pub struct EventAdapter {
    coordinator: Arc<DecisionCoordinator>,
    runtime: Handle,
    detached: Mutex<Vec<JoinHandle<()>>>,
}

impl EventAdapter {
    pub fn new(coordinator: Arc<DecisionCoordinator>, runtime: Handle) -> Self {
        Self {
            coordinator,
            runtime,
            detached: Mutex::new(Vec::new()),
        }
    }

    /// Binds to the runtime the caller is running on.
    pub fn from_current(coordinator: Arc<DecisionCoordinator>) -> Result<Self> {
        let runtime = Handle::try_current().context("event adapter needs a tokio runtime")?;
        Ok(Self::new(coordinator, runtime))
    }

    pub fn coordinator(&self) -> &Arc<DecisionCoordinator> {
        &self.coordinator
    }

    pub async fn on_navigation_decision_needed(
        &self,
        url: impl Into<String>,
        target_is_new_context: bool,
    ) -> NavigationVerdict {
        let request = NavigationRequest::new(url, target_is_new_context);
        self.coordinator.resolve_navigation(request).await
    }

    pub async fn on_alert(&self, message: impl Into<String>) {
        self.coordinator.resolve_alert(message).await
    }

    pub async fn on_confirm(&self, message: impl Into<String>) -> bool {
        self.coordinator.resolve_confirm(message).await
    }

    pub async fn on_prompt(
        &self,
        text: impl Into<String>,
        default_text: Option<String>,
    ) -> Option<String> {
        self.coordinator.resolve_prompt(text, default_text).await
    }

    /// Must not block: the coordinator call runs detached.
    pub fn on_window_open_requested(&self, url: impl Into<String>) -> NoNewContext {
        let coordinator = Arc::clone(&self.coordinator);
        let url = url.into();
        debug!(%url, "window open requested");
        let task = self.runtime.spawn(async move {
            coordinator.resolve_create_window(url).await;
        });
        let mut detached = self.detached.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        detached.retain(|handle| !handle.is_finished());
        detached.push(task);
        NoNewContext
    }

    /// Waits for detached window-open tasks, so their commands are out before a
    /// session is torn down.
    pub async fn flush(&self) {
        let tasks: Vec<JoinHandle<()>> = {
            let mut detached = self.detached.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            detached.drain(..).collect()
        };
        for task in tasks {
            if let Err(err) = task.await {
                warn!(%err, "window-open task did not finish");
            }
        }
    }

    pub fn on_provisional_navigation_failed(&self, error: NavigationFailure) {
        self.coordinator.report_navigation_failed(error);
    }

    /// Routes a serialized engine event. Window requests keep the detached path;
    /// everything that can wait goes through [`DecisionCoordinator::resolve`].
    /// Informational events produce no response.
    pub async fn dispatch(&self, event: EngineEvent) -> Option<DecisionResponse> {
        if let Some(failure) = event.failure() {
            self.on_provisional_navigation_failed(failure);
            return None;
        }
        match event.to_request()? {
            DecisionRequest::CreateWindow { url } => {
                self.on_window_open_requested(url);
                Some(DecisionResponse::NoNewContext)
            }
            request => Some(self.coordinator.resolve(request).await),
        }
    }
}

#[cfg(test)]
mod tests {
    use coordinator::CoordinatorSettings;
    use policy_engine::PopupPolicy;
    use popguard_core::ipc::Command;
    use tokio::sync::mpsc;

    use super::*;

    fn adapter(blocking: bool) -> (EventAdapter, mpsc::UnboundedReceiver<Command>) {
        let (coordinator, commands) =
            DecisionCoordinator::new(PopupPolicy::new(blocking), CoordinatorSettings::default());
        let adapter = EventAdapter::from_current(Arc::new(coordinator)).unwrap();
        (adapter, commands)
    }

    #[tokio::test]
    async fn test_window_open_returns_before_authority_hears() {
        let (adapter, mut commands) = adapter(true);

        let result = adapter.on_window_open_requested("https://w.example");
        assert_eq!(result, NoNewContext);

        // The detached task runs once this test yields.
        assert_eq!(
            commands.recv().await,
            Some(Command::WindowOpenRequested {
                url: "https://w.example".to_string(),
                popup_blocking: true,
            })
        );
    }

    #[tokio::test]
    async fn test_blocked_popup_through_adapter() {
        let (adapter, mut commands) = adapter(true);
        let verdict = adapter
            .on_navigation_decision_needed("https://b.example", true)
            .await;
        assert_eq!(verdict, NavigationVerdict::Cancel);
        assert!(matches!(commands.recv().await, Some(Command::PopupBlocked { .. })));
        assert_eq!(
            adapter.coordinator().policy_snapshot().last_blocked_url.as_deref(),
            Some("https://b.example")
        );
    }

    #[tokio::test]
    async fn test_confirm_waits_for_authority() {
        let (adapter, mut commands) = adapter(true);
        let coordinator = Arc::clone(adapter.coordinator());
        let authority = tokio::spawn(async move {
            if let Some(Command::Confirm { request_id, .. }) = commands.recv().await {
                coordinator.publish_confirm_verdict(request_id, true).unwrap();
            }
        });

        assert!(adapter.on_confirm("Leave page?").await);
        authority.await.unwrap();
    }

    #[tokio::test]
    async fn test_dispatch_failure_is_informational() {
        let (adapter, mut commands) = adapter(true);
        let response = adapter
            .dispatch(EngineEvent::ProvisionalNavigationFailed {
                url: Some("https://down.example".to_string()),
                message: "host unreachable".to_string(),
            })
            .await;
        assert_eq!(response, None);
        match commands.recv().await {
            Some(Command::NavigationFailed { error }) => {
                assert_eq!(error.message, "host unreachable")
            }
            other => panic!("unexpected command: {other:?}"),
        }

        // A failure does not get in the way of the next decision.
        let response = adapter
            .dispatch(EngineEvent::WindowOpen {
                url: "https://w.example".to_string(),
            })
            .await;
        assert_eq!(response, Some(DecisionResponse::NoNewContext));
    }

    #[tokio::test]
    async fn test_dispatch_waits_for_published_answer() {
        let (adapter, mut commands) = adapter(true);
        let coordinator = Arc::clone(adapter.coordinator());
        let authority = tokio::spawn(async move {
            if let Some(Command::Prompt { request_id, .. }) = commands.recv().await {
                coordinator
                    .publish_prompt_value(request_id, Some("ada".to_string()))
                    .unwrap();
            }
        });

        let response = adapter
            .dispatch(EngineEvent::Prompt {
                text: "Name?".to_string(),
                default_text: None,
            })
            .await;
        assert_eq!(response, Some(DecisionResponse::PromptValue(Some("ada".to_string()))));
        authority.await.unwrap();

        // A blocked popup is settled by policy, with no authority involved.
        let response = adapter
            .dispatch(EngineEvent::Navigation {
                url: "https://b.example".to_string(),
                target_is_new_context: true,
            })
            .await;
        assert_eq!(
            response,
            Some(DecisionResponse::NavigationVerdict(NavigationVerdict::Cancel))
        );
    }

    #[tokio::test]
    async fn test_teardown_unblocks_prompt() {
        let (adapter, mut commands) = adapter(true);
        let coordinator = Arc::clone(adapter.coordinator());
        let teardown = tokio::spawn(async move {
            commands.recv().await;
            coordinator.teardown();
        });

        assert_eq!(adapter.on_prompt("Name?", Some("guest".to_string())).await, None);
        teardown.await.unwrap();
    }

    #[tokio::test]
    async fn test_flush_settles_window_requests() {
        let (adapter, mut commands) = adapter(false);
        adapter.on_window_open_requested("https://one.example");
        adapter.on_window_open_requested("https://two.example");
        adapter.flush().await;

        assert!(matches!(commands.try_recv(), Ok(Command::WindowOpenRequested { .. })));
        assert!(matches!(commands.try_recv(), Ok(Command::WindowOpenRequested { .. })));
    }

    #[test]
    fn test_requires_runtime() {
        let (coordinator, _commands) =
            DecisionCoordinator::new(PopupPolicy::new(true), CoordinatorSettings::default());
        assert!(EventAdapter::from_current(Arc::new(coordinator)).is_err());
    }
}
