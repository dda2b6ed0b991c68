use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use time::OffsetDateTime;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use policy_engine::{DecisionAction, PopupPolicy};
use popguard_core::config::Config;
use popguard_core::error::DecisionError;
use popguard_core::ids::RequestId;
use popguard_core::ipc::{Command, Intent, IntentOutcome};
use popguard_core::types::{
    DecisionKind, DecisionRequest, DecisionResponse, FailSafe, NavigationFailure,
    NavigationRequest, NavigationVerdict, NoNewContext, PendingPopup, PolicySnapshot,
};

pub mod response;

pub use response::{PendingResponse, ResponseChannel};

#[derive(Debug, Clone, Default)]
pub struct CoordinatorSettings {
    /// Give up on an unanswered request after this long. `None` waits for the
    /// authority or for teardown.
    pub response_timeout: Option<Duration>,
}

impl CoordinatorSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            response_timeout: config.coordinator.response_timeout(),
        }
    }
}

/// Turns engine decision requests into authority commands and waits for the
/// correlated answers.
///
/// Every `resolve_*` call emits exactly one [`Command`]. Calls that wait do so
/// on a slot registered under the command's request id, and fall back to the
/// least permissive answer when the wait is abandoned.
pub struct DecisionCoordinator {
    commands: mpsc::UnboundedSender<Command>,
    policy: PopupPolicy,
    navigation: ResponseChannel<NavigationVerdict>,
    alerts: ResponseChannel<()>,
    confirms: ResponseChannel<bool>,
    prompts: ResponseChannel<Option<String>>,
    settings: CoordinatorSettings,
    closed: AtomicBool,
}

impl DecisionCoordinator {
    pub fn new(
        policy: PopupPolicy,
        settings: CoordinatorSettings,
    ) -> (Self, mpsc::UnboundedReceiver<Command>) {
        let (commands, receiver) = mpsc::unbounded_channel();
        let coordinator = Self {
            commands,
            policy,
            navigation: ResponseChannel::new(DecisionKind::NavigationPolicy),
            alerts: ResponseChannel::new(DecisionKind::AlertAck),
            confirms: ResponseChannel::new(DecisionKind::ConfirmAck),
            prompts: ResponseChannel::new(DecisionKind::PromptAck),
            settings,
            closed: AtomicBool::new(false),
        };
        (coordinator, receiver)
    }

    pub fn from_config(config: &Config) -> (Self, mpsc::UnboundedReceiver<Command>) {
        Self::new(
            PopupPolicy::from_config(config),
            CoordinatorSettings::from_config(config),
        )
    }

    pub fn policy(&self) -> &PopupPolicy {
        &self.policy
    }

    pub fn policy_snapshot(&self) -> PolicySnapshot {
        self.policy.snapshot()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Requests still waiting on the authority, across all kinds.
    pub fn outstanding(&self) -> usize {
        self.navigation.outstanding()
            + self.alerts.outstanding()
            + self.confirms.outstanding()
            + self.prompts.outstanding()
    }

    pub async fn resolve(&self, request: DecisionRequest) -> DecisionResponse {
        match request {
            DecisionRequest::NavigationPolicy(navigation) => {
                DecisionResponse::NavigationVerdict(self.resolve_navigation(navigation).await)
            }
            DecisionRequest::AlertAck { message } => {
                self.resolve_alert(message).await;
                DecisionResponse::AlertAck
            }
            DecisionRequest::ConfirmAck { message } => {
                DecisionResponse::ConfirmVerdict(self.resolve_confirm(message).await)
            }
            DecisionRequest::PromptAck { text, default_text } => {
                DecisionResponse::PromptValue(self.resolve_prompt(text, default_text).await)
            }
            DecisionRequest::CreateWindow { url } => {
                self.resolve_create_window(url).await;
                DecisionResponse::NoNewContext
            }
        }
    }

    pub async fn resolve_navigation(&self, request: NavigationRequest) -> NavigationVerdict {
        let decision = self.policy.evaluate_navigation(&request);
        if decision.action == DecisionAction::Suppress {
            let blocked_at = OffsetDateTime::now_utc();
            info!(url = %request.url, "{}", decision.reason);
            self.policy.record_blocked(request.url.clone(), blocked_at);
            self.emit(Command::PopupBlocked {
                url: request.url,
                blocked_at,
            });
            return NavigationVerdict::Cancel;
        }

        let request_id = RequestId::new();
        let command = Command::NavigationDecision {
            request_id,
            url: request.url,
        };
        self.ask(&self.navigation, request_id, command).await
    }

    pub async fn resolve_alert(&self, message: impl Into<String>) {
        let request_id = RequestId::new();
        let command = Command::Alert {
            request_id,
            message: message.into(),
        };
        self.ask(&self.alerts, request_id, command).await
    }

    pub async fn resolve_confirm(&self, message: impl Into<String>) -> bool {
        let request_id = RequestId::new();
        let command = Command::Confirm {
            request_id,
            message: message.into(),
        };
        self.ask(&self.confirms, request_id, command).await
    }

    pub async fn resolve_prompt(
        &self,
        text: impl Into<String>,
        default_text: Option<String>,
    ) -> Option<String> {
        let request_id = RequestId::new();
        let command = Command::Prompt {
            request_id,
            text: text.into(),
            default_text,
        };
        self.ask(&self.prompts, request_id, command).await
    }

    /// Window creation never waits and never yields a context; what happens to the
    /// URL is up to the authority.
    pub async fn resolve_create_window(&self, url: impl Into<String>) -> NoNewContext {
        let popup_blocking = self.policy.should_block();
        self.emit(Command::WindowOpenRequested {
            url: url.into(),
            popup_blocking,
        });
        NoNewContext
    }

    pub fn report_navigation_failed(&self, error: NavigationFailure) {
        warn!(error = %DecisionError::NavigationFailed(error.clone()), "engine reported a failure");
        self.emit(Command::NavigationFailed { error });
    }

    pub fn publish_navigation_verdict(
        &self,
        request_id: RequestId,
        verdict: NavigationVerdict,
    ) -> Result<(), DecisionError> {
        checked(self.navigation.publish(request_id, verdict))
    }

    pub fn publish_alert_ack(&self, request_id: RequestId) -> Result<(), DecisionError> {
        checked(self.alerts.publish(request_id, ()))
    }

    pub fn publish_confirm_verdict(
        &self,
        request_id: RequestId,
        confirmed: bool,
    ) -> Result<(), DecisionError> {
        checked(self.confirms.publish(request_id, confirmed))
    }

    pub fn publish_prompt_value(
        &self,
        request_id: RequestId,
        value: Option<String>,
    ) -> Result<(), DecisionError> {
        checked(self.prompts.publish(request_id, value))
    }

    pub fn toggle_popup_blocking(&self) -> bool {
        let enabled = self.policy.toggle();
        info!(enabled, "popup blocking switched");
        enabled
    }

    /// Clears the blocked-popup record and hands it to the caller to reopen.
    pub fn restore_last_blocked_popup(&self) -> Option<PendingPopup> {
        let restored = self.policy.take_last_blocked();
        match &restored {
            Some(popup) => info!(url = %popup.url, "restoring blocked popup"),
            None => debug!("no blocked popup to restore"),
        }
        restored
    }

    pub fn apply(&self, intent: Intent) -> Result<IntentOutcome, DecisionError> {
        match intent {
            Intent::TogglePopupBlocking => Ok(IntentOutcome::PopupBlocking {
                enabled: self.toggle_popup_blocking(),
            }),
            Intent::RestoreLastBlockedPopup => {
                Ok(IntentOutcome::Restored(self.restore_last_blocked_popup()))
            }
            Intent::PublishNavigationVerdict {
                request_id,
                verdict,
            } => self
                .publish_navigation_verdict(request_id, verdict)
                .map(|_| IntentOutcome::Published),
            Intent::PublishAlertAck { request_id } => self
                .publish_alert_ack(request_id)
                .map(|_| IntentOutcome::Published),
            Intent::PublishConfirmVerdict {
                request_id,
                confirmed,
            } => self
                .publish_confirm_verdict(request_id, confirmed)
                .map(|_| IntentOutcome::Published),
            Intent::PublishPromptValue { request_id, value } => self
                .publish_prompt_value(request_id, value)
                .map(|_| IntentOutcome::Published),
        }
    }

    /// Ends the session: every outstanding wait resolves to its fail-safe answer
    /// and later requests stop waiting.
    pub fn teardown(&self) -> usize {
        self.closed.store(true, Ordering::SeqCst);
        let cancelled = self.navigation.cancel_all()
            + self.alerts.cancel_all()
            + self.confirms.cancel_all()
            + self.prompts.cancel_all();
        info!(cancelled, "decision session torn down");
        cancelled
    }

    fn emit(&self, command: Command) -> bool {
        debug!(?command, "emitting command");
        match self.commands.send(command) {
            Ok(()) => true,
            Err(err) => {
                warn!(command = ?err.0, "decision authority is gone, using fail-safe answer");
                false
            }
        }
    }

    /// Opens the slot, tells the authority, and waits. Any way the wait can fail
    /// ends in the kind's [`FailSafe`] answer.
    async fn ask<T: FailSafe>(
        &self,
        channel: &ResponseChannel<T>,
        request_id: RequestId,
        command: Command,
    ) -> T {
        let pending = channel.register(request_id);
        if !self.emit(command) {
            return T::fail_safe();
        }
        match self.wait(pending).await {
            Ok(value) => value,
            Err(err) => {
                debug!(%err, "falling back to fail-safe answer");
                T::fail_safe()
            }
        }
    }

    async fn wait<T>(&self, pending: PendingResponse<T>) -> Result<T, DecisionError> {
        let kind = pending.kind();
        // Registered after teardown already swept the slots.
        if self.is_closed() {
            return Err(DecisionError::Abandoned { kind });
        }
        match self.settings.response_timeout {
            Some(limit) => match tokio::time::timeout(limit, pending.await_next()).await {
                Ok(result) => result,
                Err(_) => {
                    warn!(%kind, timeout_ms = limit.as_millis() as u64, "no response from decision authority");
                    Err(DecisionError::Abandoned { kind })
                }
            },
            None => pending.await_next().await,
        }
    }
}

fn checked(result: Result<(), DecisionError>) -> Result<(), DecisionError> {
    if let Err(err) = &result {
        warn!(%err, "ignoring unmatched publish");
    }
    result
}
