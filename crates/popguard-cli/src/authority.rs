use std::sync::Arc;

use anyhow::{Context, Result};
use time::OffsetDateTime;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, Lines};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

use coordinator::DecisionCoordinator;
use popguard_core::config::{AuthorityMode, PromptAnswer};
use popguard_core::error::DecisionError;
use popguard_core::ipc::Command;
use popguard_core::types::NavigationVerdict;
use reporting::{ReportEvent, SessionRecorder};

/// Stand-in for the application's decision authority: answers commands either
/// automatically or by asking on the terminal.
pub struct Authority {
    coordinator: Arc<DecisionCoordinator>,
    mode: AuthorityMode,
    prompt_answer: PromptAnswer,
    recorder: SessionRecorder,
}

impl Authority {
    pub fn new(
        coordinator: Arc<DecisionCoordinator>,
        mode: AuthorityMode,
        prompt_answer: PromptAnswer,
        recorder: SessionRecorder,
    ) -> Self {
        Self {
            coordinator,
            mode,
            prompt_answer,
            recorder,
        }
    }

    /// Serves commands until `shutdown` fires, then drains what is queued.
    /// If serving fails the session is torn down so no request stays suspended.
    pub async fn run<R>(
        self,
        commands: mpsc::UnboundedReceiver<Command>,
        shutdown: oneshot::Receiver<()>,
        input: R,
    ) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
    {
        let result = self.serve(commands, shutdown, input.lines()).await;
        if result.is_err() {
            self.coordinator.teardown();
        }
        result
    }

    async fn serve<R>(
        &self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut shutdown: oneshot::Receiver<()>,
        mut input: Lines<R>,
    ) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
    {
        loop {
            tokio::select! {
                biased;
                command = commands.recv() => match command {
                    Some(command) => self.handle(command, &mut input).await?,
                    None => break,
                },
                _ = &mut shutdown => {
                    while let Ok(command) = commands.try_recv() {
                        self.handle(command, &mut input).await?;
                    }
                    break;
                }
            }
        }
        Ok(())
    }

    async fn handle<R>(&self, command: Command, input: &mut Lines<R>) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
    {
        debug!(
            request_id = ?command.request_id(),
            kind = ?command.kind(),
            "authority received command"
        );
        match command {
            Command::NavigationDecision { request_id, url } => {
                let allow = match self.mode {
                    AuthorityMode::Allow => true,
                    AuthorityMode::Deny => false,
                    AuthorityMode::Interactive => {
                        ask(input, &format!("Allow navigation to {url}? [y/N] ")).await?
                    }
                };
                let verdict = if allow {
                    NavigationVerdict::Allow
                } else {
                    NavigationVerdict::Cancel
                };
                info!(%url, %verdict, "navigation decided");
                settled(self.coordinator.publish_navigation_verdict(request_id, verdict));
            }
            Command::PopupBlocked { url, blocked_at } => {
                info!(%url, "popup blocked");
                self.recorder.record(ReportEvent::PopupBlocked {
                    at: blocked_at,
                    url,
                });
            }
            Command::Alert { request_id, message } => {
                if self.mode == AuthorityMode::Interactive {
                    read_answer(input, &format!("Alert: {message}\nPress Enter to dismiss ")).await?;
                }
                settled(self.coordinator.publish_alert_ack(request_id));
            }
            Command::Confirm { request_id, message } => {
                let confirmed = match self.mode {
                    AuthorityMode::Allow => true,
                    AuthorityMode::Deny => false,
                    AuthorityMode::Interactive => ask(input, &format!("{message} [y/N] ")).await?,
                };
                settled(self.coordinator.publish_confirm_verdict(request_id, confirmed));
            }
            Command::Prompt {
                request_id,
                text,
                default_text,
            } => {
                let value = match self.mode {
                    AuthorityMode::Deny => None,
                    AuthorityMode::Allow => match self.prompt_answer {
                        PromptAnswer::Default => Some(default_text.unwrap_or_default()),
                        PromptAnswer::Cancel => None,
                    },
                    AuthorityMode::Interactive => {
                        let hint = default_text.clone().unwrap_or_default();
                        match read_answer(input, &format!("{text} [{hint}] ")).await? {
                            Some(line) if line.is_empty() => Some(hint),
                            other => other,
                        }
                    }
                };
                settled(self.coordinator.publish_prompt_value(request_id, value));
            }
            Command::WindowOpenRequested {
                url,
                popup_blocking,
            } => {
                let now = OffsetDateTime::now_utc();
                if popup_blocking {
                    info!(%url, "window request blocked, restore to open it");
                    self.coordinator.policy().record_blocked(url.clone(), now);
                } else {
                    info!(%url, "window request redirected to the current view");
                }
                self.recorder.record(ReportEvent::WindowIntercepted {
                    at: now,
                    url,
                    popup_blocking,
                });
            }
            Command::NavigationFailed { error } => {
                self.recorder.record(ReportEvent::NavigationFailed {
                    at: OffsetDateTime::now_utc(),
                    failure: error,
                });
            }
        }
        Ok(())
    }
}

fn settled(result: Result<(), DecisionError>) {
    if let Err(err) = result {
        debug!(%err, "answer not delivered");
    }
}

/// `None` once input is exhausted.
async fn read_answer<R>(input: &mut Lines<R>, question: &str) -> Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    eprint!("{question}");
    let line = input.next_line().await.context("read answer")?;
    Ok(line.map(|line| line.trim().to_string()))
}

/// Anything but an explicit yes, including closed input, counts as no.
async fn ask<R>(input: &mut Lines<R>, question: &str) -> Result<bool>
where
    R: AsyncBufRead + Unpin,
{
    let answer = read_answer(input, question).await?;
    Ok(matches!(
        answer.as_deref().map(str::to_lowercase).as_deref(),
        Some("y") | Some("yes")
    ))
}

#[cfg(test)]
mod tests {
    use popguard_core::config::Config;
    use popguard_core::ids::SessionId;
    use popguard_core::types::NavigationRequest;
    use tokio::io::BufReader;

    use super::*;

    fn session() -> (
        Arc<DecisionCoordinator>,
        mpsc::UnboundedReceiver<Command>,
        SessionRecorder,
    ) {
        let (coordinator, commands) = DecisionCoordinator::from_config(&Config::default_config());
        (Arc::new(coordinator), commands, SessionRecorder::start(SessionId::new()))
    }

    #[tokio::test]
    async fn test_interactive_answers_from_input() {
        let (coordinator, commands, recorder) = session();
        let (stop, shutdown) = oneshot::channel();
        let authority = Authority::new(
            Arc::clone(&coordinator),
            AuthorityMode::Interactive,
            PromptAnswer::Default,
            recorder,
        );
        let input = BufReader::new(&b"yes\n\nnope\n"[..]);
        let task = tokio::spawn(authority.run(commands, shutdown, input));

        let verdict = coordinator
            .resolve_navigation(NavigationRequest::new("https://a.example", false))
            .await;
        assert_eq!(verdict, NavigationVerdict::Allow);
        assert_eq!(
            coordinator.resolve_prompt("Name?", Some("guest".to_string())).await,
            Some("guest".to_string())
        );
        assert!(!coordinator.resolve_confirm("Delete everything?").await);
        // Input is exhausted: closed stdin denies.
        assert!(!coordinator.resolve_confirm("Really?").await);

        stop.send(()).unwrap();
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_blocked_window_is_restorable() {
        let (coordinator, commands, recorder) = session();
        let (stop, shutdown) = oneshot::channel();
        let authority = Authority::new(
            Arc::clone(&coordinator),
            AuthorityMode::Deny,
            PromptAnswer::Cancel,
            recorder.clone(),
        );
        let task = tokio::spawn(authority.run(commands, shutdown, tokio::io::empty()));

        coordinator.resolve_create_window("https://w.example").await;
        stop.send(()).unwrap();
        task.await.unwrap().unwrap();

        assert_eq!(
            coordinator.restore_last_blocked_popup().map(|popup| popup.url),
            Some("https://w.example".to_string())
        );
        assert_eq!(recorder.finish().stats.windows_intercepted, 1);
    }
}
