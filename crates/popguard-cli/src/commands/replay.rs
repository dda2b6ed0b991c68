use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use time::OffsetDateTime;
use tokio::io::AsyncBufRead;
use tokio::sync::oneshot;
use tracing::{info, warn};

use coordinator::DecisionCoordinator;
use engine_adapter::{EventAdapter, EventSource, JsonlSource};
use popguard_core::config::{AuthorityMode, Config, ConfigPaths};
use popguard_core::ids::SessionId;
use popguard_core::ipc::IntentOutcome;
use reporting::json;
use reporting::{timeline, ReportEvent, SessionRecorder, SessionReport};

use crate::authority::Authority;
use crate::script::ScriptStep;

pub struct ReplayInputs {
    pub config: Config,
    pub paths: ConfigPaths,
    pub script: PathBuf,
    pub mode: Option<AuthorityMode>,
    pub json: bool,
    pub store: bool,
}

pub fn execute(inputs: ReplayInputs) -> Result<()> {
    let mode = inputs.mode.unwrap_or(inputs.config.authority.mode);
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("start tokio runtime")?;
    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let report = runtime.block_on(replay(&inputs.config, mode, &inputs.script, stdin))?;

    if inputs.store {
        store_report(&inputs.paths, &inputs.config, &report)?;
    }
    if inputs.json {
        println!("{}", json::render_json(&report).context("render report JSON")?);
    } else if inputs.config.reporting.human_summary {
        println!("{}", report.human_summary());
        for line in timeline::timeline(&report.events) {
            println!("  {line}");
        }
    }
    Ok(())
}

/// Runs one session: the script plays the engine and the user, the
/// [`Authority`] answers on `input`.
pub async fn replay<R>(
    config: &Config,
    mode: AuthorityMode,
    script: &Path,
    input: R,
) -> Result<SessionReport>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    let mut source: JsonlSource<_, ScriptStep> = JsonlSource::from_path(script)?;
    let (coordinator, commands) = DecisionCoordinator::from_config(config);
    let coordinator = Arc::new(coordinator);
    let recorder = SessionRecorder::start(SessionId::new());
    info!(
        session = %recorder.session_id(),
        %mode,
        script = %script.display(),
        "replay started"
    );

    let (stop, shutdown) = oneshot::channel();
    let authority = Authority::new(
        Arc::clone(&coordinator),
        mode,
        config.authority.prompt_answer,
        recorder.clone(),
    );
    let authority_task = tokio::spawn(authority.run(commands, shutdown, input));
    let adapter = EventAdapter::from_current(Arc::clone(&coordinator))?;

    let outcome = drive(&adapter, &coordinator, &recorder, &mut source).await;

    adapter.flush().await;
    let _ = stop.send(());
    let served = authority_task.await.context("authority task panicked")?;
    let abandoned = coordinator.teardown();
    if abandoned > 0 {
        warn!(abandoned, "requests were still waiting at teardown");
    }
    outcome?;
    served?;

    let report = recorder.finish();
    info!(session = %report.session_id, events = report.events.len(), "replay finished");
    Ok(report)
}

async fn drive(
    adapter: &EventAdapter,
    coordinator: &DecisionCoordinator,
    recorder: &SessionRecorder,
    source: &mut impl EventSource<ScriptStep>,
) -> Result<()> {
    while let Some(step) = source.next_event()? {
        match step {
            ScriptStep::Engine(event) => {
                let request = event.to_request();
                let response = adapter.dispatch(event).await;
                if let (Some(request), Some(response)) = (request, response) {
                    recorder.record(ReportEvent::Decision {
                        at: OffsetDateTime::now_utc(),
                        request,
                        response,
                    });
                }
            }
            ScriptStep::User(action) => match coordinator.apply(action.into()) {
                Ok(IntentOutcome::PopupBlocking { enabled }) => {
                    recorder.record(ReportEvent::PopupBlockingToggled {
                        at: OffsetDateTime::now_utc(),
                        enabled,
                    });
                }
                Ok(IntentOutcome::Restored(popup)) => {
                    match &popup {
                        Some(popup) => info!(url = %popup.url, "opening restored popup in the current view"),
                        None => info!("no blocked popup to restore"),
                    }
                    recorder.record(ReportEvent::PopupRestored {
                        at: OffsetDateTime::now_utc(),
                        url: popup.map(|popup| popup.url),
                    });
                }
                Ok(IntentOutcome::Published) => {}
                Err(err) => warn!(%err, ?action, "user action rejected"),
            },
        }
    }
    Ok(())
}

fn store_report(paths: &ConfigPaths, config: &Config, report: &SessionReport) -> Result<()> {
    if !config.reporting.store_reports {
        return Ok(());
    }
    fs::create_dir_all(&paths.report_dir)
        .with_context(|| format!("create report dir {}", paths.report_dir.display()))?;

    let report_path = paths.report_dir.join(format!("{}.json", report.session_id));
    let contents = json::render_json(report).context("render report JSON")?;
    fs::write(&report_path, contents)
        .with_context(|| format!("write report {}", report_path.display()))?;
    info!(path = %report_path.display(), "report stored");
    Ok(())
}

#[cfg(test)]
mod tests {
    use popguard_core::types::{DecisionResponse, NavigationVerdict};

    use super::*;

    fn write_script(dir: &Path, lines: &[&str]) -> PathBuf {
        let path = dir.join("session.jsonl");
        fs::write(&path, lines.join("\n")).unwrap();
        path
    }

    fn navigation_verdicts(report: &SessionReport) -> Vec<NavigationVerdict> {
        report
            .events
            .iter()
            .filter_map(|event| match event {
                ReportEvent::Decision {
                    response: DecisionResponse::NavigationVerdict(verdict),
                    ..
                } => Some(*verdict),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_replay_blocks_and_restores_popup() {
        let dir = tempfile::tempdir().unwrap();
        let script = write_script(
            dir.path(),
            &[
                r#"{"source":"engine","event":"navigation","url":"https://a.example"}"#,
                r#"{"source":"engine","event":"navigation","url":"https://b.example","target_is_new_context":true}"#,
                r#"{"source":"user","action":"restore_last_blocked_popup"}"#,
                r#"{"source":"user","action":"restore_last_blocked_popup"}"#,
            ],
        );

        let report = replay(
            &Config::default_config(),
            AuthorityMode::Allow,
            &script,
            tokio::io::empty(),
        )
        .await
        .unwrap();

        assert_eq!(
            navigation_verdicts(&report),
            vec![NavigationVerdict::Allow, NavigationVerdict::Cancel]
        );
        assert_eq!(report.stats.popups_blocked, 1);
        let restored: Vec<Option<String>> = report
            .events
            .iter()
            .filter_map(|event| match event {
                ReportEvent::PopupRestored { url, .. } => Some(url.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(restored, vec![Some("https://b.example".to_string()), None]);
    }

    #[tokio::test]
    async fn test_replay_toggle_lets_popups_through() {
        let dir = tempfile::tempdir().unwrap();
        let script = write_script(
            dir.path(),
            &[
                r#"{"source":"user","action":"toggle_popup_blocking"}"#,
                r#"{"source":"engine","event":"navigation","url":"https://b.example","target_is_new_context":true}"#,
                r#"{"source":"engine","event":"prompt","text":"Name?","default_text":"guest"}"#,
            ],
        );

        let report = replay(
            &Config::default_config(),
            AuthorityMode::Deny,
            &script,
            tokio::io::empty(),
        )
        .await
        .unwrap();

        assert_eq!(navigation_verdicts(&report), vec![NavigationVerdict::Cancel]);
        assert_eq!(report.stats.popups_blocked, 0);
        assert_eq!(report.stats.dialogs_answered, 1);
        assert!(report.events.iter().any(|event| matches!(
            event,
            ReportEvent::PopupBlockingToggled { enabled: false, .. }
        )));
    }

    #[tokio::test]
    async fn test_replay_records_window_interception() {
        let dir = tempfile::tempdir().unwrap();
        let script = write_script(
            dir.path(),
            &[
                "# window.open from a click handler",
                r#"{"source":"engine","event":"window_open","url":"https://w.example"}"#,
                r#"{"source":"engine","event":"provisional_navigation_failed","url":"https://down.example","message":"host unreachable"}"#,
            ],
        );

        let report = replay(
            &Config::default_config(),
            AuthorityMode::Allow,
            &script,
            tokio::io::empty(),
        )
        .await
        .unwrap();

        assert_eq!(report.stats.windows_intercepted, 1);
        assert_eq!(report.stats.navigation_failures, 1);
        assert_eq!(report.stats.decisions, 1);
    }

    #[tokio::test]
    async fn test_bad_script_line_fails_replay() {
        let dir = tempfile::tempdir().unwrap();
        let script = write_script(dir.path(), &[r#"{"source":"engine","event":"teleport"}"#]);

        let err = replay(
            &Config::default_config(),
            AuthorityMode::Allow,
            &script,
            tokio::io::empty(),
        )
        .await
        .unwrap_err();
        assert!(format!("{err:#}").contains("line 1"));
    }

    #[test]
    fn test_store_report_respects_config() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ConfigPaths {
            config_path: dir.path().join("config.toml"),
            data_dir: dir.path().to_path_buf(),
            report_dir: dir.path().join("reports"),
        };
        let report = SessionRecorder::start(SessionId::new()).finish();

        let mut config = Config::default_config();
        config.reporting.store_reports = false;
        store_report(&paths, &config, &report).unwrap();
        assert!(!paths.report_dir.exists());

        config.reporting.store_reports = true;
        store_report(&paths, &config, &report).unwrap();
        assert!(paths
            .report_dir
            .join(format!("{}.json", report.session_id))
            .exists());
    }
}
