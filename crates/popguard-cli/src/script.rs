use serde::Deserialize;

use engine_adapter::EngineEvent;
use popguard_core::ipc::Intent;

/// One line of a replay script: either something the engine raised or
/// something the user did on the toolbar.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum ScriptStep {
    Engine(EngineEvent),
    User(UserAction),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum UserAction {
    TogglePopupBlocking,
    RestoreLastBlockedPopup,
}

impl From<UserAction> for Intent {
    fn from(action: UserAction) -> Self {
        match action {
            UserAction::TogglePopupBlocking => Intent::TogglePopupBlocking,
            UserAction::RestoreLastBlockedPopup => Intent::RestoreLastBlockedPopup,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use popguard_core::ipc::decode_line;

    #[test]
    fn test_parse_engine_step() {
        let step: ScriptStep = decode_line(
            r#"{"source":"engine","event":"navigation","url":"https://b.example","target_is_new_context":true}"#,
        )
        .unwrap();
        assert_eq!(
            step,
            ScriptStep::Engine(EngineEvent::Navigation {
                url: "https://b.example".to_string(),
                target_is_new_context: true,
            })
        );
    }

    #[test]
    fn test_parse_user_step() {
        let step: ScriptStep =
            decode_line(r#"{"source":"user","action":"restore_last_blocked_popup"}"#).unwrap();
        assert_eq!(step, ScriptStep::User(UserAction::RestoreLastBlockedPopup));
        assert_eq!(
            Intent::from(UserAction::TogglePopupBlocking),
            Intent::TogglePopupBlocking
        );
    }

    #[test]
    fn test_unknown_source_rejected() {
        assert!(decode_line::<ScriptStep>(r#"{"source":"network","event":"alert"}"#).is_err());
    }
}
