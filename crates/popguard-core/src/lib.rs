pub mod config;
pub mod error;
pub mod ids;
pub mod ipc;
pub mod types;

pub use config::{AuthorityMode, Config, ConfigPaths, PromptAnswer};
pub use error::{DecisionError, PopGuardError};
pub use ids::{RequestId, SessionId};
pub use ipc::{Command, Intent, IntentOutcome};
pub use types::{
    DecisionKind, DecisionRequest, DecisionResponse, FailSafe, NavigationFailure, NavigationRequest,
    NavigationVerdict, NoNewContext, PendingPopup, PolicySnapshot,
};
