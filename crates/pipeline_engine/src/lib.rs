//! Pipeline engine: backend IO and effect execution.
mod backend;
mod engine;
mod settings;
mod types;

pub use backend::{parse_jobs, Backend, ReqwestBackend};
pub use engine::{EngineHandle, RefreshSignal};
pub use settings::{EngineSettings, SettingsError};
pub use types::{DispatchError, FailureKind, FetchError};
