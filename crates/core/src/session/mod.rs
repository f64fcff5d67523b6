pub use session::{SessionCommand, SessionInfo, SessionSpec, SessionState};
pub use supervisor::{ActiveTargets, Supervisor};

#[allow(clippy::module_inception)]
mod session;
mod supervisor;
