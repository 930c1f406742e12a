//! User actions against pm2 and the notices reporting their outcome
pub mod dispatcher;
pub mod notice;

pub use dispatcher::{build_invocation, new_process_invocation, CommandDispatcher, SupervisorCommand};
pub use notice::{Notice, NoticeKind};
