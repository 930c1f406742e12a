//! pm2 process list: the record model and the polling cache built on it
pub mod cache;
pub mod model;

pub use cache::ProcessListCache;
pub use model::{parse_jlist, ProcessRecord, ProcessSnapshot, ProcessStatus};
