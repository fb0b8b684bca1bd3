//! Chain health: cached per-chain snapshots and the background poll loop

mod monitor;
mod poller;

pub use monitor::{ChainHealthMonitor, ChainHealthStatus};
pub use poller::HealthPoller;
