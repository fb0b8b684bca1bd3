/*!
# Chain RPC

The narrow interface the protocol needs from each chain's RPC endpoint,
together with the machinery every caller wraps it in:

- [`ChainClient`]: capability trait, one implementation per chain
- [`ChainClientSet`]: lookup of the client serving a chain
- [`FakeChainClient`]: deterministic in-memory client for tests
- [`with_retry`]: per-attempt timeout plus bounded exponential backoff
- [`run_windowed`]: bounded-concurrency fan-out over chains
*/

mod batch;
mod client;
mod error;
mod fake;
mod retry;

pub use batch::run_windowed;
pub use client::{ChainClient, ChainClientSet, ChainHealthReport, EntityKind, EntityRecord};
#[cfg(test)]
pub use client::MockChainClient;
pub use error::ChainClientError;
pub use fake::FakeChainClient;
pub use retry::{with_retry, DefaultRetryPolicy, RetryConfig, RetryMetrics, RetryPolicy};
