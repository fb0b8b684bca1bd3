//! Primary-chain failover keyed to a vault's security level

mod manager;

pub use manager::{
    FailoverDecision,
    FailoverManager,
    FailoverOptions,
    FailoverOutcome,
    FailoverStrategy,
    Suspension,
    PROTOCOL_TAG,
};
