/*!
# Recovery

Classification of chain failures into the shared error taxonomy, and the
recovery path each category maps onto.

| Category | Retryable | Recovery |
|---|---|---|
| NETWORK | always | RETRY |
| RPC | transient only | ALTERNATE_RPC |
| CROSS_CHAIN | no | FALLBACK_CHAIN |
| CONTRACT, VALIDATION | no | MANUAL_RESOLUTION |
| others | no | NONE |

Typed [`ChainClientError`](crate::rpc::ChainClientError) variants carry their
category directly. Only untyped failures fall back to keyword matching.
*/

mod classifier;

pub use classifier::{
    BlockchainError,
    ClientSafeError,
    ErrorCategory,
    ErrorClassifier,
    RecoveryStrategy,
};
