/*!
# Bridge Layer

Directional bridge records keyed by `(source, target)` and the coordinator
that moves assets and messages across them.

Bridge status only changes through [`BridgeRegistry::reevaluate`], which the
health poller drives. A failed transfer never demotes a bridge.

| Bridge | Transfer status | ETA |
|---|---|---|
| ONLINE | PENDING | `now + confirmations * interval` |
| DEGRADED | PENDING_SLOW | same, times the degraded multiplier |
| OFFLINE | rejected | |
*/

mod registry;
mod transfer;

pub use registry::{evaluate_status, BridgeConnection, BridgeRegistry, BridgeStatus, ContractRefs};
pub use transfer::{
    completion_percentage,
    AssetTransferCoordinator,
    AssetTransferRequest,
    MessageRelayRequest,
    TrackedTransfer,
    TransactionVerificationResult,
    TransferKind,
    TransferReceipt,
    TransferStatus,
};
