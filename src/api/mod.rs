/*!
# Service Surface

Transport-neutral handlers for the REST endpoints. Each request body is
parsed from its wire form (chain ids as strings, camelCase fields) and
validated before a component is called. Failures come back as an HTTP
status plus a [`ClientSafeError`](crate::recovery::ClientSafeError).

| Endpoint | Handler |
|---|---|
| `GET /bridge-status` | [`CrossChainService::bridge_statuses`] |
| `GET /bridge-status/{source}/{target}` | [`CrossChainService::bridge_status`] |
| `POST /initialize-bridge` | [`CrossChainService::initialize_bridge`] |
| `POST /test-transfer` | [`CrossChainService::test_transfer`] |
| `POST /verify-bridge-transaction` | [`CrossChainService::verify_bridge_transaction`] |
| `POST /security/create-multisig-request` | [`CrossChainService::create_multisig_request`] |
| `GET /security/multisig-status/{id}` | [`CrossChainService::multisig_status`] |
| `POST /security/submit-signature` | [`CrossChainService::submit_signature`] |
| `GET /security/generate-zk-proof/{id}` | [`CrossChainService::generate_proof`] |
| `POST /cross-chain/verify-vault` | [`CrossChainService::verify_vault`] |
*/

mod requests;
mod service;

pub use requests::{
    CreateMultisig,
    CreateMultisigBody,
    InitializeBridgeBody,
    SubmitSignatureBody,
    TestTransferBody,
    VerifyTransactionBody,
    VerifyVaultBody,
    VerifyVaultOptionsBody,
};
pub use service::{ApiError, ApiResult, CrossChainService};
