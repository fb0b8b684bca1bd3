//! # Chains
//!
//! The closed set of supported chains, the roles they hold and the security
//! levels vaults are configured with. Parsing any identifier outside the set
//! fails with a validation error, which is how malformed chain names are kept
//! out of the rest of the crate.

mod types;
mod roles;

pub use types::{Chain, ChainPair, ChainRole, SecurityLevel};
pub use roles::RoleAssignment;
