use std::collections::BTreeMap;
use serde::{Serialize, Deserialize};

use crate::chain::{Chain, ChainRole, SecurityLevel};
use crate::error::Error;
use crate::Result;

/// Role table mapping chains onto the roles they hold
///
/// Chains absent from the table take no part in failover decisions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleAssignment {
    roles: BTreeMap<Chain, ChainRole>,
}

impl Default for RoleAssignment {
    fn default() -> Self {
        let mut roles = BTreeMap::new();
        roles.insert(Chain::Eth, ChainRole::Primary);
        roles.insert(Chain::Sol, ChainRole::Secondary);
        roles.insert(Chain::Ton, ChainRole::Fallback);
        roles.insert(Chain::Btc, ChainRole::Verification);
        roles.insert(Chain::Polygon, ChainRole::Verification);
        Self { roles }
    }
}

impl RoleAssignment {
    /// Build a table, requiring exactly one primary
    pub fn new(roles: BTreeMap<Chain, ChainRole>) -> Result<Self> {
        let table = Self { roles };
        table.validate()?;
        Ok(table)
    }

    pub fn validate(&self) -> Result<()> {
        let primaries = self.roles.values().filter(|r| **r == ChainRole::Primary).count();
        if primaries != 1 {
            return Err(Error::Config(format!(
                "role table must name exactly one primary chain, found {}",
                primaries
            )));
        }
        Ok(())
    }

    pub fn role_of(&self, chain: Chain) -> Option<ChainRole> {
        self.roles.get(&chain).copied()
    }

    pub fn primary(&self) -> Chain {
        self.chain_by_role(ChainRole::Primary)
            .unwrap_or(Chain::Eth)
    }

    /// First chain (in chain order) holding the role
    pub fn chain_by_role(&self, role: ChainRole) -> Option<Chain> {
        self.roles
            .iter()
            .find(|(_, r)| **r == role)
            .map(|(chain, _)| *chain)
    }

    /// Assigned chains other than `exclude`, best replacement first
    pub fn by_priority(&self, exclude: Chain) -> Vec<Chain> {
        let mut chains: Vec<(Chain, ChainRole)> = self.roles
            .iter()
            .filter(|(chain, _)| **chain != exclude)
            .map(|(chain, role)| (*chain, *role))
            .collect();
        chains.sort_by_key(|(chain, role)| (role.priority(), *chain));
        chains.into_iter().map(|(chain, _)| chain).collect()
    }

    /// Chains a vault at `level` depends on, with `primary` first
    pub fn required_chains(&self, primary: Chain, level: SecurityLevel) -> Vec<Chain> {
        let mut chains = vec![primary];
        if level == SecurityLevel::Basic {
            return chains;
        }
        for (chain, role) in &self.roles {
            if *chain == primary {
                continue;
            }
            let required = match level {
                SecurityLevel::Basic => false,
                SecurityLevel::Advanced => matches!(
                    role,
                    ChainRole::Primary | ChainRole::Secondary | ChainRole::Fallback
                ),
                SecurityLevel::Maximum => true,
            };
            if required {
                chains.push(*chain);
            }
        }
        chains
    }

    /// Promote `new_primary`, demoting the current primary to fallback
    pub fn promote(&mut self, new_primary: Chain) -> Chain {
        let previous = self.primary();
        if previous != new_primary {
            self.roles.insert(previous, ChainRole::Fallback);
            self.roles.insert(new_primary, ChainRole::Primary);
        }
        previous
    }

    pub fn iter(&self) -> impl Iterator<Item = (Chain, ChainRole)> + '_ {
        self.roles.iter().map(|(c, r)| (*c, *r))
    }
}
