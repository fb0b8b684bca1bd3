/*!
# Chain Types

Identifiers shared by every component: the supported chain set, the roles a
chain can hold for a vault, and the security levels a vault can be configured
with.

Chain identifiers are a closed enum. Anything outside the five supported
chains is rejected when parsed, so no component ever sees an unknown chain.

```rust
use crossvault_protocol::chain::Chain;

let chain: Chain = "SOL".parse().unwrap();
assert_eq!(chain, Chain::Sol);
assert_eq!(chain.default_confirmations(), 32);
assert!("DOGE".parse::<Chain>().is_err());
```
*/

use std::fmt;
use std::str::FromStr;
use serde::{Serialize, Deserialize};

use crate::error::Error;

/// Supported chains
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Chain {
    Eth,
    Sol,
    Ton,
    Btc,
    Polygon,
}

impl Chain {
    /// Every supported chain, in declaration order
    pub const ALL: [Chain; 5] = [Chain::Eth, Chain::Sol, Chain::Ton, Chain::Btc, Chain::Polygon];

    pub fn as_str(&self) -> &'static str {
        match self {
            Chain::Eth => "ETH",
            Chain::Sol => "SOL",
            Chain::Ton => "TON",
            Chain::Btc => "BTC",
            Chain::Polygon => "POLYGON",
        }
    }

    /// Confirmations a transfer targeting this chain needs before it settles
    pub fn default_confirmations(&self) -> u32 {
        match self {
            Chain::Eth => 12,
            Chain::Sol => 32,
            Chain::Ton => 16,
            Chain::Btc => 6,
            Chain::Polygon => 20,
        }
    }

    /// Expected time between two confirmations, in milliseconds
    pub fn default_confirmation_interval_ms(&self) -> u64 {
        match self {
            Chain::Eth => 12_000,
            Chain::Sol => 400,
            Chain::Ton => 5_000,
            Chain::Btc => 600_000,
            Chain::Polygon => 2_000,
        }
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Chain {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ETH" => Ok(Chain::Eth),
            "SOL" => Ok(Chain::Sol),
            "TON" => Ok(Chain::Ton),
            "BTC" => Ok(Chain::Btc),
            "POLYGON" => Ok(Chain::Polygon),
            _ => Err(Error::Validation(format!("unsupported chain identifier: {:?}", s))),
        }
    }
}

/// Role a chain plays for the vaults it protects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChainRole {
    Primary,
    Secondary,
    Verification,
    Fallback,
}

impl ChainRole {
    /// Lower value wins when choosing a replacement primary
    pub fn priority(&self) -> u8 {
        match self {
            ChainRole::Primary => 0,
            ChainRole::Secondary => 1,
            ChainRole::Verification => 2,
            ChainRole::Fallback => 3,
        }
    }
}

/// Security level a vault is configured with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SecurityLevel {
    Basic,
    Advanced,
    Maximum,
}

impl FromStr for SecurityLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BASIC" => Ok(SecurityLevel::Basic),
            "ADVANCED" => Ok(SecurityLevel::Advanced),
            "MAXIMUM" => Ok(SecurityLevel::Maximum),
            _ => Err(Error::Validation(format!("unknown security level: {:?}", s))),
        }
    }
}

/// Ordered source/target pair keying a bridge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChainPair {
    pub source: Chain,
    pub target: Chain,
}

impl ChainPair {
    pub fn new(source: Chain, target: Chain) -> Self {
        Self { source, target }
    }

    pub fn reversed(&self) -> Self {
        Self::new(self.target, self.source)
    }
}

impl fmt::Display for ChainPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}->{}", self.source, self.target)
    }
}
