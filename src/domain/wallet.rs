use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

use super::dapp_action::Rejection;

/// EVM networks the agent can connect a session on.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display, EnumIter,
    EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum EthereumChain {
    #[default]
    Ethereum,
    Optimism,
    Polygon,
    Arbitrum,
    Avalanche,
    Gnosis,
    Bnb,
}

impl EthereumChain {
    pub fn id(&self) -> u64 {
        match self {
            EthereumChain::Ethereum => 1,
            EthereumChain::Optimism => 10,
            EthereumChain::Bnb => 56,
            EthereumChain::Gnosis => 100,
            EthereumChain::Polygon => 137,
            EthereumChain::Avalanche => 43114,
            EthereumChain::Arbitrum => 42161,
        }
    }

    pub fn from_id(id: u64) -> Option<Self> {
        Self::iter().find(|chain| chain.id() == id)
    }
}

/// Coin an account belongs to. Only Ethereum accounts can back a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum Coin {
    Ethereum,
    Solana,
    Near,
    Tezos,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub address: String,
    pub coin: Coin,
}

impl Account {
    pub fn ethereum(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            coin: Coin::Ethereum,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WalletId(pub String);

impl std::fmt::Display for WalletId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// What the accounts list reports back. Every part is optional: closing the
/// list or picking an incomplete row leaves fields empty.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WalletSelection {
    pub chain: Option<EthereumChain>,
    pub wallet: Option<WalletId>,
    pub account: Option<Account>,
}

impl WalletSelection {
    pub fn new(chain: EthereumChain, wallet: WalletId, account: Account) -> Self {
        Self {
            chain: Some(chain),
            wallet: Some(wallet),
            account: Some(account),
        }
    }
}

impl Rejection for WalletSelection {
    fn rejection() -> Self {
        Self::default()
    }
}

/// An unsigned EVM transaction as proposed by a dapp. Quantities stay as the
/// hex strings the dapp sent.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub from: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default)]
    pub data: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_price: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
}
