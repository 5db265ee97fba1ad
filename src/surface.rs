//! The presentation surface the agent drives. The agent never renders; it asks
//! for a flow to be shown and later receives exactly one [`FlowOutcome`] for it.

use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::domain::{
    auth::{ApprovalSubject, AuthenticationReason},
    request::PeerMeta,
    wallet::{Account, EthereumChain, Transaction, WalletSelection},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FlowId(pub u64);

impl fmt::Display for FlowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum Browser {
    Safari,
    Chrome,
    Firefox,
    Brave,
    Edge,
    Arc,
}

/// A modal flow to present.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum Flow {
    /// First launch: create a password.
    Welcome,
    PasswordEntry {
        reason: AuthenticationReason,
    },
    AccountsList {
        /// Whether picking a wallet does something (connect or answer a dapp).
        selects_wallet: bool,
        /// Chain to preselect, taken from the session link.
        preferred_chain: Option<EthereumChain>,
    },
    Connecting,
    ApproveTransaction {
        transaction: Transaction,
        chain: EthereumChain,
        peer: PeerMeta,
    },
    ApproveMessage {
        subject: ApprovalSubject,
        meta: String,
        account: Account,
        peer: PeerMeta,
    },
    Error {
        message: String,
    },
    StatusMenu,
}

/// What the user did with a presented flow.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum FlowOutcome {
    PasswordCreated(bool),
    PasswordEntered(bool),
    WalletSelected(WalletSelection),
    MessageReviewed(bool),
    TransactionReviewed(Option<Transaction>),
    /// Window closed without an answer.
    Dismissed,
}

pub trait Presenter {
    fn present(&mut self, id: FlowId, flow: Flow);

    fn close(&mut self, id: FlowId);

    /// Close every flow, then hand focus to `activate` (or the frontmost
    /// browser when `None`).
    fn close_all(&mut self, activate: Option<Browser>);

    fn is_visible(&self, id: FlowId) -> bool;
}
