//! Actions a dapp request resolves to, and the one-shot completions that carry
//! each outcome back to whoever asked.

use std::fmt;

use tokio::sync::oneshot;

use super::{
    auth::ApprovalSubject,
    request::{PeerMeta, Web3Provider},
    wallet::{Account, EthereumChain, Transaction, WalletSelection},
};

/// Value a completion delivers when it is dropped without being completed.
pub trait Rejection {
    fn rejection() -> Self;
}

impl Rejection for bool {
    fn rejection() -> Self {
        false
    }
}

impl<T> Rejection for Option<T> {
    fn rejection() -> Self {
        None
    }
}

type Sink<T> = Box<dyn FnOnce(T) + Send>;

/// A one-shot outcome sink.
///
/// `complete` consumes the completion. Dropping it without completing sends
/// `T::rejection()` instead, so the sink fires exactly once whatever path the
/// owning flow takes.
pub struct Completion<T: Rejection> {
    sink: Option<Sink<T>>,
}

impl<T: Rejection> Completion<T> {
    pub fn new(sink: impl FnOnce(T) + Send + 'static) -> Self {
        Self {
            sink: Some(Box::new(sink)),
        }
    }

    pub fn complete(mut self, value: T) {
        if let Some(sink) = self.sink.take() {
            sink(value);
        }
    }
}

impl<T: Rejection + Send + 'static> Completion<T> {
    /// Completion paired with a receiver for its single value.
    pub fn channel() -> (Self, oneshot::Receiver<T>) {
        let (tx, rx) = oneshot::channel();
        let completion = Self::new(move |value| {
            let _ = tx.send(value);
        });
        (completion, rx)
    }
}

impl<T: Rejection> Drop for Completion<T> {
    fn drop(&mut self) {
        if let Some(sink) = self.sink.take() {
            sink(T::rejection());
        }
    }
}

impl<T: Rejection> fmt::Debug for Completion<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completion")
            .field("pending", &self.sink.is_some())
            .finish()
    }
}

#[derive(Debug)]
pub struct SelectAccountAction {
    pub provider: Web3Provider,
    pub completion: Completion<WalletSelection>,
}

#[derive(Debug)]
pub struct SignMessageAction {
    pub provider: Web3Provider,
    pub subject: ApprovalSubject,
    pub account: Account,
    /// Text shown to the user for the message being signed.
    pub meta: String,
    pub peer: PeerMeta,
    pub completion: Completion<bool>,
}

#[derive(Debug)]
pub struct SendTransactionAction {
    pub provider: Web3Provider,
    pub transaction: Transaction,
    pub chain: EthereumChain,
    pub account: Account,
    pub peer: PeerMeta,
    pub completion: Completion<Option<Transaction>>,
}

/// What an extension request asks the agent to do.
#[derive(Debug)]
pub enum DappAction {
    None,
    JustShowApp,
    SwitchAccount(SelectAccountAction),
    SelectAccount(SelectAccountAction),
    ApproveMessage(SignMessageAction),
    ApproveTransaction(SendTransactionAction),
}

impl DappAction {
    pub fn name(&self) -> &'static str {
        match self {
            DappAction::None => "none",
            DappAction::JustShowApp => "just_show_app",
            DappAction::SwitchAccount(_) => "switch_account",
            DappAction::SelectAccount(_) => "select_account",
            DappAction::ApproveMessage(_) => "approve_message",
            DappAction::ApproveTransaction(_) => "approve_transaction",
        }
    }
}
