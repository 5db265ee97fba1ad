//! Turns an extension request into a [`DappAction`].
//!
//! Every completion built here answers the extension through the request's
//! responder and then calls `on_done`, which the agent uses to hand focus back
//! to the browser.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, warn};

use super::{
    auth::ApprovalSubject,
    dapp_action::{
        Completion, DappAction, SelectAccountAction, SendTransactionAction, SignMessageAction,
    },
    request::{ExtensionMethod, ExtensionRequest, ExtensionResponse, Responder},
    wallet::{Account, EthereumChain, Transaction, WalletSelection},
};

pub type OnDone = Arc<dyn Fn() + Send + Sync>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ClassifyError {
    #[error("request {0} has no account address")]
    MissingAddress(u64),
    #[error("unsupported chain id: {0}")]
    UnknownChain(u64),
}

/// Validated request, before any completion is attached.
enum Plan {
    SelectAccount,
    SwitchAccount,
    ApproveMessage {
        subject: ApprovalSubject,
        meta: String,
        account: Account,
    },
    ApproveTransaction {
        transaction: Transaction,
        chain: EthereumChain,
        account: Account,
    },
    ShowApp,
}

/// Classify `request`. Requests that cannot be served are answered with an
/// error right away and come back as [`DappAction::None`].
pub fn classify_extension_request(
    request: ExtensionRequest,
    default_chain: EthereumChain,
    on_done: OnDone,
) -> DappAction {
    let ExtensionRequest {
        id,
        provider,
        method,
        host,
        mut peer,
        address,
        chain_id,
        responder,
    } = request;
    if peer.name.is_empty() {
        peer.name = host;
    }
    debug!("Classifying extension request {}: {:?}", id, method);

    let plan = match plan(id, method, address, chain_id, default_chain) {
        Ok(plan) => plan,
        Err(e) => {
            warn!("Rejecting extension request {}: {}", id, e);
            responder.send(ExtensionResponse::Error {
                message: e.to_string(),
            });
            return DappAction::None;
        }
    };

    match plan {
        Plan::SelectAccount => DappAction::SelectAccount(SelectAccountAction {
            provider,
            completion: select_completion(responder, on_done),
        }),
        Plan::SwitchAccount => DappAction::SwitchAccount(SelectAccountAction {
            provider,
            completion: select_completion(responder, on_done),
        }),
        Plan::ApproveMessage {
            subject,
            meta,
            account,
        } => DappAction::ApproveMessage(SignMessageAction {
            provider,
            subject,
            account,
            meta,
            peer,
            completion: message_completion(responder, on_done),
        }),
        Plan::ApproveTransaction {
            transaction,
            chain,
            account,
        } => DappAction::ApproveTransaction(SendTransactionAction {
            provider,
            transaction,
            chain,
            account,
            peer,
            completion: transaction_completion(responder, on_done),
        }),
        Plan::ShowApp => DappAction::JustShowApp,
    }
}

fn plan(
    id: u64,
    method: ExtensionMethod,
    address: Option<String>,
    chain_id: Option<u64>,
    default_chain: EthereumChain,
) -> Result<Plan, ClassifyError> {
    let account = |address: Option<String>| {
        address
            .map(Account::ethereum)
            .ok_or(ClassifyError::MissingAddress(id))
    };
    let plan = match method {
        ExtensionMethod::RequestAccounts => Plan::SelectAccount,
        ExtensionMethod::SwitchAccount | ExtensionMethod::SwitchEthereumChain { .. } => {
            Plan::SwitchAccount
        }
        ExtensionMethod::SignMessage { data } => Plan::ApproveMessage {
            subject: ApprovalSubject::SignMessage,
            meta: data,
            account: account(address)?,
        },
        ExtensionMethod::SignPersonalMessage { data } => Plan::ApproveMessage {
            subject: ApprovalSubject::SignPersonalMessage,
            meta: personal_message_text(&data),
            account: account(address)?,
        },
        ExtensionMethod::SignTypedData { data } => Plan::ApproveMessage {
            subject: ApprovalSubject::SignTypedData,
            meta: data,
            account: account(address)?,
        },
        ExtensionMethod::SendTransaction { transaction } => {
            let chain = match chain_id {
                Some(chain_id) => {
                    EthereumChain::from_id(chain_id).ok_or(ClassifyError::UnknownChain(chain_id))?
                }
                None => default_chain,
            };
            Plan::ApproveTransaction {
                transaction,
                chain,
                account: account(address)?,
            }
        }
        ExtensionMethod::ShowApp => Plan::ShowApp,
    };
    Ok(plan)
}

fn select_completion(responder: Responder, on_done: OnDone) -> Completion<WalletSelection> {
    Completion::new(move |selection: WalletSelection| {
        let response = match selection {
            WalletSelection {
                chain: Some(chain),
                wallet: Some(_),
                account: Some(account),
            } => ExtensionResponse::Accounts {
                chain_id: chain.id(),
                addresses: vec![account.address],
            },
            _ => ExtensionResponse::Cancelled,
        };
        responder.send(response);
        on_done();
    })
}

fn message_completion(responder: Responder, on_done: OnDone) -> Completion<bool> {
    Completion::new(move |approved| {
        responder.send(if approved {
            ExtensionResponse::Approved
        } else {
            ExtensionResponse::Cancelled
        });
        on_done();
    })
}

fn transaction_completion(responder: Responder, on_done: OnDone) -> Completion<Option<Transaction>> {
    Completion::new(move |transaction| {
        responder.send(match transaction {
            Some(transaction) => ExtensionResponse::Transaction { transaction },
            None => ExtensionResponse::Cancelled,
        });
        on_done();
    })
}

/// Personal messages usually arrive hex encoded; show them as text when they
/// decode to UTF-8.
fn personal_message_text(data: &str) -> String {
    data.strip_prefix("0x")
        .and_then(|hex_data| hex::decode(hex_data).ok())
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .unwrap_or_else(|| data.to_string())
}
