//! Requests that reach the agent from outside: session links and extension
//! bridge messages.

use serde::{Deserialize, Serialize};
use strum::Display;
use tokio::sync::oneshot;
use tracing::debug;

use super::wallet::Transaction;

/// A unit of work from outside the agent. Absence of a request is `None` at
/// the call sites.
#[derive(Debug)]
pub enum ExternalRequest {
    SessionLink(SessionDescriptor),
    Extension(ExtensionRequest),
}

impl ExternalRequest {
    pub fn kind(&self) -> &'static str {
        match self {
            ExternalRequest::SessionLink(_) => "session_link",
            ExternalRequest::Extension(_) => "extension",
        }
    }
}

/// Metadata a dapp sends about itself.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerMeta {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon_url: Option<String>,
}

/// Everything needed to later establish a session connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionDescriptor {
    pub topic: String,
    pub version: u8,
    /// Bridge server (v1 sessions).
    pub bridge: Option<String>,
    /// Relay protocol (v2 sessions).
    pub relay_protocol: Option<String>,
    /// Hex-encoded symmetric key.
    pub key: String,
    /// Chain the dapp asked for, if the link carried one.
    pub chain_hint: Option<u64>,
}

impl SessionDescriptor {
    /// Bare descriptor with only a topic set.
    pub fn for_topic(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            version: 2,
            bridge: None,
            relay_protocol: None,
            key: String::new(),
            chain_hint: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Web3Provider {
    #[default]
    Ethereum,
    Solana,
    Near,
    Tezos,
    Unknown,
}

/// The call an extension request carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "name",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum ExtensionMethod {
    RequestAccounts,
    SwitchAccount,
    SwitchEthereumChain { chain_id: u64 },
    SignMessage { data: String },
    SignPersonalMessage { data: String },
    SignTypedData { data: String },
    SendTransaction { transaction: Transaction },
    ShowApp,
}

/// Answer delivered back to the extension bridge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "result",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum ExtensionResponse {
    Accounts { chain_id: u64, addresses: Vec<String> },
    Approved,
    Transaction { transaction: Transaction },
    Cancelled,
    Error { message: String },
}

/// One-shot channel back to the extension bridge.
#[derive(Debug, Default)]
pub struct Responder(Option<oneshot::Sender<ExtensionResponse>>);

impl Responder {
    pub fn channel() -> (Self, oneshot::Receiver<ExtensionResponse>) {
        let (tx, rx) = oneshot::channel();
        (Self(Some(tx)), rx)
    }

    pub fn send(mut self, response: ExtensionResponse) {
        match self.0.take() {
            Some(tx) => {
                if tx.send(response).is_err() {
                    debug!("Extension bridge stopped listening");
                }
            }
            None => debug!("Extension request has no responder: {:?}", response),
        }
    }
}

/// A request handed in by the browser extension bridge, already parsed.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtensionRequest {
    pub id: u64,
    #[serde(default)]
    pub provider: Web3Provider,
    pub method: ExtensionMethod,
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub peer: PeerMeta,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<u64>,
    #[serde(skip)]
    pub responder: Responder,
}

impl ExtensionRequest {
    pub fn new(id: u64, method: ExtensionMethod) -> Self {
        Self {
            id,
            provider: Web3Provider::Ethereum,
            method,
            host: String::new(),
            peer: PeerMeta::default(),
            address: None,
            chain_id: None,
            responder: Responder::default(),
        }
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Attach a fresh responder and return the receiving end.
    pub fn with_responder(mut self) -> (Self, oneshot::Receiver<ExtensionResponse>) {
        let (responder, rx) = Responder::channel();
        self.responder = responder;
        (self, rx)
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    pub fn with_chain_id(mut self, chain_id: u64) -> Self {
        self.chain_id = Some(chain_id);
        self
    }
}
