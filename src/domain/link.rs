//! Session link parsing.
//!
//! Accepted forms:
//! - `wc:<topic>@1?bridge=<url>&key=<hex>`
//! - `wc:<topic>@2?relay-protocol=<name>&symKey=<hex>`
//! - any `<scheme>://...?uri=<percent-encoded wc link>` wrapper around either.
//!
//! An optional `chainId` query parameter becomes the session's chain hint.

use thiserror::Error;
use url::Url;

use super::request::SessionDescriptor;

const SESSION_SCHEME: &str = "wc";
const KEY_LEN: usize = 32;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LinkError {
    #[error("not a url: {0}")]
    Malformed(#[from] url::ParseError),
    #[error("unsupported scheme: {0}")]
    Scheme(String),
    #[error("missing session topic")]
    Topic,
    #[error("unsupported protocol version: {0}")]
    Version(String),
    #[error("missing query parameter: {0}")]
    MissingParam(&'static str),
    #[error("invalid key")]
    Key,
    #[error("invalid chain id: {0}")]
    ChainId(String),
}

/// Parse pasteboard text into a session descriptor.
pub fn parse_session_link(text: &str) -> Result<SessionDescriptor, LinkError> {
    let url = Url::parse(text.trim())?;
    if url.scheme() == SESSION_SCHEME {
        return parse_wc(&url);
    }
    let inner = query_param(&url, "uri").ok_or_else(|| LinkError::Scheme(url.scheme().to_string()))?;
    let inner = Url::parse(inner.trim())?;
    if inner.scheme() != SESSION_SCHEME {
        return Err(LinkError::Scheme(inner.scheme().to_string()));
    }
    parse_wc(&inner)
}

pub fn is_session_link(text: &str) -> bool {
    parse_session_link(text).is_ok()
}

fn parse_wc(url: &Url) -> Result<SessionDescriptor, LinkError> {
    let (topic, version) = url.path().split_once('@').ok_or(LinkError::Topic)?;
    if topic.is_empty() || topic.contains(char::is_whitespace) {
        return Err(LinkError::Topic);
    }

    let chain_hint = match query_param(url, "chainId") {
        Some(value) => Some(
            value
                .parse::<u64>()
                .map_err(|_| LinkError::ChainId(value.clone()))?,
        ),
        None => None,
    };

    let mut session = SessionDescriptor::for_topic(topic);
    session.chain_hint = chain_hint;

    match version {
        "1" => {
            session.version = 1;
            let bridge = query_param(url, "bridge").ok_or(LinkError::MissingParam("bridge"))?;
            Url::parse(&bridge)?;
            session.bridge = Some(bridge);
            session.key = parse_key(query_param(url, "key"), "key")?;
        }
        "2" => {
            session.version = 2;
            session.relay_protocol = Some(
                query_param(url, "relay-protocol").ok_or(LinkError::MissingParam("relay-protocol"))?,
            );
            session.key = parse_key(query_param(url, "symKey"), "symKey")?;
        }
        other => return Err(LinkError::Version(other.to_string())),
    }

    Ok(session)
}

fn parse_key(value: Option<String>, name: &'static str) -> Result<String, LinkError> {
    let value = value.ok_or(LinkError::MissingParam(name))?;
    match hex::decode(&value) {
        Ok(bytes) if bytes.len() == KEY_LEN => Ok(value.to_lowercase()),
        _ => Err(LinkError::Key),
    }
}

fn query_param(url: &Url, name: &str) -> Option<String> {
    url.query_pairs()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}
