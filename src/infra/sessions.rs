use std::sync::{Arc, Mutex};

use futures::{FutureExt, future::BoxFuture};
use thiserror::Error;
use tracing::info;

use crate::domain::{request::SessionDescriptor, wallet::WalletId};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConnectError {
    #[error("session {0} expired")]
    Expired(String),
    #[error("connection failed: {0}")]
    Transport(String),
}

/// Establishes and restores wallet sessions with dapp peers.
pub trait SessionConnector {
    fn connect(
        &self,
        session: &SessionDescriptor,
        chain_id: u64,
        wallet_id: &WalletId,
    ) -> BoxFuture<'static, Result<(), ConnectError>>;

    /// Reconnect sessions persisted by an earlier run.
    fn restart_sessions(&self);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectedSession {
    pub topic: String,
    pub chain_id: u64,
    pub wallet_id: WalletId,
}

#[derive(Debug, Default)]
struct RegistryState {
    connected: Vec<ConnectedSession>,
    restarts: usize,
    fail_with: Option<ConnectError>,
}

/// Keeps connected sessions in memory.
#[derive(Debug, Clone, Default)]
pub struct SessionRegistry {
    state: Arc<Mutex<RegistryState>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following connect fail with `error`.
    pub fn fail_with(&self, error: ConnectError) {
        self.lock().fail_with = Some(error);
    }

    pub fn connected(&self) -> Vec<ConnectedSession> {
        self.lock().connected.clone()
    }

    pub fn restarts(&self) -> usize {
        self.lock().restarts
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl SessionConnector for SessionRegistry {
    fn connect(
        &self,
        session: &SessionDescriptor,
        chain_id: u64,
        wallet_id: &WalletId,
    ) -> BoxFuture<'static, Result<(), ConnectError>> {
        let mut state = self.lock();
        let result = match state.fail_with.clone() {
            Some(error) => Err(error),
            None => {
                info!(
                    "Connected session {} on chain {} with wallet {}",
                    session.topic, chain_id, wallet_id
                );
                state.connected.push(ConnectedSession {
                    topic: session.topic.clone(),
                    chain_id,
                    wallet_id: wallet_id.clone(),
                });
                Ok(())
            }
        };
        futures::future::ready(result).boxed()
    }

    fn restart_sessions(&self) {
        let mut state = self.lock();
        state.restarts += 1;
        info!("Restarting {} sessions", state.connected.len());
    }
}
