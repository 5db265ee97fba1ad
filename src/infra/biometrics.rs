use std::{
    collections::VecDeque,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
};

use futures::{FutureExt, future::BoxFuture};
use tokio::sync::oneshot;
use tracing::debug;

use crate::domain::auth::{AuthenticationReason, BiometricOutcome};

/// Local biometric check (fingerprint, face).
pub trait Authenticator {
    fn can_evaluate(&self) -> bool;

    fn evaluate(&self, reason: AuthenticationReason) -> BoxFuture<'static, BiometricOutcome>;
}

/// No biometric hardware; every challenge goes to password entry.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unavailable;

impl Authenticator for Unavailable {
    fn can_evaluate(&self) -> bool {
        false
    }

    fn evaluate(&self, _reason: AuthenticationReason) -> BoxFuture<'static, BiometricOutcome> {
        futures::future::ready(BiometricOutcome::Error("biometrics unavailable".to_string()))
            .boxed()
    }
}

/// Biometric check answered from outside: each evaluation waits until
/// [`PromptAuthenticator::answer`] is called. Evaluations nobody answers
/// resolve as cancelled once the authenticator is dropped.
#[derive(Debug, Clone)]
pub struct PromptAuthenticator {
    available: Arc<AtomicBool>,
    pending: Arc<Mutex<VecDeque<oneshot::Sender<BiometricOutcome>>>>,
    prompts: Arc<Mutex<Vec<AuthenticationReason>>>,
}

impl PromptAuthenticator {
    pub fn new(available: bool) -> Self {
        Self {
            available: Arc::new(AtomicBool::new(available)),
            pending: Arc::new(Mutex::new(VecDeque::new())),
            prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Answer the oldest waiting evaluation. Returns false if none is waiting.
    pub fn answer(&self, outcome: BiometricOutcome) -> bool {
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        while let Some(tx) = pending.pop_front() {
            if tx.send(outcome.clone()).is_ok() {
                return true;
            }
        }
        false
    }

    pub fn waiting(&self) -> usize {
        self.pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|tx| !tx.is_closed())
            .count()
    }

    /// Reasons of every evaluation started so far.
    pub fn prompts(&self) -> Vec<AuthenticationReason> {
        self.prompts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl Authenticator for PromptAuthenticator {
    fn can_evaluate(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    fn evaluate(&self, reason: AuthenticationReason) -> BoxFuture<'static, BiometricOutcome> {
        debug!("Biometric prompt: {}", reason.title());
        self.prompts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(reason);
        let (tx, rx) = oneshot::channel();
        self.pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(tx);
        async move { rx.await.unwrap_or(BiometricOutcome::Cancelled) }.boxed()
    }
}
