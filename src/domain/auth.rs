use serde::{Deserialize, Serialize};
use strum::Display;

use super::request::ExternalRequest;

/// Why the user is being asked to authenticate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum AuthenticationReason {
    Start,
    SendTransaction,
    SignMessage,
    SignPersonalMessage,
    SignTypedData,
}

impl AuthenticationReason {
    /// Prompt shown by the biometric dialog and the password flow.
    pub fn title(&self) -> &'static str {
        match self {
            AuthenticationReason::Start => "unlock the wallet",
            AuthenticationReason::SendTransaction => "send a transaction",
            AuthenticationReason::SignMessage => "sign a message",
            AuthenticationReason::SignPersonalMessage => "sign a personal message",
            AuthenticationReason::SignTypedData => "sign typed data",
        }
    }
}

/// Kind of payload a message approval is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "snake_case")]
pub enum ApprovalSubject {
    SignMessage,
    SignPersonalMessage,
    SignTypedData,
}

impl ApprovalSubject {
    pub fn as_authentication_reason(&self) -> AuthenticationReason {
        match self {
            ApprovalSubject::SignMessage => AuthenticationReason::SignMessage,
            ApprovalSubject::SignPersonalMessage => AuthenticationReason::SignPersonalMessage,
            ApprovalSubject::SignTypedData => AuthenticationReason::SignTypedData,
        }
    }
}

/// Result of a biometric evaluation. Everything but `Success` is eligible for
/// the password fallback; the variants only differ in what gets logged.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum BiometricOutcome {
    Success,
    Failed,
    Cancelled,
    Error(String),
}

impl BiometricOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, BiometricOutcome::Success)
    }
}

/// Process-wide authentication state, owned by the agent.
#[derive(Debug, Default)]
pub struct AuthenticationState {
    /// Last answer from the credential store.
    pub has_stored_credential: bool,
    /// A challenge (startup or approval) is being evaluated.
    pub challenge_in_flight: bool,
    /// At least one challenge has finished since launch.
    pub challenge_completed_once: bool,
    /// The user has authenticated since launch, either by creating a
    /// credential or by passing the startup challenge.
    pub authenticated_on_start: bool,
    /// Request that arrived while the agent could not route it yet.
    pub deferred_request: Option<ExternalRequest>,
}

impl AuthenticationState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `request` for later, replacing whatever was deferred before.
    /// Returns the request it replaced.
    pub fn defer(&mut self, request: ExternalRequest) -> Option<ExternalRequest> {
        self.deferred_request.replace(request)
    }

    /// Store `request` only if nothing is deferred yet.
    pub fn defer_if_empty(&mut self, request: Option<ExternalRequest>) {
        if self.deferred_request.is_none() {
            self.deferred_request = request;
        }
    }

    /// Mark the user as authenticated after creating a credential.
    pub fn credential_created(&mut self) {
        self.has_stored_credential = true;
        self.authenticated_on_start = true;
        self.challenge_completed_once = true;
    }
}
