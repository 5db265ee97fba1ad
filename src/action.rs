use strum::Display;

use crate::{
    domain::{
        auth::BiometricOutcome,
        request::{ExtensionRequest, ExternalRequest},
    },
    gate::ChallengeId,
    infra::sessions::ConnectError,
    surface::{Browser, FlowId, FlowOutcome},
};

/// Messages processed by the agent loop, one at a time.
#[derive(Debug, Display)]
#[strum(serialize_all = "snake_case")]
pub enum Action {
    /// App launched or reopened: check the pasteboard and show the first screen.
    Open,
    StatusItemClicked,
    SetStatusItemBlocked(bool),
    ShowInitialScreen(Option<ExternalRequest>),
    Extension(ExtensionRequest),
    FlowFinished {
        flow: FlowId,
        outcome: FlowOutcome,
    },
    BiometricFinished {
        challenge: ChallengeId,
        outcome: BiometricOutcome,
    },
    ConnectFinished {
        flow: FlowId,
        result: Result<(), ConnectError>,
    },
    /// A dapp request was answered; close everything and focus the browser.
    ReturnToBrowser(Option<Browser>),
    Quit,
}
