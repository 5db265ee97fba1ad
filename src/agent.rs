//! The agent: routes external requests to flows, gated by authentication.
//!
//! All state lives here and is touched from one loop. Suspending work
//! (biometric checks, session connects) is kept as futures that resolve into
//! [`Action`]s handled on the same loop.

use std::{collections::HashMap, sync::Arc};

use color_eyre::eyre::Result;
use futures::{FutureExt, StreamExt, future::BoxFuture, stream::FuturesUnordered};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, warn};

use crate::{
    action::Action,
    config::Config,
    domain::{
        auth::{AuthenticationReason, AuthenticationState, BiometricOutcome},
        classify::{OnDone, classify_extension_request},
        dapp_action::{DappAction, SelectAccountAction, SendTransactionAction, SignMessageAction},
        request::{ExtensionRequest, ExternalRequest, SessionDescriptor},
        wallet::{Coin, EthereumChain, Transaction, WalletId, WalletSelection},
    },
    gate::{AuthGate, ChallengeId, GateCommand, GateStep, Resolution},
    infra::{
        biometrics::Authenticator, credentials::CredentialStore, pasteboard::RequestSource,
        sessions::{ConnectError, SessionConnector},
    },
    surface::{Browser, Flow, FlowId, FlowOutcome, Presenter},
};

/// Everything the agent talks to.
pub struct Collaborators {
    pub source: Box<dyn RequestSource>,
    pub authenticator: Box<dyn Authenticator>,
    pub credentials: Box<dyn CredentialStore>,
    pub sessions: Box<dyn SessionConnector>,
    pub presenter: Box<dyn Presenter>,
}

/// What happens once a challenge resolves.
#[derive(Debug)]
enum ChallengePurpose {
    Startup {
        request: Option<ExternalRequest>,
    },
    ApproveMessage {
        action: SignMessageAction,
    },
    ApproveTransaction {
        action: SendTransactionAction,
        transaction: Transaction,
    },
}

#[derive(Debug)]
enum AccountsWiring {
    None,
    Session(SessionDescriptor),
    Action(SelectAccountAction),
}

/// What happens once a presented flow reports its outcome.
#[derive(Debug)]
enum FlowContinuation {
    Welcome { request: Option<ExternalRequest> },
    Password { challenge: ChallengeId },
    Accounts(AccountsWiring),
    Connecting,
    ApproveMessage(SignMessageAction),
    ApproveTransaction(SendTransactionAction),
    Error,
    StatusMenu,
}

/// Cloneable sender for feeding the agent from other tasks.
#[derive(Debug, Clone)]
pub struct AgentHandle {
    action_tx: UnboundedSender<Action>,
}

impl AgentHandle {
    pub fn send(&self, action: Action) -> Result<()> {
        self.action_tx.send(action)?;
        Ok(())
    }

    pub fn open(&self) -> Result<()> {
        self.send(Action::Open)
    }

    pub fn submit_extension_request(&self, request: ExtensionRequest) -> Result<()> {
        self.send(Action::Extension(request))
    }

    pub fn finish_flow(&self, flow: FlowId, outcome: FlowOutcome) -> Result<()> {
        self.send(Action::FlowFinished { flow, outcome })
    }

    pub fn quit(&self) -> Result<()> {
        self.send(Action::Quit)
    }
}

pub struct Agent {
    config: Config,
    state: AuthenticationState,
    gate: AuthGate<ChallengePurpose>,
    flows: HashMap<FlowId, FlowContinuation>,
    next_flow: u64,
    setup_flow: Option<FlowId>,
    status_item_blocked: bool,
    should_quit: bool,
    action_tx: UnboundedSender<Action>,
    action_rx: UnboundedReceiver<Action>,
    in_flight: FuturesUnordered<BoxFuture<'static, Action>>,
    source: Box<dyn RequestSource>,
    authenticator: Box<dyn Authenticator>,
    credentials: Box<dyn CredentialStore>,
    sessions: Box<dyn SessionConnector>,
    presenter: Box<dyn Presenter>,
}

impl Agent {
    pub fn new(config: Config, collaborators: Collaborators) -> Self {
        let (action_tx, action_rx) = mpsc::unbounded_channel();
        let Collaborators {
            source,
            authenticator,
            credentials,
            sessions,
            presenter,
        } = collaborators;
        Self {
            config,
            state: AuthenticationState::new(),
            gate: AuthGate::new(),
            flows: HashMap::new(),
            next_flow: 0,
            setup_flow: None,
            status_item_blocked: false,
            should_quit: false,
            action_tx,
            action_rx,
            in_flight: FuturesUnordered::new(),
            source,
            authenticator,
            credentials,
            sessions,
            presenter,
        }
    }

    pub fn handle(&self) -> AgentHandle {
        AgentHandle {
            action_tx: self.action_tx.clone(),
        }
    }

    pub fn state(&self) -> &AuthenticationState {
        &self.state
    }

    /// Flows presented and still waiting for an outcome.
    pub fn open_flows(&self) -> usize {
        self.flows.len()
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    /// Process queued actions and finished futures until nothing is ready.
    pub fn settle(&mut self) {
        loop {
            if let Ok(action) = self.action_rx.try_recv() {
                self.handle_action(action);
                continue;
            }
            match self.in_flight.next().now_or_never() {
                Some(Some(action)) => self.handle_action(action),
                _ => break,
            }
        }
    }

    pub async fn run(&mut self) -> Result<()> {
        self.action_tx.send(Action::Open)?;
        info!("Agent started");

        loop {
            tokio::select! {
                Some(action) = self.action_rx.recv() => self.handle_action(action),
                Some(action) = self.in_flight.next(), if !self.in_flight.is_empty() => {
                    self.handle_action(action)
                }
                else => break,
            }

            if self.should_quit {
                break;
            }
        }

        info!("Agent stopped");
        Ok(())
    }

    pub fn handle_action(&mut self, action: Action) {
        debug!("Handling action: {}", action);
        match action {
            Action::Open => {
                let request = self.source.poll_pending_request();
                self.show_initial_screen(request);
            }
            Action::StatusItemClicked => {
                if self.status_item_blocked {
                    debug!("Status item is blocked");
                    return;
                }
                match self.source.poll_pending_request() {
                    Some(request) => self.show_initial_screen(Some(request)),
                    None => {
                        self.present(Flow::StatusMenu, FlowContinuation::StatusMenu);
                    }
                }
            }
            Action::SetStatusItemBlocked(blocked) => {
                self.status_item_blocked = blocked;
            }
            Action::ShowInitialScreen(request) => self.show_initial_screen(request),
            Action::Extension(request) => {
                self.show_initial_screen(Some(ExternalRequest::Extension(request)))
            }
            Action::FlowFinished { flow, outcome } => self.finish_flow(flow, outcome),
            Action::BiometricFinished { challenge, outcome } => {
                self.biometric_finished(challenge, outcome)
            }
            Action::ConnectFinished { flow, result } => self.connect_finished(flow, result),
            Action::ReturnToBrowser(browser) => self.return_to_browser(browser),
            Action::Quit => {
                self.should_quit = true;
            }
        }
    }

    /// Route `request` (or the deferred one) to a flow, authenticating first
    /// when needed.
    pub fn show_initial_screen(&mut self, request: Option<ExternalRequest>) {
        if self.gate.startup_pending() || self.setup_flow.is_some() {
            if let Some(request) = request {
                info!("Deferring {} request until unlocked", request.kind());
                if let Some(replaced) = self.state.defer(request) {
                    debug!("Discarded earlier deferred {} request", replaced.kind());
                }
            }
            return;
        }

        self.state.has_stored_credential =
            self.state.has_stored_credential || self.credentials.has_stored_credential();
        if !self.state.has_stored_credential {
            let flow = self.present(Flow::Welcome, FlowContinuation::Welcome { request });
            self.setup_flow = Some(flow);
            return;
        }

        if !self.state.authenticated_on_start {
            self.authenticate(
                true,
                AuthenticationReason::Start,
                ChallengePurpose::Startup { request },
            );
            return;
        }

        let request = request.or_else(|| self.state.deferred_request.take());
        self.state.deferred_request = None;

        match request {
            Some(ExternalRequest::Extension(request)) => self.process_extension_request(request),
            Some(ExternalRequest::SessionLink(session)) => {
                let preferred_chain = session.chain_hint.and_then(EthereumChain::from_id);
                self.present(
                    Flow::AccountsList {
                        selects_wallet: true,
                        preferred_chain,
                    },
                    FlowContinuation::Accounts(AccountsWiring::Session(session)),
                );
            }
            None => {
                self.present(
                    Flow::AccountsList {
                        selects_wallet: false,
                        preferred_chain: None,
                    },
                    FlowContinuation::Accounts(AccountsWiring::None),
                );
            }
        }
    }

    pub fn show_error_message(&mut self, message: impl Into<String>) {
        self.present(
            Flow::Error {
                message: message.into(),
            },
            FlowContinuation::Error,
        );
    }

    fn present(&mut self, flow: Flow, continuation: FlowContinuation) -> FlowId {
        self.next_flow += 1;
        let id = FlowId(self.next_flow);
        debug!("Presenting {} as {}", flow, id);
        self.flows.insert(id, continuation);
        self.presenter.present(id, flow);
        id
    }

    /// Hand focus back to the browser once nothing else waits on the user.
    /// Open flows and running challenges are left alone; the last one to
    /// finish brings the browser back.
    fn return_to_browser(&mut self, activate: Option<Browser>) {
        if !self.flows.is_empty() || self.gate.is_busy() {
            debug!(
                "Staying in front: {} flows open, challenge running: {}",
                self.flows.len(),
                self.gate.is_busy()
            );
            return;
        }
        self.presenter.close_all(activate);
    }

    fn finish_flow(&mut self, id: FlowId, outcome: FlowOutcome) {
        let Some(continuation) = self.flows.remove(&id) else {
            warn!("Outcome {} for unknown flow {}", outcome, id);
            return;
        };
        self.presenter.close(id);
        if self.setup_flow == Some(id) {
            self.setup_flow = None;
        }
        debug!("Flow {} finished: {}", id, outcome);

        match (continuation, outcome) {
            (FlowContinuation::Welcome { request }, FlowOutcome::PasswordCreated(true)) => {
                info!("Credential created");
                self.state.credential_created();
                self.show_initial_screen(request);
            }
            (FlowContinuation::Password { challenge }, FlowOutcome::PasswordEntered(success)) => {
                if let Some(resolution) =
                    self.gate
                        .password_finished(&mut self.state, challenge, success)
                {
                    self.challenge_resolved(resolution);
                }
            }
            (FlowContinuation::Accounts(wiring), FlowOutcome::WalletSelected(selection)) => {
                self.wallet_selected(wiring, selection)
            }
            (FlowContinuation::ApproveMessage(action), FlowOutcome::MessageReviewed(true)) => {
                let reason = action.subject.as_authentication_reason();
                self.authenticate(false, reason, ChallengePurpose::ApproveMessage { action });
            }
            (
                FlowContinuation::ApproveTransaction(action),
                FlowOutcome::TransactionReviewed(Some(transaction)),
            ) => {
                self.authenticate(
                    false,
                    AuthenticationReason::SendTransaction,
                    ChallengePurpose::ApproveTransaction {
                        action,
                        transaction,
                    },
                );
            }
            (continuation, outcome) => {
                if !is_refusal(&outcome) {
                    warn!("Unexpected outcome {} for flow {}", outcome, id);
                }
                self.cancel_flow(continuation);
            }
        }
    }

    /// The flow ended without a usable answer.
    fn cancel_flow(&mut self, continuation: FlowContinuation) {
        match continuation {
            FlowContinuation::Welcome { request } => self.state.defer_if_empty(request),
            FlowContinuation::Password { challenge } => {
                if let Some(resolution) =
                    self.gate
                        .password_finished(&mut self.state, challenge, false)
                {
                    self.challenge_resolved(resolution);
                }
            }
            FlowContinuation::Accounts(AccountsWiring::Action(action)) => {
                action.completion.complete(WalletSelection::default())
            }
            FlowContinuation::ApproveMessage(action) => action.completion.complete(false),
            FlowContinuation::ApproveTransaction(action) => action.completion.complete(None),
            FlowContinuation::Accounts(_)
            | FlowContinuation::Connecting
            | FlowContinuation::Error
            | FlowContinuation::StatusMenu => {}
        }
    }

    fn authenticate(
        &mut self,
        on_start: bool,
        reason: AuthenticationReason,
        purpose: ChallengePurpose,
    ) {
        let biometrics = self.biometrics_available();
        let (id, command) = self
            .gate
            .request(&mut self.state, on_start, reason, purpose, biometrics);
        debug!("Requested challenge {:?} for {}", id, reason);
        if let Some(command) = command {
            self.run_gate_command(command);
        }
    }

    fn biometrics_available(&self) -> bool {
        self.config.biometrics && self.authenticator.can_evaluate()
    }

    fn run_gate_command(&mut self, command: GateCommand) {
        match command {
            GateCommand::Evaluate { id, reason } => {
                let evaluation = self.authenticator.evaluate(reason);
                self.in_flight.push(
                    evaluation
                        .map(move |outcome| Action::BiometricFinished {
                            challenge: id,
                            outcome,
                        })
                        .boxed(),
                );
            }
            GateCommand::PromptPassword { id, reason } => {
                self.present(
                    Flow::PasswordEntry { reason },
                    FlowContinuation::Password { challenge: id },
                );
            }
        }
    }

    fn biometric_finished(&mut self, challenge: ChallengeId, outcome: BiometricOutcome) {
        if !outcome.is_success() {
            info!("Biometric check did not pass: {}", outcome);
        }
        match self
            .gate
            .biometric_finished(&mut self.state, challenge, outcome.is_success())
        {
            Some(GateStep::Command(command)) => self.run_gate_command(command),
            Some(GateStep::Resolved(resolution)) => self.challenge_resolved(resolution),
            None => {}
        }
    }

    fn challenge_resolved(&mut self, resolution: Resolution<ChallengePurpose>) {
        let success = resolution.success;
        match resolution.purpose {
            ChallengePurpose::Startup { request } => {
                if success {
                    info!("Unlocked");
                    self.state.authenticated_on_start = true;
                    self.show_initial_screen(request);
                    if self.config.restart_sessions_on_unlock {
                        self.sessions.restart_sessions();
                    }
                } else {
                    warn!("Startup authentication failed");
                    self.state.defer_if_empty(request);
                }
            }
            ChallengePurpose::ApproveMessage { action } => action.completion.complete(success),
            ChallengePurpose::ApproveTransaction {
                action,
                transaction,
            } => action.completion.complete(success.then_some(transaction)),
        }

        let biometrics = self.biometrics_available();
        if let Some(command) = self.gate.start_next(&mut self.state, biometrics) {
            self.run_gate_command(command);
        }
    }

    fn process_extension_request(&mut self, request: ExtensionRequest) {
        let action_tx = self.action_tx.clone();
        let on_done: OnDone = Arc::new(move || {
            let _ = action_tx.send(Action::ReturnToBrowser(Some(Browser::Safari)));
        });
        let action = classify_extension_request(request, self.config.default_chain, on_done);
        info!("Extension request resolved to {}", action.name());
        self.dispatch(action);
    }

    fn dispatch(&mut self, action: DappAction) {
        match action {
            DappAction::None => {}
            DappAction::JustShowApp => {
                self.present(
                    Flow::AccountsList {
                        selects_wallet: false,
                        preferred_chain: None,
                    },
                    FlowContinuation::Accounts(AccountsWiring::None),
                );
            }
            DappAction::SelectAccount(action) | DappAction::SwitchAccount(action) => {
                self.present(
                    Flow::AccountsList {
                        selects_wallet: true,
                        preferred_chain: None,
                    },
                    FlowContinuation::Accounts(AccountsWiring::Action(action)),
                );
            }
            DappAction::ApproveMessage(action) => {
                let flow = Flow::ApproveMessage {
                    subject: action.subject,
                    meta: action.meta.clone(),
                    account: action.account.clone(),
                    peer: action.peer.clone(),
                };
                self.present(flow, FlowContinuation::ApproveMessage(action));
            }
            DappAction::ApproveTransaction(action) => {
                let flow = Flow::ApproveTransaction {
                    transaction: action.transaction.clone(),
                    chain: action.chain,
                    peer: action.peer.clone(),
                };
                self.present(flow, FlowContinuation::ApproveTransaction(action));
            }
        }
    }

    fn wallet_selected(&mut self, wiring: AccountsWiring, selection: WalletSelection) {
        match wiring {
            AccountsWiring::None => {}
            AccountsWiring::Action(action) => action.completion.complete(selection),
            AccountsWiring::Session(session) => match selection {
                WalletSelection {
                    chain: Some(chain),
                    wallet: Some(wallet),
                    account: Some(account),
                } if account.coin == Coin::Ethereum => {
                    self.connect_wallet(session, chain.id(), wallet)
                }
                _ => {
                    debug!("No Ethereum account picked for session {}", session.topic);
                    self.return_to_browser(None)
                }
            },
        }
    }

    fn connect_wallet(&mut self, session: SessionDescriptor, chain_id: u64, wallet: WalletId) {
        info!(
            "Connecting session {} on chain {} with wallet {}",
            session.topic, chain_id, wallet
        );
        let flow = self.present(Flow::Connecting, FlowContinuation::Connecting);
        let connection = self.sessions.connect(&session, chain_id, &wallet);
        self.in_flight.push(
            connection
                .map(move |result| Action::ConnectFinished { flow, result })
                .boxed(),
        );
    }

    fn connect_finished(&mut self, flow: FlowId, result: Result<(), ConnectError>) {
        let visible = self.presenter.is_visible(flow);
        self.flows.remove(&flow);
        match result {
            Ok(()) if visible => {
                self.presenter.close(flow);
                self.return_to_browser(self.config.browser);
            }
            Ok(()) => debug!("Connected after flow {} was closed", flow),
            Err(e) => {
                warn!("Connecting failed: {}", e);
                if visible {
                    self.presenter.close(flow);
                }
                self.show_error_message(e.to_string());
            }
        }
    }
}

fn is_refusal(outcome: &FlowOutcome) -> bool {
    matches!(
        outcome,
        FlowOutcome::Dismissed
            | FlowOutcome::PasswordCreated(false)
            | FlowOutcome::MessageReviewed(false)
            | FlowOutcome::TransactionReviewed(None)
    )
}
