//! Integration tests for wallet-agent.
//!
//! Drives a real [`Agent`] with in-memory collaborators:
//! - a recording presenter standing in for the windows
//! - a prompt authenticator answered by the test
//! - in-memory credential store, pasteboard and session registry

pub mod dapp_actions;
pub mod sessions;

use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex},
};

use wallet_agent::{
    action::Action,
    agent::{Agent, Collaborators},
    config::Config,
    domain::auth::BiometricOutcome,
    infra::{
        biometrics::PromptAuthenticator,
        credentials::MemoryCredentialStore,
        pasteboard::{MemoryPasteboard, PasteboardSource},
        sessions::SessionRegistry,
    },
    surface::{Browser, Flow, FlowId, FlowOutcome, Presenter},
};

pub const KEY: &str = "41791102999c339c844880b23950704cc43aa840f3739e365323cda4dfa89e7a";

/// A v2 session link for `topic`.
pub fn session_link(topic: &str) -> String {
    format!("wc:{topic}@2?relay-protocol=irn&symKey={KEY}")
}

#[derive(Debug, Default)]
struct PresenterLog {
    presented: Vec<(FlowId, Flow)>,
    visible: BTreeMap<FlowId, Flow>,
    close_all_calls: Vec<Option<Browser>>,
}

/// Presenter that records everything it is asked to show.
#[derive(Debug, Clone, Default)]
pub struct RecordingPresenter {
    log: Arc<Mutex<PresenterLog>>,
}

impl RecordingPresenter {
    /// Every flow presented so far, in order.
    pub fn presented(&self) -> Vec<(FlowId, Flow)> {
        self.log.lock().unwrap().presented.clone()
    }

    pub fn last(&self) -> Option<(FlowId, Flow)> {
        self.log.lock().unwrap().presented.last().cloned()
    }

    pub fn visible(&self) -> Vec<(FlowId, Flow)> {
        self.log
            .lock()
            .unwrap()
            .visible
            .iter()
            .map(|(id, flow)| (*id, flow.clone()))
            .collect()
    }

    pub fn close_all_calls(&self) -> Vec<Option<Browser>> {
        self.log.lock().unwrap().close_all_calls.clone()
    }

    /// Forget what was recorded, keeping the visible set.
    pub fn clear(&self) {
        let mut log = self.log.lock().unwrap();
        log.presented.clear();
        log.close_all_calls.clear();
    }
}

impl Presenter for RecordingPresenter {
    fn present(&mut self, id: FlowId, flow: Flow) {
        let mut log = self.log.lock().unwrap();
        log.presented.push((id, flow.clone()));
        log.visible.insert(id, flow);
    }

    fn close(&mut self, id: FlowId) {
        self.log.lock().unwrap().visible.remove(&id);
    }

    fn close_all(&mut self, activate: Option<Browser>) {
        let mut log = self.log.lock().unwrap();
        log.visible.clear();
        log.close_all_calls.push(activate);
    }

    fn is_visible(&self, id: FlowId) -> bool {
        self.log.lock().unwrap().visible.contains_key(&id)
    }
}

/// An agent plus handles on all of its collaborators.
pub struct TestAgent {
    pub agent: Agent,
    pub presenter: RecordingPresenter,
    pub pasteboard: MemoryPasteboard,
    pub authenticator: PromptAuthenticator,
    pub credentials: MemoryCredentialStore,
    pub sessions: SessionRegistry,
}

impl TestAgent {
    pub fn new(has_password: bool) -> Self {
        Self::with_config(Config::default(), has_password)
    }

    pub fn with_config(config: Config, has_password: bool) -> Self {
        let presenter = RecordingPresenter::default();
        let pasteboard = MemoryPasteboard::new();
        let authenticator = PromptAuthenticator::new(true);
        let credentials = MemoryCredentialStore::new(has_password);
        let sessions = SessionRegistry::new();

        let agent = Agent::new(
            config,
            Collaborators {
                source: Box::new(PasteboardSource::new(pasteboard.clone())),
                authenticator: Box::new(authenticator.clone()),
                credentials: Box::new(credentials.clone()),
                sessions: Box::new(sessions.clone()),
                presenter: Box::new(presenter.clone()),
            },
        );

        Self {
            agent,
            presenter,
            pasteboard,
            authenticator,
            credentials,
            sessions,
        }
    }

    /// An agent that already passed startup authentication, with nothing on
    /// screen and empty recordings.
    pub fn unlocked() -> Self {
        Self::unlocked_with(Config::default())
    }

    /// Same as [`TestAgent::unlocked`], answering the startup challenge the
    /// way `config` asks for.
    pub fn unlocked_with(config: Config) -> Self {
        let biometrics = config.biometrics;
        let mut test = Self::with_config(config, true);
        test.send(Action::Open);
        if biometrics {
            test.bio(BiometricOutcome::Success);
        } else {
            let (password, _) = test.last_flow();
            test.finish(password, FlowOutcome::PasswordEntered(true));
        }
        let (accounts, _) = test.last_flow();
        test.finish(accounts, FlowOutcome::Dismissed);
        test.presenter.clear();
        test
    }

    pub fn send(&mut self, action: Action) {
        self.agent.handle_action(action);
        self.agent.settle();
    }

    pub fn finish(&mut self, flow: FlowId, outcome: FlowOutcome) {
        self.send(Action::FlowFinished { flow, outcome });
    }

    /// Answer the oldest waiting biometric prompt.
    pub fn bio(&mut self, outcome: BiometricOutcome) {
        assert!(self.authenticator.answer(outcome), "no biometric prompt waiting");
        self.agent.settle();
    }

    pub fn last_flow(&self) -> (FlowId, Flow) {
        self.presenter.last().expect("no flow presented")
    }
}
