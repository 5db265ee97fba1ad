//! Line-oriented console surface: presented flows are printed, and stdin
//! commands play the user.

use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex},
};

use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::eyre::{Result, eyre};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info};

use wallet_agent::{
    action::Action,
    agent::AgentHandle,
    domain::{
        auth::BiometricOutcome,
        request::ExtensionRequest,
        wallet::{Account, EthereumChain, WalletId, WalletSelection},
    },
    infra::{
        biometrics::PromptAuthenticator, credentials::MemoryCredentialStore,
        pasteboard::MemoryPasteboard,
    },
    surface::{Browser, Flow, FlowId, FlowOutcome, Presenter},
};

/// Prints flows and remembers which ones are on screen.
#[derive(Debug, Clone, Default)]
pub struct ConsolePresenter {
    visible: Arc<Mutex<BTreeMap<FlowId, Flow>>>,
}

impl ConsolePresenter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn flow(&self, id: FlowId) -> Option<Flow> {
        self.lock().get(&id).cloned()
    }

    pub fn visible(&self) -> Vec<(FlowId, Flow)> {
        self.lock()
            .iter()
            .map(|(id, flow)| (*id, flow.clone()))
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<FlowId, Flow>> {
        self.visible.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Presenter for ConsolePresenter {
    fn present(&mut self, id: FlowId, flow: Flow) {
        println!("[{id}] {}", describe(&flow));
        self.lock().insert(id, flow);
    }

    fn close(&mut self, id: FlowId) {
        if self.lock().remove(&id).is_some() {
            debug!("Closed flow {}", id);
        }
    }

    fn close_all(&mut self, activate: Option<Browser>) {
        self.lock().clear();
        match activate {
            Some(browser) => println!("(all windows closed, back to {browser})"),
            None => println!("(all windows closed)"),
        }
    }

    fn is_visible(&self, id: FlowId) -> bool {
        self.lock().contains_key(&id)
    }
}

fn describe(flow: &Flow) -> String {
    match flow {
        Flow::Welcome => "welcome: create a password (create <flow>)".to_string(),
        Flow::PasswordEntry { reason } => {
            format!("enter password to {} (password <flow> ok|fail)", reason.title())
        }
        Flow::AccountsList {
            selects_wallet,
            preferred_chain,
        } => match (*selects_wallet, preferred_chain) {
            (true, Some(chain)) => {
                format!("accounts: pick one, {chain} suggested (select <flow> <chain> <wallet> <address>)")
            }
            (true, None) => {
                "accounts: pick one (select <flow> <chain> <wallet> <address>)".to_string()
            }
            (false, _) => "accounts".to_string(),
        },
        Flow::Connecting => "connecting...".to_string(),
        Flow::ApproveTransaction {
            transaction,
            chain,
            peer,
        } => format!(
            "{} wants to send a transaction on {chain} to {} (approve|reject <flow>)",
            peer.name,
            transaction.to.as_deref().unwrap_or("new contract")
        ),
        Flow::ApproveMessage {
            subject,
            meta,
            account,
            peer,
        } => format!(
            "{} asks {} to {subject}: {meta} (approve|reject <flow>)",
            peer.name, account.address
        ),
        Flow::Error { message } => format!("error: {message}"),
        Flow::StatusMenu => "menu".to_string(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Answer {
    Ok,
    Fail,
    Cancel,
}

#[derive(Parser, Debug)]
#[command(no_binary_name = true, disable_help_subcommand = true)]
pub struct Line {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Put text on the pasteboard
    Paste { text: String },
    /// Check the pasteboard and open the agent
    Open,
    /// Click the status bar item
    Click,
    /// Answer the waiting biometric prompt
    Bio { answer: Answer },
    /// Submit an extension request given as JSON
    Ext { json: String },
    /// Create the wallet password in a welcome flow
    Create { flow: u64 },
    /// Answer a password flow
    Password { flow: u64, answer: Answer },
    /// Pick an account in an accounts flow
    Select {
        flow: u64,
        chain: EthereumChain,
        wallet: String,
        address: String,
    },
    /// Approve a message or transaction flow
    Approve { flow: u64 },
    /// Reject a message or transaction flow
    Reject { flow: u64 },
    /// Close a flow without answering
    Close { flow: u64 },
    /// List open flows
    Flows,
    Quit,
}

/// Parse one input line. `paste` and `ext` take the rest of the line as-is.
pub fn parse_line(line: &str) -> Result<Command> {
    let line = line.trim();
    let args: Vec<&str> = match line.split_once(char::is_whitespace) {
        Some((head @ ("paste" | "ext"), rest)) => vec![head, rest.trim()],
        _ => line.split_whitespace().collect(),
    };
    Line::try_parse_from(args)
        .map(|line| line.command)
        .map_err(|e| eyre!("{}", e.render()))
}

/// Shared pieces the console acts on.
#[derive(Clone)]
pub struct Console {
    pub handle: AgentHandle,
    pub presenter: ConsolePresenter,
    pub pasteboard: MemoryPasteboard,
    pub authenticator: PromptAuthenticator,
    pub credentials: MemoryCredentialStore,
}

impl Console {
    /// Read commands from stdin until EOF or `quit`.
    pub async fn run(self) -> Result<()> {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            match parse_line(&line) {
                Ok(Command::Quit) => break,
                Ok(command) => {
                    if let Err(e) = self.execute(command) {
                        println!("{e}");
                    }
                }
                Err(e) => println!("{e}"),
            }
        }
        self.handle.quit()
    }

    pub fn execute(&self, command: Command) -> Result<()> {
        debug!("Console command: {:?}", command);
        match command {
            Command::Paste { text } => self.pasteboard.set(text),
            Command::Open => self.handle.open()?,
            Command::Click => self.handle.send(Action::StatusItemClicked)?,
            Command::Bio { answer } => {
                let outcome = match answer {
                    Answer::Ok => BiometricOutcome::Success,
                    Answer::Fail => BiometricOutcome::Failed,
                    Answer::Cancel => BiometricOutcome::Cancelled,
                };
                if !self.authenticator.answer(outcome) {
                    println!("no biometric prompt is waiting");
                }
            }
            Command::Ext { json } => {
                let (request, response) = ExtensionRequest::from_json(&json)?.with_responder();
                let id = request.id;
                tokio::spawn(async move {
                    if let Ok(response) = response.await {
                        match serde_json::to_string(&response) {
                            Ok(json) => println!("extension request {id} answered: {json}"),
                            Err(e) => println!("extension request {id} answered: {e}"),
                        }
                    }
                });
                self.handle.submit_extension_request(request)?;
            }
            Command::Create { flow } => {
                self.credentials.store();
                info!("Credential stored from console");
                self.finish(flow, FlowOutcome::PasswordCreated(true))?;
            }
            Command::Password { flow, answer } => {
                self.finish(flow, FlowOutcome::PasswordEntered(answer == Answer::Ok))?
            }
            Command::Select {
                flow,
                chain,
                wallet,
                address,
            } => self.finish(
                flow,
                FlowOutcome::WalletSelected(WalletSelection::new(
                    chain,
                    WalletId(wallet),
                    Account::ethereum(address),
                )),
            )?,
            Command::Approve { flow } => {
                let outcome = match self.presenter.flow(FlowId(flow)) {
                    Some(Flow::ApproveMessage { .. }) => FlowOutcome::MessageReviewed(true),
                    Some(Flow::ApproveTransaction { transaction, .. }) => {
                        FlowOutcome::TransactionReviewed(Some(transaction))
                    }
                    _ => return Err(eyre!("flow {flow} has nothing to approve")),
                };
                self.finish(flow, outcome)?;
            }
            Command::Reject { flow } => {
                let outcome = match self.presenter.flow(FlowId(flow)) {
                    Some(Flow::ApproveMessage { .. }) => FlowOutcome::MessageReviewed(false),
                    Some(Flow::ApproveTransaction { .. }) => FlowOutcome::TransactionReviewed(None),
                    _ => return Err(eyre!("flow {flow} has nothing to reject")),
                };
                self.finish(flow, outcome)?;
            }
            Command::Close { flow } => self.finish(flow, FlowOutcome::Dismissed)?,
            Command::Flows => {
                for (id, flow) in self.presenter.visible() {
                    println!("[{id}] {flow}");
                }
            }
            Command::Quit => self.handle.quit()?,
        }
        Ok(())
    }

    fn finish(&self, flow: u64, outcome: FlowOutcome) -> Result<()> {
        self.handle.finish_flow(FlowId(flow), outcome)
    }
}
